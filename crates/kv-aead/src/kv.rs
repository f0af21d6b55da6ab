// SPDX-License-Identifier: Apache-2.0
//! Wraps a base `KV` so every stored value is sealed with [`AeadCodec`].

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use kv_core::{KeyStream, KvError, KvResult, KV};

use crate::codec::AeadCodec;

/// A `KV` whose values are transparently encrypted and authenticated.
///
/// The key space is unchanged; only stored values pass through the AEAD
/// block format.
pub struct AeadKv {
    base: Arc<dyn KV>,
    codec: AeadCodec,
}

impl AeadKv {
    /// Wrap `base`, sealing and opening values with `codec`.
    pub fn new(base: Arc<dyn KV>, codec: AeadCodec) -> Self {
        Self { base, codec }
    }
}

#[async_trait]
impl KV for AeadKv {
    async fn get(&self, key: &[u8]) -> KvResult<Vec<u8>> {
        let stored = self.base.get(key).await?;
        self.codec
            .decode(&stored)
            .map_err(|e| KvError::Codec(e.to_string()))
    }

    async fn has(&self, keys: &[Vec<u8>]) -> KvResult<HashSet<Vec<u8>>> {
        self.base.has(keys).await
    }

    async fn put(&self, key: &[u8], data: &[u8], replace: bool) -> KvResult<()> {
        let sealed = self
            .codec
            .encode(data)
            .map_err(|e| KvError::Codec(e.to_string()))?;
        self.base.put(key, &sealed, replace).await
    }

    async fn delete(&self, key: &[u8]) -> KvResult<()> {
        self.base.delete(key).await
    }

    async fn list(&self, start: &[u8]) -> KvResult<KeyStream> {
        self.base.list(start).await
    }

    async fn len(&self) -> KvResult<u64> {
        self.base.len().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::keyring::StaticKeyring;
    use crate::nonce::NonceSource;
    use kv_memory::MemoryKv;

    struct FixedByteNonceSource(u8);

    impl NonceSource for FixedByteNonceSource {
        fn fill(&self, buf: &mut [u8]) {
            buf.fill(self.0);
        }
    }

    fn aead_kv() -> AeadKv {
        let keyring = StaticKeyring::single(1, b"0123456789abcdef".to_vec());
        let codec = AeadCodec::with_nonce_source(Arc::new(keyring), Arc::new(FixedByteNonceSource(0x01)));
        AeadKv::new(Arc::new(MemoryKv::new()), codec)
    }

    #[tokio::test]
    async fn round_trip_through_the_kv_interface() {
        let kv = aead_kv();
        kv.put(b"secret", b"the password is swordfish", false)
            .await
            .unwrap();
        assert_eq!(kv.get(b"secret").await.unwrap(), b"the password is swordfish");
    }

    #[tokio::test]
    async fn base_storage_never_sees_plaintext() {
        let base: Arc<dyn KV> = Arc::new(MemoryKv::new());
        let keyring = StaticKeyring::single(1, b"0123456789abcdef".to_vec());
        let codec = AeadCodec::with_nonce_source(Arc::new(keyring), Arc::new(FixedByteNonceSource(0x01)));
        let kv = AeadKv::new(Arc::clone(&base), codec);
        kv.put(b"k", b"plaintext value", false).await.unwrap();
        let raw = base.get(b"k").await.unwrap();
        assert_ne!(raw, b"plaintext value");
    }

    #[tokio::test]
    async fn not_found_propagates_through_the_codec_layer() {
        let kv = aead_kv();
        let err = kv.get(b"missing").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
