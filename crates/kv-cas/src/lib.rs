// SPDX-License-Identifier: Apache-2.0
//! Content-addressable wrapper: derive a [`CAS`] from any [`KV`].
//!
//! [`cas_from_kv`] wraps an arbitrary `KV` so that `cas_key(data)` computes
//! `hasher.digest(data)` and `cas_put(data)` writes the blob under that
//! address, eliding the write (treating *key-exists* as success) when the
//! content is already stored. The wrapper never requests replacement — the
//! key is a pure function of the content, so there is never a different
//! value to replace it with.
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::module_name_repetitions,
    clippy::missing_errors_doc
)]

mod hasher;

pub use hasher::{Blake3Hasher, ContentHasher, Sha1Hasher};

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use kv_core::{KeyStream, KvResult, CAS, KV};

/// Wrap `kv` to present a [`CAS`] interface, addressing content with `hasher`.
pub fn cas_from_kv(kv: Arc<dyn KV>, hasher: Arc<dyn ContentHasher>) -> Arc<dyn CAS> {
    Arc::new(CasFromKv { kv, hasher })
}

struct CasFromKv {
    kv: Arc<dyn KV>,
    hasher: Arc<dyn ContentHasher>,
}

#[async_trait]
impl KV for CasFromKv {
    async fn get(&self, key: &[u8]) -> KvResult<Vec<u8>> {
        self.kv.get(key).await
    }

    async fn has(&self, keys: &[Vec<u8>]) -> KvResult<HashSet<Vec<u8>>> {
        self.kv.has(keys).await
    }

    async fn put(&self, key: &[u8], data: &[u8], replace: bool) -> KvResult<()> {
        self.kv.put(key, data, replace).await
    }

    async fn delete(&self, key: &[u8]) -> KvResult<()> {
        self.kv.delete(key).await
    }

    async fn list(&self, start: &[u8]) -> KvResult<KeyStream> {
        self.kv.list(start).await
    }

    async fn len(&self) -> KvResult<u64> {
        self.kv.len().await
    }
}

#[async_trait]
impl CAS for CasFromKv {
    fn cas_key(&self, data: &[u8]) -> Vec<u8> {
        self.hasher.digest(data)
    }

    async fn cas_put(&self, data: &[u8]) -> KvResult<Vec<u8>> {
        let key = self.cas_key(data);
        let present = self.kv.has(std::slice::from_ref(&key)).await?;
        if present.contains(&key) {
            return Ok(key);
        }
        match self.kv.put(&key, data, false).await {
            Ok(()) => Ok(key),
            Err(err) if err.is_exists() => Ok(key),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use kv_memory::MemoryKv;

    fn sha1_cas() -> Arc<dyn CAS> {
        let base: Arc<dyn KV> = Arc::new(MemoryKv::new());
        cas_from_kv(base, Arc::new(Sha1Hasher))
    }

    #[tokio::test]
    async fn cas_key_equals_cas_put_key() {
        let cas = sha1_cas();
        let data = b"abcde\n";
        let key = cas.cas_key(data);
        let put_key = cas.cas_put(data).await.unwrap();
        assert_eq!(key, put_key);
    }

    #[tokio::test]
    async fn cas_put_is_idempotent() {
        let cas = sha1_cas();
        let data = b"some of what a fool thinks often remains";
        let k1 = cas.cas_put(data).await.unwrap();
        let k2 = cas.cas_put(data).await.unwrap();
        assert_eq!(k1, k2);
        assert_eq!(cas.get(&k1).await.unwrap(), data);
    }

    #[tokio::test]
    async fn known_sha1_vector() {
        let cas = sha1_cas();
        let key = cas.cas_put(b"abcde\n").await.unwrap();
        let hex: String = key.iter().map(|b| format!("{b:02x}")).collect();
        assert_eq!(hex, "ec11312386ad561674f724b8cca7cf1796e26d1d");
    }

    #[tokio::test]
    async fn distinct_content_distinct_keys() {
        let cas = sha1_cas();
        let k1 = cas.cas_put(b"one").await.unwrap();
        let k2 = cas.cas_put(b"two").await.unwrap();
        assert_ne!(k1, k2);
    }
}
