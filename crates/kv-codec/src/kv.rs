// SPDX-License-Identifier: Apache-2.0
//! The `encoded` layer: transforms every value through a [`Codec`].

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use kv_core::{KvError, KvResult, KeyStream, KV};

use crate::codec::Codec;

/// Wraps a base `KV` so every stored value passes through a [`Codec`].
///
/// The key space is unchanged — only values are transformed, so `list`,
/// `has`, `len`, and `delete` forward unmodified to the base.
pub struct EncodedKv {
    base: Arc<dyn KV>,
    codec: Arc<dyn Codec>,
}

impl EncodedKv {
    /// Wrap `base`, encoding/decoding values with `codec`.
    pub fn new(base: Arc<dyn KV>, codec: Arc<dyn Codec>) -> Self {
        Self { base, codec }
    }
}

#[async_trait]
impl KV for EncodedKv {
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
        let encoded = self.codec.encode(data);
        self.base.put(key, &encoded, replace).await
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
