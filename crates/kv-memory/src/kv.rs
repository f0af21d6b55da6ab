// SPDX-License-Identifier: Apache-2.0
//! `BTreeMap`-backed in-memory keyspace.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use futures::stream;
use kv_core::{KeyError, KeyStream, KvResult, KV};
use tokio::sync::RwLock;

/// A single in-memory keyspace.
///
/// Keys are stored in a `BTreeMap`, which keeps `list` trivially ordered.
/// The whole map is guarded by a single `RwLock` — adequate for the sizes
/// this backend is meant for (tests, write-back buffers); `kv-cache`'s
/// sharded keymap is the place to look if a single lock becomes a
/// bottleneck over a slow backend.
#[derive(Default)]
pub struct MemoryKv {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryKv {
    /// Create an empty keyspace.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
        }
    }
}

#[async_trait]
impl KV for MemoryKv {
    async fn get(&self, key: &[u8]) -> KvResult<Vec<u8>> {
        let data = self.data.read().await;
        data.get(key)
            .cloned()
            .ok_or_else(|| KeyError::not_found(key.to_vec()).into())
    }

    async fn has(&self, keys: &[Vec<u8>]) -> KvResult<HashSet<Vec<u8>>> {
        let data = self.data.read().await;
        Ok(keys
            .iter()
            .filter(|k| data.contains_key(k.as_slice()))
            .cloned()
            .collect())
    }

    async fn put(&self, key: &[u8], value: &[u8], replace: bool) -> KvResult<()> {
        let mut data = self.data.write().await;
        if !replace && data.contains_key(key) {
            return Err(KeyError::exists(key.to_vec()).into());
        }
        data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &[u8]) -> KvResult<()> {
        let mut data = self.data.write().await;
        data.remove(key)
            .map(|_| ())
            .ok_or_else(|| KeyError::not_found(key.to_vec()).into())
    }

    async fn list(&self, start: &[u8]) -> KvResult<KeyStream> {
        let data = self.data.read().await;
        let keys: Vec<Vec<u8>> = data
            .range(start.to_vec()..)
            .map(|(k, _)| k.clone())
            .collect();
        Ok(Box::pin(stream::iter(keys.into_iter().map(Ok))))
    }

    async fn len(&self) -> KvResult<u64> {
        let data = self.data.read().await;
        Ok(data.len() as u64)
    }
}
