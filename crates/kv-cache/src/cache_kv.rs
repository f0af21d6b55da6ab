// SPDX-License-Identifier: Apache-2.0
//! [`CacheKv`]: read-through cache over a slow base `KV`.

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use futures::StreamExt;
use kv_core::{KeyError, KeyStream, KvError, KvResult, KV};
use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::bytes_lru::BytesBoundedLru;
use crate::throttle::KeyedThrottle;

const SHARD_COUNT: u16 = 256;

/// Wraps a slow base `KV` with a materialized key index, a bounded-byte LRU
/// value cache, and per-key single-flight deduplication.
///
/// Assumes the wrapped keyspace is not concurrently mutated by any writer
/// other than this cache; concurrent readers of the base are fine.
pub struct CacheKv {
    base: Arc<dyn KV>,
    keymap: RwLock<BTreeSet<Vec<u8>>>,
    cache: StdMutex<BytesBoundedLru>,
    listed: AtomicBool,
    init: AsyncMutex<()>,
    get_throttle: KeyedThrottle,
    put_throttle: KeyedThrottle,
    delete_throttle: KeyedThrottle,
}

impl CacheKv {
    /// Wrap `base`, bounding the value cache to `cache_cap_bytes` total
    /// bytes of stored values.
    pub fn new(base: Arc<dyn KV>, cache_cap_bytes: usize) -> Self {
        Self {
            base,
            keymap: RwLock::new(BTreeSet::new()),
            cache: StdMutex::new(BytesBoundedLru::new(cache_cap_bytes)),
            listed: AtomicBool::new(false),
            init: AsyncMutex::new(()),
            get_throttle: KeyedThrottle::new(),
            put_throttle: KeyedThrottle::new(),
            delete_throttle: KeyedThrottle::new(),
        }
    }

    /// Ensure the key index has been populated, retrying the scan on a
    /// previous failure.
    #[instrument(skip(self))]
    async fn ensure_loaded(&self) -> KvResult<()> {
        if self.listed.load(Ordering::Acquire) {
            return Ok(());
        }
        let _guard = self.init.lock().await;
        if self.listed.load(Ordering::Acquire) {
            return Ok(());
        }
        self.load_keymap().await?;
        self.listed.store(true, Ordering::Release);
        Ok(())
    }

    async fn load_keymap(&self) -> KvResult<()> {
        let cancel = CancellationToken::new();
        let mut shards = Vec::with_capacity(SHARD_COUNT as usize);
        for shard in 0u16..SHARD_COUNT {
            let base = Arc::clone(&self.base);
            let cancel = cancel.clone();
            let shard_byte = shard as u8;
            shards.push(tokio::spawn(async move {
                scan_shard(base.as_ref(), shard_byte, &cancel).await
            }));
        }

        let mut all = BTreeSet::new();
        let mut first_error: Option<KvError> = None;
        for shard in shards {
            match shard.await.map_err(KvError::other) {
                Ok(Ok(keys)) => all.extend(keys),
                Ok(Err(err)) => {
                    cancel.cancel();
                    first_error.get_or_insert(err);
                }
                Err(err) => {
                    cancel.cancel();
                    first_error.get_or_insert(err);
                }
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }

        *self.keymap.write().await = all;
        Ok(())
    }
}

async fn scan_shard(base: &dyn KV, shard_byte: u8, cancel: &CancellationToken) -> KvResult<Vec<Vec<u8>>> {
    let mut keys = Vec::new();
    let mut stream = base.list(&[shard_byte]).await?;
    while let Some(item) = stream.next().await {
        if cancel.is_cancelled() {
            break;
        }
        let key = item?;
        if key.first().copied() != Some(shard_byte) {
            break;
        }
        keys.push(key);
    }
    Ok(keys)
}

#[async_trait]
impl KV for CacheKv {
    #[instrument(skip(self))]
    async fn get(&self, key: &[u8]) -> KvResult<Vec<u8>> {
        self.ensure_loaded().await?;

        {
            let keymap = self.keymap.read().await;
            if !keymap.contains(key) {
                return Err(KeyError::not_found(key.to_vec()).into());
            }
        }
        #[allow(clippy::unwrap_used)]
        if let Some(cached) = self.cache.lock().unwrap_or_else(|p| p.into_inner()).get(key) {
            return Ok(cached);
        }

        let _guard = self.get_throttle.acquire(key).await;
        #[allow(clippy::unwrap_used)]
        if let Some(cached) = self.cache.lock().unwrap_or_else(|p| p.into_inner()).get(key) {
            return Ok(cached);
        }
        let data = self.base.get(key).await?;
        #[allow(clippy::unwrap_used)]
        self.cache
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .put(key.to_vec(), data.clone());
        Ok(data)
    }

    async fn has(&self, keys: &[Vec<u8>]) -> KvResult<HashSet<Vec<u8>>> {
        self.ensure_loaded().await?;
        let keymap = self.keymap.read().await;
        Ok(keys.iter().filter(|k| keymap.contains(k.as_slice())).cloned().collect())
    }

    #[instrument(skip(self, data))]
    async fn put(&self, key: &[u8], data: &[u8], replace: bool) -> KvResult<()> {
        self.ensure_loaded().await?;
        let _guard = self.put_throttle.acquire(key).await;
        self.base.put(key, data, replace).await?;
        self.keymap.write().await.insert(key.to_vec());
        #[allow(clippy::unwrap_used)]
        self.cache
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .put(key.to_vec(), data.to_vec());
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &[u8]) -> KvResult<()> {
        self.ensure_loaded().await?;
        let _guard = self.delete_throttle.acquire(key).await;
        let result = self.base.delete(key).await;
        #[allow(clippy::unwrap_used)]
        self.cache.lock().unwrap_or_else(|p| p.into_inner()).remove(key);
        if result.is_ok() {
            self.keymap.write().await.remove(key);
        }
        result
    }

    async fn list(&self, start: &[u8]) -> KvResult<KeyStream> {
        self.ensure_loaded().await?;
        let keymap = self.keymap.read().await;
        let keys: Vec<Vec<u8>> = keymap.range(start.to_vec()..).cloned().collect();
        Ok(Box::pin(futures::stream::iter(keys.into_iter().map(Ok))))
    }

    async fn len(&self) -> KvResult<u64> {
        self.ensure_loaded().await?;
        Ok(self.keymap.read().await.len() as u64)
    }
}
