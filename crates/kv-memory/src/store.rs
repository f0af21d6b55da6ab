// SPDX-License-Identifier: Apache-2.0
//! `Store` implementation wiring `MemoryKv` into `kv-monitor`.

use std::sync::Arc;

use async_trait::async_trait;
use kv_cas::Blake3Hasher;
use kv_core::{KvResult, Store, CAS, KV};
use kv_monitor::{MonitorStore, NewKv};

use crate::kv::MemoryKv;

struct MemoryNewKv;

#[async_trait]
impl NewKv<()> for MemoryNewKv {
    async fn new_kv(&self, _state: &(), _prefix: &[u8], _name: &str) -> KvResult<Arc<dyn KV>> {
        Ok(Arc::new(MemoryKv::new()))
    }
}

/// An in-memory [`Store`]: every `kv`/`sub` name gets a fresh, independent
/// [`MemoryKv`], memoized by [`kv_monitor::Monitor`].
pub struct MemoryStore {
    inner: MonitorStore<()>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: MonitorStore::new(
                (),
                Vec::new(),
                Arc::new(MemoryNewKv),
                None,
                Arc::new(Blake3Hasher),
            ),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn kv(&self, name: &str) -> KvResult<Arc<dyn KV>> {
        self.inner.kv(name).await
    }

    async fn cas(&self, name: &str) -> KvResult<Arc<dyn CAS>> {
        self.inner.cas(name).await
    }

    async fn sub(&self, name: &str) -> KvResult<Arc<dyn Store>> {
        self.inner.sub(name).await
    }

    async fn close(&self) -> KvResult<()> {
        self.inner.close().await
    }
}
