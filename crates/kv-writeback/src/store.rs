// SPDX-License-Identifier: Apache-2.0
//! [`WbStore`]: a `Store` whose keyspaces buffer non-replacing writes and
//! drain them to a base `Store` in the background.

use std::sync::Arc;

use async_trait::async_trait;
use kv_affix::AffixedKv;
use kv_cas::Blake3Hasher;
use kv_core::{KvResult, Store, CAS, KV};
use kv_monitor::{MonitorStore, NewKv, NewSub};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::shared::{run_drainer, WbOptions, WbShared};
use crate::wb_kv::WbKv;

#[derive(Clone)]
struct WbState {
    base: Arc<dyn Store>,
    shared: Arc<WbShared>,
}

struct WbNewKv;

#[async_trait]
impl NewKv<WbState> for WbNewKv {
    async fn new_kv(&self, state: &WbState, prefix: &[u8], name: &str) -> KvResult<Arc<dyn KV>> {
        let base_kv = state.base.kv(name).await?;
        state.shared.register(prefix.to_vec(), Arc::clone(&base_kv)).await;
        let buffer: Arc<dyn KV> = AffixedKv::new(Arc::clone(state.shared.buffer())).with_prefix(prefix.to_vec());
        Ok(Arc::new(WbKv::new(base_kv, buffer, Arc::clone(&state.shared))))
    }
}

struct WbNewSub;

#[async_trait]
impl NewSub<WbState> for WbNewSub {
    async fn new_sub(&self, state: &WbState, prefix: &[u8], name: &str) -> KvResult<Arc<dyn Store>> {
        let base_sub = state.base.sub(name).await?;
        let child = WbState {
            base: base_sub,
            shared: Arc::clone(&state.shared),
        };
        Ok(Arc::new(MonitorStore::new(
            child,
            prefix.to_vec(),
            Arc::new(WbNewKv),
            Some(Arc::new(WbNewSub)),
            Arc::new(Blake3Hasher),
        )))
    }
}

/// A `Store` that buffers non-replacing writes in `buffer` and drains them
/// to `base` in the background.
///
/// All keyspaces and sub-stores derived from one `WbStore` share a single
/// buffer `KV` (tagged by derived prefix, see `kv-monitor`) and a single
/// background drainer task, matching the specification's "single background
/// drainer per store" design.
pub struct WbStore {
    inner: MonitorStore<WbState>,
    shared: Arc<WbShared>,
    drainer: Mutex<Option<JoinHandle<()>>>,
}

impl WbStore {
    /// Wrap `base`, buffering non-replacing writes in `buffer` with default
    /// drain tunables.
    pub fn new(base: Arc<dyn Store>, buffer: Arc<dyn KV>) -> Self {
        Self::with_options(base, buffer, WbOptions::default())
    }

    /// As [`WbStore::new`], with explicit drain tunables.
    pub fn with_options(base: Arc<dyn Store>, buffer: Arc<dyn KV>, options: WbOptions) -> Self {
        let shared = Arc::new(WbShared::new(buffer, options));
        let state = WbState {
            base,
            shared: Arc::clone(&shared),
        };
        let inner = MonitorStore::new(state, Vec::new(), Arc::new(WbNewKv), Some(Arc::new(WbNewSub)), Arc::new(Blake3Hasher));
        let drain_shared = Arc::clone(&shared);
        let handle = tokio::spawn(run_drainer(drain_shared));
        Self {
            inner,
            shared,
            drainer: Mutex::new(Some(handle)),
        }
    }

    /// Block until a drain cycle has left the buffer empty, i.e. every
    /// accepted, non-deleted write since the last `sync` has reached the
    /// base.
    pub async fn sync(&self) -> KvResult<()> {
        self.shared.sync().await
    }
}

#[async_trait]
impl Store for WbStore {
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
        self.shared.cancel();
        let handle = self.drainer.lock().await.take();
        if let Some(handle) = handle {
            handle.await.map_err(kv_core::KvError::other)?;
        }
        Ok(())
    }
}
