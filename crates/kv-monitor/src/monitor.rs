// SPDX-License-Identifier: Apache-2.0
//! The memoizing `kv`/`sub`/`cas` factory shared by every store layer.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use kv_cas::{cas_from_kv, ContentHasher};
use kv_core::{KvResult, Store, CAS, KV};
use tokio::sync::Mutex;
use tracing::instrument;

use crate::prefix::derive_prefix;

/// Constructs a `KV` for a given `(state, prefix, name)`.
///
/// Constructors must not call back into the monitor that invoked them — the
/// per-name lock is held for the duration of construction to coalesce
/// concurrent lookups, and a constructor that reenters would deadlock. A
/// constructor that itself needs a monitor should build a fresh one (a
/// sub-store is, by design, a separate monitor).
#[async_trait]
pub trait NewKv<S>: Send + Sync {
    /// Build the `KV` named `name` under the given derived `prefix`.
    async fn new_kv(&self, state: &S, prefix: &[u8], name: &str) -> KvResult<Arc<dyn KV>>;
}

/// Constructs a sub-`Store` for a given `(state, prefix, name)`.
#[async_trait]
pub trait NewSub<S>: Send + Sync {
    /// Build the sub-store named `name` under the given derived `prefix`.
    async fn new_sub(&self, state: &S, prefix: &[u8], name: &str) -> KvResult<Arc<dyn Store>>;
}

/// Memoizing factory for named `KV`s and sub-`Store`s, with derived prefix
/// threading.
///
/// `kv(name)` and `sub(name)` each hold a mutex over their respective cache
/// map while invoking the configured constructor, so concurrent lookups of
/// the same name share one construction instead of racing to build (and
/// potentially losing track of) independent instances.
pub struct Monitor<S> {
    state: S,
    prefix: Vec<u8>,
    new_kv: Arc<dyn NewKv<S>>,
    new_sub: Option<Arc<dyn NewSub<S>>>,
    kvs: Mutex<HashMap<String, Arc<dyn KV>>>,
    subs: Mutex<HashMap<String, Arc<dyn Store>>>,
}

impl<S> Monitor<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Build a monitor rooted at `prefix`, using `new_kv`/`new_sub` to
    /// construct keyspaces and sub-stores on first lookup.
    pub fn new(
        state: S,
        prefix: Vec<u8>,
        new_kv: Arc<dyn NewKv<S>>,
        new_sub: Option<Arc<dyn NewSub<S>>>,
    ) -> Self {
        Self {
            state,
            prefix,
            new_kv,
            new_sub,
            kvs: Mutex::new(HashMap::new()),
            subs: Mutex::new(HashMap::new()),
        }
    }

    /// The derived prefix identifying this monitor's position in the store
    /// tree.
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Look up (constructing on first use) the `KV` named `name`.
    #[instrument(skip(self), fields(name))]
    pub async fn kv(&self, name: &str) -> KvResult<Arc<dyn KV>> {
        let mut kvs = self.kvs.lock().await;
        if let Some(existing) = kvs.get(name) {
            return Ok(Arc::clone(existing));
        }
        let child_prefix = derive_prefix(&self.prefix, name);
        let built = self.new_kv.new_kv(&self.state, &child_prefix, name).await?;
        kvs.insert(name.to_string(), Arc::clone(&built));
        Ok(built)
    }

    /// Look up (constructing on first use) the sub-store named `name`.
    ///
    /// If no `new_sub` constructor was configured, the parent's state is
    /// reused unchanged — the returned store shares the same `new_kv`
    /// constructor, just scoped under the extended prefix.
    #[instrument(skip(self), fields(name))]
    pub async fn sub(&self, name: &str) -> KvResult<Arc<dyn Store>> {
        let mut subs = self.subs.lock().await;
        if let Some(existing) = subs.get(name) {
            return Ok(Arc::clone(existing));
        }
        let child_prefix = derive_prefix(&self.prefix, name);
        let built: Arc<dyn Store> = match &self.new_sub {
            Some(ctor) => ctor.new_sub(&self.state, &child_prefix, name).await?,
            None => Arc::new(MonitorStore::new(
                self.state.clone(),
                child_prefix,
                Arc::clone(&self.new_kv),
                None,
                Arc::new(kv_cas::Blake3Hasher),
            )),
        };
        subs.insert(name.to_string(), Arc::clone(&built));
        Ok(built)
    }
}

/// A [`Store`] implementation backed by a [`Monitor`].
///
/// Most backend crates construct one `MonitorStore` as their public `Store`
/// type; it supplies `cas(name)` as `cas_from_kv(kv(name))` over the
/// configured hasher, per the specification.
pub struct MonitorStore<S> {
    monitor: Monitor<S>,
    hasher: Arc<dyn ContentHasher>,
}

impl<S> MonitorStore<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Construct a store rooted at `prefix` over `state`.
    pub fn new(
        state: S,
        prefix: Vec<u8>,
        new_kv: Arc<dyn NewKv<S>>,
        new_sub: Option<Arc<dyn NewSub<S>>>,
        hasher: Arc<dyn ContentHasher>,
    ) -> Self {
        Self {
            monitor: Monitor::new(state, prefix, new_kv, new_sub),
            hasher,
        }
    }

    /// The derived prefix identifying this store's position in the tree.
    pub fn prefix(&self) -> &[u8] {
        self.monitor.prefix()
    }
}

#[async_trait]
impl<S> Store for MonitorStore<S>
where
    S: Clone + Send + Sync + 'static,
{
    async fn kv(&self, name: &str) -> KvResult<Arc<dyn KV>> {
        self.monitor.kv(name).await
    }

    async fn cas(&self, name: &str) -> KvResult<Arc<dyn CAS>> {
        let kv = self.monitor.kv(name).await?;
        Ok(cas_from_kv(kv, Arc::clone(&self.hasher)))
    }

    async fn sub(&self, name: &str) -> KvResult<Arc<dyn Store>> {
        self.monitor.sub(name).await
    }

    async fn close(&self) -> KvResult<()> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use kv_core::KeyStream;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingKv;

    #[async_trait]
    impl KV for CountingKv {
        async fn get(&self, _key: &[u8]) -> KvResult<Vec<u8>> {
            Ok(Vec::new())
        }
        async fn has(&self, _keys: &[Vec<u8>]) -> KvResult<HashSet<Vec<u8>>> {
            Ok(HashSet::new())
        }
        async fn put(&self, _key: &[u8], _data: &[u8], _replace: bool) -> KvResult<()> {
            Ok(())
        }
        async fn delete(&self, _key: &[u8]) -> KvResult<()> {
            Ok(())
        }
        async fn list(&self, _start: &[u8]) -> KvResult<KeyStream> {
            Ok(Box::pin(futures::stream::empty()))
        }
        async fn len(&self) -> KvResult<u64> {
            Ok(0)
        }
    }

    struct CountingCtor {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl NewKv<()> for CountingCtor {
        async fn new_kv(&self, _state: &(), _prefix: &[u8], _name: &str) -> KvResult<Arc<dyn KV>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(CountingKv))
        }
    }

    #[tokio::test]
    async fn repeated_lookups_construct_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let monitor = Monitor::new(
            (),
            Vec::new(),
            Arc::new(CountingCtor {
                calls: Arc::clone(&calls),
            }),
            None,
        );
        let a = monitor.kv("alpha").await.unwrap();
        let b = monitor.kv("alpha").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_names_construct_independently() {
        let calls = Arc::new(AtomicUsize::new(0));
        let monitor = Monitor::new(
            (),
            Vec::new(),
            Arc::new(CountingCtor {
                calls: Arc::clone(&calls),
            }),
            None,
        );
        let _ = monitor.kv("alpha").await.unwrap();
        let _ = monitor.kv("beta").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn sub_without_ctor_reuses_state() {
        let calls = Arc::new(AtomicUsize::new(0));
        let store = MonitorStore::new(
            (),
            Vec::new(),
            Arc::new(CountingCtor {
                calls: Arc::clone(&calls),
            }),
            None,
            Arc::new(kv_cas::Blake3Hasher),
        );
        let child = store.sub("child").await.unwrap();
        let _ = child.kv("alpha").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
