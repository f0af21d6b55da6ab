// SPDX-License-Identifier: Apache-2.0
//! [`FsStore`]: a `Store` rooted at a directory, nesting named keyspaces and
//! sub-stores as `_<hex(name)>` subdirectories.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use kv_cas::Blake3Hasher;
use kv_core::{Store, KV};
use kv_monitor::{MonitorStore, NewKv, NewSub};

use crate::fs_kv::FsKv;

fn namespace_dir(root: &std::path::Path, name: &str) -> PathBuf {
    root.join(format!("_{}", hex::encode(name.as_bytes())))
}

struct FsNewKv;

#[async_trait]
impl NewKv<PathBuf> for FsNewKv {
    async fn new_kv(
        &self,
        root: &PathBuf,
        _prefix: &[u8],
        name: &str,
    ) -> kv_core::KvResult<Arc<dyn KV>> {
        Ok(Arc::new(FsKv::new(namespace_dir(root, name))))
    }
}

struct FsNewSub;

#[async_trait]
impl NewSub<PathBuf> for FsNewSub {
    async fn new_sub(
        &self,
        root: &PathBuf,
        prefix: &[u8],
        name: &str,
    ) -> kv_core::KvResult<Arc<dyn Store>> {
        Ok(Arc::new(FsStore::at(
            namespace_dir(root, name),
            prefix.to_vec(),
        )))
    }
}

/// A filesystem-backed `Store` rooted at a directory.
pub struct FsStore {
    inner: MonitorStore<PathBuf>,
}

impl FsStore {
    /// Open (creating if necessary) a store rooted at `root`.
    pub fn new(root: PathBuf) -> Self {
        Self::at(root, Vec::new())
    }

    fn at(root: PathBuf, prefix: Vec<u8>) -> Self {
        Self {
            inner: MonitorStore::new(
                root,
                prefix,
                Arc::new(FsNewKv),
                Some(Arc::new(FsNewSub)),
                Arc::new(Blake3Hasher),
            ),
        }
    }
}

#[async_trait]
impl Store for FsStore {
    async fn kv(&self, name: &str) -> kv_core::KvResult<Arc<dyn KV>> {
        self.inner.kv(name).await
    }

    async fn cas(&self, name: &str) -> kv_core::KvResult<Arc<dyn kv_core::CAS>> {
        self.inner.cas(name).await
    }

    async fn sub(&self, name: &str) -> kv_core::KvResult<Arc<dyn Store>> {
        self.inner.sub(name).await
    }

    async fn close(&self) -> kv_core::KvResult<()> {
        Ok(())
    }
}
