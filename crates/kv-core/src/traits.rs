// SPDX-License-Identifier: Apache-2.0
//! The `KV`, `CAS`, and `Store` trait trio (see module docs in `lib.rs`).

use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::Stream;

use crate::error::KvResult;

/// A lazily-produced, lexicographically ordered sequence of keys.
///
/// Each item is `Ok(key)` or `Err(KvError)`; an error terminates the stream —
/// exactly one of "more keys" or "an error" is true at any point, matching the
/// `(key, error)` pairing in the specification.
pub type KeyStream = Pin<Box<dyn Stream<Item = KvResult<Vec<u8>>> + Send>>;

/// A mutable mapping from opaque byte-string keys to opaque byte-sequence
/// values.
///
/// Keys are ordered lexicographically by their raw bytes. Whether the empty
/// key is representable is backend-defined: a backend that cannot represent
/// it reports [`KeyErrorKind::NotFound`](crate::KeyErrorKind::NotFound) for
/// any operation against `b""`.
///
/// Implementations must be safe for concurrent use by multiple callers. A
/// sequence of operations on one `KV` that does not overlap with a `delete`
/// is linearizable; `delete` is permitted to race with everything else.
#[async_trait]
pub trait KV: Send + Sync {
    /// Fetch the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns a *key-not-found* [`KvError`](crate::KvError) if `key` is absent.
    async fn get(&self, key: &[u8]) -> KvResult<Vec<u8>>;

    /// Return the subset of `keys` that are present in this keyspace.
    async fn has(&self, keys: &[Vec<u8>]) -> KvResult<HashSet<Vec<u8>>>;

    /// Store `data` under `key`.
    ///
    /// When `replace` is `false` and `key` is already present, no mutation
    /// occurs and a *key-exists* error is returned.
    ///
    /// # Errors
    ///
    /// Returns a *key-exists* [`KvError`](crate::KvError) when `replace` is
    /// `false` and the key is already present.
    async fn put(&self, key: &[u8], data: &[u8], replace: bool) -> KvResult<()>;

    /// Remove `key` and its value, if present.
    ///
    /// # Errors
    ///
    /// Returns a *key-not-found* [`KvError`](crate::KvError) if `key` is absent.
    async fn delete(&self, key: &[u8]) -> KvResult<()>;

    /// List keys in ascending lexicographic order, starting at the least key
    /// greater than or equal to `start`.
    async fn list(&self, start: &[u8]) -> KvResult<KeyStream>;

    /// Count of keys currently present in this keyspace.
    async fn len(&self) -> KvResult<u64>;

    /// `true` if this keyspace currently has no keys.
    async fn is_empty(&self) -> KvResult<bool> {
        Ok(self.len().await? == 0)
    }
}

/// A [`KV`] whose keys are a deterministic function of the stored value.
///
/// `cas_key(d)` and the key returned by `cas_put(d)` are equal for every `d`,
/// regardless of how many times `cas_put` has already been called with `d`.
#[async_trait]
pub trait CAS: KV {
    /// Compute the content address of `data` without storing it.
    fn cas_key(&self, data: &[u8]) -> Vec<u8>;

    /// Store `data` under its content address, returning that address.
    ///
    /// Writing the same content twice is a no-op the second time — the
    /// address is a pure function of content, so there is nothing to replace.
    async fn cas_put(&self, data: &[u8]) -> KvResult<Vec<u8>>;
}

/// A namespace container exposing named `KV`, `CAS`, and sub-`Store` factories.
///
/// Repeated calls with the same name need not return the same value but must
/// converge to the same logical content: `kv` and `cas` with the same name
/// share storage, and `sub` produces a subordinate store whose keyspaces are
/// disjoint from its parent and from peer sub-stores.
#[async_trait]
pub trait Store: Send + Sync {
    /// Open (creating if necessary) the named keyspace as a `KV`.
    async fn kv(&self, name: &str) -> KvResult<Arc<dyn KV>>;

    /// Open the named keyspace as a `CAS`. Shares storage with `kv(name)`.
    async fn cas(&self, name: &str) -> KvResult<Arc<dyn CAS>>;

    /// Open (creating if necessary) a subordinate store.
    async fn sub(&self, name: &str) -> KvResult<Arc<dyn Store>>;

    /// Release the backend resource this store owns. Closing a parent store
    /// closes all of its sub-stores and keyspaces.
    async fn close(&self) -> KvResult<()>;
}
