// SPDX-License-Identifier: Apache-2.0
//! Prefix/suffix key-rewriting layer.
//!
//! [`AffixedKv`] rewrites every key crossing the boundary into a shared
//! backend: outbound `key` becomes `prefix + key + suffix`; inbound listed
//! keys are stripped back down. [`AffixedKv::with_prefix`],
//! [`AffixedKv::with_suffix`], and [`AffixedKv::derive`] produce clones
//! sharing the same underlying `KV` — because they are inherent methods on
//! `AffixedKv` itself rather than a generic "wrap any `KV`" constructor,
//! nesting structurally collapses: deriving from an already-affixed view can
//! never produce two layers of rewriting, only a new affix pair over the
//! same base.
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

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use kv_core::{KeyError, KeyStream, KvResult, KV};

/// A `KV` view that prepends `prefix` and appends `suffix` to every key it
/// forwards to `base`.
pub struct AffixedKv {
    base: Arc<dyn KV>,
    prefix: Vec<u8>,
    suffix: Vec<u8>,
}

impl AffixedKv {
    /// Wrap `base` with no prefix or suffix — the identity affix.
    pub fn new(base: Arc<dyn KV>) -> Arc<Self> {
        Arc::new(Self {
            base,
            prefix: Vec::new(),
            suffix: Vec::new(),
        })
    }

    /// Derive a view sharing the same base with a different prefix, keeping
    /// the current suffix.
    pub fn with_prefix(&self, prefix: impl Into<Vec<u8>>) -> Arc<Self> {
        Arc::new(Self {
            base: Arc::clone(&self.base),
            prefix: prefix.into(),
            suffix: self.suffix.clone(),
        })
    }

    /// Derive a view sharing the same base with a different suffix, keeping
    /// the current prefix.
    pub fn with_suffix(&self, suffix: impl Into<Vec<u8>>) -> Arc<Self> {
        Arc::new(Self {
            base: Arc::clone(&self.base),
            prefix: self.prefix.clone(),
            suffix: suffix.into(),
        })
    }

    /// Derive a view sharing the same base with a new prefix and suffix.
    pub fn derive(&self, prefix: impl Into<Vec<u8>>, suffix: impl Into<Vec<u8>>) -> Arc<Self> {
        Arc::new(Self {
            base: Arc::clone(&self.base),
            prefix: prefix.into(),
            suffix: suffix.into(),
        })
    }

    fn outbound(&self, key: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.prefix.len() + key.len() + self.suffix.len());
        out.extend_from_slice(&self.prefix);
        out.extend_from_slice(key);
        out.extend_from_slice(&self.suffix);
        out
    }

    fn strip(&self, key: &[u8]) -> Option<Vec<u8>> {
        if key.len() < self.prefix.len() + self.suffix.len() {
            return None;
        }
        if !key.starts_with(&self.prefix) || !key.ends_with(&self.suffix) {
            return None;
        }
        Some(key[self.prefix.len()..key.len() - self.suffix.len()].to_vec())
    }
}

#[async_trait]
impl KV for AffixedKv {
    async fn get(&self, key: &[u8]) -> KvResult<Vec<u8>> {
        match self.base.get(&self.outbound(key)).await {
            Ok(v) => Ok(v),
            Err(e) if e.is_not_found() => Err(KeyError::not_found(key.to_vec()).into()),
            Err(e) => Err(e),
        }
    }

    async fn has(&self, keys: &[Vec<u8>]) -> KvResult<HashSet<Vec<u8>>> {
        let outbound_keys: Vec<Vec<u8>> = keys.iter().map(|k| self.outbound(k)).collect();
        let present = self.base.has(&outbound_keys).await?;
        Ok(keys
            .iter()
            .filter(|k| present.contains(&self.outbound(k)))
            .cloned()
            .collect())
    }

    async fn put(&self, key: &[u8], data: &[u8], replace: bool) -> KvResult<()> {
        match self.base.put(&self.outbound(key), data, replace).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_exists() => Err(KeyError::exists(key.to_vec()).into()),
            Err(e) => Err(e),
        }
    }

    async fn delete(&self, key: &[u8]) -> KvResult<()> {
        match self.base.delete(&self.outbound(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Err(KeyError::not_found(key.to_vec()).into()),
            Err(e) => Err(e),
        }
    }

    async fn list(&self, start: &[u8]) -> KvResult<KeyStream> {
        let base_stream = self.base.list(&self.outbound(start)).await?;
        let prefix = self.prefix.clone();
        let suffix = self.suffix.clone();
        let state = (base_stream, prefix, suffix, false);
        let stream = futures::stream::unfold(state, |(mut inner, prefix, suffix, mut stopped)| async move {
            loop {
                if stopped {
                    return None;
                }
                match inner.next().await {
                    None => return None,
                    Some(Err(e)) => {
                        stopped = true;
                        return Some((Err(e), (inner, prefix, suffix, stopped)));
                    }
                    Some(Ok(key)) => {
                        if !key.starts_with(prefix.as_slice()) {
                            stopped = true;
                            continue;
                        }
                        let stripped = if key.len() >= prefix.len() + suffix.len()
                            && key.ends_with(suffix.as_slice())
                        {
                            Some(key[prefix.len()..key.len() - suffix.len()].to_vec())
                        } else {
                            None
                        };
                        match stripped {
                            Some(inner_key) => {
                                return Some((Ok(inner_key), (inner, prefix, suffix, stopped)))
                            }
                            None => continue,
                        }
                    }
                }
            }
        });
        Ok(Box::pin(stream))
    }

    async fn len(&self) -> KvResult<u64> {
        if self.prefix.is_empty() && self.suffix.is_empty() {
            return self.base.len().await;
        }
        let mut count = 0u64;
        let mut stream = self.list(&[]).await?;
        while let Some(item) = stream.next().await {
            item?;
            count += 1;
        }
        Ok(count)
    }
}
