// SPDX-License-Identifier: Apache-2.0
//! [`WbKv`]: a single logical keyspace over the write-back buffer and base.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use kv_core::{KeyError, KeyStream, KvResult, KV};
use tracing::instrument;

use crate::shared::WbShared;

/// A `KV` whose non-replacing writes land in a shared buffer keyspace (see
/// `kv-writeback`'s module docs) and are drained to `base` in the
/// background. Replacing writes and deletes go straight to `base`.
pub struct WbKv {
    base: Arc<dyn KV>,
    /// The buffer, already scoped to this keyspace's prefix by `kv-affix`.
    buffer: Arc<dyn KV>,
    shared: Arc<WbShared>,
}

impl WbKv {
    pub(crate) fn new(base: Arc<dyn KV>, buffer: Arc<dyn KV>, shared: Arc<WbShared>) -> Self {
        Self { base, buffer, shared }
    }

    fn check_closed(&self) -> KvResult<()> {
        match self.shared.saved_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn buffered_keys_from(&self, start: &[u8]) -> KvResult<Vec<Vec<u8>>> {
        let mut stream = self.buffer.list(start).await?;
        let mut keys = Vec::new();
        while let Some(item) = stream.next().await {
            keys.push(item?);
        }
        Ok(keys)
    }
}

#[async_trait]
impl KV for WbKv {
    #[instrument(skip(self))]
    async fn get(&self, key: &[u8]) -> KvResult<Vec<u8>> {
        let (buffer_res, base_res) = tokio::join!(self.buffer.get(key), self.base.get(key));
        match buffer_res {
            Ok(data) => Ok(data),
            Err(err) if err.is_not_found() => base_res,
            Err(err) => Err(err),
        }
    }

    async fn has(&self, keys: &[Vec<u8>]) -> KvResult<HashSet<Vec<u8>>> {
        let in_buffer = self.buffer.has(keys).await?;
        let remaining: Vec<Vec<u8>> = keys.iter().filter(|k| !in_buffer.contains(k.as_slice())).cloned().collect();
        let in_base = if remaining.is_empty() {
            HashSet::new()
        } else {
            self.base.has(&remaining).await?
        };
        Ok(in_buffer.union(&in_base).cloned().collect())
    }

    #[instrument(skip(self, data))]
    async fn put(&self, key: &[u8], data: &[u8], replace: bool) -> KvResult<()> {
        self.check_closed()?;
        if replace {
            return self.base.put(key, data, true).await;
        }
        if !self.base.has(&[key.to_vec()]).await?.is_empty() {
            return Err(KeyError::exists(key.to_vec()).into());
        }
        self.buffer.put(key, data, false).await?;
        self.shared.signal();
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &[u8]) -> KvResult<()> {
        let (buffer_res, base_res) = tokio::join!(self.buffer.delete(key), self.base.delete(key));
        if buffer_res.is_ok() || base_res.is_ok() {
            Ok(())
        } else {
            base_res
        }
    }

    async fn list(&self, start: &[u8]) -> KvResult<KeyStream> {
        let buffered = self.buffered_keys_from(start).await?;
        let base_stream = self.base.list(start).await?;
        Ok(Box::pin(merge_ordered(base_stream, buffered)))
    }

    async fn len(&self) -> KvResult<u64> {
        let base_len = self.base.len().await?;
        let buffered = self.buffered_keys_from(&[]).await?;
        if buffered.is_empty() {
            return Ok(base_len);
        }
        let present_in_base = self.base.has(&buffered).await?;
        Ok(base_len + buffered.len() as u64 - present_in_base.len() as u64)
    }
}

/// Merge the base's lazily-produced key stream with an already-sorted,
/// deduplicated vector of buffered keys, yielding the union in ascending
/// order with no duplicates.
fn merge_ordered(base_stream: KeyStream, buffered: Vec<Vec<u8>>) -> KeyStream {
    let state = (base_stream, buffered.into_iter().peekable(), None::<Vec<u8>>);
    Box::pin(futures::stream::unfold(state, |(mut base, mut buffered, mut pending_base)| async move {
        if pending_base.is_none() {
            match base.next().await {
                Some(Ok(key)) => pending_base = Some(key),
                Some(Err(err)) => return Some((Err(err), (base, buffered, None))),
                None => {}
            }
        }
        match (pending_base.take(), buffered.peek()) {
            (Some(b), Some(buf)) if *buf < b => {
                let next = buffered.next()?;
                Some((Ok(next), (base, buffered, Some(b))))
            }
            (Some(b), Some(buf)) if *buf == b => {
                buffered.next();
                Some((Ok(b), (base, buffered, None)))
            }
            (Some(b), _) => Some((Ok(b), (base, buffered, None))),
            (None, Some(_)) => {
                let next = buffered.next()?;
                Some((Ok(next), (base, buffered, None)))
            }
            (None, None) => None,
        }
    }))
}
