// SPDX-License-Identifier: Apache-2.0
//! The state and background loop shared by every keyspace a write-back
//! store derives: the physical buffer, the prefix→base routing table, and
//! the drain cycle itself.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use kv_core::{KvError, KvResult, KV};
use rand::seq::SliceRandom;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

/// Tunables for the background drainer.
#[derive(Clone, Copy, Debug)]
pub struct WbOptions {
    /// Upper bound on blobs flushed to the base concurrently.
    pub max_concurrent_drains: usize,
    /// Per-attempt timeout for a single flush to the base.
    pub attempt_timeout: Duration,
    /// Maximum attempts (including the first) before a flush is abandoned.
    pub max_attempts: u32,
    /// Sleep between retry attempts.
    pub retry_sleep: Duration,
}

impl Default for WbOptions {
    fn default() -> Self {
        Self {
            max_concurrent_drains: 64,
            attempt_timeout: Duration::from_secs(20),
            max_attempts: 3,
            retry_sleep: Duration::from_millis(100),
        }
    }
}

#[derive(Debug)]
struct DrainFailure(String);

impl fmt::Display for DrainFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "write-back drainer failed: {}", self.0)
    }
}

impl std::error::Error for DrainFailure {}

/// State shared by every `WbKv` derived from one `WbStore`, and by the
/// store's single background drainer task.
pub(crate) struct WbShared {
    buffer: Arc<dyn KV>,
    registry: Mutex<HashMap<Vec<u8>, Arc<dyn KV>>>,
    notify: Notify,
    clean: Notify,
    cancel: CancellationToken,
    error: std::sync::Mutex<Option<String>>,
    options: WbOptions,
}

impl WbShared {
    pub(crate) fn new(buffer: Arc<dyn KV>, options: WbOptions) -> Self {
        Self {
            buffer,
            registry: Mutex::new(HashMap::new()),
            notify: Notify::new(),
            clean: Notify::new(),
            cancel: CancellationToken::new(),
            error: std::sync::Mutex::new(None),
            options,
        }
    }

    pub(crate) fn buffer(&self) -> &Arc<dyn KV> {
        &self.buffer
    }

    pub(crate) async fn register(&self, prefix: Vec<u8>, base_kv: Arc<dyn KV>) {
        self.registry.lock().await.insert(prefix, base_kv);
    }

    /// Wake the drainer after a non-replacing `put` buffers a new key.
    pub(crate) fn signal(&self) {
        self.notify.notify_one();
    }

    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
        self.notify.notify_one();
    }

    fn set_error(&self, err: &KvError) {
        let mut slot = self.error.lock().unwrap_or_else(|p| p.into_inner());
        if slot.is_none() {
            *slot = Some(err.to_string());
        }
    }

    /// The saved drainer error, if a flush has permanently failed.
    pub(crate) fn saved_error(&self) -> Option<KvError> {
        let slot = self.error.lock().unwrap_or_else(|p| p.into_inner());
        slot.clone().map(|msg| KvError::other(DrainFailure(msg)))
    }

    /// Block until a drain cycle leaves the buffer empty, the drainer has
    /// recorded a permanent error, or the store is cancelled.
    pub(crate) async fn sync(&self) -> KvResult<()> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(KvError::Cancelled);
            }
            if let Some(err) = self.saved_error() {
                return Err(err);
            }
            if self.buffer.len().await? == 0 {
                return Ok(());
            }
            tokio::select! {
                () = self.clean.notified() => {}
                () = self.cancel.cancelled() => return Err(KvError::Cancelled),
            }
        }
    }
}

/// Runs for the lifetime of the owning `WbStore`: waits for buffered writes,
/// then drains them to the base with bounded, shuffled, retried concurrency.
pub(crate) async fn run_drainer(shared: Arc<WbShared>) {
    if let Err(err) = drain_cycle(&shared).await {
        warn!(error = %err, "initial write-back drain failed");
        shared.set_error(&err);
    }
    shared.clean.notify_waiters();

    loop {
        tokio::select! {
            () = shared.cancel.cancelled() => return,
            () = shared.notify.notified() => {}
        }
        if shared.cancel.is_cancelled() {
            return;
        }
        if let Err(err) = drain_cycle(&shared).await {
            warn!(error = %err, "write-back drain cycle failed");
            shared.set_error(&err);
        }
        shared.clean.notify_waiters();
    }
}

/// One pass: list the buffer, shuffle, and drain every key found through a
/// bounded worker pool. A single pass per wake — a key `drain_one` cannot
/// yet route (e.g. an unregistered prefix) is left buffered for a later
/// wake rather than retried in a tight loop.
#[instrument(skip(shared))]
async fn drain_cycle(shared: &Arc<WbShared>) -> KvResult<()> {
    let mut keys = buffered_keys(shared.buffer.as_ref(), &[]).await?;
    if keys.is_empty() {
        return Ok(());
    }
    keys.shuffle(&mut rand::thread_rng());

    let semaphore = Arc::new(tokio::sync::Semaphore::new(shared.options.max_concurrent_drains));
    let mut tasks = JoinSet::new();
    for key in keys {
        if shared.cancel.is_cancelled() {
            return Err(KvError::Cancelled);
        }
        let shared = Arc::clone(shared);
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            #[allow(clippy::unwrap_used)]
            let _permit = semaphore.acquire_owned().await.unwrap();
            drain_one(&shared, key).await
        });
    }

    let mut first_err = None;
    while let Some(joined) = tasks.join_next().await {
        match joined.map_err(KvError::other) {
            Ok(Ok(())) => {}
            Ok(Err(err)) | Err(err) => {
                first_err.get_or_insert(err);
            }
        }
    }
    match first_err {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn buffered_keys(buffer: &dyn KV, start: &[u8]) -> KvResult<Vec<Vec<u8>>> {
    let mut stream = buffer.list(start).await?;
    let mut keys = Vec::new();
    while let Some(item) = stream.next().await {
        keys.push(item?);
    }
    Ok(keys)
}

async fn drain_one(shared: &WbShared, tagged_key: Vec<u8>) -> KvResult<()> {
    const PREFIX_LEN: usize = 8;
    if tagged_key.len() < PREFIX_LEN {
        // Malformed entry — cannot be routed to any base KV. Drop it rather
        // than retry it forever.
        let _ = shared.buffer.delete(&tagged_key).await;
        return Ok(());
    }
    let (prefix, key) = tagged_key.split_at(PREFIX_LEN);
    let base = {
        let registry = shared.registry.lock().await;
        registry.get(prefix).cloned()
    };
    let Some(base) = base else {
        // No keyspace with this prefix has been opened in this process yet;
        // leave it buffered for a later cycle once it is.
        return Ok(());
    };

    let data = match shared.buffer.get(&tagged_key).await {
        Ok(data) => data,
        Err(err) if err.is_not_found() => return Ok(()),
        Err(err) => return Err(err),
    };

    if let Some(err) = flush_with_retry(&shared.options, base.as_ref(), key, &data).await {
        return Err(err);
    }

    match shared.buffer.delete(&tagged_key).await {
        Ok(()) => Ok(()),
        Err(err) if err.is_not_found() => Ok(()),
        Err(err) => Err(err),
    }
}

/// Flush one blob to the base, retrying transient failures. Returns `None`
/// on success (including a base-reported *key-exists*, which write-back
/// treats as success), `Some(err)` on a permanent failure.
async fn flush_with_retry(options: &WbOptions, base: &dyn KV, key: &[u8], data: &[u8]) -> Option<KvError> {
    let mut last_err = None;
    for attempt in 1..=options.max_attempts {
        let outcome = tokio::time::timeout(options.attempt_timeout, base.put(key, data, false)).await;
        match outcome {
            Ok(Ok(())) => return None,
            Ok(Err(err)) if err.is_exists() => return None,
            Ok(Err(err)) => {
                let transient = is_transient(&err);
                last_err = Some(err);
                if !transient || attempt == options.max_attempts {
                    break;
                }
            }
            Err(_elapsed) => {
                last_err = Some(KvError::DeadlineExceeded);
                if attempt == options.max_attempts {
                    break;
                }
            }
        }
        tokio::time::sleep(options.retry_sleep).await;
    }
    last_err
}

fn is_transient(err: &KvError) -> bool {
    matches!(err, KvError::Io(io_err) if matches!(
        io_err.kind(),
        std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::Interrupted
    ))
}
