// SPDX-License-Identifier: Apache-2.0
//! Per-key single-flight throttling: concurrent operations against the same
//! key serialize through one lock instead of racing the base independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;

/// A set of per-key locks, created on demand and reaped once uncontended.
pub struct KeyedThrottle {
    entries: Mutex<HashMap<Vec<u8>, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyedThrottle {
    /// Build an empty throttle set.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Wait for, then hold, the lock for `key`. Concurrent callers for the
    /// same key queue behind each other; callers for different keys never
    /// block one another.
    pub async fn acquire(&self, key: &[u8]) -> KeyGuard<'_> {
        let lock = {
            #[allow(clippy::unwrap_used)]
            let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
            Arc::clone(
                entries
                    .entry(key.to_vec())
                    .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
            )
        };
        let guard = lock.lock_owned().await;
        KeyGuard {
            throttle: self,
            key: key.to_vec(),
            _guard: guard,
        }
    }

    fn release(&self, key: &[u8]) {
        #[allow(clippy::unwrap_used)]
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        let reap = matches!(entries.get(key), Some(existing) if Arc::strong_count(existing) <= 2);
        if reap {
            entries.remove(key);
        }
    }
}

impl Default for KeyedThrottle {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds a key's throttle lock until dropped.
pub struct KeyGuard<'a> {
    throttle: &'a KeyedThrottle,
    key: Vec<u8>,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        self.throttle.release(&self.key);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn concurrent_same_key_callers_serialize() {
        let throttle = Arc::new(KeyedThrottle::new());
        let concurrent = Arc::new(AtomicUsize::new(0));
        let max_concurrent = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let throttle = Arc::clone(&throttle);
            let concurrent = Arc::clone(&concurrent);
            let max_concurrent = Arc::clone(&max_concurrent);
            handles.push(tokio::spawn(async move {
                let _guard = throttle.acquire(b"k").await;
                let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                max_concurrent.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                concurrent.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(max_concurrent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_keys_run_concurrently() {
        let throttle = Arc::new(KeyedThrottle::new());
        let concurrent = Arc::new(AtomicUsize::new(0));
        let max_concurrent = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for i in 0..8u8 {
            let throttle = Arc::clone(&throttle);
            let concurrent = Arc::clone(&concurrent);
            let max_concurrent = Arc::clone(&max_concurrent);
            handles.push(tokio::spawn(async move {
                let _guard = throttle.acquire(&[i]).await;
                let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                max_concurrent.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                concurrent.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(max_concurrent.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn entry_is_reaped_once_uncontended() {
        let throttle = KeyedThrottle::new();
        {
            let _guard = throttle.acquire(b"k").await;
        }
        assert!(throttle.entries.lock().unwrap().is_empty());
    }
}
