// SPDX-License-Identifier: Apache-2.0
#![allow(missing_docs)]
//! Invariants 1, 3, 4, 5, 6 from the specification's testable-properties
//! section, run against both the memory and filesystem backends.

use futures::StreamExt;
use kv_conformance::{fs_store, memory_store};
use kv_core::{Store, KV};
use std::sync::Arc;

async fn backends() -> Vec<(&'static str, Arc<dyn Store>, Option<tempfile::TempDir>)> {
    let dir = tempfile::tempdir().expect("tempdir");
    let fs = fs_store(dir.path());
    vec![("memory", memory_store(), None), ("fs", fs, Some(dir))]
}

#[tokio::test]
async fn round_trip_put_then_get() {
    for (_name, store, _dir) in backends().await {
        let kv = store.kv("k").await.unwrap();
        kv.put(b"fruit", b"apple", true).await.unwrap();
        assert_eq!(kv.get(b"fruit").await.unwrap(), b"apple");
    }
}

#[tokio::test]
async fn existence_semantics() {
    for (_name, store, _dir) in backends().await {
        let kv = store.kv("k").await.unwrap();
        kv.put(b"k", b"v1", false).await.unwrap();
        assert!(kv.put(b"k", b"v2", false).await.unwrap_err().is_exists());
        kv.put(b"k", b"v2", true).await.unwrap();
        assert_eq!(kv.get(b"k").await.unwrap(), b"v2");
    }
}

#[tokio::test]
async fn list_order_is_ascending_and_bounded_below_by_start() {
    for (_name, store, _dir) in backends().await {
        let kv = store.kv("k").await.unwrap();
        for key in ["nut", "fruit", "animal", "beverage"] {
            kv.put(key.as_bytes(), b"v", false).await.unwrap();
        }
        let mut stream = kv.list(b"beverage").await.unwrap();
        let mut previous: Option<Vec<u8>> = None;
        while let Some(item) = stream.next().await {
            let key = item.unwrap();
            assert!(key.as_slice() >= b"beverage".as_slice());
            if let Some(prev) = &previous {
                assert!(prev < &key, "list order must be strictly increasing");
            }
            previous = Some(key);
        }
        assert!(previous.is_some());
    }
}

#[tokio::test]
async fn empty_key_round_trips_where_accepted() {
    for (_name, store, _dir) in backends().await {
        let kv = store.kv("k").await.unwrap();
        if kv.put(b"", b"v", false).await.is_err() {
            continue;
        }
        assert_eq!(kv.get(b"").await.unwrap(), b"v");
        kv.delete(b"").await.unwrap();
        assert!(kv.get(b"").await.unwrap_err().is_not_found());
    }
}

#[tokio::test]
async fn distinct_names_and_sub_stores_are_disjoint() {
    for (_name, store, _dir) in backends().await {
        let fruit = store.kv("fruit").await.unwrap();
        let veg = store.kv("veg").await.unwrap();
        fruit.put(b"k", b"apple", false).await.unwrap();
        assert!(veg.get(b"k").await.unwrap_err().is_not_found());

        let tenant = store.sub("tenant-a").await.unwrap();
        let tenant_kv = tenant.kv("fruit").await.unwrap();
        assert!(tenant_kv.get(b"k").await.unwrap_err().is_not_found());
        tenant_kv.put(b"k", b"pear", false).await.unwrap();
        assert_eq!(fruit.get(b"k").await.unwrap(), b"apple");
    }
}
