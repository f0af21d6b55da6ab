// SPDX-License-Identifier: Apache-2.0
#![allow(missing_docs)]
//! Invariant 7 (affix round trip) and scenario S3 from the specification:
//! two affixed views sharing one base with disjoint affixes never see each
//! other's keys.

use futures::StreamExt;
use kv_affix::AffixedKv;
use kv_conformance::memory_store;
use kv_core::{Store, KV};
use std::sync::Arc;

#[tokio::test]
async fn prefix_and_suffix_round_trip() {
    let store = memory_store();
    let base = store.kv("base").await.unwrap();
    let view = AffixedKv::new(base).derive(b"pre-".to_vec(), b"-post".to_vec());

    view.put(b"key", b"value", false).await.unwrap();
    assert_eq!(view.get(b"key").await.unwrap(), b"value");

    let mut stream = view.list(b"").await.unwrap();
    let mut keys = Vec::new();
    while let Some(item) = stream.next().await {
        keys.push(item.unwrap());
    }
    assert_eq!(keys, vec![b"key".to_vec()]);
}

#[tokio::test]
async fn disjoint_affixes_over_one_base_do_not_see_each_others_keys() {
    let store = memory_store();
    let base = store.kv("base").await.unwrap();
    let a = AffixedKv::new(Arc::clone(&base)).derive(b"A:".to_vec(), b":A".to_vec());
    let b = AffixedKv::new(base).derive(b"B:".to_vec(), b":B".to_vec());

    a.put(b"foo", b"from-a", false).await.unwrap();
    b.put(b"foo", b"from-b", false).await.unwrap();

    assert_eq!(a.get(b"foo").await.unwrap(), b"from-a");
    assert_eq!(b.get(b"foo").await.unwrap(), b"from-b");

    let mut a_keys = Vec::new();
    let mut stream = a.list(b"").await.unwrap();
    while let Some(item) = stream.next().await {
        a_keys.push(item.unwrap());
    }
    assert_eq!(a_keys, vec![b"foo".to_vec()]);
}

#[tokio::test]
async fn key_not_matching_affix_is_invisible() {
    let store = memory_store();
    let underlying = store.kv("raw").await.unwrap();
    underlying.put(b"unrelated", b"v", false).await.unwrap();

    let view = AffixedKv::new(underlying).with_prefix(b"scoped:".to_vec());
    assert!(view.get(b"unrelated").await.unwrap_err().is_not_found());
}
