// SPDX-License-Identifier: Apache-2.0
//! Shared fixtures for the integration tests under `tests/`.
//!
//! Nothing here is re-exported to other crates; this lib only exists so the
//! `tests/*.rs` binaries can share stack-construction helpers instead of
//! duplicating them.

#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![deny(clippy::todo, clippy::unimplemented, clippy::dbg_macro)]
#![deny(clippy::print_stdout, clippy::print_stderr)]
#![allow(clippy::must_use_candidate, clippy::return_self_not_must_use)]
#![allow(clippy::unreadable_literal, clippy::missing_const_for_fn)]
#![allow(clippy::module_name_repetitions, clippy::use_self)]
#![allow(clippy::doc_markdown, clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]
#![allow(clippy::similar_names, clippy::multiple_crate_versions)]

use std::path::Path;
use std::sync::Arc;

use kv_aead::{AeadCodec, NonceSource, StaticKeyring};
use kv_cas::{cas_from_kv, Sha1Hasher};
use kv_core::{Store, CAS, KV};
use kv_fs::FsStore;
use kv_memory::MemoryStore;

/// A fresh in-memory `Store`.
#[must_use]
pub fn memory_store() -> Arc<dyn Store> {
    Arc::new(MemoryStore::new())
}

/// A filesystem `Store` rooted at `dir`.
#[must_use]
pub fn fs_store(dir: &Path) -> Arc<dyn Store> {
    Arc::new(FsStore::new(dir.to_path_buf()))
}

/// Derive a `CAS` over `kv` using SHA-1, matching the specification's
/// literal content-address scenario.
#[must_use]
pub fn sha1_cas(kv: Arc<dyn KV>) -> Arc<dyn CAS> {
    cas_from_kv(kv, Arc::new(Sha1Hasher))
}

/// A deterministic [`NonceSource`] that fills every nonce with the same
/// byte, for reproducing the specification's literal AEAD scenario.
#[derive(Debug, Clone, Copy)]
pub struct FixedByteNonceSource(
    /// The byte every nonce is filled with.
    pub u8,
);

impl NonceSource for FixedByteNonceSource {
    fn fill(&self, buf: &mut [u8]) {
        buf.fill(self.0);
    }
}

/// The AEAD codec from the specification's literal round-trip scenario:
/// AES-128-GCM key `"0123456789abcdef"`, key ID 1, nonces filled with
/// `0x01`.
#[must_use]
pub fn literal_aead_codec() -> AeadCodec {
    let keyring = StaticKeyring::single(1, b"0123456789abcdef".to_vec());
    AeadCodec::with_nonce_source(Arc::new(keyring), Arc::new(FixedByteNonceSource(0x01)))
}
