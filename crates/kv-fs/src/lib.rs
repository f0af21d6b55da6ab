// SPDX-License-Identifier: Apache-2.0
//! Hex-sharded filesystem `KV`/`Store` backend.
//!
//! [`FsKv`] places each key's blob at `root/<shard>/<tail>`, the hex
//! encoding of the key split at a fixed digit boundary (padding short keys
//! with a non-hex filler so the split is always well-defined). [`FsStore`]
//! nests named keyspaces and sub-stores as `_<hex(name)>` directories so
//! they never collide with shard directories.

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

mod fs_kv;
mod layout;
mod store;

pub use fs_kv::FsKv;
pub use layout::{decode_entry, is_shard_dir, shard_and_tail, DEFAULT_SHARD_DIGITS};
pub use store::FsStore;
