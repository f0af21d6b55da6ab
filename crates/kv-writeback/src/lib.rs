// SPDX-License-Identifier: Apache-2.0
//! Write-back `Store`: buffers non-replacing writes and drains them to a
//! base `Store` with a single background task.

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

mod shared;
mod store;
mod wb_kv;

pub use shared::WbOptions;
pub use store::WbStore;
pub use wb_kv::WbKv;
