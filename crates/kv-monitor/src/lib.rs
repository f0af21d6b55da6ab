// SPDX-License-Identifier: Apache-2.0
//! Shared `kv`/`sub`/`cas` memoization and prefix-derivation plumbing.
//!
//! Every store layer in the stack is, underneath, a [`Monitor`]: a
//! mutex-guarded cache of previously-built `KV`s and sub-`Store`s, keyed by
//! name, plus a deterministic prefix fingerprint extended on each `kv`/`sub`
//! call. [`MonitorStore`] packages a `Monitor` as a ready-to-use [`Store`]
//! implementation for backend crates that have nothing more to add.
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

mod monitor;
mod prefix;

pub use monitor::{Monitor, MonitorStore, NewKv, NewSub};
pub use prefix::derive_prefix;
pub use kv_core::Store;
