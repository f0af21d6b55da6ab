// SPDX-License-Identifier: Apache-2.0
//! Core traits and sentinel errors for the blob storage stack.
//!
//! `kv-core` defines the three interfaces every layer in the stack implements
//! or wraps:
//!
//! - [`KV`]: a mutable mapping from opaque byte keys to byte values.
//! - [`CAS`]: a [`KV`] whose keys are a deterministic function of the value.
//! - [`Store`]: a namespace container exposing named `KV`/`CAS`/sub-`Store`
//!   factories.
//!
//! Backend crates (`kv-memory`, `kv-fs`, `kv-zip`) implement these traits
//! directly. Wrapper crates (`kv-affix`, `kv-codec`, `kv-aead`, `kv-cas`,
//! `kv-cache`, `kv-writeback`) implement them by forwarding to an inner
//! implementation, transforming keys, values, or scheduling along the way.
//!
//! Every method that can suspend is `async` via [`async_trait`]; this keeps
//! the traits object-safe (`Arc<dyn KV>`, `Arc<dyn Store>`) so layers can be
//! composed at construction time without generic explosion.
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
    clippy::unreadable_literal,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::many_single_char_names,
    clippy::module_name_repetitions,
    clippy::use_self,
    clippy::missing_errors_doc
)]

mod error;
mod traits;

pub use error::{find_kind, KeyError, KeyErrorKind, KvError, KvResult};
pub use traits::{KeyStream, CAS, KV};
pub use traits::Store;
