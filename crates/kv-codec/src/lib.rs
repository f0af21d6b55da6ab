// SPDX-License-Identifier: Apache-2.0
//! Reversible value codecs and the `encoded` KV layer.
//!
//! A [`Codec`] transforms values on the way into and out of storage; the key
//! space is left untouched. [`EncodedKv`] applies a codec to any base `KV`.

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

mod codec;
mod kv;
mod varint;

pub use codec::{Codec, CodecError, Identity, Zlib, ZlibLevel};
pub use kv::EncodedKv;
