// SPDX-License-Identifier: Apache-2.0
//! Authenticated encryption for stored values.
//!
//! [`AeadCodec`] compresses a value with snappy and seals it with
//! AES-128-GCM under a key drawn from a [`Keyring`]; [`AeadKv`] applies that
//! codec to any base `KV`. Every block is self-describing — tag byte, key
//! ID, nonce, ciphertext — so a keyring carrying several keys can open
//! values written under any of them while new writes always use whichever
//! key the keyring currently designates active.

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
mod keyring;
mod kv;
mod nonce;

pub use codec::{AeadCodec, AeadError};
pub use keyring::{KeyFileRecord, Keyring, KeyringError, StaticKeyring};
pub use kv::AeadKv;
pub use nonce::{NonceSource, RandomNonceSource};
