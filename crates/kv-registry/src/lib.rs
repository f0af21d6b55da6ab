// SPDX-License-Identifier: Apache-2.0
//! A generic address-tag registry, external to the core storage stack.
//!
//! An address is `tag` or `tag:remainder`. [`Registry::register`] binds a
//! tag to an [`Opener`]; [`Registry::open`] splits an address and dispatches
//! the remainder to the opener registered for its tag.

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

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

/// Errors raised by registration or resolution, independent of whatever
/// error type an individual [`Opener`] surfaces.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The tag was empty or contained `:`.
    #[error("invalid tag {0:?}")]
    InvalidTag(String),
    /// A tag was registered twice.
    #[error("tag {0:?} is already registered")]
    DuplicateTag(String),
    /// No opener is registered for the address's tag.
    #[error("no opener registered for address {0:?}")]
    InvalidAddress(String),
    /// The opener itself failed.
    #[error("opener failed: {0}")]
    Open(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl RegistryError {
    /// Wrap an opener-specific failure.
    pub fn open(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Open(Box::new(err))
    }
}

/// Turns the remainder of an address (the part after the first `:`, or the
/// whole address if there was no `:`) into an opened value of type `T`.
#[async_trait]
pub trait Opener<T>: Send + Sync {
    /// Open `remainder`, the address with its tag and separator stripped.
    async fn open(&self, remainder: &str) -> Result<T, RegistryError>;
}

/// Splits `address` into its tag and remainder at the first `:`.
///
/// `"tag"` yields `("tag", "")`; `"tag:rest:of:address"` yields
/// `("tag", "rest:of:address")`.
fn split_address(address: &str) -> (&str, &str) {
    match address.split_once(':') {
        Some((tag, remainder)) => (tag, remainder),
        None => (address, ""),
    }
}

/// A map from address tags to [`Opener`]s, generic over the opened type `T`.
pub struct Registry<T> {
    openers: Mutex<HashMap<String, Arc<dyn Opener<T>>>>,
}

impl<T> Registry<T> {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            openers: Mutex::new(HashMap::new()),
        }
    }

    /// Bind `tag` to `opener`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::InvalidTag`] if `tag` is empty or contains `:`;
    /// [`RegistryError::DuplicateTag`] if `tag` is already bound.
    pub fn register(&self, tag: &str, opener: Arc<dyn Opener<T>>) -> Result<(), RegistryError> {
        if tag.is_empty() || tag.contains(':') {
            return Err(RegistryError::InvalidTag(tag.to_string()));
        }
        #[allow(clippy::unwrap_used)]
        let mut openers = self.openers.lock().unwrap_or_else(|p| p.into_inner());
        if openers.contains_key(tag) {
            return Err(RegistryError::DuplicateTag(tag.to_string()));
        }
        openers.insert(tag.to_string(), opener);
        Ok(())
    }

    /// Split `address` into tag and remainder and dispatch to the
    /// registered opener.
    ///
    /// # Errors
    ///
    /// [`RegistryError::InvalidAddress`] if no opener is registered for the
    /// address's tag; otherwise whatever the opener itself returns.
    pub async fn open(&self, address: &str) -> Result<T, RegistryError> {
        let (tag, remainder) = split_address(address);
        let opener = {
            #[allow(clippy::unwrap_used)]
            let openers = self.openers.lock().unwrap_or_else(|p| p.into_inner());
            openers.get(tag).cloned()
        };
        match opener {
            Some(opener) => opener.open(remainder).await,
            None => Err(RegistryError::InvalidAddress(address.to_string())),
        }
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct EchoOpener;

    #[async_trait]
    impl Opener<String> for EchoOpener {
        async fn open(&self, remainder: &str) -> Result<String, RegistryError> {
            Ok(remainder.to_string())
        }
    }

    struct FailingOpener;

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct BoomError;

    #[async_trait]
    impl Opener<String> for FailingOpener {
        async fn open(&self, _remainder: &str) -> Result<String, RegistryError> {
            Err(RegistryError::open(BoomError))
        }
    }

    #[test]
    fn split_address_with_and_without_colon() {
        assert_eq!(split_address("mem"), ("mem", ""));
        assert_eq!(split_address("file:/tmp/data"), ("file", "/tmp/data"));
        assert_eq!(split_address("zip:a:b:c"), ("zip", "a:b:c"));
    }

    #[test]
    fn empty_or_colon_bearing_tag_is_rejected() {
        let registry: Registry<String> = Registry::new();
        assert!(matches!(
            registry.register("", Arc::new(EchoOpener)),
            Err(RegistryError::InvalidTag(_))
        ));
        assert!(matches!(
            registry.register("a:b", Arc::new(EchoOpener)),
            Err(RegistryError::InvalidTag(_))
        ));
    }

    #[test]
    fn duplicate_tag_is_rejected() {
        let registry: Registry<String> = Registry::new();
        registry.register("mem", Arc::new(EchoOpener)).unwrap();
        assert!(matches!(
            registry.register("mem", Arc::new(EchoOpener)),
            Err(RegistryError::DuplicateTag(_))
        ));
    }

    #[tokio::test]
    async fn open_dispatches_remainder_to_the_registered_opener() {
        let registry: Registry<String> = Registry::new();
        registry.register("file", Arc::new(EchoOpener)).unwrap();
        assert_eq!(registry.open("file:/tmp/data").await.unwrap(), "/tmp/data");
        assert_eq!(registry.open("file").await.unwrap(), "");
    }

    #[tokio::test]
    async fn unknown_tag_is_invalid_address() {
        let registry: Registry<String> = Registry::new();
        assert!(matches!(
            registry.open("nope:x").await,
            Err(RegistryError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn opener_failure_propagates() {
        let registry: Registry<String> = Registry::new();
        registry.register("bad", Arc::new(FailingOpener)).unwrap();
        assert!(matches!(registry.open("bad:x").await, Err(RegistryError::Open(_))));
    }
}
