// SPDX-License-Identifier: Apache-2.0
//! Sentinel error types shared by every layer.
//!
//! Two kinds — [`KeyErrorKind::NotFound`] and [`KeyErrorKind::Exists`] — carry
//! the offending key but hide it from the default [`Display`](std::fmt::Display)
//! form, since keys may be sensitive. [`find_kind`] walks the
//! [`Error::source`](std::error::Error::source) chain so a layer several wrappers
//! deep can still recognize a sentinel raised by the innermost backend.

use std::fmt;

/// Which sentinel condition a [`KeyError`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyErrorKind {
    /// The requested key is absent from this keyspace.
    NotFound,
    /// A non-replacing put landed on a key that already exists.
    Exists,
}

/// A key-not-found or key-exists condition, carrying the implicated key.
///
/// `Display` omits the key (it may be sensitive); `Debug` includes it.
#[derive(Clone)]
pub struct KeyError {
    kind: KeyErrorKind,
    key: Vec<u8>,
}

impl KeyError {
    /// Build a *key-not-found* error for `key`.
    pub fn not_found(key: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: KeyErrorKind::NotFound,
            key: key.into(),
        }
    }

    /// Build a *key-exists* error for `key`.
    pub fn exists(key: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: KeyErrorKind::Exists,
            key: key.into(),
        }
    }

    /// Which sentinel condition this is.
    pub fn kind(&self) -> KeyErrorKind {
        self.kind
    }

    /// The key this error was raised for.
    pub fn key(&self) -> &[u8] {
        &self.key
    }
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            KeyErrorKind::NotFound => write!(f, "key not found"),
            KeyErrorKind::Exists => write!(f, "key already exists"),
        }
    }
}

impl fmt::Debug for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyError")
            .field("kind", &self.kind)
            .field("key", &String::from_utf8_lossy(&self.key))
            .finish()
    }
}

impl std::error::Error for KeyError {}

/// Errors surfaced by any `KV`/`CAS`/`Store` implementation.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    /// A key-not-found or key-exists sentinel.
    #[error("{0}")]
    Key(#[source] KeyError),

    /// The operation's cancellation token fired before completion.
    #[error("operation cancelled")]
    Cancelled,

    /// The operation's deadline elapsed before completion.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Mutation attempted on a read-only store (e.g. the ZIP backend).
    #[error("store is read-only")]
    ReadOnly,

    /// Backend I/O failure (filesystem, archive, network).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A codec (compression/encryption) transform failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// Any other backend-specific failure, preserved as the source.
    #[error("{0}")]
    Other(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<KeyError> for KvError {
    fn from(err: KeyError) -> Self {
        KvError::Key(err)
    }
}

impl KvError {
    /// Wrap an arbitrary error as [`KvError::Other`].
    pub fn other(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        KvError::Other(Box::new(err))
    }

    /// `true` if this error (or something in its source chain) is a
    /// *key-not-found* sentinel.
    pub fn is_not_found(&self) -> bool {
        find_kind(self) == Some(KeyErrorKind::NotFound)
    }

    /// `true` if this error (or something in its source chain) is a
    /// *key-exists* sentinel.
    pub fn is_exists(&self) -> bool {
        find_kind(self) == Some(KeyErrorKind::Exists)
    }
}

/// Result alias used throughout the stack.
pub type KvResult<T> = Result<T, KvError>;

/// Walk `err`'s source chain looking for a [`KeyError`], returning its kind.
///
/// This recognizes sentinels regardless of how many layers of wrapping sit
/// between the caller and the backend that raised them.
pub fn find_kind(err: &(dyn std::error::Error + 'static)) -> Option<KeyErrorKind> {
    let mut cur: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = cur {
        if let Some(ke) = e.downcast_ref::<KeyError>() {
            return Some(ke.kind());
        }
        cur = e.source();
    }
    None
}
