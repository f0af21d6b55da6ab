// SPDX-License-Identifier: Apache-2.0
//! The [`Keyring`] contract and a static, file-record-driven implementation.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while looking up or loading keyring material.
#[derive(Debug, Error)]
pub enum KeyringError {
    /// `decode` referenced a key ID the keyring does not carry.
    #[error("unknown key id {0}")]
    UnknownKey(u32),

    /// No key in the keyring is marked active.
    #[error("keyring has no active key")]
    NoActiveKey,

    /// A loaded record's key material was malformed for its algorithm.
    #[error("invalid key material for id {id}: {reason}")]
    InvalidKeyMaterial {
        /// The offending record's key ID.
        id: u32,
        /// Why the key material was rejected.
        reason: String,
    },
}

/// The unit of key rotation: new writes use the active key; reads use
/// whatever key ID the block says it was written under.
pub trait Keyring: Send + Sync {
    /// `true` if this keyring carries a key under `id`.
    fn has(&self, id: u32) -> bool;

    /// Append the key bytes for `id` to `buf`, returning the extended buffer.
    ///
    /// # Errors
    ///
    /// Returns [`KeyringError::UnknownKey`] if `id` is not present.
    fn append(&self, id: u32, buf: Vec<u8>) -> Result<Vec<u8>, KeyringError>;

    /// Append the key currently designated for new writes to `buf`, reporting
    /// its ID alongside the extended buffer.
    ///
    /// # Errors
    ///
    /// Returns [`KeyringError::NoActiveKey`] if no key is marked active.
    fn append_active(&self, buf: Vec<u8>) -> Result<(u32, Vec<u8>), KeyringError>;
}

/// A key-file record as loaded from an external key-file loader (out of
/// scope here — this is the concrete type such a loader targets).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyFileRecord {
    /// The key's numeric ID, referenced by AEAD blocks that were written
    /// under it.
    pub id: u32,
    /// The algorithm this key is used with, e.g. `"AES-128-GCM"`.
    pub algorithm: String,
    /// Base64-encoded raw key bytes.
    pub key_b64: String,
    /// `true` if this is the key new writes should use.
    pub active: bool,
}

/// A keyring built once from a fixed set of [`KeyFileRecord`]s.
pub struct StaticKeyring {
    keys: HashMap<u32, Vec<u8>>,
    active: Option<u32>,
}

impl StaticKeyring {
    /// Build a keyring from decoded records.
    ///
    /// # Errors
    ///
    /// Returns [`KeyringError::InvalidKeyMaterial`] if a record's
    /// `key_b64` does not decode, or does not match the expected length for
    /// `"AES-128-GCM"` (16 bytes).
    pub fn from_records(records: Vec<KeyFileRecord>) -> Result<Self, KeyringError> {
        let mut keys = HashMap::with_capacity(records.len());
        let mut active = None;
        for record in records {
            let bytes =
                BASE64
                    .decode(record.key_b64.as_bytes())
                    .map_err(|e| KeyringError::InvalidKeyMaterial {
                        id: record.id,
                        reason: e.to_string(),
                    })?;
            if record.algorithm == "AES-128-GCM" && bytes.len() != 16 {
                return Err(KeyringError::InvalidKeyMaterial {
                    id: record.id,
                    reason: format!("AES-128-GCM requires a 16-byte key, got {}", bytes.len()),
                });
            }
            if record.active {
                active = Some(record.id);
            }
            keys.insert(record.id, bytes);
        }
        Ok(Self { keys, active })
    }

    /// Build a keyring with a single active key, the common case in tests
    /// and small deployments.
    pub fn single(id: u32, key: Vec<u8>) -> Self {
        let mut keys = HashMap::with_capacity(1);
        keys.insert(id, key);
        Self {
            keys,
            active: Some(id),
        }
    }
}

impl Keyring for StaticKeyring {
    fn has(&self, id: u32) -> bool {
        self.keys.contains_key(&id)
    }

    fn append(&self, id: u32, mut buf: Vec<u8>) -> Result<Vec<u8>, KeyringError> {
        let key = self.keys.get(&id).ok_or(KeyringError::UnknownKey(id))?;
        buf.extend_from_slice(key);
        Ok(buf)
    }

    fn append_active(&self, buf: Vec<u8>) -> Result<(u32, Vec<u8>), KeyringError> {
        let id = self.active.ok_or(KeyringError::NoActiveKey)?;
        Ok((id, self.append(id, buf)?))
    }
}
