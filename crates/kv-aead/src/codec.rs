// SPDX-License-Identifier: Apache-2.0
//! The framed AEAD block format: compress, then seal under the keyring's
//! active key.
//!
//! Unlike [`kv_codec::Codec`], encoding here can fail — there may be no
//! active key, or the active key may not suit the cipher — so this codec
//! exposes its own fallible `encode`/`decode` rather than implementing that
//! trait.

use std::sync::Arc;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes128Gcm, Key, Nonce};
use thiserror::Error;

use crate::keyring::{Keyring, KeyringError};
use crate::nonce::{NonceSource, RandomNonceSource};

const NONCE_LEN: usize = 12;
const V2_FLAG: u8 = 0x80;

/// Errors raised while encoding or decoding an AEAD block.
#[derive(Debug, Error)]
pub enum AeadError {
    /// The keyring could not supply the key this block needed.
    #[error(transparent)]
    Keyring(#[from] KeyringError),

    /// The key material did not fit the cipher (wrong length).
    #[error("cipher key error: {0}")]
    Key(String),

    /// Authenticated decryption failed — wrong key, or the ciphertext was
    /// tampered with.
    #[error("authentication failed")]
    Authentication,

    /// Snappy compression or decompression failed.
    #[error("compression error: {0}")]
    Compression(String),

    /// The block's framing (tag, key ID, nonce, length prefix) was malformed.
    #[error("corrupt aead block: {0}")]
    Corrupt(String),
}

fn cipher_for(key_bytes: &[u8]) -> Result<Aes128Gcm, AeadError> {
    if key_bytes.len() != 16 {
        return Err(AeadError::Key(format!(
            "AES-128-GCM key must be 16 bytes, got {}",
            key_bytes.len()
        )));
    }
    Ok(Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(key_bytes)))
}

/// Compresses with snappy and seals the result with AES-128-GCM, addressing
/// keys through a [`Keyring`].
///
/// Always writes the v2 block format (tag byte with the high bit set,
/// followed by a big-endian key ID); decodes both v2 and the legacy v1
/// format (high bit clear, implicit key ID 1, no key-ID field).
pub struct AeadCodec {
    keyring: Arc<dyn Keyring>,
    nonce_source: Arc<dyn NonceSource>,
}

impl AeadCodec {
    /// Build a codec over `keyring`, generating nonces with the system CSPRNG.
    pub fn new(keyring: Arc<dyn Keyring>) -> Self {
        Self {
            keyring,
            nonce_source: Arc::new(RandomNonceSource),
        }
    }

    /// Build a codec with an explicit nonce source, for deterministic tests.
    pub fn with_nonce_source(keyring: Arc<dyn Keyring>, nonce_source: Arc<dyn NonceSource>) -> Self {
        Self {
            keyring,
            nonce_source,
        }
    }

    /// Compress and seal `data` under the keyring's active key.
    ///
    /// # Errors
    ///
    /// Returns [`AeadError`] if the keyring has no active key or the active
    /// key does not fit the cipher.
    pub fn encode(&self, data: &[u8]) -> Result<Vec<u8>, AeadError> {
        let (key_id, key_bytes) = self.keyring.append_active(Vec::new())?;
        let cipher = cipher_for(&key_bytes)?;

        let compressed = snap::raw::Encoder::new()
            .compress_vec(data)
            .map_err(|e| AeadError::Compression(e.to_string()))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.nonce_source.fill(&mut nonce_bytes);

        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), compressed.as_ref())
            .map_err(|_| AeadError::Authentication)?;

        let mut out = Vec::with_capacity(1 + 4 + NONCE_LEN + sealed.len());
        out.push(V2_FLAG | (NONCE_LEN as u8));
        out.extend_from_slice(&key_id.to_be_bytes());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Open a block previously produced by [`encode`](Self::encode), or a
    /// legacy v1 block (implicit key ID 1).
    ///
    /// # Errors
    ///
    /// Returns [`AeadError`] if the framing is malformed, the key ID is
    /// unknown, authentication fails, or decompression fails or produces a
    /// length mismatched with the recorded frame length.
    pub fn decode(&self, data: &[u8]) -> Result<Vec<u8>, AeadError> {
        let tag = *data
            .first()
            .ok_or_else(|| AeadError::Corrupt("empty block".into()))?;
        let nonce_len = usize::from(tag & 0x7f);
        let is_v2 = tag & V2_FLAG != 0;

        let mut cursor = 1usize;
        let key_id = if is_v2 {
            let bytes = data
                .get(cursor..cursor + 4)
                .ok_or_else(|| AeadError::Corrupt("truncated key id".into()))?;
            cursor += 4;
            #[allow(clippy::unwrap_used)]
            u32::from_be_bytes(bytes.try_into().unwrap())
        } else {
            1
        };

        let nonce_bytes = data
            .get(cursor..cursor + nonce_len)
            .ok_or_else(|| AeadError::Corrupt("truncated nonce".into()))?;
        cursor += nonce_len;
        let ciphertext = data
            .get(cursor..)
            .ok_or_else(|| AeadError::Corrupt("truncated ciphertext".into()))?;

        let key_bytes = self.keyring.append(key_id, Vec::new())?;
        let cipher = cipher_for(&key_bytes)?;
        let compressed = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| AeadError::Authentication)?;

        let expected_len = snap::raw::decompress_len(&compressed)
            .map_err(|e| AeadError::Compression(e.to_string()))?;
        let decompressed = snap::raw::Decoder::new()
            .decompress_vec(&compressed)
            .map_err(|e| AeadError::Compression(e.to_string()))?;
        if decompressed.len() != expected_len {
            return Err(AeadError::Corrupt(format!(
                "decompressed length {} does not match frame length {expected_len}",
                decompressed.len()
            )));
        }
        Ok(decompressed)
    }
}
