// SPDX-License-Identifier: Apache-2.0
//! Pluggable content hashers used to derive CAS keys.

use sha1::{Digest as _, Sha1};

/// A content hash function used to derive CAS keys from stored bytes.
///
/// Implementations must be a pure function of `data` — the same bytes must
/// always produce the same digest, independent of call order or prior state.
pub trait ContentHasher: Send + Sync {
    /// Compute the digest of `data`, returned as an opaque byte string.
    fn digest(&self, data: &[u8]) -> Vec<u8>;
}

/// BLAKE3, the default content hasher for new deployments.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Hasher;

impl ContentHasher for Blake3Hasher {
    fn digest(&self, data: &[u8]) -> Vec<u8> {
        blake3::hash(data).as_bytes().to_vec()
    }
}

/// SHA-1, provided for interop with legacy content-address formats.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha1Hasher;

impl ContentHasher for Sha1Hasher {
    fn digest(&self, data: &[u8]) -> Vec<u8> {
        let mut hasher = Sha1::new();
        hasher.update(data);
        hasher.finalize().to_vec()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn sha1_matches_known_vector() {
        // S4: cas_key("abcde\n") under SHA-1.
        let digest = Sha1Hasher.digest(b"abcde\n");
        assert_eq!(hex::encode(digest), "ec11312386ad561674f724b8cca7cf1796e26d1d");
    }

    #[test]
    fn blake3_is_deterministic() {
        let d1 = Blake3Hasher.digest(b"repeatable");
        let d2 = Blake3Hasher.digest(b"repeatable");
        assert_eq!(d1, d2);
        assert_eq!(d1.len(), 32);
    }

    mod hex {
        pub fn encode(bytes: Vec<u8>) -> String {
            bytes.iter().map(|b| format!("{b:02x}")).collect()
        }
    }
}
