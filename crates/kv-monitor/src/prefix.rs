// SPDX-License-Identifier: Apache-2.0
//! Derived prefix fingerprints identifying a store's path from the root.

/// Extend `parent_prefix` with `name`, producing a short deterministic
/// fingerprint for the resulting keyspace.
///
/// The fingerprint is `BLAKE3(parent_prefix || 0x00 || name)` truncated to
/// 8 bytes. Reusing BLAKE3 (rather than introducing a second hash primitive)
/// matches the content-hashing choice already made in `kv-cas`.
pub fn derive_prefix(parent_prefix: &[u8], name: &str) -> Vec<u8> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(parent_prefix);
    hasher.update(&[0u8]);
    hasher.update(name.as_bytes());
    hasher.finalize().as_bytes()[..8].to_vec()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let a = derive_prefix(b"root", "kv1");
        let b = derive_prefix(b"root", "kv1");
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_names_distinct_prefixes() {
        let a = derive_prefix(b"root", "kv1");
        let b = derive_prefix(b"root", "kv2");
        assert_ne!(a, b);
    }

    #[test]
    fn distinct_parents_distinct_prefixes() {
        let a = derive_prefix(b"root-a", "kv1");
        let b = derive_prefix(b"root-b", "kv1");
        assert_ne!(a, b);
    }

    #[test]
    fn length_is_eight_bytes() {
        assert_eq!(derive_prefix(b"", "x").len(), 8);
    }
}
