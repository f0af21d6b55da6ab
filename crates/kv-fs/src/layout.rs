// SPDX-License-Identifier: Apache-2.0
//! Key-to-path hex-sharding, independent of any particular I/O.

/// Default number of hex digits devoted to the shard directory name.
pub const DEFAULT_SHARD_DIGITS: usize = 3;

/// Split `key`'s hex encoding into `(shard, tail)` at `shard_digits`,
/// padding with `-` (not a hex digit) if the encoding is too short.
pub fn shard_and_tail(key: &[u8], shard_digits: usize) -> (String, String) {
    let mut encoded = hex::encode(key);
    let min_len = shard_digits + 1;
    if encoded.len() < min_len {
        encoded.push_str(&"-".repeat(min_len - encoded.len()));
    }
    let (shard, tail) = encoded.split_at(shard_digits);
    (shard.to_string(), tail.to_string())
}

/// Recover the original key bytes from a `(shard, tail)` directory entry
/// pair, or `None` if the combined name does not decode as padded hex.
pub fn decode_entry(shard: &str, tail: &str) -> Option<Vec<u8>> {
    let combined = format!("{shard}{tail}");
    let trimmed = combined.trim_end_matches('-');
    hex::decode(trimmed).ok()
}

/// `true` if `name` looks like a shard directory: exactly `shard_digits`
/// characters, each a lowercase hex digit or the `-` pad filler used for
/// keys shorter than `shard_digits + 1` hex digits.
///
/// Keyspace/sub-store directories are named `_<hex(name)>` and so never
/// collide with this alphabet.
pub fn is_shard_dir(name: &str, shard_digits: usize) -> bool {
    name.len() == shard_digits && name.bytes().all(|b| b.is_ascii_hexdigit() || b == b'-')
}
