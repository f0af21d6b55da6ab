// SPDX-License-Identifier: Apache-2.0
//! The `Codec` trait and the `Identity`/`Zlib` implementations.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use thiserror::Error;

use crate::varint::{decode_uvarint, encode_uvarint};

/// Errors raised while encoding or decoding a value through a [`Codec`].
#[derive(Debug, Error)]
pub enum CodecError {
    /// The encoded bytes are structurally malformed (missing/truncated
    /// length prefix, bad compressed stream, length mismatch after
    /// decompression).
    #[error("corrupt encoded value: {0}")]
    Corrupt(String),

    /// The underlying compression library reported an I/O failure.
    #[error("codec io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A reversible value transform: `decode(encode(d)) == d` for all `d`.
pub trait Codec: Send + Sync {
    /// Transform `data` before it is stored.
    fn encode(&self, data: &[u8]) -> Vec<u8>;

    /// Recover the original bytes from `data` previously produced by
    /// [`encode`](Codec::encode).
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if `data` is not validly encoded.
    fn decode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;

    /// Report the decoded length of `data` without necessarily decoding it.
    ///
    /// The default implementation decodes and measures; codecs that store
    /// the length cheaply (e.g. [`Zlib`]) override this to avoid the full
    /// decompression.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if `data` is not validly encoded.
    fn decoded_len(&self, data: &[u8]) -> Result<u64, CodecError> {
        Ok(self.decode(data)?.len() as u64)
    }
}

/// No-op codec: `encode`/`decode` are the identity function.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Codec for Identity {
    fn encode(&self, data: &[u8]) -> Vec<u8> {
        data.to_vec()
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(data.to_vec())
    }

    fn decoded_len(&self, data: &[u8]) -> Result<u64, CodecError> {
        Ok(data.len() as u64)
    }
}

/// Zlib compression level, mirroring the caller-chosen levels in the
/// specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZlibLevel {
    /// No compression — still passes through the zlib framing.
    None,
    /// Fastest compression, larger output.
    Fastest,
    /// Balanced compression/speed tradeoff.
    #[default]
    Default,
    /// Smallest output, slowest compression.
    Smallest,
}

impl ZlibLevel {
    fn to_flate2(self) -> Compression {
        match self {
            ZlibLevel::None => Compression::none(),
            ZlibLevel::Fastest => Compression::fast(),
            ZlibLevel::Default => Compression::default(),
            ZlibLevel::Smallest => Compression::best(),
        }
    }
}

/// Zlib-backed codec. Encoded bytes are `uvarint(len(original))` followed by
/// raw zlib-compressed data, so [`decoded_len`](Codec::decoded_len) can read
/// the size without decompressing the payload.
#[derive(Debug, Clone, Copy)]
pub struct Zlib {
    level: ZlibLevel,
}

impl Zlib {
    /// Construct a zlib codec at the given compression level.
    #[must_use]
    pub fn new(level: ZlibLevel) -> Self {
        Self { level }
    }
}

impl Default for Zlib {
    fn default() -> Self {
        Self::new(ZlibLevel::default())
    }
}

impl Codec for Zlib {
    fn encode(&self, data: &[u8]) -> Vec<u8> {
        let mut out = encode_uvarint(data.len() as u64);
        let mut encoder = ZlibEncoder::new(Vec::new(), self.level.to_flate2());
        // Writing to a `Vec<u8>` cannot fail.
        #[allow(clippy::unwrap_used)]
        encoder.write_all(data).unwrap();
        #[allow(clippy::unwrap_used)]
        let compressed = encoder.finish().unwrap();
        out.extend_from_slice(&compressed);
        out
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let (expected_len, consumed) = decode_uvarint(data)
            .ok_or_else(|| CodecError::Corrupt("missing length prefix".into()))?;
        let mut decoder = ZlibDecoder::new(&data[consumed..]);
        let mut out = Vec::with_capacity(expected_len as usize);
        decoder.read_to_end(&mut out)?;
        if out.len() as u64 != expected_len {
            return Err(CodecError::Corrupt(format!(
                "decoded length {} does not match prefix {expected_len}",
                out.len()
            )));
        }
        Ok(out)
    }

    fn decoded_len(&self, data: &[u8]) -> Result<u64, CodecError> {
        let (expected_len, _) = decode_uvarint(data)
            .ok_or_else(|| CodecError::Corrupt("missing length prefix".into()))?;
        Ok(expected_len)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn identity_round_trip() {
        let codec = Identity;
        let data = b"hello";
        assert_eq!(codec.decode(&codec.encode(data)).unwrap(), data);
    }

    #[test]
    fn zlib_round_trip_all_levels() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(10);
        for level in [
            ZlibLevel::None,
            ZlibLevel::Fastest,
            ZlibLevel::Default,
            ZlibLevel::Smallest,
        ] {
            let codec = Zlib::new(level);
            let encoded = codec.encode(&data);
            assert_eq!(codec.decode(&encoded).unwrap(), data);
            assert_eq!(codec.decoded_len(&encoded).unwrap(), data.len() as u64);
        }
    }

    #[test]
    fn zlib_decoded_len_avoids_decompression_on_empty_payload() {
        let codec = Zlib::default();
        let encoded = codec.encode(b"");
        assert_eq!(codec.decoded_len(&encoded).unwrap(), 0);
    }

    #[test]
    fn zlib_corrupt_stream_is_rejected() {
        let codec = Zlib::default();
        let mut encoded = codec.encode(b"some payload bytes");
        let last = encoded.len() - 1;
        encoded[last] ^= 0xFF;
        assert!(codec.decode(&encoded).is_err());
    }

    #[test]
    fn zlib_empty_input_is_missing_prefix() {
        let codec = Zlib::default();
        assert!(codec.decode(&[]).is_err());
    }
}
