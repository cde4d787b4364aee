//! Variable-length Integer Encoding (Varint)
//!
//! Every `int`, `long`, length prefix and block header in a recordfile is a
//! zig-zag varint:
//!
//! ## Varint Encoding
//! - Each byte carries 7 bits of data, least significant group first
//! - The high bit (0x80) is a continuation flag
//! - Small magnitudes (0-63 after zig-zag) take a single byte
//! - A 64-bit value takes at most 10 bytes
//!
//! ## ZigZag Encoding (for signed integers)
//! Folds the sign into the low bit so small negative numbers stay small:
//! - 0 → 0, -1 → 1, 1 → 2, -2 → 3, 2 → 4, etc.
//!
//! ## Decoding
//! Decoding is fallible: input that ends mid-varint or runs past 10 bytes
//! returns a `VarintError` instead of panicking, because the bytes come from
//! files that may be truncated or corrupted.
//!
//! ## Usage
//! ```ignore
//! let mut buf = BytesMut::new();
//! encode_varint(&mut buf, -42);
//! let value = decode_varint(&mut buf.as_ref())?; // -42
//! ```

use bytes::{Buf, BufMut};
use thiserror::Error;

/// Longest valid encoding of a 64-bit varint
pub const MAX_VARINT_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VarintError {
    #[error("input ended inside a varint")]
    Truncated,

    #[error("varint longer than {MAX_VARINT_LEN} bytes")]
    Overflow,
}

/// Map a signed integer onto an unsigned one (0, -1, 1, -2 → 0, 1, 2, 3)
pub fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag_encode`]
pub fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Encode a signed integer as a varint (ZigZag encoding)
pub fn encode_varint(buf: &mut impl BufMut, value: i64) {
    encode_varint_u64(buf, zigzag_encode(value));
}

/// Encode an unsigned integer as a varint
pub fn encode_varint_u64(buf: &mut impl BufMut, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;

        if value != 0 {
            byte |= 0x80; // Set continuation bit
        }

        buf.put_u8(byte);

        if value == 0 {
            break;
        }
    }
}

/// Decode a varint to a signed integer
pub fn decode_varint(buf: &mut impl Buf) -> Result<i64, VarintError> {
    decode_varint_u64(buf).map(zigzag_decode)
}

/// Decode a varint to an unsigned integer
pub fn decode_varint_u64(buf: &mut impl Buf) -> Result<u64, VarintError> {
    let mut value: u64 = 0;
    let mut shift = 0;

    loop {
        if !buf.has_remaining() {
            return Err(VarintError::Truncated);
        }
        let byte = buf.get_u8();
        value |= ((byte & 0x7F) as u64) << shift;

        if (byte & 0x80) == 0 {
            return Ok(value);
        }

        shift += 7;

        if shift >= 64 {
            return Err(VarintError::Overflow);
        }
    }
}
