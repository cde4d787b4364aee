//! Block Compression
//!
//! Each block payload is compressed as a whole with the file's codec:
//!
//! | Codec       | Payload                                                  |
//! |-------------|----------------------------------------------------------|
//! | `null`      | encoded records as-is                                    |
//! | `deflate`   | raw deflate stream (RFC 1951, no zlib/gzip header)       |
//! | `snappy`    | snappy raw block + 4-byte big-endian CRC32 of the input  |
//! | `zstandard` | one zstd frame                                           |
//!
//! Empty input round-trips through every codec.

use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use recordfile_core::DecodeError;

use crate::config::Codec;
use crate::error::{Error, Result};

const SNAPPY_CRC_LEN: usize = 4;

/// Compress a block payload.
pub fn compress(codec: Codec, data: &[u8]) -> Result<Vec<u8>> {
    match codec {
        Codec::Null => Ok(data.to_vec()),
        Codec::Deflate { level } => {
            let mut encoder = DeflateEncoder::new(Vec::new(), flate2::Compression::new(level));
            encoder
                .write_all(data)
                .map_err(|e| Error::Compression(e.to_string()))?;
            encoder.finish().map_err(|e| Error::Compression(e.to_string()))
        }
        Codec::Snappy => {
            let mut compressed = snap::raw::Encoder::new()
                .compress_vec(data)
                .map_err(|e| Error::Compression(e.to_string()))?;
            compressed.extend_from_slice(&crc32fast::hash(data).to_be_bytes());
            Ok(compressed)
        }
        Codec::Zstandard { level } => {
            zstd::encode_all(data, level).map_err(|e| Error::Compression(e.to_string()))
        }
    }
}

/// Decompress a block payload.
pub fn decompress(codec: Codec, data: &[u8]) -> std::result::Result<Vec<u8>, DecodeError> {
    match codec {
        Codec::Null => Ok(data.to_vec()),
        Codec::Deflate { .. } => {
            let mut decoder = DeflateDecoder::new(data);
            let mut decompressed = Vec::new();
            decoder
                .read_to_end(&mut decompressed)
                .map_err(|e| DecodeError::Decompression(e.to_string()))?;
            Ok(decompressed)
        }
        Codec::Snappy => {
            if data.len() < SNAPPY_CRC_LEN {
                return Err(DecodeError::Decompression(format!(
                    "snappy block of {} bytes has no checksum",
                    data.len()
                )));
            }
            let (block, crc) = data.split_at(data.len() - SNAPPY_CRC_LEN);
            let decompressed = snap::raw::Decoder::new()
                .decompress_vec(block)
                .map_err(|e| DecodeError::Decompression(e.to_string()))?;

            let expected = u32::from_be_bytes([crc[0], crc[1], crc[2], crc[3]]);
            if crc32fast::hash(&decompressed) != expected {
                return Err(DecodeError::ChecksumMismatch);
            }
            Ok(decompressed)
        }
        Codec::Zstandard { .. } => {
            zstd::decode_all(data).map_err(|e| DecodeError::Decompression(e.to_string()))
        }
    }
}
