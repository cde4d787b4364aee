//! Container File Format
//!
//! A container file is self-describing: the header carries the writer's schema
//! and codec, so any reader can decode it without outside metadata.
//!
//! ## File Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Header                                       │
//! │  - Magic: "Obj" 0x01 (4 bytes)               │
//! │  - Metadata: map<bytes>                      │
//! │      avro.schema -> canonical schema text    │
//! │      avro.codec  -> null|deflate|snappy|...  │
//! │      user keys   -> user values              │
//! │  - Sync marker (16 random bytes)             │
//! ├──────────────────────────────────────────────┤
//! │ Block 0                                      │
//! │  - Record count (varint long)                │
//! │  - Payload size in bytes (varint long)       │
//! │  - Payload (compressed encoded records)      │
//! │  - Sync marker (16 bytes, same as header)    │
//! ├──────────────────────────────────────────────┤
//! │ Block 1 ...                                  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The metadata map uses the map encoding: a varint entry count, that many
//! `(string key, bytes value)` pairs, then a terminating zero count. A
//! negative count is followed by the byte size of the entries and means
//! `-count` entries.
//!
//! The repeated sync marker lets a reader detect a block boundary that has
//! been damaged: if the 16 bytes after a payload don't match the header's
//! marker, the file is corrupt from that point on.

pub mod reader;
pub mod writer;

pub use reader::{DataFileReader, TypedRecords};
pub use writer::DataFileWriter;

use std::collections::BTreeMap;
use std::io::{self, Read};

use recordfile_core::varint::{self, MAX_VARINT_LEN};
use recordfile_core::DecodeError;

use crate::error::{Error, Result};

/// Magic bytes at the start of every container file
pub const MAGIC: [u8; 4] = *b"Obj\x01";

/// Size of the sync marker in bytes
pub const SYNC_SIZE: usize = 16;

/// Header metadata key holding the writer schema
pub const SCHEMA_KEY: &str = "avro.schema";

/// Header metadata key holding the codec name
pub const CODEC_KEY: &str = "avro.codec";

pub type SyncMarker = [u8; SYNC_SIZE];

/// Parsed file header
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub metadata: BTreeMap<String, Vec<u8>>,
    pub sync: SyncMarker,
}

impl Header {
    /// Serialized header bytes
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256);
        buf.extend_from_slice(&MAGIC);

        if !self.metadata.is_empty() {
            varint::encode_varint(&mut buf, self.metadata.len() as i64);
            for (key, value) in &self.metadata {
                varint::encode_varint(&mut buf, key.len() as i64);
                buf.extend_from_slice(key.as_bytes());
                varint::encode_varint(&mut buf, value.len() as i64);
                buf.extend_from_slice(value);
            }
        }
        varint::encode_varint(&mut buf, 0);

        buf.extend_from_slice(&self.sync);
        buf
    }

    /// Read and validate a header from the start of a file.
    pub fn read_from<R: Read>(reader: &mut CountingReader<R>) -> Result<Self> {
        let mut magic = [0u8; 4];
        match reader.read_exact(&mut magic) {
            Ok(()) if magic == MAGIC => {}
            Ok(()) => return Err(Error::InvalidMagic),
            Err(Error::Core(_)) => return Err(Error::InvalidMagic),
            Err(e) => return Err(e),
        }

        let mut metadata = BTreeMap::new();
        loop {
            let mut count = reader.read_required_long()?;
            if count == 0 {
                break;
            }
            if count < 0 {
                // Block byte size, not needed to read the entries
                reader.read_required_long()?;
                count = count.checked_neg().ok_or(DecodeError::InvalidLength {
                    offset: reader.position(),
                    length: count,
                })?;
            }
            for _ in 0..count {
                let offset = reader.position();
                let key = String::from_utf8(reader.read_len_prefixed()?)
                    .map_err(|_| DecodeError::InvalidUtf8 { offset })?;
                let value = reader.read_len_prefixed()?;
                metadata.insert(key, value);
            }
        }

        let mut sync = [0u8; SYNC_SIZE];
        reader.read_exact(&mut sync)?;

        Ok(Self { metadata, sync })
    }

    /// A metadata value as UTF-8 text
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(|value| std::str::from_utf8(value).ok())
    }
}

/// A reader that knows how many bytes it has consumed
#[derive(Debug)]
pub struct CountingReader<R> {
    inner: R,
    position: u64,
}

impl<R: Read> CountingReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, position: 0 }
    }

    /// Bytes consumed so far
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.position += 1;
                    return Ok(Some(byte[0]));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Read a zig-zag varint. `None` when the input ends before its first
    /// byte, which is how a clean end of file looks between blocks.
    pub fn read_long(&mut self) -> Result<Option<i64>> {
        let offset = self.position;
        let mut value: u64 = 0;
        for i in 0..MAX_VARINT_LEN {
            let byte = match self.read_byte()? {
                Some(byte) => byte,
                None if i == 0 => return Ok(None),
                None => return Err(DecodeError::Truncated { offset, needed: 1 }.into()),
            };
            value |= u64::from(byte & 0x7F) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(Some(varint::zigzag_decode(value)));
            }
        }
        Err(DecodeError::VarintOverflow { offset }.into())
    }

    /// Read a varint that must be present.
    pub fn read_required_long(&mut self) -> Result<i64> {
        let offset = self.position;
        self.read_long()?
            .ok_or_else(|| DecodeError::Truncated { offset, needed: 1 }.into())
    }

    /// Fill `buf` completely; running out of input is `Truncated`.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(DecodeError::Truncated {
                        offset: self.position,
                        needed: (buf.len() - filled) as u64,
                    }
                    .into())
                }
                Ok(n) => {
                    filled += n;
                    self.position += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Read exactly `len` bytes into a new buffer.
    pub fn read_vec(&mut self, len: u64) -> Result<Vec<u8>> {
        let offset = self.position;
        let mut buf = Vec::new();
        // Grows with the data actually present, so a corrupt size can't
        // trigger a huge allocation up front
        let read = (&mut self.inner).take(len).read_to_end(&mut buf)?;
        self.position += read as u64;
        if (read as u64) < len {
            return Err(DecodeError::Truncated {
                offset: offset + read as u64,
                needed: len - read as u64,
            }
            .into());
        }
        Ok(buf)
    }

    fn read_len_prefixed(&mut self) -> Result<Vec<u8>> {
        let offset = self.position;
        let length = self.read_required_long()?;
        if length < 0 {
            return Err(DecodeError::InvalidLength { offset, length }.into());
        }
        self.read_vec(length as u64)
    }
}
