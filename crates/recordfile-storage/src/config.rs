//! Writer Configuration
//!
//! This module defines configuration for the write path.
//!
//! ## WriterConfig
//!
//! Controls how records are batched into blocks and how blocks are stored:
//!
//! - **codec**: Block compression codec (default: null)
//! - **block_max_records**: Flush a block after this many records (default: 4000)
//! - **block_max_bytes**: Flush a block once its encoded size reaches this (default: 64KB)
//! - **metadata**: User key/value pairs stored in the file header
//!
//! ## Usage
//!
//! ```ignore
//! use recordfile_storage::{Codec, WriterConfig};
//!
//! // Small, well-compressed blocks
//! let config = WriterConfig {
//!     codec: Codec::Deflate { level: 9 },
//!     block_max_records: 100,
//!     ..Default::default()
//! };
//!
//! // From a JSON config file
//! let config: WriterConfig = serde_json::from_str(r#"{"codec": {"zstandard": {"level": 3}}}"#)?;
//! ```

use std::collections::BTreeMap;
use std::fmt;

use recordfile_core::DecodeError;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Metadata keys with this prefix are reserved for the container format
pub const RESERVED_PREFIX: &str = "avro.";

/// Block compression codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    /// No compression
    #[default]
    Null,

    /// Raw deflate (RFC 1951), level 0-9
    Deflate {
        #[serde(default = "default_deflate_level")]
        level: u32,
    },

    /// Snappy block with a CRC32 trailer
    Snappy,

    /// Zstandard at the given level
    Zstandard {
        #[serde(default = "default_zstd_level")]
        level: i32,
    },
}

impl Codec {
    /// Name stored under `avro.codec` in the file header
    pub fn name(&self) -> &'static str {
        match self {
            Codec::Null => "null",
            Codec::Deflate { .. } => "deflate",
            Codec::Snappy => "snappy",
            Codec::Zstandard { .. } => "zstandard",
        }
    }

    /// Codec for a header name. Levels only matter when compressing, so the
    /// defaults are used.
    pub fn from_name(name: &str) -> std::result::Result<Self, DecodeError> {
        match name {
            "null" => Ok(Codec::Null),
            "deflate" => Ok(Codec::Deflate {
                level: default_deflate_level(),
            }),
            "snappy" => Ok(Codec::Snappy),
            "zstandard" => Ok(Codec::Zstandard {
                level: default_zstd_level(),
            }),
            other => Err(DecodeError::UnknownCodec(other.to_string())),
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Codec::Deflate { level } => write!(f, "deflate(level={level})"),
            Codec::Zstandard { level } => write!(f, "zstandard(level={level})"),
            other => f.write_str(other.name()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriterConfig {
    /// Block compression codec (default: null)
    #[serde(default)]
    pub codec: Codec,

    /// Maximum records per block (default: 4000)
    #[serde(default = "default_block_max_records")]
    pub block_max_records: usize,

    /// Flush threshold for a block's uncompressed size in bytes (default: 64KB)
    #[serde(default = "default_block_max_bytes")]
    pub block_max_bytes: usize,

    /// User metadata written to the file header
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            codec: Codec::default(),
            block_max_records: default_block_max_records(),
            block_max_bytes: default_block_max_bytes(),
            metadata: BTreeMap::new(),
        }
    }
}

impl WriterConfig {
    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Reject settings the writer can't honor.
    pub fn validate(&self) -> Result<()> {
        match self.codec {
            Codec::Deflate { level } if level > 9 => {
                return Err(Error::InvalidConfig(format!(
                    "deflate level must be 0-9, got {level}"
                )));
            }
            Codec::Zstandard { level } if !zstd::compression_level_range().contains(&level) => {
                return Err(Error::InvalidConfig(format!(
                    "zstandard level {level} out of range {:?}",
                    zstd::compression_level_range()
                )));
            }
            _ => {}
        }

        if self.block_max_records == 0 {
            return Err(Error::InvalidConfig("block_max_records must be at least 1".to_string()));
        }
        if self.block_max_bytes == 0 {
            return Err(Error::InvalidConfig("block_max_bytes must be at least 1".to_string()));
        }

        if let Some(key) = self.metadata.keys().find(|k| k.starts_with(RESERVED_PREFIX)) {
            return Err(Error::InvalidConfig(format!(
                "metadata key {key:?} uses the reserved prefix {RESERVED_PREFIX:?}"
            )));
        }

        Ok(())
    }
}

fn default_block_max_records() -> usize {
    4000
}

fn default_block_max_bytes() -> usize {
    64 * 1024 // 64KB
}

fn default_deflate_level() -> u32 {
    6
}

fn default_zstd_level() -> i32 {
    3
}
