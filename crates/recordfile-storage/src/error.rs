//! Storage Error Types
//!
//! This module defines all error types that can occur while writing or reading
//! container files.
//!
//! ## Error Categories
//!
//! ### Core Errors
//! - `Core`: schema, encode, decode or binding failure from `recordfile-core`
//!
//! ### File Errors
//! - `Io`: the underlying sink or source failed
//! - `InvalidMagic`: the input doesn't start with a container header
//! - `Corruption`: a block's sync marker doesn't match the header's. The
//!   reader stops at the first corruption and reports it on every later call.
//!
//! ### Usage Errors
//! - `InvalidState`: operation on a closed reader or writer
//! - `InvalidConfig`: writer configuration rejected by `WriterConfig::validate`
//! - `Compression`: a block codec failed while compressing
//!
//! ## Usage
//!
//! All storage operations return `Result<T>` which is aliased to
//! `Result<T, Error>`. This allows clean error propagation with `?`.

use recordfile_core::{DecodeError, EncodeError, SchemaError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] recordfile_core::Error),

    #[error("Not a container file: bad magic bytes")]
    InvalidMagic,

    #[error("Corrupt container: sync marker mismatch after block {block} at byte {offset}")]
    Corruption { block: u64, offset: u64 },

    #[error("Invalid state: {0}")]
    InvalidState(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Compression error: {0}")]
    Compression(String),
}

impl Error {
    /// The decode error behind this error, if any
    pub fn as_decode(&self) -> Option<&DecodeError> {
        match self {
            Error::Core(recordfile_core::Error::Decode(err)) => Some(err),
            _ => None,
        }
    }

    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::Corruption { .. })
    }
}

impl From<SchemaError> for Error {
    fn from(err: SchemaError) -> Self {
        Error::Core(err.into())
    }
}

impl From<EncodeError> for Error {
    fn from(err: EncodeError) -> Self {
        Error::Core(err.into())
    }
}

impl From<DecodeError> for Error {
    fn from(err: DecodeError) -> Self {
        Error::Core(err.into())
    }
}
