//! Error Types for recordfile
//!
//! This module defines the error taxonomy shared by the schema model, the binary
//! codec and the record bindings.
//!
//! ## Error Categories
//!
//! ### Schema Errors (`SchemaError`)
//! - Malformed schema JSON, unknown type names, invalid names
//! - Duplicate field names, named types defined twice
//! - Default values that don't conform to their field type
//! - Reader/writer schemas that cannot be resolved against each other
//!
//! ### Encode Errors (`EncodeError`)
//! - A required field (no default) was never set
//! - A value doesn't match the type its field declares
//! - A field name the target schema doesn't know about
//!
//! ### Decode Errors (`DecodeError`)
//! - Byte stream shorter than the schema requires
//! - Length prefixes that are negative or point past the end of the block
//! - Invalid UTF-8 in a string field
//! - Unknown codec names and failed decompression
//!
//! Every decode error raised inside a record is wrapped with the path of the
//! field being decoded (`DecodeError::InField`), so a log line shows both the
//! byte offset and the field name.
//!
//! ## Usage
//! All fallible functions in this crate return `Result<T>` aliased to
//! `Result<T, Error>`, or one of the narrower error types where the caller can
//! only hit one category. The narrow types convert into `Error` with `?`.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Binding error: {0}")]
    Binding(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("Invalid schema JSON: {0}")]
    Json(String),

    #[error("Invalid name: {0:?}")]
    InvalidName(String),

    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("Missing key {key:?} in {context}")]
    MissingKey { key: &'static str, context: String },

    #[error("Duplicate field {field:?} in record {record}")]
    DuplicateField { record: String, field: String },

    #[error("Invalid default for field {field:?}: {reason}")]
    InvalidDefault { field: String, reason: String },

    #[error("Named type defined more than once: {0}")]
    Redefined(String),

    #[error("Expected a record schema, found {0}")]
    NotARecord(String),

    #[error("Incompatible schemas at {field}: {reason}")]
    Incompatible { field: String, reason: String },

    #[error("Reference to {name} inside namespace {namespace} would read back as {namespace}.{name}")]
    AmbiguousReference { name: String, namespace: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    #[error("Required field {0:?} has no value and no default")]
    MissingField(String),

    #[error("Type mismatch at {field:?}: expected {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: &'static str,
    },

    #[error("Unknown field {field:?} for record {record}")]
    UnknownField { record: String, field: String },

    #[error("Record {found} cannot be written as record {expected}")]
    RecordName { expected: String, found: String },

    #[error("Record has {found} values but schema {record} declares {expected} fields")]
    Arity {
        record: String,
        expected: usize,
        found: usize,
    },
}

impl EncodeError {
    /// Attach the enclosing field name to a mismatch raised for a nested value.
    pub fn in_field(self, name: &str) -> Self {
        match self {
            EncodeError::TypeMismatch {
                field,
                expected,
                found,
            } => EncodeError::TypeMismatch {
                field: join_path(name, &field),
                expected,
                found,
            },
            EncodeError::MissingField(field) => EncodeError::MissingField(join_path(name, &field)),
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("Unexpected end of data at offset {offset}: needed {needed} more bytes")]
    Truncated { offset: u64, needed: u64 },

    #[error("Invalid length {length} at offset {offset}")]
    InvalidLength { offset: u64, length: i64 },

    #[error("Varint longer than 10 bytes at offset {offset}")]
    VarintOverflow { offset: u64 },

    #[error("Value {value} at offset {offset} does not fit in an int")]
    IntOutOfRange { offset: u64, value: i64 },

    #[error("Invalid boolean byte {byte:#04x} at offset {offset}")]
    InvalidBoolean { offset: u64, byte: u8 },

    #[error("Invalid UTF-8 string at offset {offset}")]
    InvalidUtf8 { offset: u64 },

    #[error("Unknown codec: {0}")]
    UnknownCodec(String),

    #[error("Decompression error: {0}")]
    Decompression(String),

    #[error("Block checksum mismatch")]
    ChecksumMismatch,

    #[error("{remaining} trailing bytes after decoding {count} records")]
    TrailingBytes { count: u64, remaining: u64 },

    #[error("Field {field:?}: {source}")]
    InField {
        field: String,
        #[source]
        source: Box<DecodeError>,
    },
}

impl DecodeError {
    /// Wrap this error with the name of the field that was being decoded.
    pub fn in_field(self, name: &str) -> Self {
        match self {
            DecodeError::InField { field, source } => DecodeError::InField {
                field: join_path(name, &field),
                source,
            },
            other => DecodeError::InField {
                field: name.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, with field context stripped.
    pub fn root_cause(&self) -> &DecodeError {
        match self {
            DecodeError::InField { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

fn join_path(outer: &str, inner: &str) -> String {
    if inner.is_empty() {
        outer.to_string()
    } else {
        format!("{outer}.{inner}")
    }
}
