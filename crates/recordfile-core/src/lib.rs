//! recordfile core
//!
//! Schema model, value model and binary codec for schema-driven records,
//! plus the three record bindings that feed them.
//!
//! ## Layers
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ binding   RecordBuilder │ static_record! │ describable!  │
//! ├──────────────────────────────────────────────────────────┤
//! │ value     Value, Record, FieldValue                      │
//! ├──────────────────────────────────────────────────────────┤
//! │ codec     encode_record / Decoder          varint        │
//! ├──────────────────────────────────────────────────────────┤
//! │ schema    parse, canonical text, fingerprint, resolution │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The container file format lives in `recordfile-storage`.

pub mod binding;
pub mod codec;
pub mod codegen;
pub mod error;
pub mod schema;
pub mod value;
pub mod varint;

pub use binding::{Binding, Describable, FieldType, GenericRecord, RecordBuilder, RecordSource, StaticRecord};
pub use codec::{decode_from_slice, encode_record, encode_to_vec, encode_value, Decoder};
pub use error::{DecodeError, EncodeError, Error, Result, SchemaError};
pub use schema::{Field, Name, RecordSchema, ResolvedRecord, Schema};
pub use value::{FieldValue, Record, Value};
