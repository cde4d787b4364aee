//! recordfile Storage Layer
//!
//! This crate implements the container file format: self-describing files of
//! schema-encoded records, batched into optionally compressed blocks.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌───────────────────────┐
//! │ Bindings              │  Record / static_record! / describable!
//! └──────────┬────────────┘
//!            │ records
//!            ▼
//! ┌───────────────────────┐
//! │ DataFileWriter        │
//! │ - Encodes             │
//! │ - Batches into blocks │
//! │ - Compresses          │
//! └──────────┬────────────┘
//!            │ header + blocks
//!            ▼
//! ┌───────────────────────┐
//! │ File / any io::Write  │
//! └──────────┬────────────┘
//!            │ bytes
//!            ▼
//! ┌───────────────────────┐
//! │ DataFileReader        │
//! │ - Validates sync      │
//! │ - Decompresses        │
//! │ - Resolves schemas    │
//! └──────────┬────────────┘
//!            │ records
//!            ▼
//! ┌───────────────────────┐
//! │ Bindings              │
//! └───────────────────────┘
//! ```
//!
//! ## Usage Example
//!
//! ```ignore
//! use recordfile_core::{RecordBuilder, Schema};
//! use recordfile_storage::{DataFileReader, DataFileWriter, WriterConfig};
//!
//! let schema = Schema::parse_record(SCHEMA_TEXT)?;
//! let mut writer = DataFileWriter::create("events.avro", &schema, WriterConfig::default())?;
//! writer.append(&RecordBuilder::new(&schema).with("id", 1).build()?)?;
//! writer.close()?;
//!
//! let mut reader = DataFileReader::open("events.avro", None)?;
//! while let Some(record) = reader.next_record()? {
//!     println!("{}", record);
//! }
//! ```
//!
//! ## Logging
//!
//! The crate logs through `tracing` and never installs a subscriber: opens
//! and closes at `info`, every block at `debug`, drop-time flush failures and
//! corruption at `warn`.

pub mod compression;
pub mod config;
pub mod container;
pub mod error;

pub use config::{Codec, WriterConfig};
pub use container::{DataFileReader, DataFileWriter, Header, TypedRecords, MAGIC, SYNC_SIZE};
pub use error::{Error, Result};
