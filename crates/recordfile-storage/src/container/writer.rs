//! Data File Writer - Appending Records to a Container File
//!
//! `DataFileWriter` writes the header once, then batches encoded records into
//! blocks and appends each block as it fills up.
//!
//! ## What Does DataFileWriter Do?
//!
//! 1. **Writes the header** on open: magic, schema, codec, user metadata and a
//!    fresh random sync marker
//! 2. **Encodes records** into the pending block as they're appended
//! 3. **Flushes a block** when it reaches `block_max_records` records or
//!    `block_max_bytes` encoded bytes: compress, then write
//!    `{count, size, payload, sync}`
//! 4. **Closes** by flushing the last partial block and the sink
//!
//! ## Example Usage
//!
//! ```ignore
//! use recordfile_storage::{Codec, DataFileWriter, WriterConfig};
//!
//! let config = WriterConfig::default().with_codec(Codec::Deflate { level: 9 });
//! let mut writer = DataFileWriter::create("customers.avro", &schema, config)?;
//!
//! for customer in customers {
//!     writer.append(&customer)?;
//! }
//!
//! writer.close()?;
//! ```
//!
//! ## Failure Behavior
//!
//! A record that fails to encode is rolled back out of the pending block, so
//! the records appended before it are unaffected. If the sink fails while a
//! block is written, the file may end in a partial block; readers report that
//! as a truncated block.
//!
//! Dropping a writer without calling `close` flushes on a best-effort basis
//! and logs any failure.
//!
//! ## Thread Safety
//!
//! DataFileWriter is NOT thread-safe. Each file has exactly one writer.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use recordfile_core::schema::same_record;
use recordfile_core::{codec, varint, Record, RecordSchema, RecordSource, Schema};
use tracing::{debug, info, warn};

use super::{Header, SyncMarker, CODEC_KEY, SCHEMA_KEY};
use crate::compression;
use crate::config::WriterConfig;
use crate::error::{Error, Result};

/// Writes records to a container file
pub struct DataFileWriter<W: Write> {
    /// Output; `None` once closed
    sink: Option<W>,

    /// Schema every appended record is encoded with
    schema: Arc<RecordSchema>,

    config: WriterConfig,

    /// Sync marker written after every block
    sync: SyncMarker,

    /// Encoded records of the pending block
    block: Vec<u8>,

    /// Records in the pending block
    block_records: u64,

    /// Total records appended
    records_written: u64,

    /// Blocks written to the sink
    blocks_written: u64,
}

impl DataFileWriter<BufWriter<File>> {
    /// Create (or truncate) a file and write the header.
    pub fn create(path: impl AsRef<Path>, schema: &Arc<RecordSchema>, config: WriterConfig) -> Result<Self> {
        let path = path.as_ref();
        config.validate()?;
        let file = File::create(path)?;
        info!(
            path = %path.display(),
            schema = schema.fullname(),
            codec = %config.codec,
            "Creating data file"
        );
        Self::new(BufWriter::new(file), schema, config)
    }
}

impl<W: Write> DataFileWriter<W> {
    /// Write a header to `sink` and return a writer ready for records.
    pub fn new(mut sink: W, schema: &Arc<RecordSchema>, config: WriterConfig) -> Result<Self> {
        config.validate()?;

        let canonical = Schema::Record(Arc::clone(schema)).canonical_text();
        let mut metadata: std::collections::BTreeMap<String, Vec<u8>> = config
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), v.as_bytes().to_vec()))
            .collect();
        metadata.insert(SCHEMA_KEY.to_string(), canonical.into_bytes());
        metadata.insert(CODEC_KEY.to_string(), config.codec.name().as_bytes().to_vec());

        let header = Header {
            metadata,
            sync: rand::random(),
        };
        sink.write_all(&header.encode())?;

        debug!(
            schema = schema.fullname(),
            codec = %config.codec,
            block_max_records = config.block_max_records,
            block_max_bytes = config.block_max_bytes,
            "Wrote data file header"
        );

        Ok(Self {
            sink: Some(sink),
            schema: Arc::clone(schema),
            block: Vec::with_capacity(config.block_max_bytes.min(1024 * 1024)),
            config,
            sync: header.sync,
            block_records: 0,
            records_written: 0,
            blocks_written: 0,
        })
    }

    /// Append a value from any binding.
    pub fn append<T: RecordSource>(&mut self, value: &T) -> Result<()> {
        self.ensure_open()?;
        let record = value.to_record(&self.schema)?;
        self.append_record(&record)
    }

    /// Append a record. A record built for another schema is projected onto
    /// the file's schema by field name.
    pub fn append_record(&mut self, record: &Record) -> Result<()> {
        self.ensure_open()?;

        let projected;
        let record = if same_record(record.schema(), &self.schema) {
            record
        } else {
            projected = record.clone().project_strict(&self.schema)?;
            &projected
        };

        let mark = self.block.len();
        if let Err(e) = codec::encode_record(&mut self.block, record) {
            self.block.truncate(mark);
            return Err(e.into());
        }

        self.block_records += 1;
        self.records_written += 1;

        if self.block_records >= self.config.block_max_records as u64
            || self.block.len() >= self.config.block_max_bytes
        {
            self.flush_block()?;
        }
        Ok(())
    }

    /// Write the pending block (if any) and flush the sink.
    pub fn flush(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.flush_block()?;
        if let Some(sink) = self.sink.as_mut() {
            sink.flush()?;
        }
        Ok(())
    }

    /// Flush everything and release the sink. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.sink.is_none() {
            return Ok(());
        }

        let result = self.flush();
        // Released even when the flush failed
        self.sink = None;

        info!(
            schema = self.schema.fullname(),
            records = self.records_written,
            blocks = self.blocks_written,
            ok = result.is_ok(),
            "Closed data file writer"
        );
        result
    }

    /// Flush everything and hand back the sink.
    pub fn into_inner(mut self) -> Result<W> {
        self.flush()?;
        self.sink.take().ok_or(Error::InvalidState("writer is closed"))
    }

    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }

    pub fn sync_marker(&self) -> &SyncMarker {
        &self.sync
    }

    /// Records appended so far, including the pending block
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    pub fn blocks_written(&self) -> u64 {
        self.blocks_written
    }

    pub fn is_closed(&self) -> bool {
        self.sink.is_none()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.sink.is_none() {
            return Err(Error::InvalidState("writer is closed"));
        }
        Ok(())
    }

    fn flush_block(&mut self) -> Result<()> {
        if self.block_records == 0 {
            return Ok(());
        }
        let Some(sink) = self.sink.as_mut() else {
            return Err(Error::InvalidState("writer is closed"));
        };

        // The pending block is reset before any error surfaces, so a failed
        // block is never written twice (e.g. again on drop)
        let payload = compression::compress(self.config.codec, &self.block);
        let count = std::mem::take(&mut self.block_records);
        let raw_len = self.block.len();
        self.block.clear();
        let payload = payload?;

        let mut frame = Vec::with_capacity(payload.len() + 2 * varint::MAX_VARINT_LEN + self.sync.len());
        varint::encode_varint(&mut frame, count as i64);
        varint::encode_varint(&mut frame, payload.len() as i64);
        frame.extend_from_slice(&payload);
        frame.extend_from_slice(&self.sync);
        sink.write_all(&frame)?;

        self.blocks_written += 1;
        debug!(
            block = self.blocks_written - 1,
            records = count,
            raw_bytes = raw_len,
            stored_bytes = payload.len(),
            "Flushed block"
        );
        Ok(())
    }
}

impl<W: Write> Drop for DataFileWriter<W> {
    fn drop(&mut self) {
        if self.sink.is_some() {
            if let Err(e) = self.close() {
                warn!(
                    schema = self.schema.fullname(),
                    error = %e,
                    "Failed to flush data file writer on drop"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Codec;
    use crate::container::MAGIC;
    use recordfile_core::{EncodeError, RecordBuilder};

    fn schema() -> Arc<RecordSchema> {
        Schema::parse_record(
            r#"{"type":"record","name":"Event","fields":[
                {"name":"id","type":"long"},
                {"name":"name","type":"string"}]}"#,
        )
        .unwrap()
    }

    fn event(id: i64) -> Record {
        RecordBuilder::new(&schema())
            .with("id", id)
            .with("name", format!("event-{id}"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_header_written_on_open() {
        let writer = DataFileWriter::new(Vec::new(), &schema(), WriterConfig::default()).unwrap();
        let bytes = writer.into_inner().unwrap();
        assert_eq!(&bytes[..4], &MAGIC);
    }

    #[test]
    fn test_blocks_flush_at_record_threshold() {
        let config = WriterConfig {
            block_max_records: 3,
            ..Default::default()
        };
        let mut writer = DataFileWriter::new(Vec::new(), &schema(), config).unwrap();
        for id in 0..7 {
            writer.append_record(&event(id)).unwrap();
        }
        assert_eq!(writer.blocks_written(), 2);
        assert_eq!(writer.records_written(), 7);

        writer.flush().unwrap();
        assert_eq!(writer.blocks_written(), 3);

        // Nothing pending: no empty block
        writer.flush().unwrap();
        assert_eq!(writer.blocks_written(), 3);
    }

    #[test]
    fn test_blocks_flush_at_byte_threshold() {
        let config = WriterConfig {
            block_max_bytes: 32,
            ..Default::default()
        };
        let mut writer = DataFileWriter::new(Vec::new(), &schema(), config).unwrap();
        for id in 0..10 {
            writer.append_record(&event(id)).unwrap();
        }
        // Each record is 9-10 bytes, so a block holds about 4
        assert!(writer.blocks_written() >= 2);
    }

    #[test]
    fn test_failed_append_rolls_back() {
        let mut writer = DataFileWriter::new(Vec::new(), &schema(), WriterConfig::default()).unwrap();
        writer.append_record(&event(1)).unwrap();

        let mut incomplete = Record::new(schema());
        incomplete.put("id", 2i64).unwrap();
        let err = writer.append_record(&incomplete).unwrap_err();
        assert!(matches!(
            err,
            Error::Core(recordfile_core::Error::Encode(EncodeError::MissingField(_)))
        ));

        assert_eq!(writer.records_written(), 1);
        assert_eq!(writer.block.len(), codec::encode_to_vec(&event(1)).unwrap().len());
    }

    #[test]
    fn test_close_is_idempotent_and_final() {
        let mut writer = DataFileWriter::new(Vec::new(), &schema(), WriterConfig::default()).unwrap();
        writer.append_record(&event(1)).unwrap();
        writer.close().unwrap();
        writer.close().unwrap();
        assert!(writer.is_closed());

        assert!(matches!(writer.append_record(&event(2)), Err(Error::InvalidState(_))));
        assert!(matches!(writer.flush(), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = WriterConfig::default().with_codec(Codec::Deflate { level: 12 });
        assert!(matches!(
            DataFileWriter::new(Vec::new(), &schema(), config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_sync_marker_is_random() {
        let a = DataFileWriter::new(Vec::new(), &schema(), WriterConfig::default()).unwrap();
        let b = DataFileWriter::new(Vec::new(), &schema(), WriterConfig::default()).unwrap();
        assert_ne!(a.sync_marker(), b.sync_marker());
    }
}
