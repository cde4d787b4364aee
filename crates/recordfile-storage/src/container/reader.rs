//! Data File Reader - Reading Records Back from a Container File
//!
//! `DataFileReader` parses the header, resolves the reader schema against the
//! writer schema once, then streams blocks: read one block, decompress it,
//! decode its records, move on. Blocks are consumed strictly in order and
//! discarded once decoded.
//!
//! ## Reading Process
//!
//! ```text
//! 1. Open:   magic ─► metadata ─► parse avro.schema ─► resolve codec ─► sync
//! 2. Block:  count ─► size ─► payload ─► sync == header sync? ─► decompress
//! 3. Record: decode with the resolution plan (skip / promote / default)
//! 4. EOF at a block boundary ─► end of stream
//! ```
//!
//! ## Error Behavior
//!
//! - A sync marker mismatch is corruption. The reader stops there for good:
//!   every later call returns the same `Error::Corruption` and no further
//!   blocks are read.
//! - A record that fails to decode discards the rest of its block; reading
//!   continues with the next block.
//! - Bytes left over after a block's last record are reported as
//!   `DecodeError::TrailingBytes` by the call after that record is returned.
//! - An unreadable block header or payload (truncated file, bad length) ends
//!   the stream after the error is returned.
//!
//! ## Example Usage
//!
//! ```ignore
//! use recordfile_storage::DataFileReader;
//!
//! let mut reader = DataFileReader::open("customers.avro", None)?;
//! while let Some(record) = reader.next_record()? {
//!     println!("{}", record);
//! }
//!
//! // Or straight into a typed binding
//! for customer in DataFileReader::open("customers.avro", None)?.into_typed::<Customer>() {
//!     let customer = customer?;
//! }
//! ```

use std::fs::File;
use std::io::{BufReader, Read};
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

use recordfile_core::{
    DecodeError, Decoder, Record, RecordSchema, RecordSource, ResolvedRecord, Schema, SchemaError,
};
use tracing::{debug, info, warn};

use super::{CountingReader, Header, SyncMarker, CODEC_KEY, SCHEMA_KEY};
use crate::compression;
use crate::config::Codec;
use crate::error::{Error, Result};

/// Reads records from a container file
pub struct DataFileReader<R: Read> {
    /// Input; `None` once closed
    source: Option<CountingReader<R>>,

    header: Header,

    writer_schema: Arc<RecordSchema>,

    /// Plan mapping writer records onto the reader schema
    resolved: ResolvedRecord,

    codec: Codec,

    /// Decompressed payload of the current block
    block: Vec<u8>,

    /// Decode position within `block`
    block_pos: usize,

    /// Records in the current block
    block_records: u64,

    /// Records of the current block not yet decoded
    block_remaining: u64,

    /// Blocks read so far
    block_count: u64,

    records_read: u64,

    /// Set at end of stream or after an unrecoverable block error
    finished: bool,

    /// `(block, offset)` of a sync mismatch
    poisoned: Option<(u64, u64)>,

    /// Error to report before reading on
    pending: Option<DecodeError>,

    /// The iterator has yielded a terminal error
    iter_done: bool,
}

impl DataFileReader<BufReader<File>> {
    /// Open a file, optionally projecting its records onto `reader_schema`.
    pub fn open(path: impl AsRef<Path>, reader_schema: Option<&Schema>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let reader = Self::new(BufReader::new(file), reader_schema)?;
        info!(
            path = %path.display(),
            schema = reader.writer_schema.fullname(),
            codec = reader.codec.name(),
            "Opened data file"
        );
        Ok(reader)
    }
}

impl<R: Read> DataFileReader<R> {
    /// Read the header from `source` and prepare to read blocks.
    pub fn new(source: R, reader_schema: Option<&Schema>) -> Result<Self> {
        let mut source = CountingReader::new(source);
        let header = Header::read_from(&mut source)?;

        let schema_bytes = header.metadata.get(SCHEMA_KEY).ok_or(SchemaError::MissingKey {
            key: SCHEMA_KEY,
            context: "file header".to_string(),
        })?;
        let schema_text = std::str::from_utf8(schema_bytes)
            .map_err(|_| SchemaError::Json("writer schema is not valid UTF-8".to_string()))?;
        let writer_schema = Schema::parse_record(schema_text)?;

        let codec = match header.metadata.get(CODEC_KEY) {
            Some(name) => Codec::from_name(&String::from_utf8_lossy(name))?,
            None => Codec::Null,
        };

        let resolved = match reader_schema {
            None => ResolvedRecord::identity(&writer_schema),
            Some(Schema::Record(reader)) => ResolvedRecord::new(&writer_schema, reader)?,
            Some(other) => return Err(SchemaError::NotARecord(other.type_name().to_string()).into()),
        };

        debug!(
            writer_schema = writer_schema.fullname(),
            reader_schema = resolved.reader_schema().fullname(),
            codec = codec.name(),
            header_bytes = source.position(),
            "Read data file header"
        );

        Ok(Self {
            source: Some(source),
            header,
            writer_schema,
            resolved,
            codec,
            block: Vec::new(),
            block_pos: 0,
            block_records: 0,
            block_remaining: 0,
            block_count: 0,
            records_read: 0,
            finished: false,
            poisoned: None,
            pending: None,
            iter_done: false,
        })
    }

    /// Whether another record is available. May read the next block header.
    pub fn has_next(&mut self) -> Result<bool> {
        self.check_usable()?;
        while self.block_remaining == 0 {
            if self.finished {
                return Ok(false);
            }
            if let Err(e) = self.load_block() {
                if !e.is_corruption() {
                    self.finished = true;
                }
                return Err(e);
            }
        }
        Ok(true)
    }

    /// Next record in the reader schema, `None` at end of stream.
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        self.check_usable()?;
        if let Some(err) = self.pending.take() {
            return Err(err.into());
        }
        if !self.has_next()? {
            return Ok(None);
        }

        let mut decoder = Decoder::with_position(&self.block, self.block_pos);
        let record = match decoder.decode_record(&self.resolved) {
            Ok(record) => record,
            Err(e) => {
                warn!(
                    block = self.block_count - 1,
                    skipped = self.block_remaining,
                    error = %e,
                    "Discarding rest of block after decode error"
                );
                self.discard_block();
                return Err(e.into());
            }
        };
        self.block_pos = decoder.position();
        self.block_remaining -= 1;

        if self.block_remaining == 0 && self.block_pos != self.block.len() {
            let remaining = (self.block.len() - self.block_pos) as u64;
            warn!(
                block = self.block_count - 1,
                remaining,
                "Bytes left over after the last record of the block"
            );
            self.pending = Some(DecodeError::TrailingBytes {
                count: self.block_records,
                remaining,
            });
            self.discard_block();
        }

        self.records_read += 1;
        Ok(Some(record))
    }

    /// Next record converted to a binding.
    pub fn read<T: RecordSource>(&mut self) -> Result<Option<T>> {
        match self.next_record()? {
            Some(record) => Ok(Some(T::from_record(record)?)),
            None => Ok(None),
        }
    }

    /// Iterate over records converted to a binding.
    pub fn into_typed<T: RecordSource>(self) -> TypedRecords<R, T> {
        TypedRecords {
            reader: self,
            _marker: PhantomData,
        }
    }

    /// Release the source. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.source.take().is_some() {
            self.discard_block();
            self.pending = None;
            info!(
                schema = self.writer_schema.fullname(),
                records = self.records_read,
                blocks = self.block_count,
                "Closed data file reader"
            );
        }
        Ok(())
    }

    /// Schema records are returned in (the reader schema)
    pub fn schema(&self) -> &Arc<RecordSchema> {
        self.resolved.reader_schema()
    }

    /// Schema the file was written with
    pub fn writer_schema(&self) -> &Arc<RecordSchema> {
        &self.writer_schema
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Raw header metadata value
    pub fn metadata(&self, key: &str) -> Option<&[u8]> {
        self.header.metadata.get(key).map(Vec::as_slice)
    }

    /// Header metadata value as text
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.header.metadata_str(key)
    }

    pub fn sync_marker(&self) -> &SyncMarker {
        &self.header.sync
    }

    /// Blocks read so far
    pub fn block_count(&self) -> u64 {
        self.block_count
    }

    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    pub fn is_closed(&self) -> bool {
        self.source.is_none()
    }

    fn check_usable(&self) -> Result<()> {
        if self.source.is_none() {
            return Err(Error::InvalidState("reader is closed"));
        }
        if let Some((block, offset)) = self.poisoned {
            return Err(Error::Corruption { block, offset });
        }
        Ok(())
    }

    fn discard_block(&mut self) {
        self.block.clear();
        self.block_pos = 0;
        self.block_remaining = 0;
    }

    /// Read the next block into memory. Empty blocks are read and skipped by
    /// the caller's loop; a clean EOF sets `finished`.
    fn load_block(&mut self) -> Result<()> {
        let Some(source) = self.source.as_mut() else {
            return Err(Error::InvalidState("reader is closed"));
        };

        let offset = source.position();
        let count = match source.read_long()? {
            Some(count) => count,
            None => {
                self.finished = true;
                return Ok(());
            }
        };
        if count < 0 {
            return Err(DecodeError::InvalidLength { offset, length: count }.into());
        }

        let size_offset = source.position();
        let size = source.read_required_long()?;
        if size < 0 {
            return Err(DecodeError::InvalidLength {
                offset: size_offset,
                length: size,
            }
            .into());
        }

        let payload = source.read_vec(size as u64)?;

        let sync_offset = source.position();
        let mut sync = [0u8; super::SYNC_SIZE];
        source.read_exact(&mut sync)?;
        if sync != self.header.sync {
            self.poisoned = Some((self.block_count, sync_offset));
            self.discard_block();
            warn!(
                block = self.block_count,
                offset = sync_offset,
                "Sync marker mismatch, data file is corrupt"
            );
            return Err(Error::Corruption {
                block: self.block_count,
                offset: sync_offset,
            });
        }

        self.block = compression::decompress(self.codec, &payload)?;
        self.block_pos = 0;
        self.block_records = count as u64;
        self.block_remaining = count as u64;
        self.block_count += 1;

        if count == 0 && !self.block.is_empty() {
            let remaining = self.block.len() as u64;
            self.discard_block();
            return Err(DecodeError::TrailingBytes { count: 0, remaining }.into());
        }

        debug!(
            block = self.block_count - 1,
            offset,
            records = count,
            stored_bytes = size,
            raw_bytes = self.block.len(),
            "Read block"
        );
        Ok(())
    }
}

impl<R: Read> Iterator for DataFileReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.iter_done {
            return None;
        }
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.iter_done = true;
                None
            }
            Err(e) => {
                // Corruption and closed readers never recover; stop after
                // reporting once
                if e.is_corruption() || matches!(e, Error::InvalidState(_)) {
                    self.iter_done = true;
                }
                Some(Err(e))
            }
        }
    }
}

/// Iterator over records converted to a binding, see [`DataFileReader::into_typed`]
pub struct TypedRecords<R: Read, T> {
    reader: DataFileReader<R>,
    _marker: PhantomData<fn() -> T>,
}

impl<R: Read, T> TypedRecords<R, T> {
    pub fn into_inner(self) -> DataFileReader<R> {
        self.reader
    }
}

impl<R: Read, T: RecordSource> Iterator for TypedRecords<R, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader
            .next()
            .map(|record| record.and_then(|r| T::from_record(r).map_err(Error::from)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WriterConfig;
    use crate::container::DataFileWriter;
    use recordfile_core::{RecordBuilder, Value};

    fn schema() -> Arc<RecordSchema> {
        Schema::parse_record(
            r#"{"type":"record","name":"Event","namespace":"com.example","fields":[
                {"name":"id","type":"int"},
                {"name":"name","type":"string"}]}"#,
        )
        .unwrap()
    }

    fn write_events(count: i32, config: WriterConfig) -> Vec<u8> {
        let schema = schema();
        let mut writer = DataFileWriter::new(Vec::new(), &schema, config).unwrap();
        for id in 0..count {
            let record = RecordBuilder::new(&schema)
                .with("id", id)
                .with("name", format!("event-{id}"))
                .build()
                .unwrap();
            writer.append_record(&record).unwrap();
        }
        writer.into_inner().unwrap()
    }

    #[test]
    fn test_read_back_in_order() {
        let bytes = write_events(10, WriterConfig::default());
        let mut reader = DataFileReader::new(&bytes[..], None).unwrap();

        let mut ids = Vec::new();
        while let Some(record) = reader.next_record().unwrap() {
            ids.push(record.get("id").value().and_then(Value::as_i32).unwrap());
        }
        assert_eq!(ids, (0..10).collect::<Vec<_>>());
        assert_eq!(reader.block_count(), 1);
        assert!(!reader.has_next().unwrap());
        assert_eq!(reader.next_record().unwrap(), None);
    }

    #[test]
    fn test_empty_file() {
        let bytes = write_events(0, WriterConfig::default());
        let mut reader = DataFileReader::new(&bytes[..], None).unwrap();
        assert!(!reader.has_next().unwrap());
        assert_eq!(reader.block_count(), 0);
        assert_eq!(reader.schema().fullname(), "com.example.Event");
    }

    #[test]
    fn test_missing_schema_key() {
        let header = Header {
            metadata: Default::default(),
            sync: [0u8; super::super::SYNC_SIZE],
        };
        let bytes = header.encode();
        let err = DataFileReader::new(&bytes[..], None).err().unwrap();
        assert!(matches!(
            err,
            Error::Core(recordfile_core::Error::Schema(SchemaError::MissingKey { key: "avro.schema", .. }))
        ));
    }

    #[test]
    fn test_unknown_codec() {
        let mut metadata = std::collections::BTreeMap::new();
        metadata.insert(SCHEMA_KEY.to_string(), schema().canonical_text().into_bytes());
        metadata.insert(CODEC_KEY.to_string(), b"lzma".to_vec());
        let bytes = Header {
            metadata,
            sync: [0u8; super::super::SYNC_SIZE],
        }
        .encode();

        let err = DataFileReader::new(&bytes[..], None).err().unwrap();
        assert!(matches!(err.as_decode(), Some(DecodeError::UnknownCodec(name)) if name == "lzma"));
    }

    #[test]
    fn test_reader_schema_must_be_record() {
        let bytes = write_events(1, WriterConfig::default());
        let err = DataFileReader::new(&bytes[..], Some(&Schema::Int)).err().unwrap();
        assert!(matches!(
            err,
            Error::Core(recordfile_core::Error::Schema(SchemaError::NotARecord(_)))
        ));
    }

    #[test]
    fn test_closed_reader() {
        let bytes = write_events(3, WriterConfig::default());
        let mut reader = DataFileReader::new(&bytes[..], None).unwrap();
        reader.next_record().unwrap();
        reader.close().unwrap();
        reader.close().unwrap();

        assert!(matches!(reader.next_record(), Err(Error::InvalidState(_))));
        assert!(matches!(reader.has_next(), Err(Error::InvalidState(_))));
        assert!(matches!(reader.next(), Some(Err(Error::InvalidState(_)))));
        assert!(reader.next().is_none());
    }

    fn push_block(bytes: &mut Vec<u8>, count: i64, payload: &[u8], sync: &SyncMarker) {
        recordfile_core::varint::encode_varint(bytes, count);
        recordfile_core::varint::encode_varint(bytes, payload.len() as i64);
        bytes.extend_from_slice(payload);
        bytes.extend_from_slice(sync);
    }

    #[test]
    fn test_trailing_bytes_after_last_record() {
        let schema = schema();
        let sync = [7u8; super::super::SYNC_SIZE];
        let mut metadata = std::collections::BTreeMap::new();
        metadata.insert(SCHEMA_KEY.to_string(), schema.canonical_text().into_bytes());
        let mut bytes = Header { metadata, sync }.encode();

        let event = |id: i32| {
            let record = RecordBuilder::new(&schema)
                .with("id", id)
                .with("name", format!("event-{id}"))
                .build()
                .unwrap();
            recordfile_core::encode_to_vec(&record).unwrap()
        };

        let mut payload = event(1);
        payload.extend_from_slice(&event(2));
        payload.extend_from_slice(&[0x02, 0x04]);
        push_block(&mut bytes, 2, &payload, &sync);
        push_block(&mut bytes, 1, &event(3), &sync);

        let mut reader = DataFileReader::new(&bytes[..], None).unwrap();
        let id = |record: Record| record.get("id").value().and_then(Value::as_i32);

        assert_eq!(reader.next_record().unwrap().map(id), Some(Some(1)));
        // The last record decoded cleanly and is still returned
        assert_eq!(reader.next_record().unwrap().map(id), Some(Some(2)));
        assert_eq!(reader.records_read(), 2);

        let err = reader.next_record().unwrap_err();
        assert!(matches!(
            err.as_decode(),
            Some(DecodeError::TrailingBytes { count: 2, remaining: 2 })
        ));

        assert_eq!(reader.next_record().unwrap().map(id), Some(Some(3)));
        assert_eq!(reader.next_record().unwrap(), None);
        assert_eq!(reader.records_read(), 3);
    }

    #[test]
    fn test_truncated_block() {
        let bytes = write_events(5, WriterConfig::default());
        let cut = &bytes[..bytes.len() - 20];
        let mut reader = DataFileReader::new(cut, None).unwrap();

        let err = reader.next_record().unwrap_err();
        assert!(matches!(err.as_decode(), Some(DecodeError::Truncated { .. })));
        // The stream ends after the error
        assert_eq!(reader.next_record().unwrap(), None);
    }
}
