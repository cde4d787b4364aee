//! Binary Codec
//!
//! Maps values to the compact binary encoding their schema governs, and back.
//! The encoding carries no type tags and no field names: a reader needs the
//! writer's schema to make sense of the bytes.
//!
//! ## Wire Format
//!
//! ```text
//! null     ->  (nothing)
//! boolean  ->  [0x00 | 0x01]
//! int/long ->  [zig-zag varint]
//! float    ->  [4 bytes LE]
//! double   ->  [8 bytes LE]
//! bytes    ->  [varint length][raw bytes]
//! string   ->  [varint length][UTF-8 bytes]
//! record   ->  [field 0][field 1]...[field n]
//! ```
//!
//! Decoding works on a borrowed block buffer. Every error records the byte
//! offset within the buffer, and record decoding wraps it with the field path.
//!
//! ## Example
//!
//! ```ignore
//! let mut buf = BytesMut::new();
//! encode_record(&mut buf, &record)?;
//!
//! let mut decoder = Decoder::new(&buf);
//! let decoded = decoder.decode_record(&ResolvedRecord::identity(record.schema()))?;
//! assert_eq!(decoded, record);
//! ```

use std::sync::Arc;

use bytes::BufMut;

use crate::error::{DecodeError, EncodeError};
use crate::schema::resolve::{FieldStep, ValueReader};
use crate::schema::{same_record, RecordSchema, ResolvedRecord, Schema};
use crate::value::{Record, Value};
use crate::varint::{self, VarintError};

/// Encode a single value of the given schema.
pub fn encode_value(buf: &mut impl BufMut, schema: &Schema, value: &Value) -> Result<(), EncodeError> {
    match (schema, value) {
        (Schema::Null, Value::Null) => {}
        (Schema::Boolean, Value::Boolean(b)) => buf.put_u8(u8::from(*b)),
        (Schema::Int, Value::Int(v)) => varint::encode_varint(buf, i64::from(*v)),
        (Schema::Long, Value::Long(v)) => varint::encode_varint(buf, *v),
        (Schema::Float, Value::Float(v)) => buf.put_f32_le(*v),
        (Schema::Double, Value::Double(v)) => buf.put_f64_le(*v),
        (Schema::Bytes, Value::Bytes(b)) => put_len_prefixed(buf, b),
        (Schema::String, Value::String(s)) => put_len_prefixed(buf, s.as_bytes()),
        (Schema::Record(expected), Value::Record(record)) if same_record(expected, record.schema()) => {
            encode_record(buf, record)?;
        }
        (schema, value) => {
            // Promotable values (an int for a long field, a record under an
            // equivalent schema) are converted first.
            let coerced = value
                .clone()
                .coerce_to(schema)
                .map_err(|value| EncodeError::TypeMismatch {
                    field: String::new(),
                    expected: schema.type_name().to_string(),
                    found: value.kind(),
                })?;
            return encode_value(buf, schema, &coerced);
        }
    }
    Ok(())
}

/// Encode a record positionally. Absent fields fall back to their default.
pub fn encode_record(buf: &mut impl BufMut, record: &Record) -> Result<(), EncodeError> {
    for (field, value) in record.iter() {
        let value = value
            .or(field.default.as_ref())
            .ok_or_else(|| EncodeError::MissingField(field.name.clone()))?;
        encode_value(buf, &field.schema, value).map_err(|e| e.in_field(&field.name))?;
    }
    Ok(())
}

/// Encode a record into a fresh buffer.
pub fn encode_to_vec(record: &Record) -> Result<Vec<u8>, EncodeError> {
    let mut buf = Vec::new();
    encode_record(&mut buf, record)?;
    Ok(buf)
}

fn put_len_prefixed(buf: &mut impl BufMut, bytes: &[u8]) {
    varint::encode_varint(buf, bytes.len() as i64);
    buf.put_slice(bytes);
}

/// Cursor over an encoded buffer
#[derive(Debug)]
pub struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Resume decoding at `pos`, keeping offsets relative to the start of `data`.
    pub fn with_position(data: &'a [u8], pos: usize) -> Self {
        Self {
            data,
            pos: pos.min(data.len()),
        }
    }

    /// Byte offset of the next read
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to decode
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Decode a value written with `schema`.
    pub fn decode_value(&mut self, schema: &Schema) -> Result<Value, DecodeError> {
        let value = match schema {
            Schema::Null => Value::Null,
            Schema::Boolean => Value::Boolean(self.read_bool()?),
            Schema::Int => Value::Int(self.read_int()?),
            Schema::Long => Value::Long(self.read_long()?),
            Schema::Float => Value::Float(f32::from_le_bytes(self.read_array()?)),
            Schema::Double => Value::Double(f64::from_le_bytes(self.read_array()?)),
            Schema::Bytes => Value::Bytes(self.read_len_prefixed()?.to_vec()),
            Schema::String => Value::String(self.read_string()?),
            Schema::Record(record) => Value::Record(self.decode_writer_record(record)?),
        };
        Ok(value)
    }

    /// Decode a record according to a resolution plan.
    ///
    /// Writer fields are consumed in writer order; the result is laid out in
    /// reader order with defaults (or absent slots) for reader-only fields.
    pub fn decode_record(&mut self, resolved: &ResolvedRecord) -> Result<Record, DecodeError> {
        let reader = resolved.reader_schema();
        let mut slots: Vec<Option<Value>> = vec![None; reader.fields().len()];

        for step in resolved.steps() {
            match step {
                FieldStep::Read { name, slot, reader } => {
                    let value = self.read_resolved(reader).map_err(|e| e.in_field(name))?;
                    slots[*slot] = Some(value);
                }
                FieldStep::Skip { name, schema } => {
                    self.skip_value(schema).map_err(|e| e.in_field(name))?;
                }
            }
        }

        for (slot, default) in resolved.fill() {
            slots[*slot] = default.clone();
        }

        Ok(Record::from_decoded(Arc::clone(reader), slots))
    }

    /// Advance past a value without materializing it.
    pub fn skip_value(&mut self, schema: &Schema) -> Result<(), DecodeError> {
        match schema {
            Schema::Null => {}
            Schema::Boolean => {
                self.read_bool()?;
            }
            Schema::Int | Schema::Long => {
                self.read_long()?;
            }
            Schema::Float => self.advance(4)?,
            Schema::Double => self.advance(8)?,
            Schema::Bytes | Schema::String => {
                self.read_len_prefixed()?;
            }
            Schema::Record(record) => {
                for field in record.fields() {
                    self.skip_value(&field.schema).map_err(|e| e.in_field(&field.name))?;
                }
            }
        }
        Ok(())
    }

    fn decode_writer_record(&mut self, schema: &Arc<RecordSchema>) -> Result<Record, DecodeError> {
        let mut slots = Vec::with_capacity(schema.fields().len());
        for field in schema.fields() {
            let value = self.decode_value(&field.schema).map_err(|e| e.in_field(&field.name))?;
            slots.push(Some(value));
        }
        Ok(Record::from_decoded(Arc::clone(schema), slots))
    }

    fn read_resolved(&mut self, reader: &ValueReader) -> Result<Value, DecodeError> {
        match reader {
            ValueReader::Exact(schema) => self.decode_value(schema),
            ValueReader::Promote { writer, reader } => {
                let offset = self.offset();
                self.decode_value(writer)?
                    .coerce_to(reader)
                    // Only bytes -> string can fail
                    .map_err(|_| DecodeError::InvalidUtf8 { offset })
            }
            ValueReader::Record(nested) => self.decode_record(nested).map(Value::Record),
        }
    }

    fn offset(&self) -> u64 {
        self.pos as u64
    }

    fn read_long(&mut self) -> Result<i64, DecodeError> {
        let offset = self.offset();
        let mut rest = &self.data[self.pos..];
        let before = rest.len();
        let value = varint::decode_varint(&mut rest).map_err(|e| match e {
            VarintError::Truncated => DecodeError::Truncated { offset, needed: 1 },
            VarintError::Overflow => DecodeError::VarintOverflow { offset },
        })?;
        self.pos += before - rest.len();
        Ok(value)
    }

    fn read_int(&mut self) -> Result<i32, DecodeError> {
        let offset = self.offset();
        let value = self.read_long()?;
        i32::try_from(value).map_err(|_| DecodeError::IntOutOfRange { offset, value })
    }

    fn read_bool(&mut self) -> Result<bool, DecodeError> {
        let offset = self.offset();
        let [byte] = self.read_array::<1>()?;
        match byte {
            0 => Ok(false),
            1 => Ok(true),
            byte => Err(DecodeError::InvalidBoolean { offset, byte }),
        }
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let bytes = self.take(N)?;
        let mut array = [0u8; N];
        array.copy_from_slice(bytes);
        Ok(array)
    }

    fn read_len_prefixed(&mut self) -> Result<&'a [u8], DecodeError> {
        let offset = self.offset();
        let length = self.read_long()?;
        if length < 0 || length as u64 > self.remaining() as u64 {
            return Err(DecodeError::InvalidLength { offset, length });
        }
        self.take(length as usize)
    }

    fn read_string(&mut self) -> Result<String, DecodeError> {
        let offset = self.offset();
        let bytes = self.read_len_prefixed()?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| DecodeError::InvalidUtf8 { offset })
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::Truncated {
                offset: self.offset(),
                needed: (n - self.remaining()) as u64,
            });
        }
        let data: &'a [u8] = self.data;
        let bytes = &data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn advance(&mut self, n: usize) -> Result<(), DecodeError> {
        self.take(n).map(|_| ())
    }
}

/// Decode one record written with `schema`, requiring the buffer to be fully consumed.
pub fn decode_from_slice(data: &[u8], schema: &Arc<RecordSchema>) -> Result<Record, DecodeError> {
    let mut decoder = Decoder::new(data);
    let record = decoder.decode_record(&ResolvedRecord::identity(schema))?;
    if !decoder.is_empty() {
        return Err(DecodeError::TrailingBytes {
            count: 1,
            remaining: decoder.remaining() as u64,
        });
    }
    Ok(record)
}
