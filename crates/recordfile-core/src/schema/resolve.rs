//! Reader/writer schema resolution
//!
//! Data is always decoded with the schema it was written with. When the caller
//! asks for a different reader schema, the two are matched field by field once,
//! up front, and the decoder replays that plan for every record:
//!
//! ```text
//! writer fields:  first_name  last_name  age   nickname
//!                     │           │       │        │
//!                   read        read    read     skip      (writer order)
//!                     │           │       │
//! reader fields:  first_name  last_name  age   automated_email
//!                                                   │
//!                                          default or absent
//! ```
//!
//! ## Rules
//! - Fields are matched by name, never by position
//! - A writer field the reader doesn't declare is skipped
//! - A reader field the writer doesn't declare takes its default; without a
//!   default it is left absent (`FieldValue::Absent`), not an error
//! - Types must be equal or promotable: int → long/float/double,
//!   long → float/double, float → double, string ↔ bytes
//! - Nested records must share a name and are resolved recursively

use std::sync::Arc;

use tracing::debug;

use super::{same_record, RecordSchema, Schema};
use crate::error::SchemaError;
use crate::value::Value;

/// A precomputed decoding plan for one (writer, reader) record pair
#[derive(Debug, Clone)]
pub struct ResolvedRecord {
    reader: Arc<RecordSchema>,
    writer: Arc<RecordSchema>,
    steps: Vec<FieldStep>,
    fill: Vec<(usize, Option<Value>)>,
}

#[derive(Debug, Clone)]
pub(crate) enum FieldStep {
    /// Decode the writer field into a reader slot
    Read {
        name: String,
        slot: usize,
        reader: ValueReader,
    },
    /// Writer field the reader doesn't want
    Skip { name: String, schema: Schema },
}

#[derive(Debug, Clone)]
pub(crate) enum ValueReader {
    Exact(Schema),
    Promote { writer: Schema, reader: Schema },
    Record(Box<ResolvedRecord>),
}

impl ResolvedRecord {
    /// Plan for decoding data written with `writer` as records of `reader`.
    pub fn new(writer: &Arc<RecordSchema>, reader: &Arc<RecordSchema>) -> Result<Self, SchemaError> {
        if writer.name().name() != reader.name().name() {
            return Err(SchemaError::Incompatible {
                field: reader.fullname().to_string(),
                reason: format!("writer record is named {}", writer.fullname()),
            });
        }

        let mut steps = Vec::with_capacity(writer.fields().len());
        for field in writer.fields() {
            let step = match reader.position(&field.name) {
                Some(slot) => FieldStep::Read {
                    name: field.name.clone(),
                    slot,
                    reader: resolve_type(&field.schema, &reader.fields()[slot].schema, &field.name)?,
                },
                None => FieldStep::Skip {
                    name: field.name.clone(),
                    schema: field.schema.clone(),
                },
            };
            steps.push(step);
        }

        let fill = reader
            .fields()
            .iter()
            .enumerate()
            .filter(|(_, field)| writer.position(&field.name).is_none())
            .map(|(slot, field)| (slot, field.default.clone()))
            .collect::<Vec<_>>();

        if !same_record(writer, reader) {
            debug!(
                writer = writer.fullname(),
                reader = reader.fullname(),
                skipped = steps.iter().filter(|s| matches!(s, FieldStep::Skip { .. })).count(),
                filled = fill.len(),
                "Resolved reader schema against writer schema"
            );
        }

        Ok(Self {
            reader: Arc::clone(reader),
            writer: Arc::clone(writer),
            steps,
            fill,
        })
    }

    /// Plan for reading data with the schema it was written with.
    pub fn identity(schema: &Arc<RecordSchema>) -> Self {
        let steps = schema
            .fields()
            .iter()
            .enumerate()
            .map(|(slot, field)| FieldStep::Read {
                name: field.name.clone(),
                slot,
                reader: match &field.schema {
                    Schema::Record(nested) => ValueReader::Record(Box::new(Self::identity(nested))),
                    other => ValueReader::Exact(other.clone()),
                },
            })
            .collect();

        Self {
            reader: Arc::clone(schema),
            writer: Arc::clone(schema),
            steps,
            fill: Vec::new(),
        }
    }

    pub fn reader_schema(&self) -> &Arc<RecordSchema> {
        &self.reader
    }

    pub fn writer_schema(&self) -> &Arc<RecordSchema> {
        &self.writer
    }

    pub(crate) fn steps(&self) -> &[FieldStep] {
        &self.steps
    }

    pub(crate) fn fill(&self) -> &[(usize, Option<Value>)] {
        &self.fill
    }
}

fn resolve_type(writer: &Schema, reader: &Schema, field: &str) -> Result<ValueReader, SchemaError> {
    let resolved = match (writer, reader) {
        (Schema::Record(w), Schema::Record(r)) => {
            let nested = ResolvedRecord::new(w, r).map_err(|e| match e {
                SchemaError::Incompatible { field: inner, reason } => SchemaError::Incompatible {
                    field: format!("{field}.{inner}"),
                    reason,
                },
                other => other,
            })?;
            ValueReader::Record(Box::new(nested))
        }
        (w, r) if w == r => ValueReader::Exact(w.clone()),
        (Schema::Int, Schema::Long | Schema::Float | Schema::Double)
        | (Schema::Long, Schema::Float | Schema::Double)
        | (Schema::Float, Schema::Double)
        | (Schema::String, Schema::Bytes)
        | (Schema::Bytes, Schema::String) => ValueReader::Promote {
            writer: writer.clone(),
            reader: reader.clone(),
        },
        (w, r) => {
            return Err(SchemaError::Incompatible {
                field: field.to_string(),
                reason: format!("cannot read {} as {}", w.type_name(), r.type_name()),
            })
        }
    };
    Ok(resolved)
}
