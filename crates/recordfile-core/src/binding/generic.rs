//! Dynamic binding: records assembled by field name at runtime.
//!
//! `set` never fails on the spot; the first problem (unknown field, wrong type)
//! is remembered and reported by `build`, so a builder chain stays fluent.

use std::sync::Arc;

use crate::error::{EncodeError, Error, Result};
use crate::schema::RecordSchema;
use crate::value::{Record, Value};

/// A dynamically built record
pub type GenericRecord = Record;

#[derive(Debug, Clone)]
pub struct RecordBuilder {
    schema: Arc<RecordSchema>,
    values: Vec<Option<Value>>,
    error: Option<Error>,
}

impl RecordBuilder {
    pub fn new(schema: &Arc<RecordSchema>) -> Self {
        Self {
            schema: Arc::clone(schema),
            values: vec![None; schema.fields().len()],
            error: None,
        }
    }

    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }

    /// Set a field. Unknown names and type mismatches surface at `build`.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        let Some(index) = self.schema.position(name) else {
            self.fail(EncodeError::UnknownField {
                record: self.schema.fullname().to_string(),
                field: name.to_string(),
            });
            return self;
        };

        let field = &self.schema.fields()[index];
        match value.coerce_to(&field.schema) {
            Ok(value) => self.values[index] = Some(value),
            Err(value) => {
                let err = EncodeError::TypeMismatch {
                    field: field.name.clone(),
                    expected: field.schema.type_name().to_string(),
                    found: value.kind(),
                };
                self.fail(err);
            }
        }
        self
    }

    /// Owned variant of [`RecordBuilder::set`] for chaining
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Remove a previously set value
    pub fn clear(&mut self, name: &str) -> &mut Self {
        if let Some(index) = self.schema.position(name) {
            self.values[index] = None;
        }
        self
    }

    pub fn has(&self, name: &str) -> bool {
        self.schema
            .position(name)
            .is_some_and(|index| self.values[index].is_some())
    }

    /// Record a failure from outside the builder (e.g. a typed field that
    /// couldn't convert itself to a value). Only the first one is kept.
    pub fn fail(&mut self, err: impl Into<Error>) {
        if self.error.is_none() {
            self.error = Some(err.into());
        }
    }

    /// Finish the record: unset fields take their default, and a required
    /// field without one is an error.
    pub fn build(self) -> Result<Record> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let mut values = self.values;
        for (slot, field) in values.iter_mut().zip(self.schema.fields()) {
            if slot.is_none() {
                match &field.default {
                    Some(default) => *slot = Some(default.clone()),
                    None => return Err(EncodeError::MissingField(field.name.clone()).into()),
                }
            }
        }

        Ok(Record::from_slots(self.schema, values)?)
    }
}
