//! Value Model
//!
//! `Value` is the abstract value every binding converts to and from, and the
//! only thing the codec ever sees. A `Record` is the canonical record value:
//! one slot per schema field, in declaration order.
//!
//! ## Present, Absent, No Such Field
//! Field lookup distinguishes three outcomes:
//! - `FieldValue::Present(&Value)`: the record carries a value
//! - `FieldValue::Absent`: the schema declares the field but this record has
//!   no value for it (e.g. a reader-only field without a default)
//! - `FieldValue::NoSuchField`: the schema doesn't declare the name at all
//!
//! None of these is an error. `Absent` is never confused with a zero-like
//! value: `false`, `0` and `""` are all `Present`.

use std::fmt;
use std::sync::Arc;

use crate::error::EncodeError;
use crate::schema::{same_record, RecordSchema, Schema};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Bytes(Vec<u8>),
    String(String),
    Record(Record),
}

impl Value {
    /// Short name of the value's type, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Bytes(_) => "bytes",
            Value::String(_) => "string",
            Value::Record(_) => "record",
        }
    }

    /// Convert this value to the exact type `schema` declares.
    ///
    /// Applies the standard promotions (int → long/float/double, long →
    /// float/double, float → double, string ↔ bytes) and projects records onto
    /// the target record schema by field name. Returns the value unchanged in
    /// `Err` when no conversion exists.
    pub fn coerce_to(self, schema: &Schema) -> Result<Value, Value> {
        match (self, schema) {
            (v @ Value::Null, Schema::Null)
            | (v @ Value::Boolean(_), Schema::Boolean)
            | (v @ Value::Int(_), Schema::Int)
            | (v @ Value::Long(_), Schema::Long)
            | (v @ Value::Float(_), Schema::Float)
            | (v @ Value::Double(_), Schema::Double)
            | (v @ Value::Bytes(_), Schema::Bytes)
            | (v @ Value::String(_), Schema::String) => Ok(v),

            (Value::Int(i), Schema::Long) => Ok(Value::Long(i64::from(i))),
            (Value::Int(i), Schema::Float) => Ok(Value::Float(i as f32)),
            (Value::Int(i), Schema::Double) => Ok(Value::Double(f64::from(i))),
            (Value::Long(l), Schema::Float) => Ok(Value::Float(l as f32)),
            (Value::Long(l), Schema::Double) => Ok(Value::Double(l as f64)),
            (Value::Float(f), Schema::Double) => Ok(Value::Double(f64::from(f))),
            (Value::String(s), Schema::Bytes) => Ok(Value::Bytes(s.into_bytes())),
            (Value::Bytes(b), Schema::String) => match String::from_utf8(b) {
                Ok(s) => Ok(Value::String(s)),
                Err(e) => Err(Value::Bytes(e.into_bytes())),
            },

            (Value::Record(record), Schema::Record(target)) => {
                if same_record(record.schema(), target) {
                    return Ok(Value::Record(record));
                }
                if record.schema().name() != target.name() {
                    return Err(Value::Record(record));
                }
                let original = record.clone();
                record.project(target).map(Value::Record).map_err(|_| Value::Record(original))
            }

            (other, _) => Err(other),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(i64::from(*i)),
            Value::Long(l) => Some(*l),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(f64::from(*f)),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Value::Record(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Long(l) => write!(f, "{l}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => {
                f.write_str("\"")?;
                for byte in b {
                    write!(f, "\\u00{byte:02X}")?;
                }
                f.write_str("\"")
            }
            Value::Record(r) => write!(f, "{r}"),
        }
    }
}

/// Result of looking up a field by name
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Present(&'a Value),
    Absent,
    NoSuchField,
}

impl<'a> FieldValue<'a> {
    pub fn value(self) -> Option<&'a Value> {
        match self {
            FieldValue::Present(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, FieldValue::Present(_))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }

    pub fn is_no_such_field(&self) -> bool {
        matches!(self, FieldValue::NoSuchField)
    }
}

/// A record value conforming to a record schema
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    schema: Arc<RecordSchema>,
    values: Vec<Option<Value>>,
}

impl Record {
    /// An empty record: every field absent
    pub fn new(schema: Arc<RecordSchema>) -> Self {
        let values = vec![None; schema.fields().len()];
        Self { schema, values }
    }

    /// A record with a value for every field, in declaration order
    pub fn from_values(schema: Arc<RecordSchema>, values: Vec<Value>) -> Result<Self, EncodeError> {
        Self::from_slots(schema, values.into_iter().map(Some).collect())
    }

    /// A record from per-field slots, `None` marking an absent field.
    ///
    /// Present values are coerced to their field's type.
    pub fn from_slots(schema: Arc<RecordSchema>, slots: Vec<Option<Value>>) -> Result<Self, EncodeError> {
        if slots.len() != schema.fields().len() {
            return Err(EncodeError::Arity {
                record: schema.fullname().to_string(),
                expected: schema.fields().len(),
                found: slots.len(),
            });
        }

        let values = schema
            .fields()
            .iter()
            .zip(slots)
            .map(|(field, slot)| slot.map(|value| coerce_field(value, &field.schema, &field.name)).transpose())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { schema, values })
    }

    /// Decoder-built records are already typed correctly
    pub(crate) fn from_decoded(schema: Arc<RecordSchema>, values: Vec<Option<Value>>) -> Self {
        Self { schema, values }
    }

    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }

    /// Look up a field by name. Never fails: unknown names are `NoSuchField`.
    pub fn get(&self, name: &str) -> FieldValue<'_> {
        match self.schema.position(name) {
            Some(index) => match &self.values[index] {
                Some(value) => FieldValue::Present(value),
                None => FieldValue::Absent,
            },
            None => FieldValue::NoSuchField,
        }
    }

    /// Value at a field position, `None` when absent or out of range
    pub fn get_at(&self, index: usize) -> Option<&Value> {
        self.values.get(index).and_then(Option::as_ref)
    }

    /// Set a field, coercing the value to the field's type.
    pub fn put(&mut self, name: &str, value: impl Into<Value>) -> Result<(), EncodeError> {
        let index = self
            .schema
            .position(name)
            .ok_or_else(|| EncodeError::UnknownField {
                record: self.schema.fullname().to_string(),
                field: name.to_string(),
            })?;
        let field = &self.schema.fields()[index];
        self.values[index] = Some(coerce_field(value.into(), &field.schema, &field.name)?);
        Ok(())
    }

    /// Mark a field absent
    pub fn clear(&mut self, name: &str) -> bool {
        match self.schema.position(name) {
            Some(index) => self.values[index].take().is_some(),
            None => false,
        }
    }

    /// Fields paired with their values, in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&crate::schema::Field, Option<&Value>)> {
        self.schema
            .fields()
            .iter()
            .zip(self.values.iter().map(Option::as_ref))
    }

    pub fn slots(&self) -> &[Option<Value>] {
        &self.values
    }

    pub fn into_slots(self) -> Vec<Option<Value>> {
        self.values
    }

    /// Re-express this record under another schema of the same name.
    ///
    /// Fields are matched by name and coerced; target fields missing here
    /// take their default or stay absent; fields the target doesn't declare
    /// are dropped. Names are compared without their namespace, so a reader
    /// schema may move a record to another namespace.
    pub fn project(self, target: &Arc<RecordSchema>) -> Result<Record, EncodeError> {
        if same_record(&self.schema, target) {
            return Ok(self);
        }
        self.check_name(target)?;

        let source = Arc::clone(&self.schema);
        let mut values: Vec<Option<Value>> = self.values.into_iter().collect();

        let mut projected = Vec::with_capacity(target.fields().len());
        for field in target.fields() {
            let value = match source.position(&field.name).and_then(|i| values[i].take()) {
                Some(value) => Some(coerce_field(value, &field.schema, &field.name)?),
                None => field.default.clone(),
            };
            projected.push(value);
        }

        Ok(Record {
            schema: Arc::clone(target),
            values: projected,
        })
    }

    /// Like [`Record::project`], but a present value for a field the target
    /// doesn't declare is an error instead of being dropped.
    pub fn project_strict(self, target: &Arc<RecordSchema>) -> Result<Record, EncodeError> {
        if !same_record(&self.schema, target) {
            self.check_name(target)?;
            if let Some((field, _)) = self
                .iter()
                .find(|(field, value)| value.is_some() && target.position(&field.name).is_none())
            {
                return Err(EncodeError::UnknownField {
                    record: target.fullname().to_string(),
                    field: field.name.clone(),
                });
            }
        }
        self.project(target)
    }

    fn check_name(&self, target: &RecordSchema) -> Result<(), EncodeError> {
        if self.schema.name().name() != target.name().name() {
            return Err(EncodeError::RecordName {
                expected: target.fullname().to_string(),
                found: self.schema.fullname().to_string(),
            });
        }
        Ok(())
    }
}

fn coerce_field(value: Value, schema: &Schema, name: &str) -> Result<Value, EncodeError> {
    value.coerce_to(schema).map_err(|value| EncodeError::TypeMismatch {
        field: name.to_string(),
        expected: schema.type_name().to_string(),
        found: value.kind(),
    })
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (index, (field, value)) in self.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{:?}: ", field.name)?;
            match value {
                Some(value) => write!(f, "{value}")?,
                None => f.write_str("null")?,
            }
        }
        f.write_str("}")
    }
}
