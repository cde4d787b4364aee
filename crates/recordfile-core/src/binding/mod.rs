//! Record Bindings
//!
//! Three ways to turn application data into records, all converging on the
//! same canonical [`Record`] before they reach the codec:
//!
//! ```text
//!  RecordBuilder / Record ──┐   (dynamic: field-name map, checked at build)
//!  static_record! struct  ──┼──► Record ──► codec ──► bytes
//!  describable! struct    ──┘   (introspected: schema derived from the type)
//! ```
//!
//! The codec never learns which binding produced a record. A binding only
//! implements [`RecordSource`]: conversion to a record under a target schema,
//! and construction from a decoded record.
//!
//! ## Field Types
//! Typed bindings map Rust field types onto schema types through
//! [`FieldType`]:
//!
//! | Rust      | Schema    |
//! |-----------|-----------|
//! | `()`      | `null`    |
//! | `bool`    | `boolean` |
//! | `i32`     | `int`     |
//! | `i64`     | `long`    |
//! | `f32`     | `float`   |
//! | `f64`     | `double`  |
//! | `Vec<u8>` | `bytes`   |
//! | `String`  | `string`  |
//! | a static or describable struct | its record schema |

pub mod generic;
pub mod reflect;
pub mod specific;

use std::sync::Arc;

use crate::error::{Error, Result, SchemaError};
use crate::schema::{RecordSchema, Schema};
use crate::value::{Record, Value};

pub use generic::{GenericRecord, RecordBuilder};
pub use reflect::Describable;
pub use specific::StaticRecord;

/// Which binding strategy a type uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Binding {
    /// Field-name map checked against the schema at build time
    Dynamic,
    /// Struct generated against an embedded schema text
    Static,
    /// Schema derived from the struct's declared fields
    Introspected,
}

/// Anything that can be written to and read from a data file.
pub trait RecordSource: Sized {
    const BINDING: Binding;

    /// Convert to a record conforming to `schema`.
    fn to_record(&self, schema: &Arc<RecordSchema>) -> Result<Record>;

    /// Build from a decoded record.
    fn from_record(record: Record) -> Result<Self>;
}

/// A Rust type usable as a field of a typed record
pub trait FieldType: Sized {
    fn field_schema() -> std::result::Result<Schema, SchemaError>;
    fn to_value(&self) -> Result<Value>;
    fn from_value(value: Value) -> Result<Self>;
}

impl RecordSource for Record {
    const BINDING: Binding = Binding::Dynamic;

    fn to_record(&self, schema: &Arc<RecordSchema>) -> Result<Record> {
        Ok(self.clone().project_strict(schema)?)
    }

    fn from_record(record: Record) -> Result<Self> {
        Ok(record)
    }
}

macro_rules! impl_field_type {
    ($ty:ty, $variant:ident, $schema:expr) => {
        impl FieldType for $ty {
            fn field_schema() -> std::result::Result<Schema, SchemaError> {
                Ok($schema)
            }

            fn to_value(&self) -> Result<Value> {
                Ok(Value::$variant(self.clone()))
            }

            fn from_value(value: Value) -> Result<Self> {
                match value.coerce_to(&$schema) {
                    Ok(Value::$variant(v)) => Ok(v),
                    Ok(other) | Err(other) => Err(mismatch($schema.type_name(), &other)),
                }
            }
        }
    };
}

impl_field_type!(bool, Boolean, Schema::Boolean);
impl_field_type!(i32, Int, Schema::Int);
impl_field_type!(i64, Long, Schema::Long);
impl_field_type!(f32, Float, Schema::Float);
impl_field_type!(f64, Double, Schema::Double);
impl_field_type!(String, String, Schema::String);
impl_field_type!(Vec<u8>, Bytes, Schema::Bytes);

impl FieldType for () {
    fn field_schema() -> std::result::Result<Schema, SchemaError> {
        Ok(Schema::Null)
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::Null)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(()),
            other => Err(mismatch("null", &other)),
        }
    }
}

fn mismatch(expected: &str, found: &Value) -> Error {
    Error::Binding(format!("expected {expected}, found {}", found.kind()))
}

/// Schema field name for a Rust field identifier (`r#type` -> `type`)
#[doc(hidden)]
pub fn field_name(ident: &'static str) -> &'static str {
    ident.strip_prefix("r#").unwrap_or(ident)
}

/// Hands out a record's values in declaration order to typed constructors.
#[doc(hidden)]
pub struct FieldCursor {
    record: String,
    values: std::vec::IntoIter<Option<Value>>,
}

impl FieldCursor {
    pub fn new(record: Record) -> Self {
        Self {
            record: record.schema().fullname().to_string(),
            values: record.into_slots().into_iter(),
        }
    }

    pub fn take<T: FieldType>(&mut self, ident: &'static str) -> Result<T> {
        let name = field_name(ident);
        match self.values.next() {
            Some(Some(value)) => T::from_value(value).map_err(|e| match e {
                Error::Binding(msg) => Error::Binding(format!("field {name:?} of {}: {msg}", self.record)),
                other => other,
            }),
            Some(None) => Err(Error::Binding(format!(
                "field {name:?} of {} is absent",
                self.record
            ))),
            None => Err(Error::Binding(format!(
                "record {} has no value for field {name:?}",
                self.record
            ))),
        }
    }
}

/// Shared `RecordSource` and `FieldType` impls for typed bindings.
///
/// `$schema` must evaluate to `Result<&'static Arc<RecordSchema>, SchemaError>`.
#[doc(hidden)]
#[macro_export]
macro_rules! __record_binding {
    ($name:ident, $schema:expr, $binding:expr, { $($field:ident : $ty:ty),* $(,)? }) => {
        impl $crate::binding::RecordSource for $name {
            const BINDING: $crate::binding::Binding = $binding;

            fn to_record(
                &self,
                schema: &::std::sync::Arc<$crate::schema::RecordSchema>,
            ) -> $crate::Result<$crate::value::Record> {
                let own = $schema?;
                let record = $crate::value::Record::from_slots(
                    ::std::sync::Arc::clone(own),
                    vec![$(Some($crate::binding::FieldType::to_value(&self.$field)?)),*],
                )?;
                Ok(record.project_strict(schema)?)
            }

            fn from_record(record: $crate::value::Record) -> $crate::Result<Self> {
                let own = $schema?;
                let mut cursor = $crate::binding::FieldCursor::new(record.project(own)?);
                Ok(Self {
                    $($field: cursor.take::<$ty>(stringify!($field))?),*
                })
            }
        }

        impl $crate::binding::FieldType for $name {
            fn field_schema() -> ::std::result::Result<$crate::schema::Schema, $crate::SchemaError> {
                Ok($crate::schema::Schema::Record(::std::sync::Arc::clone($schema?)))
            }

            fn to_value(&self) -> $crate::Result<$crate::value::Value> {
                let own = $schema?;
                $crate::binding::RecordSource::to_record(self, own).map($crate::value::Value::Record)
            }

            fn from_value(value: $crate::value::Value) -> $crate::Result<Self> {
                match value {
                    $crate::value::Value::Record(record) => {
                        <Self as $crate::binding::RecordSource>::from_record(record)
                    }
                    other => Err($crate::Error::Binding(format!(
                        "expected record {}, found {}",
                        stringify!($name),
                        other.kind()
                    ))),
                }
            }
        }
    };
}
