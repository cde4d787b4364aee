//! Schema Model
//!
//! A schema describes the shape of every record in a file: a named record with
//! an ordered list of fields, each with a type, an optional default and an
//! optional doc string.
//!
//! ## Supported Types
//!
//! | Type      | Rust value            | Encoding                              |
//! |-----------|-----------------------|---------------------------------------|
//! | `null`    | `Value::Null`         | nothing                               |
//! | `boolean` | `Value::Boolean`      | 1 byte                                |
//! | `int`     | `Value::Int` (i32)    | zig-zag varint                        |
//! | `long`    | `Value::Long` (i64)   | zig-zag varint                        |
//! | `float`   | `Value::Float` (f32)  | 4 bytes little-endian                 |
//! | `double`  | `Value::Double` (f64) | 8 bytes little-endian                 |
//! | `bytes`   | `Value::Bytes`        | varint length + raw bytes             |
//! | `string`  | `Value::String`       | varint length + UTF-8 bytes           |
//! | `record`  | `Value::Record`       | fields back to back, declaration order|
//!
//! ## Invariants
//! - Field names are unique within a record and follow `[A-Za-z_][A-Za-z0-9_]*`
//! - Field order is significant: the encoding is positional, never tagged
//! - A named record is defined once; later uses refer to it by name
//! - Every default value conforms to its field's type
//!
//! `RecordSchema::new` enforces all of these, so schemas parsed from JSON and
//! schemas derived from Rust types go through the same checks.
//!
//! ## Equality
//! Two schemas are the same schema when their canonical text is identical (see
//! [`Schema::canonical_text`]). Structural `PartialEq` agrees with that.

mod canonical;
mod parser;
pub(crate) mod resolve;

pub use resolve::ResolvedRecord;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::error::SchemaError;
use crate::value::Value;

/// A type in the schema tree
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Bytes,
    String,
    Record(Arc<RecordSchema>),
}

impl Schema {
    /// Parse schema text (JSON). Primitive schemas are accepted as well as records.
    pub fn parse(text: &str) -> Result<Schema, SchemaError> {
        parser::parse(text)
    }

    /// Parse schema text and require a record at the top level.
    pub fn parse_record(text: &str) -> Result<Arc<RecordSchema>, SchemaError> {
        match parser::parse(text)? {
            Schema::Record(record) => Ok(record),
            other => Err(SchemaError::NotARecord(other.type_name().to_string())),
        }
    }

    /// Deterministic JSON text for this schema.
    ///
    /// Structurally equal schemas always produce byte-identical text, and
    /// `Schema::parse(&s.canonical_text())` returns a schema equal to `s`.
    pub fn canonical_text(&self) -> String {
        canonical::to_canonical_text(self)
    }

    /// Indented JSON for people to read or save as an `.avsc` file. Same
    /// keys in the same order as the canonical text, so it parses back to an
    /// equal schema.
    pub fn pretty_text(&self) -> String {
        canonical::to_pretty_text(self)
    }

    /// CRC-64-AVRO fingerprint of the canonical text
    pub fn fingerprint(&self) -> u64 {
        canonical::fingerprint64(self.canonical_text().as_bytes())
    }

    /// Type name as written in schema text; records report their full name.
    pub fn type_name(&self) -> &str {
        match self {
            Schema::Null => "null",
            Schema::Boolean => "boolean",
            Schema::Int => "int",
            Schema::Long => "long",
            Schema::Float => "float",
            Schema::Double => "double",
            Schema::Bytes => "bytes",
            Schema::String => "string",
            Schema::Record(record) => record.name.fullname(),
        }
    }

    /// Same primitive type, or records with the same full name.
    pub fn same_kind(&self, other: &Schema) -> bool {
        match (self, other) {
            (Schema::Record(a), Schema::Record(b)) => a.name == b.name,
            (a, b) => std::mem::discriminant(a) == std::mem::discriminant(b),
        }
    }

    pub(crate) fn from_primitive_name(name: &str) -> Option<Schema> {
        let schema = match name {
            "null" => Schema::Null,
            "boolean" => Schema::Boolean,
            "int" => Schema::Int,
            "long" => Schema::Long,
            "float" => Schema::Float,
            "double" => Schema::Double,
            "bytes" => Schema::Bytes,
            "string" => Schema::String,
            _ => return None,
        };
        Some(schema)
    }
}

impl From<Arc<RecordSchema>> for Schema {
    fn from(record: Arc<RecordSchema>) -> Self {
        Schema::Record(record)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_text())
    }
}

/// A possibly namespaced name, e.g. `com.example.Customer`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name {
    name: String,
    namespace: Option<String>,
    fullname: String,
}

impl Name {
    /// Build a name. A dotted `name` carries its own namespace and overrides
    /// `namespace`; an empty namespace means "no namespace".
    pub fn new(name: &str, namespace: Option<&str>) -> Result<Self, SchemaError> {
        let (name, namespace) = match name.rsplit_once('.') {
            Some((ns, short)) => (short, Some(ns)),
            None => (name, namespace.filter(|ns| !ns.is_empty())),
        };

        validate_identifier(name)?;
        if let Some(ns) = namespace {
            if ns.split('.').any(|part| validate_identifier(part).is_err()) {
                return Err(SchemaError::InvalidName(ns.to_string()));
            }
        }

        let fullname = match namespace {
            Some(ns) => format!("{ns}.{name}"),
            None => name.to_string(),
        };

        Ok(Self {
            name: name.to_string(),
            namespace: namespace.map(str::to_string),
            fullname,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn fullname(&self) -> &str {
        &self.fullname
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fullname)
    }
}

/// A single field of a record
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub schema: Schema,
    pub default: Option<Value>,
    pub doc: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>, schema: impl Into<Schema>) -> Self {
        Self {
            name: name.into(),
            schema: schema.into(),
            default: None,
            doc: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }
}

/// A named record type with ordered fields
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    name: Name,
    doc: Option<String>,
    fields: Vec<Field>,
    positions: HashMap<String, usize>,
}

impl RecordSchema {
    /// Build and validate a record schema.
    ///
    /// Fails on invalid or duplicate field names and on defaults that don't
    /// conform to their field's type. Defaults are normalized to the field's
    /// exact type (an `Int` default on a `long` field becomes a `Long`).
    pub fn new(name: Name, doc: Option<String>, fields: Vec<Field>) -> Result<Self, SchemaError> {
        let mut positions = HashMap::with_capacity(fields.len());
        let mut checked = Vec::with_capacity(fields.len());

        for (index, mut field) in fields.into_iter().enumerate() {
            validate_identifier(&field.name)?;
            if positions.insert(field.name.clone(), index).is_some() {
                return Err(SchemaError::DuplicateField {
                    record: name.fullname().to_string(),
                    field: field.name,
                });
            }

            if let Some(default) = field.default.take() {
                let default = default.coerce_to(&field.schema).map_err(|value| {
                    SchemaError::InvalidDefault {
                        field: field.name.clone(),
                        reason: format!(
                            "{} value does not match type {}",
                            value.kind(),
                            field.schema.type_name()
                        ),
                    }
                })?;
                field.default = Some(default);
            }

            checked.push(field);
        }

        check_unqualified_references(&checked, name.namespace(), &mut HashSet::new())?;

        Ok(Self {
            name,
            doc,
            fields: checked,
            positions,
        })
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn fullname(&self) -> &str {
        self.name.fullname()
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.position(name).map(|index| &self.fields[index])
    }

    /// Position of a field in declaration order
    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn canonical_text(&self) -> String {
        canonical::record_canonical_text(self)
    }
}

/// True when both handles point at the same schema, by identity or structure.
pub fn same_record(a: &Arc<RecordSchema>, b: &Arc<RecordSchema>) -> bool {
    Arc::ptr_eq(a, b) || a == b
}

// A record without a namespace, used a second time inside namespace `ns`, is
// written by its bare name. If `ns.<name>` is defined by then, parsing binds
// that bare name to the namespaced record instead. Named types are registered
// after their fields, the same order the parser registers them in.
fn check_unqualified_references(
    fields: &[Field],
    namespace: Option<&str>,
    defined: &mut HashSet<String>,
) -> Result<(), SchemaError> {
    for field in fields {
        let Schema::Record(record) = &field.schema else {
            continue;
        };

        if !defined.contains(record.fullname()) {
            check_unqualified_references(record.fields(), record.name().namespace(), defined)?;
            defined.insert(record.fullname().to_string());
            continue;
        }

        if let (None, Some(ns)) = (record.name().namespace(), namespace) {
            if defined.contains(&format!("{ns}.{}", record.name().name())) {
                return Err(SchemaError::AmbiguousReference {
                    name: record.name().name().to_string(),
                    namespace: ns.to_string(),
                });
            }
        }
    }
    Ok(())
}

fn validate_identifier(name: &str) -> Result<(), SchemaError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(SchemaError::InvalidName(name.to_string()))
    }
}
