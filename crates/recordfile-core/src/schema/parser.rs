//! JSON schema text → `Schema`
//!
//! Accepted forms:
//! - a bare type name: `"string"`, or the name of a record defined earlier
//! - an object with a `type` key: `{"type": "int"}`, `{"type": "record", ...}`
//!
//! Records take `name` (required), `namespace`, `doc` and `fields` (required).
//! Fields take `name` and `type` (required), `default` and `doc`. Other keys are
//! ignored. Nested records inherit the enclosing namespace unless they name
//! their own.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value as Json};

use super::{Field, Name, RecordSchema, Schema};
use crate::error::SchemaError;
use crate::value::{Record, Value};

pub(super) fn parse(text: &str) -> Result<Schema, SchemaError> {
    let json: Json = serde_json::from_str(text).map_err(|e| SchemaError::Json(e.to_string()))?;
    Parser::default().parse_schema(&json, None)
}

#[derive(Default)]
struct Parser {
    /// Named records defined so far, by full name
    named: HashMap<String, Arc<RecordSchema>>,
}

impl Parser {
    fn parse_schema(&mut self, json: &Json, namespace: Option<&str>) -> Result<Schema, SchemaError> {
        match json {
            Json::String(name) => self.resolve_name(name, namespace),
            Json::Object(object) => self.parse_object(object, namespace),
            Json::Array(_) => Err(SchemaError::UnknownType("union".to_string())),
            other => Err(SchemaError::Json(format!("expected a type, found {other}"))),
        }
    }

    fn resolve_name(&self, name: &str, namespace: Option<&str>) -> Result<Schema, SchemaError> {
        if let Some(primitive) = Schema::from_primitive_name(name) {
            return Ok(primitive);
        }

        // Unqualified references try the enclosing namespace first
        if !name.contains('.') {
            if let Some(ns) = namespace {
                if let Some(record) = self.named.get(&format!("{ns}.{name}")) {
                    return Ok(Schema::Record(Arc::clone(record)));
                }
            }
        }

        self.named
            .get(name)
            .map(|record| Schema::Record(Arc::clone(record)))
            .ok_or_else(|| SchemaError::UnknownType(name.to_string()))
    }

    fn parse_object(
        &mut self,
        object: &Map<String, Json>,
        namespace: Option<&str>,
    ) -> Result<Schema, SchemaError> {
        let type_json = object.get("type").ok_or_else(|| SchemaError::MissingKey {
            key: "type",
            context: "schema object".to_string(),
        })?;

        match type_json {
            Json::String(type_name) if type_name == "record" => self.parse_record(object, namespace),
            Json::String(type_name) => match Schema::from_primitive_name(type_name) {
                Some(primitive) => Ok(primitive),
                None => self.resolve_name(type_name, namespace),
            },
            nested => self.parse_schema(nested, namespace),
        }
    }

    fn parse_record(
        &mut self,
        object: &Map<String, Json>,
        namespace: Option<&str>,
    ) -> Result<Schema, SchemaError> {
        let short_name = required_str(object, "name", "record")?;
        let explicit_ns = optional_str(object, "namespace")?;
        let name = Name::new(short_name, explicit_ns.or(namespace))?;

        let doc = optional_str(object, "doc")?.map(str::to_string);
        let fields_json = object
            .get("fields")
            .and_then(Json::as_array)
            .ok_or_else(|| SchemaError::MissingKey {
                key: "fields",
                context: format!("record {}", name.fullname()),
            })?;

        let mut fields = Vec::with_capacity(fields_json.len());
        for field_json in fields_json {
            let field_object = field_json.as_object().ok_or_else(|| {
                SchemaError::Json(format!("field of {} must be an object", name.fullname()))
            })?;
            fields.push(self.parse_field(field_object, &name)?);
        }

        // Checked after the fields so a nested definition of the same name is caught too
        if self.named.contains_key(name.fullname()) {
            return Err(SchemaError::Redefined(name.fullname().to_string()));
        }

        let record = Arc::new(RecordSchema::new(name, doc, fields)?);
        self.named
            .insert(record.fullname().to_string(), Arc::clone(&record));
        Ok(Schema::Record(record))
    }

    fn parse_field(&mut self, object: &Map<String, Json>, record: &Name) -> Result<Field, SchemaError> {
        let context = format!("field of {}", record.fullname());
        let name = required_str(object, "name", &context)?;
        let type_json = object.get("type").ok_or_else(|| SchemaError::MissingKey {
            key: "type",
            context: format!("field {name}"),
        })?;

        let schema = self.parse_schema(type_json, record.namespace())?;
        let default = match object.get("default") {
            Some(json) => Some(json_to_value(json, &schema).map_err(|reason| {
                SchemaError::InvalidDefault {
                    field: name.to_string(),
                    reason,
                }
            })?),
            None => None,
        };
        let doc = optional_str(object, "doc")?.map(str::to_string);

        Ok(Field {
            name: name.to_string(),
            schema,
            default,
            doc,
        })
    }
}

fn required_str<'a>(object: &'a Map<String, Json>, key: &'static str, context: &str) -> Result<&'a str, SchemaError> {
    match object.get(key) {
        Some(Json::String(value)) => Ok(value),
        Some(other) => Err(SchemaError::Json(format!("{key} must be a string, found {other}"))),
        None => Err(SchemaError::MissingKey {
            key,
            context: context.to_string(),
        }),
    }
}

fn optional_str<'a>(object: &'a Map<String, Json>, key: &'static str) -> Result<Option<&'a str>, SchemaError> {
    match object.get(key) {
        Some(Json::String(value)) => Ok(Some(value)),
        Some(Json::Null) | None => Ok(None),
        Some(other) => Err(SchemaError::Json(format!("{key} must be a string, found {other}"))),
    }
}

/// Convert a JSON default into a value of the given type.
pub(super) fn json_to_value(json: &Json, schema: &Schema) -> Result<Value, String> {
    let mismatch = || format!("{json} is not a valid {}", schema.type_name());

    match schema {
        Schema::Null => json.is_null().then_some(Value::Null).ok_or_else(mismatch),
        Schema::Boolean => json.as_bool().map(Value::Boolean).ok_or_else(mismatch),
        Schema::Int => json
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .map(Value::Int)
            .ok_or_else(mismatch),
        Schema::Long => json.as_i64().map(Value::Long).ok_or_else(mismatch),
        Schema::Float => json.as_f64().map(|v| Value::Float(v as f32)).ok_or_else(mismatch),
        Schema::Double => json.as_f64().map(Value::Double).ok_or_else(mismatch),
        Schema::String => json
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(mismatch),
        // Bytes defaults are strings of code points 0-255, one per byte
        Schema::Bytes => {
            let text = json.as_str().ok_or_else(mismatch)?;
            text.chars()
                .map(|c| u8::try_from(u32::from(c)).map_err(|_| mismatch()))
                .collect::<Result<Vec<u8>, String>>()
                .map(Value::Bytes)
        }
        Schema::Record(record) => {
            let object = json.as_object().ok_or_else(mismatch)?;
            let mut values = Vec::with_capacity(record.fields().len());
            for field in record.fields() {
                let value = match (object.get(&field.name), &field.default) {
                    (Some(field_json), _) => json_to_value(field_json, &field.schema)
                        .map_err(|reason| format!("{}: {reason}", field.name))?,
                    (None, Some(default)) => default.clone(),
                    (None, None) => return Err(format!("missing value for {}", field.name)),
                };
                values.push(value);
            }
            Record::from_values(Arc::clone(record), values)
                .map(Value::Record)
                .map_err(|e| e.to_string())
        }
    }
}
