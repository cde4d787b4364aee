//! Canonical schema text and fingerprints
//!
//! The container header embeds the canonical text, and readers compare schemas
//! by it, so the output must not depend on anything but the schema itself:
//!
//! - primitives are bare strings: `"int"`
//! - record keys in fixed order: `type`, `name`, `namespace`, `doc`, `fields`
//! - field keys in fixed order: `name`, `type`, `default`, `doc`
//! - `namespace` is always written (`""` for none) so a nested record never
//!   silently inherits its parent's namespace on re-parse
//! - a named record is written in full once, then referenced by full name
//! - no insignificant whitespace
//!
//! Strings and numbers go through `serde_json` for escaping and float
//! formatting; the object layout is assembled here so it can't change with
//! `serde_json` feature flags.
//!
//! The pretty form serializes the same layout through `serde` structs, whose
//! field order fixes the key order.

use std::collections::HashSet;
use std::fmt::Write;

use serde::Serialize;
use serde_json::{Map, Value as Json};

use super::{RecordSchema, Schema};
use crate::value::Value;

pub(super) fn to_canonical_text(schema: &Schema) -> String {
    let mut out = String::new();
    write_schema(&mut out, schema, &mut HashSet::new());
    out
}

pub(super) fn record_canonical_text(record: &RecordSchema) -> String {
    let mut out = String::new();
    write_record(&mut out, record, &mut HashSet::new());
    out
}

fn write_schema(out: &mut String, schema: &Schema, written: &mut HashSet<String>) {
    match schema {
        Schema::Record(record) => {
            if written.contains(record.fullname()) {
                write_json_str(out, record.fullname());
            } else {
                write_record(out, record, written);
            }
        }
        primitive => write_json_str(out, primitive.type_name()),
    }
}

fn write_record(out: &mut String, record: &RecordSchema, written: &mut HashSet<String>) {
    written.insert(record.fullname().to_string());

    out.push_str(r#"{"type":"record","name":"#);
    write_json_str(out, record.name().name());
    out.push_str(r#","namespace":"#);
    write_json_str(out, record.name().namespace().unwrap_or(""));
    if let Some(doc) = record.doc() {
        out.push_str(r#","doc":"#);
        write_json_str(out, doc);
    }
    out.push_str(r#","fields":["#);

    for (index, field) in record.fields().iter().enumerate() {
        if index > 0 {
            out.push(',');
        }
        out.push_str(r#"{"name":"#);
        write_json_str(out, &field.name);
        out.push_str(r#","type":"#);
        write_schema(out, &field.schema, written);
        if let Some(default) = &field.default {
            out.push_str(r#","default":"#);
            write_default(out, default);
        }
        if let Some(doc) = &field.doc {
            out.push_str(r#","doc":"#);
            write_json_str(out, doc);
        }
        out.push('}');
    }

    out.push_str("]}");
}

fn write_default(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Int(v) => {
            let _ = write!(out, "{v}");
        }
        Value::Long(v) => {
            let _ = write!(out, "{v}");
        }
        Value::Float(v) => write_json_number(out, f64::from(*v)),
        Value::Double(v) => write_json_number(out, *v),
        Value::String(s) => write_json_str(out, s),
        Value::Bytes(bytes) => {
            let text: String = bytes.iter().map(|&b| char::from(b)).collect();
            write_json_str(out, &text);
        }
        Value::Record(record) => {
            out.push('{');
            for (index, (field, value)) in record.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_json_str(out, &field.name);
                out.push(':');
                match value {
                    Some(value) => write_default(out, value),
                    None => out.push_str("null"),
                }
            }
            out.push('}');
        }
    }
}

fn write_json_str(out: &mut String, s: &str) {
    match serde_json::to_string(s) {
        Ok(quoted) => out.push_str(&quoted),
        Err(_) => out.push_str("\"\""),
    }
}

fn write_json_number(out: &mut String, v: f64) {
    match serde_json::Number::from_f64(v) {
        Some(number) => {
            let _ = write!(out, "{number}");
        }
        // NaN and infinities have no JSON form
        None => out.push_str("null"),
    }
}

pub(super) fn to_pretty_text(schema: &Schema) -> String {
    let json = schema_json(schema, &mut HashSet::new());
    serde_json::to_string_pretty(&json).unwrap_or_else(|_| to_canonical_text(schema))
}

#[derive(Serialize)]
#[serde(untagged)]
enum SchemaJson<'a> {
    Name(&'a str),
    Record(RecordJson<'a>),
}

#[derive(Serialize)]
struct RecordJson<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    name: &'a str,
    namespace: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    doc: Option<&'a str>,
    fields: Vec<FieldJson<'a>>,
}

#[derive(Serialize)]
struct FieldJson<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    schema: SchemaJson<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    doc: Option<&'a str>,
}

fn schema_json<'a>(schema: &'a Schema, written: &mut HashSet<String>) -> SchemaJson<'a> {
    let record = match schema {
        Schema::Record(record) => record,
        primitive => return SchemaJson::Name(primitive.type_name()),
    };
    if !written.insert(record.fullname().to_string()) {
        return SchemaJson::Name(record.fullname());
    }

    let fields = record
        .fields()
        .iter()
        .map(|field| FieldJson {
            name: &field.name,
            schema: schema_json(&field.schema, written),
            default: field.default.as_ref().map(default_json),
            doc: field.doc.as_deref(),
        })
        .collect();

    SchemaJson::Record(RecordJson {
        kind: "record",
        name: record.name().name(),
        namespace: record.name().namespace().unwrap_or(""),
        doc: record.doc(),
        fields,
    })
}

fn default_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Boolean(b) => Json::Bool(*b),
        Value::Int(v) => Json::from(*v),
        Value::Long(v) => Json::from(*v),
        Value::Float(v) => float_json(f64::from(*v)),
        Value::Double(v) => float_json(*v),
        Value::String(s) => Json::String(s.clone()),
        Value::Bytes(bytes) => Json::String(bytes.iter().map(|&b| char::from(b)).collect()),
        Value::Record(record) => {
            let mut object = Map::new();
            for (field, value) in record.iter() {
                object.insert(field.name.clone(), value.map_or(Json::Null, default_json));
            }
            Json::Object(object)
        }
    }
}

fn float_json(v: f64) -> Json {
    serde_json::Number::from_f64(v).map_or(Json::Null, Json::Number)
}

/// CRC-64-AVRO (Rabin) fingerprint
pub(super) fn fingerprint64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FINGERPRINT_EMPTY, |fp, &b| {
        (fp >> 8) ^ FINGERPRINT_TABLE[((fp ^ u64::from(b)) & 0xFF) as usize]
    })
}

const FINGERPRINT_EMPTY: u64 = 0xc15d_213a_a4d7_a795;

const FINGERPRINT_TABLE: [u64; 256] = build_fingerprint_table();

const fn build_fingerprint_table() -> [u64; 256] {
    let mut table = [0u64; 256];
    let mut i = 0;
    while i < 256 {
        let mut fp = i as u64;
        let mut j = 0;
        while j < 8 {
            fp = (fp >> 1) ^ (FINGERPRINT_EMPTY & (0u64.wrapping_sub(fp & 1)));
            j += 1;
        }
        table[i] = fp;
        i += 1;
    }
    table
}
