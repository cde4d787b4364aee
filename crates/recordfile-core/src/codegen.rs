//! Rust source generation for static record bindings.
//!
//! Renders a [`static_record!`](crate::static_record) invocation for a record
//! schema and every record nested in it, dependencies first:
//!
//! ```text
//! const ADDRESS_SCHEMA: &str = r#"{...canonical text...}"#;
//!
//! recordfile_core::static_record! {
//!     #[derive(Debug, Clone, PartialEq)]
//!     pub struct Address: ADDRESS_SCHEMA, builder = AddressBuilder {
//!         pub street: String,
//!     }
//! }
//! ```
//!
//! The embedded text is the canonical text of each record, so the generated
//! struct checks against exactly the schema it was generated from.

use std::collections::HashMap;
use std::fmt::Write;

use crate::error::SchemaError;
use crate::schema::{RecordSchema, Schema};

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "dyn", "else", "enum", "extern", "false",
    "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub", "ref",
    "return", "static", "struct", "trait", "true", "type", "unsafe", "use", "where", "while",
    "abstract", "become", "box", "do", "final", "macro", "override", "priv", "try", "typeof",
    "unsized", "virtual", "yield",
];

/// Identifiers that can't be written even as raw identifiers
const RESERVED: &[&str] = &["self", "Self", "super", "crate", "_"];

/// Field names whose builder setter would collide with the builder's own methods
const BUILDER_METHODS: &[&str] = &["build"];

/// Generate Rust source declaring static bindings for `schema`.
pub fn generate_static_record(schema: &RecordSchema) -> Result<String, SchemaError> {
    let mut ordered = Vec::new();
    collect_records(schema, &mut HashMap::new(), &mut ordered)?;

    let mut out = String::new();
    for (index, record) in ordered.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        write_record(&mut out, record)?;
    }
    Ok(out)
}

// Post-order walk so nested records are declared before their users.
fn collect_records<'a>(
    record: &'a RecordSchema,
    seen: &mut HashMap<&'a str, &'a str>,
    ordered: &mut Vec<&'a RecordSchema>,
) -> Result<(), SchemaError> {
    match seen.get(record.name().name()) {
        Some(fullname) if *fullname == record.fullname() => return Ok(()),
        // Two records with the same short name would become the same struct
        Some(_) => return Err(SchemaError::Redefined(record.name().name().to_string())),
        None => {
            seen.insert(record.name().name(), record.fullname());
        }
    }

    for field in record.fields() {
        if let Schema::Record(nested) = &field.schema {
            collect_records(nested, seen, ordered)?;
        }
    }
    ordered.push(record);
    Ok(())
}

fn write_record(out: &mut String, record: &RecordSchema) -> Result<(), SchemaError> {
    let name = record.name().name();
    let constant = format!("{}_SCHEMA", screaming_snake(name));
    let text = record.canonical_text();
    let hashes = "#".repeat(raw_string_hashes(&text));

    let _ = writeln!(out, "const {constant}: &str = r{hashes}\"{text}\"{hashes};");
    out.push('\n');
    out.push_str("recordfile_core::static_record! {\n");
    if let Some(doc) = record.doc() {
        write_doc(out, doc, "    ");
    }
    out.push_str("    #[derive(Debug, Clone, PartialEq)]\n");
    let _ = writeln!(out, "    pub struct {name}: {constant}, builder = {name}Builder {{");

    for field in record.fields() {
        if let Some(doc) = &field.doc {
            write_doc(out, doc, "        ");
        }
        let _ = writeln!(
            out,
            "        pub {}: {},",
            rust_ident(&field.name)?,
            rust_type(&field.schema)
        );
    }

    out.push_str("    }\n}\n");
    Ok(())
}

fn write_doc(out: &mut String, doc: &str, indent: &str) {
    for line in doc.lines() {
        let _ = writeln!(out, "{indent}/// {line}");
    }
}

fn rust_type(schema: &Schema) -> &str {
    match schema {
        Schema::Null => "()",
        Schema::Boolean => "bool",
        Schema::Int => "i32",
        Schema::Long => "i64",
        Schema::Float => "f32",
        Schema::Double => "f64",
        Schema::Bytes => "Vec<u8>",
        Schema::String => "String",
        Schema::Record(record) => record.name().name(),
    }
}

fn rust_ident(name: &str) -> Result<String, SchemaError> {
    if RESERVED.contains(&name) || BUILDER_METHODS.contains(&name) {
        return Err(SchemaError::InvalidName(name.to_string()));
    }
    if KEYWORDS.contains(&name) {
        Ok(format!("r#{name}"))
    } else {
        Ok(name.to_string())
    }
}

fn screaming_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_ascii_uppercase() && prev_lower {
            out.push('_');
        }
        prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        out.push(c.to_ascii_uppercase());
    }
    out
}

/// Fewest `#`s that keep `text` from terminating a raw string early
fn raw_string_hashes(text: &str) -> usize {
    let mut needed = 1;
    let bytes = text.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'"' {
            let run = bytes[i + 1..].iter().take_while(|&&c| c == b'#').count();
            needed = needed.max(run + 1);
        }
    }
    needed
}
