//! Integration tests: the three bindings share one wire format.

use std::sync::Arc;

use recordfile_core::{
    codec, static_record, Binding, Decoder, Describable, FieldValue, Record, RecordBuilder, RecordSchema,
    RecordSource, ResolvedRecord, Schema, StaticRecord, Value,
};

const CUSTOMER: &str = r#"{
    "type": "record",
    "namespace": "com.example",
    "name": "Customer",
    "doc": "Avro Schema for our Customer",
    "fields": [
        { "name": "first_name", "type": "string", "doc": "First Name of Customer" },
        { "name": "last_name", "type": "string", "doc": "Last Name of Customer" },
        { "name": "age", "type": "int", "doc": "Age at the time of registration" },
        { "name": "height", "type": "float", "doc": "Height at the time of registration in cm" },
        { "name": "weight", "type": "float", "doc": "Weight at the time of registration in kg" },
        { "name": "automated_email", "type": "boolean", "default": true,
          "doc": "Field indicating if the user is enrolled in marketing emails" }
    ]
}"#;

static_record! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct Customer: CUSTOMER, builder = CustomerBuilder {
        pub first_name: String,
        pub last_name: String,
        pub age: i32,
        pub height: f32,
        pub weight: f32,
        pub automated_email: bool,
    }
}

mod introspected {
    recordfile_core::describable! {
        #[derive(Debug, Clone, PartialEq)]
        pub struct Customer in "com.example" {
            pub first_name: String,
            pub last_name: String,
            pub age: i32,
            pub height: f32,
            pub weight: f32,
            pub automated_email: bool,
        }
    }
}

mod narrow {
    recordfile_core::describable! {
        #[derive(Debug, Clone, PartialEq)]
        pub struct Customer in "com.example.narrow" {
            pub first_name: String,
            pub age: i32,
        }
    }
}

fn schema() -> Arc<RecordSchema> {
    Schema::parse_record(CUSTOMER).unwrap()
}

fn generic_customer() -> Record {
    RecordBuilder::new(&schema())
        .with("first_name", "Evandro")
        .with("last_name", "Jandre")
        .with("age", 25)
        .with("height", 170.0f32)
        .with("weight", 70.0f32)
        .build()
        .unwrap()
}

fn static_customer() -> Customer {
    Customer::builder()
        .first_name("Evandro")
        .last_name("Jandre")
        .age(25)
        .height(170.0f32)
        .weight(70.0f32)
        .build()
        .unwrap()
}

fn introspected_customer() -> introspected::Customer {
    introspected::Customer {
        first_name: "Evandro".to_string(),
        last_name: "Jandre".to_string(),
        age: 25,
        height: 170.0,
        weight: 70.0,
        automated_email: true,
    }
}

fn encode(source: &impl RecordSource) -> Vec<u8> {
    let record = source.to_record(&schema()).unwrap();
    codec::encode_to_vec(&record).unwrap()
}

#[test]
fn test_all_bindings_produce_identical_bytes() {
    let generic = encode(&generic_customer());
    let specific = encode(&static_customer());
    let introspected = encode(&introspected_customer());

    assert_eq!(generic, specific);
    assert_eq!(generic, introspected);
}

#[test]
fn test_introspected_schema_matches_parsed_fields() {
    let derived = introspected::Customer::schema().unwrap();
    assert_eq!(derived.fullname(), "com.example.Customer");

    let parsed = schema();
    let derived_fields: Vec<_> = derived.fields().iter().map(|f| (&f.name, &f.schema)).collect();
    let parsed_fields: Vec<_> = parsed.fields().iter().map(|f| (&f.name, &f.schema)).collect();
    assert_eq!(derived_fields, parsed_fields);
}

#[test]
fn test_bytes_decode_into_each_binding() {
    let bytes = encode(&generic_customer());
    let decoded = codec::decode_from_slice(&bytes, &schema()).unwrap();

    assert_eq!(Customer::from_record(decoded.clone()).unwrap(), static_customer());
    assert_eq!(
        introspected::Customer::from_record(decoded.clone()).unwrap(),
        introspected_customer()
    );
    assert_eq!(decoded, generic_customer());
}

#[test]
fn test_field_lookup_on_decoded_customer() {
    let bytes = encode(&static_customer());
    let record = codec::decode_from_slice(&bytes, &schema()).unwrap();

    assert_eq!(record.get("first_name"), FieldValue::Present(&Value::from("Evandro")));
    assert_eq!(record.get("automated_email"), FieldValue::Present(&Value::Boolean(true)));
    assert_eq!(record.get("not_here"), FieldValue::NoSuchField);
}

#[test]
fn test_projection_into_narrower_binding() {
    // A reader that only knows two of the writer's fields
    let bytes = encode(&static_customer());
    let reader = narrow::Customer::schema().unwrap();
    let resolved = ResolvedRecord::new(&schema(), reader).unwrap();

    let record = Decoder::new(&bytes).decode_record(&resolved).unwrap();
    let customer = narrow::Customer::from_record(record).unwrap();
    assert_eq!(
        customer,
        narrow::Customer {
            first_name: "Evandro".to_string(),
            age: 25
        }
    );
}

#[test]
fn test_binding_kinds() {
    assert_eq!(Record::BINDING, Binding::Dynamic);
    assert_eq!(Customer::BINDING, Binding::Static);
    assert_eq!(introspected::Customer::BINDING, Binding::Introspected);
    assert!(Customer::SCHEMA_TEXT.contains("automated_email"));
}

#[test]
fn test_strict_conversion_rejects_unknown_fields() {
    // The narrow binding has no last_name, so the full record can't convert
    let err = generic_customer().to_record(narrow::Customer::schema().unwrap()).unwrap_err();
    assert!(err.to_string().contains("last_name"));
}
