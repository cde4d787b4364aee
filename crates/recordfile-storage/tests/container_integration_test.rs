//! Container Integration Tests
//!
//! End-to-end write/read scenarios against real files: every binding, every
//! codec, block thresholds, schema projection and damaged files.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use recordfile_core::{
    static_record, DecodeError, EncodeError, FieldValue, Record, RecordBuilder, RecordSchema, Schema, Value,
};
use recordfile_storage::{Codec, DataFileReader, DataFileWriter, Error, WriterConfig, SYNC_SIZE};
use tempfile::TempDir;

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

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn customer_schema() -> Arc<RecordSchema> {
    Schema::parse_record(CUSTOMER).unwrap()
}

fn generic_customer(schema: &Arc<RecordSchema>) -> Record {
    RecordBuilder::new(schema)
        .with("first_name", "Evandro")
        .with("last_name", "Jandre")
        .with("age", 25)
        .with("height", 170.0f32)
        .with("weight", 70.0f32)
        .build()
        .unwrap()
}

fn event_schema() -> Arc<RecordSchema> {
    Schema::parse_record(
        r#"{"type":"record","name":"Event","namespace":"com.example","fields":[
            {"name":"id","type":"int"},
            {"name":"payload","type":"bytes"},
            {"name":"label","type":"string"}]}"#,
    )
    .unwrap()
}

fn event(schema: &Arc<RecordSchema>, id: i32, payload: Vec<u8>) -> Record {
    RecordBuilder::new(schema)
        .with("id", id)
        .with("payload", payload)
        .with("label", format!("event-{id}"))
        .build()
        .unwrap()
}

/// Byte positions of every occurrence of `marker` in `bytes`
fn find_all(bytes: &[u8], marker: &[u8]) -> Vec<usize> {
    bytes
        .windows(marker.len())
        .enumerate()
        .filter(|(_, window)| *window == marker)
        .map(|(pos, _)| pos)
        .collect()
}

#[test]
fn test_customer_roundtrip_all_bindings() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("customers.avro");
    let schema = customer_schema();

    let mut writer = DataFileWriter::create(&path, &schema, WriterConfig::default()).unwrap();
    writer.append(&generic_customer(&schema)).unwrap();
    writer
        .append(
            &Customer::builder()
                .first_name("Ada")
                .last_name("Lovelace")
                .age(36)
                .height(165.0f32)
                .weight(55.5f32)
                .automated_email(false)
                .build()
                .unwrap(),
        )
        .unwrap();
    writer
        .append(&introspected::Customer {
            first_name: "Alan".to_string(),
            last_name: "Turing".to_string(),
            age: 41,
            height: 178.0,
            weight: 68.0,
            automated_email: true,
        })
        .unwrap();
    assert_eq!(writer.records_written(), 3);
    writer.close().unwrap();

    let mut reader = DataFileReader::open(&path, None).unwrap();
    assert_eq!(reader.codec(), Codec::Null);
    assert_eq!(reader.writer_schema().as_ref(), schema.as_ref());

    let first = reader.next_record().unwrap().unwrap();
    assert_eq!(first.get("first_name"), FieldValue::Present(&Value::from("Evandro")));
    assert_eq!(first.get("age"), FieldValue::Present(&Value::Int(25)));
    assert_eq!(first.get("automated_email"), FieldValue::Present(&Value::Boolean(true)));
    assert_eq!(first.get("not_here"), FieldValue::NoSuchField);

    let second: Customer = reader.read().unwrap().unwrap();
    assert_eq!(second.first_name, "Ada");
    assert!(!second.automated_email);

    let third: introspected::Customer = reader.read().unwrap().unwrap();
    assert_eq!(third.last_name, "Turing");

    assert!(!reader.has_next().unwrap());
    reader.close().unwrap();
}

#[test]
fn test_customer_scenario_values() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let schema = customer_schema();

    for codec in [Codec::Null, Codec::Deflate { level: 9 }] {
        let path = dir.path().join(format!("customer-{}.avro", codec.name()));
        let customer = RecordBuilder::new(&schema)
            .with("first_name", "Evandro")
            .with("last_name", "Junior")
            .with("age", 25)
            .with("height", 1.75f32)
            .with("weight", 80.5f32)
            .with("automated_email", false)
            .build()
            .unwrap();

        let mut writer = DataFileWriter::create(&path, &schema, WriterConfig::default().with_codec(codec)).unwrap();
        writer.append(&customer).unwrap();
        writer.close().unwrap();

        let mut reader = DataFileReader::open(&path, None).unwrap();
        let record = reader.next_record().unwrap().unwrap();
        assert_eq!(record.get("first_name"), FieldValue::Present(&Value::from("Evandro")));
        assert_eq!(record.get("last_name"), FieldValue::Present(&Value::from("Junior")));
        assert_eq!(record.get("age"), FieldValue::Present(&Value::Int(25)));
        assert_eq!(record.get("height"), FieldValue::Present(&Value::Float(1.75)));
        assert_eq!(record.get("weight"), FieldValue::Present(&Value::Float(80.5)));
        assert_eq!(record.get("automated_email"), FieldValue::Present(&Value::Boolean(false)));
        assert_eq!(record.get("not_here"), FieldValue::NoSuchField);
        assert_eq!(reader.next_record().unwrap(), None);

        // The same file through both typed bindings
        let typed: Vec<Customer> = DataFileReader::open(&path, None)
            .unwrap()
            .into_typed::<Customer>()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(
            typed,
            [Customer {
                first_name: "Evandro".to_string(),
                last_name: "Junior".to_string(),
                age: 25,
                height: 1.75,
                weight: 80.5,
                automated_email: false,
            }]
        );

        let mut reader = DataFileReader::open(&path, None).unwrap();
        let introspected: introspected::Customer = reader.read().unwrap().unwrap();
        assert!(!introspected.automated_email);
        assert_eq!(introspected.weight, 80.5);
    }
}

#[test]
fn test_writer_rejects_other_record_type() {
    let schema = customer_schema();
    let invoice_schema = Schema::parse_record(
        r#"{"type":"record","name":"Invoice","namespace":"billing","fields":[
            {"name":"first_name","type":"string"},
            {"name":"age","type":"int"}]}"#,
    )
    .unwrap();
    let invoice = RecordBuilder::new(&invoice_schema)
        .with("first_name", "Evandro")
        .with("age", 25)
        .build()
        .unwrap();

    let mut writer = DataFileWriter::new(Vec::new(), &schema, WriterConfig::default()).unwrap();
    let err = writer.append(&invoice).unwrap_err();
    assert!(matches!(
        err,
        Error::Core(recordfile_core::Error::Encode(EncodeError::RecordName { .. }))
    ));
    assert!(writer.append_record(&invoice).is_err());
    assert_eq!(writer.records_written(), 0);

    let bytes = writer.into_inner().unwrap();
    let mut reader = DataFileReader::new(&bytes[..], None).unwrap();
    assert_eq!(reader.next_record().unwrap(), None);
}

#[test]
fn test_record_count_across_block_thresholds() {
    init_tracing();
    let schema = event_schema();

    for (max_records, max_bytes) in [(1, 64 * 1024), (7, 64 * 1024), (4000, 64 * 1024), (4000, 100)] {
        let config = WriterConfig {
            block_max_records: max_records,
            block_max_bytes: max_bytes,
            ..Default::default()
        };
        let mut writer = DataFileWriter::new(Vec::new(), &schema, config).unwrap();
        for id in 0..250 {
            writer.append_record(&event(&schema, id, vec![id as u8; 16])).unwrap();
        }
        let bytes = writer.into_inner().unwrap();

        let reader = DataFileReader::new(&bytes[..], None).unwrap();
        let ids: Vec<i32> = reader
            .map(|record| record.unwrap().get("id").value().and_then(Value::as_i32).unwrap())
            .collect();
        assert_eq!(ids, (0..250).collect::<Vec<_>>(), "thresholds {max_records}/{max_bytes}");
    }
}

#[test]
fn test_block_count_matches_threshold() {
    let schema = event_schema();
    let config = WriterConfig {
        block_max_records: 10,
        ..Default::default()
    };
    let mut writer = DataFileWriter::new(Vec::new(), &schema, config).unwrap();
    for id in 0..35 {
        writer.append_record(&event(&schema, id, Vec::new())).unwrap();
    }
    let bytes = writer.into_inner().unwrap();

    let mut reader = DataFileReader::new(&bytes[..], None).unwrap();
    while reader.next_record().unwrap().is_some() {}
    assert_eq!(reader.block_count(), 4);
    assert_eq!(reader.records_read(), 35);
}

#[test]
fn test_every_codec_roundtrips_files() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let schema = event_schema();
    let mut rng = StdRng::seed_from_u64(7);
    let records: Vec<Record> = (0..500)
        .map(|id| {
            let len = rng.gen_range(0..200);
            let payload: Vec<u8> = (0..len).map(|_| rng.gen_range(b'a'..=b'f')).collect();
            event(&schema, id, payload)
        })
        .collect();

    for codec in [
        Codec::Null,
        Codec::Deflate { level: 9 },
        Codec::Snappy,
        Codec::Zstandard { level: 3 },
    ] {
        let path = dir.path().join(format!("events-{}.avro", codec.name()));
        let config = WriterConfig {
            codec,
            block_max_records: 64,
            ..Default::default()
        };
        let mut writer = DataFileWriter::create(&path, &schema, config).unwrap();
        for record in &records {
            writer.append_record(record).unwrap();
        }
        writer.close().unwrap();

        let reader = DataFileReader::open(&path, None).unwrap();
        assert_eq!(reader.codec().name(), codec.name());
        let read: Vec<Record> = reader.map(Result::unwrap).collect();
        assert_eq!(read, records, "codec {codec}");
    }
}

#[test]
fn test_deflate_level_9_empty_and_random() {
    let schema = event_schema();
    let config = WriterConfig::default().with_codec(Codec::Deflate { level: 9 });

    // No records at all
    let writer = DataFileWriter::new(Vec::new(), &schema, config.clone()).unwrap();
    let bytes = writer.into_inner().unwrap();
    let mut reader = DataFileReader::new(&bytes[..], None).unwrap();
    assert_eq!(reader.codec(), Codec::Deflate { level: 6 });
    assert_eq!(reader.next_record().unwrap(), None);

    // Empty and incompressible payloads
    let mut rng = StdRng::seed_from_u64(99);
    let mut writer = DataFileWriter::new(Vec::new(), &schema, config).unwrap();
    let mut expected = Vec::new();
    for id in 0..100 {
        let payload: Vec<u8> = if id % 10 == 0 {
            Vec::new()
        } else {
            (0..rng.gen_range(1..512)).map(|_| rng.gen()).collect()
        };
        expected.push(payload.clone());
        writer.append_record(&event(&schema, id, payload)).unwrap();
    }
    let bytes = writer.into_inner().unwrap();

    let reader = DataFileReader::new(&bytes[..], None).unwrap();
    let payloads: Vec<Vec<u8>> = reader
        .map(|record| {
            let record = record.unwrap();
            record.get("payload").value().and_then(Value::as_bytes).unwrap().to_vec()
        })
        .collect();
    assert_eq!(payloads, expected);
}

#[test]
fn test_flipped_sync_marker_is_corruption() {
    init_tracing();
    let schema = event_schema();
    let config = WriterConfig {
        block_max_records: 2,
        ..Default::default()
    };
    let mut writer = DataFileWriter::new(Vec::new(), &schema, config).unwrap();
    let sync = *writer.sync_marker();
    for id in 0..6 {
        writer.append_record(&event(&schema, id, Vec::new())).unwrap();
    }
    let mut bytes = writer.into_inner().unwrap();

    // Header, then one marker after each of the three blocks
    let positions = find_all(&bytes, &sync);
    assert_eq!(positions.len(), 4);
    bytes[positions[2] + 5] ^= 0x01;

    let mut reader = DataFileReader::new(&bytes[..], None).unwrap();
    assert!(reader.next_record().unwrap().is_some());
    assert!(reader.next_record().unwrap().is_some());

    let err = reader.next_record().unwrap_err();
    assert!(
        matches!(err, Error::Corruption { block: 1, offset } if offset == positions[2] as u64),
        "unexpected error: {err:?}"
    );

    // Sticky, and nothing past the damage is read
    assert!(reader.next_record().unwrap_err().is_corruption());
    assert!(reader.has_next().unwrap_err().is_corruption());
    assert_eq!(reader.block_count(), 1);
    assert_eq!(reader.records_read(), 2);
}

#[test]
fn test_iterator_stops_after_corruption() {
    let schema = event_schema();
    let config = WriterConfig {
        block_max_records: 1,
        ..Default::default()
    };
    let mut writer = DataFileWriter::new(Vec::new(), &schema, config).unwrap();
    let sync = *writer.sync_marker();
    for id in 0..3 {
        writer.append_record(&event(&schema, id, Vec::new())).unwrap();
    }
    let mut bytes = writer.into_inner().unwrap();
    let positions = find_all(&bytes, &sync);
    bytes[positions[1]] ^= 0xFF;

    let results: Vec<_> = DataFileReader::new(&bytes[..], None).unwrap().collect();
    assert_eq!(results.len(), 1);
    assert!(results[0].as_ref().unwrap_err().is_corruption());
}

#[test]
fn test_corrupted_string_length_prefix() {
    let schema = customer_schema();
    let mut writer = DataFileWriter::new(Vec::new(), &schema, WriterConfig::default()).unwrap();
    let sync = *writer.sync_marker();
    writer.append(&generic_customer(&schema)).unwrap();
    let mut bytes = writer.into_inner().unwrap();

    // Block layout after the header: count, size, then the first_name length
    let header_end = find_all(&bytes, &sync)[0] + SYNC_SIZE;
    assert_eq!(bytes[header_end], 0x02);
    assert_eq!(bytes[header_end + 2], 0x0E);
    bytes[header_end + 2] = 0x7E;

    let mut reader = DataFileReader::new(&bytes[..], None).unwrap();
    let err = reader.next_record().unwrap_err();
    let decode = err.as_decode().expect("decode error");
    assert!(
        matches!(decode.root_cause(), DecodeError::InvalidLength { length: 63, .. }),
        "unexpected error: {decode:?}"
    );

    // The damaged block is dropped; the stream ends cleanly
    assert_eq!(reader.next_record().unwrap(), None);
}

#[test]
fn test_reader_schema_projection() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("customers.avro");
    let schema = customer_schema();

    let mut writer = DataFileWriter::create(&path, &schema, WriterConfig::default()).unwrap();
    writer.append(&generic_customer(&schema)).unwrap();
    writer.close().unwrap();

    let reader_schema = Schema::parse(
        r#"{"type":"record","name":"Customer","namespace":"com.example","fields":[
            {"name":"age","type":"long"},
            {"name":"first_name","type":"string"},
            {"name":"loyalty_tier","type":"string","default":"bronze"},
            {"name":"nickname","type":"string"}]}"#,
    )
    .unwrap();

    let mut reader = DataFileReader::open(&path, Some(&reader_schema)).unwrap();
    assert_eq!(reader.schema().fields().len(), 4);
    assert_eq!(reader.writer_schema().fields().len(), 6);

    let record = reader.next_record().unwrap().unwrap();
    assert_eq!(record.get("age"), FieldValue::Present(&Value::Long(25)));
    assert_eq!(record.get("first_name"), FieldValue::Present(&Value::from("Evandro")));
    assert_eq!(record.get("loyalty_tier"), FieldValue::Present(&Value::from("bronze")));
    assert_eq!(record.get("nickname"), FieldValue::Absent);
    assert_eq!(record.get("last_name"), FieldValue::NoSuchField);
}

#[test]
fn test_incompatible_reader_schema() {
    let schema = customer_schema();
    let mut writer = DataFileWriter::new(Vec::new(), &schema, WriterConfig::default()).unwrap();
    writer.append(&generic_customer(&schema)).unwrap();
    let bytes = writer.into_inner().unwrap();

    let reader_schema = Schema::parse(
        r#"{"type":"record","name":"Customer","fields":[{"name":"age","type":"boolean"}]}"#,
    )
    .unwrap();
    let err = DataFileReader::new(&bytes[..], Some(&reader_schema)).err().unwrap();
    assert!(err.to_string().contains("age"));
}

#[test]
fn test_user_metadata() {
    let schema = event_schema();
    let config = WriterConfig::default()
        .with_metadata("owner", "billing")
        .with_codec(Codec::Snappy);
    let writer = DataFileWriter::new(Vec::new(), &schema, config).unwrap();
    let bytes = writer.into_inner().unwrap();

    let reader = DataFileReader::new(&bytes[..], None).unwrap();
    assert_eq!(reader.metadata_str("owner"), Some("billing"));
    assert_eq!(reader.metadata("avro.codec"), Some(&b"snappy"[..]));
    assert_eq!(
        reader.metadata_str("avro.schema"),
        Some(Schema::Record(Arc::clone(&schema)).canonical_text().as_str())
    );
}

#[test]
fn test_writer_drop_flushes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dropped.avro");
    let schema = event_schema();

    {
        let mut writer = DataFileWriter::create(&path, &schema, WriterConfig::default()).unwrap();
        writer.append_record(&event(&schema, 1, b"x".to_vec())).unwrap();
    }

    let records: Vec<Record> = DataFileReader::open(&path, None).unwrap().map(Result::unwrap).collect();
    assert_eq!(records.len(), 1);
}

#[test]
fn test_not_a_container_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("garbage.bin");
    std::fs::write(&path, b"definitely not a data file").unwrap();

    assert!(matches!(DataFileReader::open(&path, None), Err(Error::InvalidMagic)));
}

#[test]
fn test_typed_iteration() {
    let schema = customer_schema();
    let mut writer = DataFileWriter::new(Vec::new(), &schema, WriterConfig::default()).unwrap();
    for _ in 0..3 {
        writer.append(&generic_customer(&schema)).unwrap();
    }
    let bytes = writer.into_inner().unwrap();

    let customers: Vec<Customer> = DataFileReader::new(&bytes[..], None)
        .unwrap()
        .into_typed::<Customer>()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(customers.len(), 3);
    assert!(customers.iter().all(|c| c.first_name == "Evandro" && c.automated_email));
}
