#![no_main]

use std::sync::{Arc, OnceLock};

use libfuzzer_sys::fuzz_target;
use recordfile_core::{codec, decode_from_slice, RecordSchema, Schema};

fn schema() -> &'static Arc<RecordSchema> {
    static SCHEMA: OnceLock<Arc<RecordSchema>> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        Schema::parse_record(
            r#"{"type":"record","name":"Customer","fields":[
                {"name":"first_name","type":"string"},
                {"name":"age","type":"int"},
                {"name":"height","type":"float"},
                {"name":"balance","type":"double"},
                {"name":"id","type":"long"},
                {"name":"photo","type":"bytes"},
                {"name":"active","type":"boolean"},
                {"name":"address","type":{"type":"record","name":"Address","fields":[
                    {"name":"street","type":"string"},
                    {"name":"zip","type":"int"}]}}]}"#,
        )
        .unwrap()
    })
}

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must decode or fail cleanly:
    // - Truncated values and overlong varints
    // - Negative or oversized lengths
    // - Invalid booleans and UTF-8
    if let Ok(record) = decode_from_slice(data, schema()) {
        // Whatever decoded must encode again; overlong varints mean the
        // bytes need not match
        let encoded = codec::encode_to_vec(&record).unwrap();
        assert!(encoded.len() <= data.len());
    }
});
