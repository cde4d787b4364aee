#![no_main]

use libfuzzer_sys::fuzz_target;
use recordfile_core::Schema;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(schema) = Schema::parse(text) {
        // Canonical text must parse back to an equal schema
        let reparsed = Schema::parse(&schema.canonical_text()).unwrap();
        assert_eq!(reparsed.fingerprint(), schema.fingerprint());
    }
});
