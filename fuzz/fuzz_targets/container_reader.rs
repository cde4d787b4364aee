#![no_main]

use libfuzzer_sys::fuzz_target;
use recordfile_storage::DataFileReader;

fuzz_target!(|data: &[u8]| {
    // Feed arbitrary bytes to the container reader.
    // It should handle all malformed inputs gracefully:
    // - Invalid magic bytes and metadata maps
    // - Unparseable or non-record schemas
    // - Unknown codecs and bad compressed payloads
    // - Damaged sync markers and truncated blocks
    if let Ok(mut reader) = DataFileReader::new(data, None) {
        let _ = reader.metadata_str("avro.codec");
        // Bounded so a stream of empty blocks can't spin forever
        for _ in 0..10_000 {
            match reader.next() {
                Some(_) => {}
                None => break,
            }
        }
        let _ = reader.close();
    }
});
