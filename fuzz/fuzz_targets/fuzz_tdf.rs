#![no_main]

use blaze_protocol::core::tdf::{decode_all, encode_all};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(records) = decode_all(data) {
        // Our own output must decode and re-encode to the same bytes
        let encoded = encode_all(&records);
        let again = decode_all(&encoded).map(|records| encode_all(&records));
        assert_eq!(again.ok(), Some(encoded));
    }
});
