#![no_main]

use blaze_protocol::Packet;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Header parse plus the lazy content parse
    if let Ok(packet) = Packet::from_bytes(data) {
        let _ = packet.records();
    }
});
