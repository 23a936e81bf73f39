#![no_main]

use libfuzzer_sys::fuzz_target;
use secure_datagram::core::frame;

fuzz_target!(|data: &[u8]| {
    // Splitting arbitrary bytes must never panic, and a split must rejoin exactly
    if let Ok(parts) = frame::split(data) {
        let rejoined = frame::join(&parts.nonce, parts.ciphertext, &parts.tag);
        assert_eq!(rejoined, data);
    }
});
