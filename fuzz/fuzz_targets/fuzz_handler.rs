#![no_main]

use libfuzzer_sys::fuzz_target;
use secure_datagram::protocol::{EchoProcessor, RequestHandler};
use secure_datagram::{Crypto, SymmetricKey};
use std::sync::Arc;

fuzz_target!(|data: &[u8]| {
    // Arbitrary datagrams must be dropped without a reply
    let crypto = Arc::new(Crypto::new(&SymmetricKey::from_bytes([0x5A; 32])));
    let handler = RequestHandler::new(crypto, EchoProcessor);
    let outcome = handler.handle(data, ([127, 0, 0, 1], 5171).into());
    assert!(outcome.reply().is_none());
});
