//! Fuzz the payload decoder.
//!
//! Decoding must never panic, and anything that decodes must encode again and
//! decode to the same kind.

#![no_main]

use etch_proto::{decode, encode};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(message) = decode(data) {
        let payload = encode(&message).expect("decoded message must encode");
        let again = decode(&payload).expect("re-encoded message must decode");
        assert_eq!(again.kind(), message.kind());
    }
});
