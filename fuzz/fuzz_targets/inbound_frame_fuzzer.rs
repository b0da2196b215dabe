//! Fuzz target for InboundMessage::decode
//!
//! Arbitrary text must never panic the decoder. Anything accepted must carry
//! a non-empty event name.

#![no_main]

use libfuzzer_sys::fuzz_target;
use ridelink_proto::InboundMessage;

fuzz_target!(|text: &str| {
    if let Ok(message) = InboundMessage::decode(text) {
        assert!(!message.kind.is_empty());
    }
});
