//! Fuzz target for the event wire decoder and the id parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_event_decode

#![no_main]

use libfuzzer_sys::fuzz_target;
use vdock_core::Event;

fuzz_target!(|data: &[u8]| {
    if let Some(&byte) = data.first() {
        match Event::try_from(byte) {
            Ok(event) => assert_eq!(event.wire_byte(), byte),
            Err(_) => assert!(byte > 1),
        }
    }

    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(event) = s.parse::<Event>() {
            assert!(event.name().eq_ignore_ascii_case(s));
        }
        let _ = vdock_config::parse_id(s);
    }
});
