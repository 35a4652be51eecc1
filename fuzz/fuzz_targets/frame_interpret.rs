//! Fuzz target for the frame interpreter
//!
//! Feeds arbitrary bytes as stream payloads, one after another, into the same
//! facts.
//!
//! # Invariants
//!
//! - Never panics, whatever the payload
//! - Confidence and subscriber count stay finite
//! - Interpreting never touches `connected`

#![no_main]

use libfuzzer_sys::fuzz_target;
use roomlink_core::{Facts, interpreter};

fuzz_target!(|payloads: Vec<Vec<u8>>| {
    let mut facts = Facts::default();

    for payload in &payloads {
        interpreter::interpret_bytes(payload, &mut facts);

        assert!(facts.confidence.is_finite(), "confidence {}", facts.confidence);
        assert!(facts.subscriber_count.is_finite(), "count {}", facts.subscriber_count);
        assert!(!facts.connected);
        assert!(facts.reported_confidence().is_finite());
    }
});
