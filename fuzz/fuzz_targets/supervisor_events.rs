//! Fuzz target for the connection supervisor
//!
//! Drives a simulated session with arbitrary interleavings of caller
//! commands, permission answers, transport events, stale events and clock
//! advances.
//!
//! # Invariants
//!
//! Every standard harness invariant is checked after each delivered event:
//! at most one live transport, at most one pending retry, never both, and a
//! session at rest holds nothing.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use roomlink_core::SupervisorConfig;
use roomlink_harness::{InvariantRegistry, Operation, RoomPick, SimDriver};

#[derive(Debug, Arbitrary)]
struct Session {
    initial: RoomPick,
    ops: Vec<Operation>,
}

fuzz_target!(|session: Session| {
    let mut driver = SimDriver::new(SupervisorConfig::default(), session.initial.as_str())
        .with_invariants(InvariantRegistry::standard());
    driver.start();

    for op in &session.ops {
        driver.apply(op);
    }

    if matches!(session.ops.last(), Some(Operation::Disconnect)) {
        assert!(!driver.supervisor().wants_connection());
    }
});
