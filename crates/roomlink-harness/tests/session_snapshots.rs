//! Snapshot tests for simulated sessions.

use std::time::Duration;

use roomlink_core::SupervisorConfig;
use roomlink_harness::{FramePick, InvariantRegistry, Operation, SimDriver};

fn started(room: &str) -> SimDriver {
    let mut driver = SimDriver::new(SupervisorConfig::default(), room)
        .with_invariants(InvariantRegistry::standard());
    driver.start();
    driver
}

#[test]
fn retries_then_connects_then_disconnects() {
    let mut driver = started("lobby");

    for _ in 0..4 {
        driver.apply(&Operation::Deny);
        driver.advance(Duration::from_secs(5));
    }
    driver.apply(&Operation::Grant);
    driver.apply(&Operation::Open);
    driver.apply(&Operation::Close { code: Some(1006) });
    driver.apply(&Operation::Disconnect);

    insta::assert_snapshot!(driver.trace().join("\n"), @r###"
    0ms check-permission attempt#1 http://127.0.0.1:8765/stream?room=lobby
    0ms schedule-retry timer#2 1000ms
    1000ms check-permission attempt#3 http://127.0.0.1:8765/stream?room=lobby
    5000ms schedule-retry timer#4 2000ms
    7000ms check-permission attempt#5 http://127.0.0.1:8765/stream?room=lobby
    10000ms schedule-retry timer#6 3000ms
    13000ms check-permission attempt#7 http://127.0.0.1:8765/stream?room=lobby
    15000ms schedule-retry timer#8 5000ms
    20000ms check-permission attempt#9 http://127.0.0.1:8765/stream?room=lobby
    20000ms open transport#10 ws://127.0.0.1:8765/stream?room=lobby
    20000ms schedule-retry timer#11 1000ms
    20000ms cancel-retry timer#11
    "###);
}

#[test]
fn faulted_session_keeps_last_facts() {
    let mut driver = started("lobby");
    driver.apply(&Operation::Grant);
    driver.apply(&Operation::Open);
    driver.apply(&Operation::Message(FramePick::Gesture));
    driver.apply(&Operation::Message(FramePick::Presence));
    driver.apply(&Operation::Message(FramePick::BadPresence));
    driver.apply(&Operation::Error);

    insta::assert_debug_snapshot!(driver.snapshot(), @r###"
    SessionSnapshot {
        state: "faulted",
        room: "lobby",
        connected: false,
        label: "wave",
        confidence: 0.871,
        subscriber_count: 3.0,
        live_transport: Some(
            2,
        ),
        pending_retry: None,
        attached_transports: [
            2,
        ],
        armed_timers: [],
        backoff_index: 0,
    }
    "###);
}
