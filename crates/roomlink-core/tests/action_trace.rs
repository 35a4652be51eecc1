//! Snapshot of the action trace for a canonical session.

use roomlink_core::{
    AttemptId, Supervisor, SupervisorConfig, SupervisorEvent, TimerId, TransportId,
};

fn resolved(attempt: u64, granted: bool) -> SupervisorEvent {
    SupervisorEvent::PermissionResolved { attempt: AttemptId(attempt), granted }
}

fn step(trace: &mut Vec<String>, label: &str, actions: &[roomlink_core::SupervisorAction]) {
    if actions.is_empty() {
        trace.push(format!("{label}: -"));
    }
    for action in actions {
        trace.push(format!("{label}: {action}"));
    }
}

#[test]
fn connect_drop_retry_switch_disconnect() {
    let mut sup = Supervisor::new(SupervisorConfig::default(), "");
    let mut trace = Vec::new();

    let a = sup.set_room("lobby");
    step(&mut trace, "set_room(lobby)", &a);
    let a = sup.handle(resolved(1, true));
    step(&mut trace, "granted", &a);
    let a = sup.handle(SupervisorEvent::TransportOpened { transport: TransportId(2) });
    step(&mut trace, "opened", &a);
    let a = sup.handle(SupervisorEvent::TransportMessage {
        transport: TransportId(2),
        payload: r#"{"type":"gesture","label":"wave","confidence":0.871}"#.to_string(),
    });
    step(&mut trace, "message", &a);
    let a = sup.handle(SupervisorEvent::TransportClosed {
        transport: TransportId(2),
        code: Some(1006),
        reason: "abnormal".to_string(),
    });
    step(&mut trace, "closed", &a);
    let a = sup.handle(SupervisorEvent::RetryFired { timer: TimerId(3) });
    step(&mut trace, "retry", &a);
    let a = sup.handle(resolved(4, false));
    step(&mut trace, "denied", &a);
    let a = sup.handle(SupervisorEvent::RetryFired { timer: TimerId(5) });
    step(&mut trace, "retry", &a);
    let a = sup.handle(resolved(6, true));
    step(&mut trace, "granted", &a);
    let a = sup.handle(SupervisorEvent::TransportOpened { transport: TransportId(7) });
    step(&mut trace, "opened", &a);
    let a = sup.set_room("other");
    step(&mut trace, "set_room(other)", &a);
    let a = sup.disconnect();
    step(&mut trace, "disconnect", &a);

    trace.push(format!(
        "final: state={} room={} connected={} label={:?}",
        sup.state().name(),
        sup.room(),
        sup.is_connected(),
        sup.gesture()
    ));

    insta::assert_snapshot!(trace.join("\n"), @r###"
    set_room(lobby): check-permission attempt#1 http://127.0.0.1:8765/stream?room=lobby
    granted: open transport#2 ws://127.0.0.1:8765/stream?room=lobby
    opened: -
    message: -
    closed: schedule-retry timer#3 1000ms
    retry: check-permission attempt#4 http://127.0.0.1:8765/stream?room=lobby
    denied: schedule-retry timer#5 2000ms
    retry: check-permission attempt#6 http://127.0.0.1:8765/stream?room=lobby
    granted: open transport#7 ws://127.0.0.1:8765/stream?room=lobby
    opened: -
    set_room(other): close transport#7 1000 "switching room"
    set_room(other): check-permission attempt#8 http://127.0.0.1:8765/stream?room=other
    disconnect: -
    final: state=disconnected room=other connected=false label=""
    "###);
}
