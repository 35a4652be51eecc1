//! Runtime tests against a scripted connector and permission gate.
//!
//! Time is paused, so retry schedules are observed exactly.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use roomlink_client::{
    ClientConfig, ClientError, Connector, PermissionError, PermissionGate, RoomProbe,
    RoomSourceError, Runtime, StaticRoom, SystemEnv, TransportError, TransportEvent,
    TransportEvents, TransportHandle,
};
use roomlink_core::TransportId;
use tokio::time::Instant;

#[derive(Default)]
struct ScriptState {
    opens: Vec<(Instant, String)>,
    sinks: Vec<TransportEvents>,
    closes: Vec<(TransportId, u16, String)>,
}

/// Connector that records opens and hands the event sinks to the test.
#[derive(Clone, Default)]
struct Script {
    state: Arc<Mutex<ScriptState>>,
    fail_opens: Arc<AtomicBool>,
}

impl Script {
    fn failing() -> Self {
        let script = Self::default();
        script.fail_opens.store(true, Ordering::SeqCst);
        script
    }

    fn open_count(&self) -> usize {
        self.state.lock().unwrap().opens.len()
    }

    fn open_times(&self) -> Vec<Instant> {
        self.state.lock().unwrap().opens.iter().map(|(at, _)| *at).collect()
    }

    fn address(&self, index: usize) -> String {
        self.state.lock().unwrap().opens[index].1.clone()
    }

    fn sink(&self, index: usize) -> TransportEvents {
        self.state.lock().unwrap().sinks[index].clone()
    }

    fn closes(&self) -> Vec<(TransportId, u16, String)> {
        self.state.lock().unwrap().closes.clone()
    }
}

struct ScriptedHandle {
    transport: TransportId,
    state: Arc<Mutex<ScriptState>>,
}

impl TransportHandle for ScriptedHandle {
    fn close(&mut self, code: u16, reason: &str) -> Result<(), TransportError> {
        self.state.lock().unwrap().closes.push((self.transport, code, reason.to_string()));
        Ok(())
    }
}

impl Connector for Script {
    fn open(
        &self,
        address: &str,
        events: TransportEvents,
    ) -> Result<Box<dyn TransportHandle>, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.opens.push((Instant::now(), address.to_string()));
        if self.fail_opens.load(Ordering::SeqCst) {
            return Err(TransportError::Connection("scripted failure".to_string()));
        }
        let transport = events.transport();
        state.sinks.push(events);
        Ok(Box::new(ScriptedHandle { transport, state: Arc::clone(&self.state) }))
    }
}

/// Permission gate with a fixed answer that counts checks.
#[derive(Clone)]
struct Gate {
    granted: bool,
    checks: Arc<AtomicU32>,
}

impl Gate {
    fn new(granted: bool) -> Self {
        Self { granted, checks: Arc::new(AtomicU32::new(0)) }
    }
}

#[async_trait]
impl PermissionGate for Gate {
    async fn check(&self, _address: &str) -> Result<bool, PermissionError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        Ok(self.granted)
    }
}

struct FixedProbe(&'static str);

impl RoomProbe for FixedProbe {
    fn probe(&self) -> Result<Option<String>, RoomSourceError> {
        Ok(Some(self.0.to_string()))
    }
}

async fn until(mut condition: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition never became true");
}

fn start(
    config: &ClientConfig,
    script: &Script,
    gate: Gate,
) -> (tokio::task::JoinHandle<()>, roomlink_client::RoomHandle) {
    let (runtime, handle) =
        Runtime::new(config, SystemEnv::new(), Arc::new(script.clone()), Arc::new(gate));
    (runtime.spawn(), handle)
}

#[tokio::test(start_paused = true)]
async fn connects_and_surfaces_frames() {
    let script = Script::default();
    let (_task, handle) = start(&ClientConfig::for_room("lobby"), &script, Gate::new(true));

    until(|| script.open_count() == 1).await;
    assert_eq!(script.address(0), "ws://127.0.0.1:8765/stream?room=lobby");
    assert!(!handle.is_connected());

    let events = script.sink(0);
    events.emit(TransportEvent::Opened).await;
    until(|| handle.is_connected()).await;
    assert_eq!(handle.status().state, "open");

    events
        .emit(TransportEvent::Message(
            r#"{"type":"gesture","label":"wave","confidence":0.871}"#.to_string(),
        ))
        .await;
    let presence = r#"{"type":"presence","subscribers":"4"}"#.to_string();
    events.emit(TransportEvent::Message(presence)).await;
    until(|| handle.subscriber_count() == 4.0).await;

    assert_eq!(handle.gesture(), "wave");
    assert_eq!(handle.confidence(), 0.87);
    assert_eq!(handle.facts().confidence, 0.871);
    assert_eq!(handle.room(), "lobby");
}

#[tokio::test(start_paused = true)]
async fn commands_take_effect_before_returning() {
    let script = Script::default();
    let (_task, handle) = start(&ClientConfig::for_room("a"), &script, Gate::new(true));

    until(|| script.open_count() == 1).await;
    let events = script.sink(0);
    events.emit(TransportEvent::Opened).await;
    let gesture = r#"{"type":"gesture","label":"wave","confidence":0.5}"#.to_string();
    events.emit(TransportEvent::Message(gesture)).await;
    until(|| handle.gesture() == "wave").await;

    handle.set_room("b").await.unwrap();
    assert_eq!(handle.room(), "b");
    assert_eq!(handle.gesture(), "");
    assert_eq!(handle.confidence(), 0.0);
    assert!(!handle.is_connected());

    until(|| script.open_count() == 2).await;
    script.sink(1).emit(TransportEvent::Opened).await;
    until(|| handle.is_connected()).await;

    handle.reconnect().await.unwrap();
    assert!(!handle.is_connected());
    assert_eq!(handle.room(), "b");

    handle.disconnect().await.unwrap();
    assert!(!handle.is_connected());
    assert_eq!(handle.status().state, "disconnected");

    handle.set_room("").await.unwrap();
    assert_eq!(handle.room(), "");
    assert_eq!(handle.status().state, "idle");
}

#[tokio::test(start_paused = true)]
async fn failed_opens_follow_backoff_schedule() {
    let script = Script::failing();
    let (_task, handle) = start(&ClientConfig::for_room("lobby"), &script, Gate::new(true));

    until(|| script.open_count() >= 6).await;

    let times = script.open_times();
    let gaps: Vec<Duration> = times.windows(2).map(|w| w[1] - w[0]).take(5).collect();
    assert_eq!(
        gaps,
        [1, 2, 3, 5, 5].map(Duration::from_secs),
        "delays follow the table and saturate at its last entry"
    );
    assert!(!handle.is_connected());
}

#[tokio::test(start_paused = true)]
async fn denied_permission_never_opens() {
    let script = Script::default();
    let gate = Gate::new(false);
    let checks = Arc::clone(&gate.checks);
    let (_task, handle) = start(&ClientConfig::for_room("lobby"), &script, gate);

    until(|| checks.load(Ordering::SeqCst) >= 3).await;

    assert_eq!(script.open_count(), 0);
    assert!(!handle.is_connected());
}

#[tokio::test(start_paused = true)]
async fn close_schedules_reconnect_after_first_delay() {
    let script = Script::default();
    let (_task, handle) = start(&ClientConfig::for_room("lobby"), &script, Gate::new(true));

    until(|| script.open_count() == 1).await;
    let events = script.sink(0);
    events.emit(TransportEvent::Opened).await;
    until(|| handle.is_connected()).await;

    events.emit(TransportEvent::Errored("reset".to_string())).await;
    until(|| !handle.is_connected()).await;
    let closed_at = Instant::now();
    events.emit(TransportEvent::Closed { code: Some(1006), reason: "reset".to_string() }).await;

    until(|| script.open_count() == 2).await;
    let reopened = script.open_times()[1] - closed_at;
    assert!(reopened >= Duration::from_secs(1) && reopened < Duration::from_millis(1100));
}

#[tokio::test(start_paused = true)]
async fn switching_room_detaches_old_transport() {
    let script = Script::default();
    let (_task, handle) = start(&ClientConfig::for_room("lobby"), &script, Gate::new(true));

    until(|| script.open_count() == 1).await;
    let old = script.sink(0);
    old.emit(TransportEvent::Opened).await;
    until(|| handle.is_connected()).await;

    handle.set_room("kitchen").await.unwrap();
    until(|| script.open_count() == 2).await;

    assert_eq!(script.address(1), "ws://127.0.0.1:8765/stream?room=kitchen");
    assert_eq!(script.closes(), vec![(old.transport(), 1000, "switching room".to_string())]);
    assert_eq!(handle.room(), "kitchen");
    assert!(!handle.is_connected());

    // Late frames from the detached transport are ignored
    old.emit(TransportEvent::Message(r#"{"type":"gesture","label":"stale"}"#.to_string())).await;
    old.emit(TransportEvent::Opened).await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(handle.gesture(), "");
    assert!(!handle.is_connected());
}

#[tokio::test(start_paused = true)]
async fn same_room_while_open_is_a_no_op() {
    let script = Script::default();
    let (_task, handle) = start(&ClientConfig::for_room("lobby"), &script, Gate::new(true));

    until(|| script.open_count() == 1).await;
    script.sink(0).emit(TransportEvent::Opened).await;
    until(|| handle.is_connected()).await;

    handle.set_room(" lobby ").await.unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(script.open_count(), 1);
    assert!(script.closes().is_empty());
    assert!(handle.is_connected());
}

#[tokio::test(start_paused = true)]
async fn reconnect_replaces_transport_immediately() {
    let script = Script::default();
    let (_task, handle) = start(&ClientConfig::for_room("lobby"), &script, Gate::new(true));

    until(|| script.open_count() == 1).await;
    let first = script.sink(0);
    first.emit(TransportEvent::Opened).await;
    until(|| handle.is_connected()).await;

    let before = Instant::now();
    handle.reconnect().await.unwrap();
    until(|| script.open_count() == 2).await;

    assert!(script.open_times()[1] - before < Duration::from_millis(50));
    assert_eq!(script.closes(), vec![(first.transport(), 1000, "reconnect requested".to_string())]);
}

#[tokio::test(start_paused = true)]
async fn disconnect_stops_retries() {
    let script = Script::failing();
    let (_task, handle) = start(&ClientConfig::for_room("lobby"), &script, Gate::new(true));

    until(|| script.open_count() == 1).await;
    handle.disconnect().await.unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(script.open_count(), 1);
    assert_eq!(handle.status().state, "disconnected");
    assert_eq!(handle.room(), "lobby");
}

#[tokio::test(start_paused = true)]
async fn clearing_room_closes_transport() {
    let script = Script::default();
    let (_task, handle) = start(&ClientConfig::for_room("lobby"), &script, Gate::new(true));

    until(|| script.open_count() == 1).await;
    let events = script.sink(0);
    events.emit(TransportEvent::Opened).await;
    until(|| handle.is_connected()).await;

    handle.set_room("").await.unwrap();
    until(|| !handle.is_connected()).await;

    assert_eq!(script.closes(), vec![(events.transport(), 1000, "room cleared".to_string())]);
    assert_eq!(handle.room(), "");
    assert_eq!(handle.status().state, "idle");
}

#[tokio::test(start_paused = true)]
async fn shutdown_closes_transport_and_stops_runtime() {
    let script = Script::default();
    let (task, handle) = start(&ClientConfig::for_room("lobby"), &script, Gate::new(true));

    until(|| script.open_count() == 1).await;
    let events = script.sink(0);
    events.emit(TransportEvent::Opened).await;
    until(|| handle.is_connected()).await;

    handle.shutdown().await.unwrap();
    task.await.unwrap();

    assert_eq!(script.closes(), vec![(events.transport(), 1000, "shutdown".to_string())]);
    assert!(!handle.is_connected());
    assert_eq!(handle.set_room("other").await, Err(ClientError::RuntimeStopped));
}

#[tokio::test(start_paused = true)]
async fn dropping_every_handle_stops_runtime() {
    let script = Script::default();
    let (task, handle) = start(&ClientConfig::default(), &script, Gate::new(true));

    drop(handle);
    task.await.unwrap();
    assert_eq!(script.open_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn discovered_room_used_when_none_configured() {
    let script = Script::default();
    let (runtime, handle) = Runtime::new(
        &ClientConfig::default(),
        SystemEnv::new(),
        Arc::new(script.clone()),
        Arc::new(Gate::new(true)),
    );
    let _task = runtime.with_room_source(Arc::new(StaticRoom::new(FixedProbe("found")))).spawn();

    until(|| script.open_count() == 1).await;
    assert_eq!(script.address(0), "ws://127.0.0.1:8765/stream?room=found");
    assert_eq!(handle.room(), "found");
}

#[tokio::test(start_paused = true)]
async fn configured_room_skips_discovery() {
    let script = Script::default();
    let (runtime, handle) = Runtime::new(
        &ClientConfig::for_room("lobby"),
        SystemEnv::new(),
        Arc::new(script.clone()),
        Arc::new(Gate::new(true)),
    );
    let _task = runtime.with_room_source(Arc::new(StaticRoom::new(FixedProbe("found")))).spawn();

    until(|| script.open_count() == 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(handle.room(), "lobby");
    assert_eq!(script.open_count(), 1);
}
