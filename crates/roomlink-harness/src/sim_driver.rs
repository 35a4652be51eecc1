//! Deterministic driver for the supervisor.
//!
//! `SimDriver` executes [`SupervisorAction`]s the way the tokio runtime does,
//! but against scripted collaborators and a virtual clock:
//!
//! - permission checks queue up until an [`Operation::Grant`] or
//!   [`Operation::Deny`] answers the oldest one
//! - opened transports stay attached until the supervisor closes them or an
//!   operation reports them closed
//! - retry timers fire when [`SimDriver::advance`] passes their deadline
//!
//! What is attached and armed is tracked from the action stream alone, so the
//! invariants can compare it against what the supervisor believes.

use std::{
    collections::{BTreeMap, VecDeque},
    time::Duration,
};

use roomlink_core::{
    AttemptId, Supervisor, SupervisorAction, SupervisorConfig, SupervisorEvent, TimerId,
    TransportId, env::Environment,
};

use crate::{
    invariants::{InvariantRegistry, SessionSnapshot},
    operation::{Operation, StalePick},
    sim_env::{SimEnv, SimInstant},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Opening,
    Open,
}

/// Simulation driver for deterministic testing.
pub struct SimDriver {
    supervisor: Supervisor,
    env: SimEnv,
    /// Permission checks not yet answered, oldest first. May include stale
    /// attempts.
    checks: VecDeque<AttemptId>,
    attached: BTreeMap<TransportId, Phase>,
    /// Transports the supervisor closed. They may still emit events.
    detached: Vec<TransportId>,
    armed: BTreeMap<TimerId, SimInstant>,
    cancelled: Vec<TimerId>,
    opens: usize,
    trace: Vec<String>,
    invariants: Option<InvariantRegistry>,
}

impl SimDriver {
    /// Create a driver around a fresh supervisor. Call [`SimDriver::start`]
    /// to connect to `initial_room`.
    pub fn new(config: SupervisorConfig, initial_room: &str) -> Self {
        Self {
            supervisor: Supervisor::new(config, initial_room),
            env: SimEnv::new(),
            checks: VecDeque::new(),
            attached: BTreeMap::new(),
            detached: Vec::new(),
            armed: BTreeMap::new(),
            cancelled: Vec::new(),
            opens: 0,
            trace: Vec::new(),
            invariants: None,
        }
    }

    /// Check invariants after every delivered event.
    #[must_use]
    pub fn with_invariants(mut self, registry: InvariantRegistry) -> Self {
        self.invariants = Some(registry);
        self
    }

    /// Start the supervisor.
    pub fn start(&mut self) {
        let actions = self.supervisor.start();
        self.execute(actions);
        self.check_invariants("after start");
    }

    /// Apply one operation. Operations with no target (for example
    /// [`Operation::Open`] with no opening transport) do nothing.
    pub fn apply(&mut self, op: &Operation) {
        let event = match *op {
            Operation::SetRoom(room) => {
                Some(SupervisorEvent::RoomSet { room: room.as_str().to_string() })
            },
            Operation::Discover(room) => {
                Some(SupervisorEvent::RoomDiscovered { room: room.as_str().to_string() })
            },
            Operation::Reconnect => Some(SupervisorEvent::ReconnectRequested),
            Operation::Disconnect => Some(SupervisorEvent::DisconnectRequested),
            Operation::Grant => self
                .checks
                .pop_front()
                .map(|attempt| SupervisorEvent::PermissionResolved { attempt, granted: true }),
            Operation::Deny => self
                .checks
                .pop_front()
                .map(|attempt| SupervisorEvent::PermissionResolved { attempt, granted: false }),
            Operation::Open => self
                .newest(Some(Phase::Opening))
                .map(|transport| SupervisorEvent::TransportOpened { transport }),
            Operation::FailOpen => self.newest(Some(Phase::Opening)).map(|transport| {
                SupervisorEvent::OpenFailed { transport, reason: "refused".to_string() }
            }),
            Operation::Message(frame) => {
                let payload = frame.payload().to_string();
                self.newest(Some(Phase::Open))
                    .map(|transport| SupervisorEvent::TransportMessage { transport, payload })
            },
            Operation::Error => self.newest(None).map(|transport| {
                SupervisorEvent::TransportErrored { transport, reason: "reset".to_string() }
            }),
            Operation::Close { code } => self.newest(None).map(|transport| {
                let reason = "peer closed".to_string();
                SupervisorEvent::TransportClosed { transport, code, reason }
            }),
            Operation::Stale(pick) => self.stale_event(pick),
            Operation::Advance { millis } => {
                self.advance(Duration::from_millis(u64::from(millis)));
                None
            },
        };

        if let Some(event) = event {
            self.deliver(event);
        }
    }

    /// Deliver one event to the supervisor and execute what it asks for.
    pub fn deliver(&mut self, event: SupervisorEvent) {
        match &event {
            SupervisorEvent::TransportClosed { transport, .. }
            | SupervisorEvent::OpenFailed { transport, .. } => {
                self.attached.remove(transport);
            },
            SupervisorEvent::TransportOpened { transport } => {
                if let Some(phase) = self.attached.get_mut(transport) {
                    *phase = Phase::Open;
                }
            },
            SupervisorEvent::RetryFired { timer } => {
                self.armed.remove(timer);
            },
            _ => {},
        }

        let context = format!("after {event:?}");
        let actions = self.supervisor.handle(event);
        self.execute(actions);
        self.check_invariants(&context);
    }

    /// Advance virtual time, firing due timers in deadline order.
    pub fn advance(&mut self, by: Duration) {
        let target = self.env.now() + by;

        loop {
            let due = self
                .armed
                .iter()
                .filter(|(_, deadline)| **deadline <= target)
                .min_by_key(|(_, deadline)| **deadline)
                .map(|(timer, deadline)| (*timer, *deadline));
            let Some((timer, deadline)) = due else {
                break;
            };
            self.env.advance_to(deadline);
            self.deliver(SupervisorEvent::RetryFired { timer });
        }

        self.env.advance_to(target);
    }

    fn execute(&mut self, actions: Vec<SupervisorAction>) {
        for action in actions {
            self.trace.push(format!("{}ms {action}", self.now().as_millis()));
            match action {
                SupervisorAction::CheckPermission { attempt, .. } => self.checks.push_back(attempt),
                SupervisorAction::OpenTransport { transport, .. } => {
                    self.attached.insert(transport, Phase::Opening);
                    self.opens += 1;
                },
                SupervisorAction::CloseTransport { transport, .. } => {
                    self.attached.remove(&transport);
                    self.detached.push(transport);
                },
                SupervisorAction::ScheduleRetry { timer, delay } => {
                    self.armed.insert(timer, self.env.now() + delay);
                },
                SupervisorAction::CancelRetry { timer } => {
                    self.armed.remove(&timer);
                    self.cancelled.push(timer);
                },
            }
        }
    }

    fn newest(&self, phase: Option<Phase>) -> Option<TransportId> {
        self.attached
            .iter()
            .rev()
            .find(|(_, p)| phase.is_none_or(|want| **p == want))
            .map(|(transport, _)| *transport)
    }

    fn stale_event(&self, pick: StalePick) -> Option<SupervisorEvent> {
        if pick == StalePick::Timer {
            let timer = *self.cancelled.last()?;
            return Some(SupervisorEvent::RetryFired { timer });
        }

        let transport = *self.detached.last()?;
        Some(match pick {
            StalePick::Opened => SupervisorEvent::TransportOpened { transport },
            StalePick::Message => SupervisorEvent::TransportMessage {
                transport,
                payload: r#"{"type":"gesture","label":"stale","confidence":0.1}"#.to_string(),
            },
            StalePick::Errored => {
                SupervisorEvent::TransportErrored { transport, reason: "late".to_string() }
            },
            StalePick::Closed | StalePick::Timer => SupervisorEvent::TransportClosed {
                transport,
                code: None,
                reason: "late".to_string(),
            },
        })
    }

    /// Snapshot for invariant checking.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::capture(
            &self.supervisor,
            self.attached.keys().map(|t| t.0).collect(),
            self.armed.keys().map(|t| t.0).collect(),
        )
    }

    /// Run the registered invariants, if any.
    pub fn check_invariants(&self, context: &str) {
        if let Some(registry) = &self.invariants {
            registry.assert_all(&self.snapshot(), context);
        }
    }

    /// The supervisor under test.
    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Virtual time since start.
    pub fn now(&self) -> Duration {
        self.env.now().since_start()
    }

    /// Number of transports opened so far.
    pub fn opens(&self) -> usize {
        self.opens
    }

    /// Permission checks awaiting an answer.
    pub fn outstanding_checks(&self) -> usize {
        self.checks.len()
    }

    /// Every executed action, prefixed with its virtual timestamp.
    pub fn trace(&self) -> &[String] {
        &self.trace
    }

    /// Take the trace collected so far.
    pub fn take_trace(&mut self) -> Vec<String> {
        std::mem::take(&mut self.trace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{FramePick, RoomPick};

    fn driver(room: &str) -> SimDriver {
        let mut driver = SimDriver::new(SupervisorConfig::default(), room)
            .with_invariants(InvariantRegistry::standard());
        driver.start();
        driver
    }

    #[test]
    fn start_without_room_does_nothing() {
        let driver = driver("");
        assert!(driver.trace().is_empty());
        assert_eq!(driver.outstanding_checks(), 0);
    }

    #[test]
    fn grant_then_open_connects() {
        let mut driver = driver("lobby");
        driver.apply(&Operation::Grant);
        driver.apply(&Operation::Open);

        assert!(driver.supervisor().is_connected());
        assert_eq!(driver.opens(), 1);
    }

    #[test]
    fn retry_fires_at_deadline() {
        let mut driver = driver("lobby");
        driver.apply(&Operation::Deny);
        assert_eq!(driver.outstanding_checks(), 0);

        driver.advance(Duration::from_millis(999));
        assert_eq!(driver.outstanding_checks(), 0);

        driver.advance(Duration::from_millis(1));
        assert_eq!(driver.outstanding_checks(), 1);
        assert_eq!(driver.now(), Duration::from_secs(1));
    }

    #[test]
    fn stale_events_from_detached_transport_are_ignored() {
        let mut driver = driver("lobby");
        driver.apply(&Operation::Grant);
        driver.apply(&Operation::Open);
        driver.apply(&Operation::SetRoom(RoomPick::Kitchen));

        for pick in [StalePick::Opened, StalePick::Message, StalePick::Errored, StalePick::Closed] {
            driver.apply(&Operation::Stale(pick));
        }

        assert_eq!(driver.supervisor().room(), "kitchen");
        assert_eq!(driver.supervisor().gesture(), "");
        assert_eq!(driver.supervisor().state().name(), "awaiting-permission");
    }

    #[test]
    fn messages_only_reach_open_transports() {
        let mut driver = driver("lobby");
        driver.apply(&Operation::Grant);
        driver.apply(&Operation::Message(FramePick::Gesture));
        assert_eq!(driver.supervisor().gesture(), "");

        driver.apply(&Operation::Open);
        driver.apply(&Operation::Message(FramePick::Gesture));
        assert_eq!(driver.supervisor().gesture(), "wave");
    }
}
