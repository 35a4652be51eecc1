//! Observable state snapshots for invariant checking.
//!
//! A snapshot combines what the supervisor reports about itself with what the
//! driver saw happen in the action stream. Invariants compare the two, so a
//! supervisor that forgets to close a transport or cancel a timer is caught
//! even if its own state looks tidy.

use roomlink_core::Supervisor;

/// Observable state of one supervised session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    /// Supervisor state name.
    pub state: &'static str,
    /// Current room.
    pub room: String,
    /// Whether the facts say a transport is open.
    pub connected: bool,
    /// Last gesture label.
    pub label: String,
    /// Last gesture confidence, unrounded.
    pub confidence: f64,
    /// Last subscriber count.
    pub subscriber_count: f64,
    /// Transport the supervisor considers live.
    pub live_transport: Option<u64>,
    /// Timer the supervisor considers pending.
    pub pending_retry: Option<u64>,
    /// Transports opened by the driver and not yet closed by either side.
    pub attached_transports: Vec<u64>,
    /// Timers scheduled by the driver and not yet fired or cancelled.
    pub armed_timers: Vec<u64>,
    /// Position in the backoff table.
    pub backoff_index: usize,
}

impl SessionSnapshot {
    /// Capture the supervisor's view, paired with the driver's.
    pub fn capture(
        supervisor: &Supervisor,
        attached_transports: Vec<u64>,
        armed_timers: Vec<u64>,
    ) -> Self {
        let facts = supervisor.facts();
        Self {
            state: supervisor.state().name(),
            room: supervisor.room().to_string(),
            connected: facts.connected,
            label: facts.label.clone(),
            confidence: facts.confidence,
            subscriber_count: facts.subscriber_count,
            live_transport: supervisor.live_transport().map(|t| t.0),
            pending_retry: supervisor.pending_retry().map(|t| t.0),
            attached_transports,
            armed_timers,
            backoff_index: supervisor.backoff().index(),
        }
    }

    /// Whether the session has stopped trying to connect.
    pub fn is_at_rest(&self) -> bool {
        matches!(self.state, "idle" | "disconnected")
    }
}
