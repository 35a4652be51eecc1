//! Room subscription supervisor.
//!
//! Keeps exactly one logical subscription alive: asks for permission, opens
//! the transport, feeds frames to the interpreter, and backs off and retries
//! whenever the transport goes away, until told to stop.
//!
//! # State Machine
//!
//! ```text
//!                 RoomSet / Reconnect / RetryFired
//!   ┌──────┐   ┌─────────────────────┐  granted   ┌─────────────┐  Opened  ┌──────┐
//!   │ Idle │──>│ AwaitingPermission  │───────────>│ Handshaking │─────────>│ Open │
//!   └──────┘   └─────────────────────┘            └─────────────┘          └──────┘
//!                  │ denied / bad address             │ OpenFailed / Closed   │ Errored
//!                  ↓                                  ↓                       ↓
//!              ┌─────────┐ <──────────────────────────┘  Closed  ┌─────────┐
//!              │ Backoff │ <─────────────────────────────────────│ Faulted │
//!              └─────────┘                                       └─────────┘
//!
//!   DisconnectRequested (any state) ──> Disconnected
//!   RoomSet("")         (any state) ──> Idle
//! ```
//!
//! Resources are carried by the state itself: a live transport exists only in
//! `Handshaking`, `Open` and `Faulted`, a pending retry only in `Backoff`, so
//! "two transports" or "a transport and a timer" cannot be represented.
//! Every asynchronous result carries the id it was issued with; a result whose
//! id no longer matches the state is stale and dropped.

use crate::{
    address::{self, PermissionScheme},
    backoff::Backoff,
    event::{AttemptId, CLOSE_NORMAL, SupervisorAction, SupervisorEvent, TimerId, TransportId},
    facts::Facts,
    interpreter::{self, Interpretation},
};

const REASON_ROOM_CLEARED: &str = "room cleared";
const REASON_SWITCHING_ROOM: &str = "switching room";
const REASON_RECONNECT: &str = "reconnect requested";
const REASON_MANUAL: &str = "manual disconnect";

/// Supervisor configuration.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Stream endpoint template. Validated at construction; an unusable base
    /// is replaced by [`address::DEFAULT_TRANSPORT_BASE`].
    pub transport_base: String,
    /// How addresses are presented to the permission collaborator.
    pub permission_scheme: PermissionScheme,
    /// Retry delays.
    pub backoff: Backoff,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            transport_base: address::DEFAULT_TRANSPORT_BASE.to_string(),
            permission_scheme: PermissionScheme::default(),
            backoff: Backoff::default(),
        }
    }
}

/// Session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No room, or not started. No intent to connect.
    Idle,
    /// Waiting for the permission collaborator.
    AwaitingPermission {
        /// Outstanding request.
        attempt: AttemptId,
        /// Stream address to open once granted.
        address: String,
    },
    /// Transport opening, handshake not complete.
    Handshaking {
        /// Live transport.
        transport: TransportId,
    },
    /// Transport open; `connected` is true.
    Open {
        /// Live transport.
        transport: TransportId,
    },
    /// Transport reported an error and is expected to close.
    Faulted {
        /// Live transport.
        transport: TransportId,
    },
    /// Waiting for the retry timer.
    Backoff {
        /// Pending timer.
        timer: TimerId,
    },
    /// Stopped by the caller. The room is remembered for display.
    Disconnected,
}

impl SessionState {
    /// Short state name for logs and snapshots.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingPermission { .. } => "awaiting-permission",
            Self::Handshaking { .. } => "handshaking",
            Self::Open { .. } => "open",
            Self::Faulted { .. } => "faulted",
            Self::Backoff { .. } => "backoff",
            Self::Disconnected => "disconnected",
        }
    }
}

/// Room subscription state machine.
///
/// Pure: no I/O, no clocks. Feed it [`SupervisorEvent`]s and execute the
/// returned [`SupervisorAction`]s.
#[derive(Debug, Clone)]
pub struct Supervisor {
    state: SessionState,
    room: String,
    transport_base: String,
    permission_scheme: PermissionScheme,
    backoff: Backoff,
    facts: Facts,
    /// Set once the caller issues any command; discovered rooms are then
    /// ignored.
    caller_took_over: bool,
    next_id: u64,
}

impl Supervisor {
    /// Create a supervisor in [`SessionState::Idle`].
    ///
    /// `initial_room` is trimmed; call [`Supervisor::start`] to begin
    /// connecting to it.
    pub fn new(config: SupervisorConfig, initial_room: &str) -> Self {
        Self {
            state: SessionState::Idle,
            room: initial_room.trim().to_string(),
            transport_base: address::normalize_base(Some(&config.transport_base)),
            permission_scheme: config.permission_scheme,
            backoff: config.backoff,
            facts: Facts::default(),
            caller_took_over: false,
            next_id: 1,
        }
    }

    /// Begin connecting to the initial room, if there is one.
    pub fn start(&mut self) -> Vec<SupervisorAction> {
        let mut actions = Vec::new();
        if self.state == SessionState::Idle && !self.room.is_empty() {
            self.begin_attempt(&mut actions);
        }
        actions
    }

    /// Current state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Current room (empty when none).
    pub fn room(&self) -> &str {
        &self.room
    }

    /// Whether a transport is open.
    pub fn is_connected(&self) -> bool {
        self.facts.connected
    }

    /// Last classification label.
    pub fn gesture(&self) -> &str {
        &self.facts.label
    }

    /// Last confidence, rounded to two decimal places.
    pub fn confidence(&self) -> f64 {
        self.facts.reported_confidence()
    }

    /// Last subscriber count.
    pub fn subscriber_count(&self) -> f64 {
        self.facts.subscriber_count
    }

    /// All facts.
    pub fn facts(&self) -> &Facts {
        &self.facts
    }

    /// Validated transport base in use.
    pub fn transport_base(&self) -> &str {
        &self.transport_base
    }

    /// Retry delay cursor.
    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// The live transport, if any.
    pub fn live_transport(&self) -> Option<TransportId> {
        match self.state {
            SessionState::Handshaking { transport }
            | SessionState::Open { transport }
            | SessionState::Faulted { transport } => Some(transport),
            _ => None,
        }
    }

    /// The pending retry timer, if any.
    pub fn pending_retry(&self) -> Option<TimerId> {
        match self.state {
            SessionState::Backoff { timer } => Some(timer),
            _ => None,
        }
    }

    /// Whether the supervisor intends to keep a connection up.
    pub fn wants_connection(&self) -> bool {
        !matches!(self.state, SessionState::Idle | SessionState::Disconnected)
    }

    /// Set the room. See [`SupervisorEvent::RoomSet`].
    pub fn set_room(&mut self, room: &str) -> Vec<SupervisorAction> {
        self.handle(SupervisorEvent::RoomSet { room: room.to_string() })
    }

    /// Force a fresh connect cycle. See [`SupervisorEvent::ReconnectRequested`].
    pub fn reconnect(&mut self) -> Vec<SupervisorAction> {
        self.handle(SupervisorEvent::ReconnectRequested)
    }

    /// Stop. See [`SupervisorEvent::DisconnectRequested`].
    pub fn disconnect(&mut self) -> Vec<SupervisorAction> {
        self.handle(SupervisorEvent::DisconnectRequested)
    }

    /// Process one event.
    pub fn handle(&mut self, event: SupervisorEvent) -> Vec<SupervisorAction> {
        let mut actions = Vec::new();
        let before = self.state.name();

        match event {
            SupervisorEvent::RoomSet { room } => {
                self.caller_took_over = true;
                self.apply_room(room.trim(), &mut actions);
            },
            SupervisorEvent::RoomDiscovered { room } => {
                let room = room.trim();
                if self.caller_took_over {
                    tracing::debug!("Ignoring discovered room {room:?}: caller already chose");
                } else if !room.is_empty() {
                    self.apply_room(room, &mut actions);
                }
            },
            SupervisorEvent::ReconnectRequested => {
                self.caller_took_over = true;
                self.on_reconnect(&mut actions);
            },
            SupervisorEvent::DisconnectRequested => {
                self.caller_took_over = true;
                self.release(REASON_MANUAL, &mut actions);
                self.facts.connected = false;
                self.state = if self.room.is_empty() {
                    SessionState::Idle
                } else {
                    SessionState::Disconnected
                };
            },
            SupervisorEvent::PermissionResolved { attempt, granted } => {
                self.on_permission(attempt, granted, &mut actions);
            },
            SupervisorEvent::OpenFailed { transport, reason } => {
                if self.state == (SessionState::Handshaking { transport }) {
                    tracing::warn!("Failed to open {transport}: {reason}");
                    self.fail_attempt(&mut actions);
                }
            },
            SupervisorEvent::TransportOpened { transport } => {
                if self.state == (SessionState::Handshaking { transport }) {
                    tracing::info!("Connected to room {:?} on {transport}", self.room);
                    self.state = SessionState::Open { transport };
                    self.facts.connected = true;
                    self.backoff.reset();
                }
            },
            SupervisorEvent::TransportMessage { transport, payload } => {
                if self.live_transport() == Some(transport) {
                    let outcome = interpreter::interpret(&payload, &mut self.facts);
                    if let Interpretation::Ignored(reason) = outcome {
                        tracing::debug!("Ignored frame on {transport}: {reason:?}");
                    }
                }
            },
            SupervisorEvent::TransportErrored { transport, reason } => {
                if self.live_transport() == Some(transport) {
                    tracing::warn!("Transport {transport} errored: {reason}");
                    self.facts.connected = false;
                    self.state = SessionState::Faulted { transport };
                }
            },
            SupervisorEvent::TransportClosed { transport, code, reason } => {
                if self.live_transport() == Some(transport) {
                    tracing::info!("Transport {transport} closed (code {code:?}): {reason}");
                    self.facts.connected = false;
                    self.schedule_retry(&mut actions);
                }
            },
            SupervisorEvent::RetryFired { timer } => {
                if self.pending_retry() == Some(timer) {
                    self.begin_attempt(&mut actions);
                } else {
                    tracing::debug!("Ignoring stale {timer}");
                }
            },
        }

        let after = self.state.name();
        if before != after {
            tracing::debug!("Supervisor {before} -> {after}");
        }

        actions
    }

    fn apply_room(&mut self, room: &str, actions: &mut Vec<SupervisorAction>) {
        if room.is_empty() {
            self.room.clear();
            self.release(REASON_ROOM_CLEARED, actions);
            self.facts.connected = false;
            self.state = SessionState::Idle;
            return;
        }

        if room == self.room && self.live_transport().is_some() {
            tracing::debug!("Room {room:?} already live");
            return;
        }

        tracing::info!("Switching to room {room:?}");
        room.clone_into(&mut self.room);
        self.facts.reset();
        self.backoff.reset();
        self.release(REASON_SWITCHING_ROOM, actions);
        self.begin_attempt(actions);
    }

    fn on_reconnect(&mut self, actions: &mut Vec<SupervisorAction>) {
        if self.room.is_empty() {
            self.facts.connected = false;
            return;
        }

        self.backoff.reset();
        self.release(REASON_RECONNECT, actions);
        self.facts.connected = false;
        self.begin_attempt(actions);
    }

    fn on_permission(
        &mut self,
        attempt: AttemptId,
        granted: bool,
        actions: &mut Vec<SupervisorAction>,
    ) {
        let address = match &self.state {
            SessionState::AwaitingPermission { attempt: current, address }
                if *current == attempt =>
            {
                address.clone()
            },
            _ => {
                tracing::debug!("Ignoring stale permission result for {attempt}");
                return;
            },
        };

        if !granted {
            tracing::warn!("Permission denied for {address}");
            self.fail_attempt(actions);
            return;
        }

        let transport = TransportId(self.allocate_id());
        self.state = SessionState::Handshaking { transport };
        actions.push(SupervisorAction::OpenTransport { transport, address });
    }

    /// Steps 1-3 of the connect sequence: guard, build the address, ask for
    /// permission.
    fn begin_attempt(&mut self, actions: &mut Vec<SupervisorAction>) {
        if self.room.is_empty() {
            self.state = SessionState::Idle;
            return;
        }

        match address::room_address_with_fallback(&self.transport_base, &self.room) {
            Ok(url) => {
                let attempt = AttemptId(self.allocate_id());
                let permission = address::permission_address(&url, self.permission_scheme);
                self.state = SessionState::AwaitingPermission { attempt, address: url.to_string() };
                actions.push(SupervisorAction::CheckPermission { attempt, address: permission });
            },
            Err(e) => {
                tracing::warn!("Cannot build transport address: {e}");
                self.facts.connected = false;
                self.enter_backoff(actions);
            },
        }
    }

    fn fail_attempt(&mut self, actions: &mut Vec<SupervisorAction>) {
        self.facts.connected = false;
        self.schedule_retry(actions);
    }

    /// Move to `Backoff` with a fresh timer. The caller has already left any
    /// state holding a transport or timer.
    fn schedule_retry(&mut self, actions: &mut Vec<SupervisorAction>) {
        if self.room.is_empty() || !self.wants_connection() {
            return;
        }
        if let Some(timer) = self.pending_retry() {
            tracing::debug!("Retry already pending ({timer})");
            return;
        }

        self.enter_backoff(actions);
    }

    fn enter_backoff(&mut self, actions: &mut Vec<SupervisorAction>) {
        let delay = self.backoff.next_delay();
        let timer = TimerId(self.allocate_id());
        tracing::info!("Retrying room {:?} in {delay:?}", self.room);
        self.state = SessionState::Backoff { timer };
        actions.push(SupervisorAction::ScheduleRetry { timer, delay });
    }

    /// Cancel any pending retry and detach/close any live transport, leaving
    /// the state `Idle`. Callers choose the next state.
    fn release(&mut self, reason: &str, actions: &mut Vec<SupervisorAction>) {
        if let Some(timer) = self.pending_retry() {
            actions.push(SupervisorAction::CancelRetry { timer });
        }
        if let Some(transport) = self.live_transport() {
            actions.push(SupervisorAction::CloseTransport {
                transport,
                code: CLOSE_NORMAL,
                reason: reason.to_string(),
            });
        }
        self.state = SessionState::Idle;
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}
