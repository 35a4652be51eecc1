//! Supervisor events and actions.

use std::{fmt, time::Duration};

/// WebSocket close code for a normal, intentional closure.
pub const CLOSE_NORMAL: u16 = 1000;

macro_rules! tag {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

tag!(
    /// Identifies one permission request. Results for any other attempt are
    /// stale.
    AttemptId,
    "attempt"
);

tag!(
    /// Identifies one transport. Events tagged with a detached transport are
    /// stale.
    TransportId,
    "transport"
);

tag!(
    /// Identifies one scheduled retry. Firings of a cancelled timer are stale.
    TimerId,
    "timer"
);

/// Inputs to the [`crate::Supervisor`].
///
/// The driver is responsible for:
/// - Forwarding caller commands
/// - Posting the results of the actions it executed, tagged with the ids the
///   supervisor handed out
#[derive(Debug, Clone, PartialEq)]
pub enum SupervisorEvent {
    /// Caller set the room. Empty (after trimming) clears it.
    RoomSet {
        /// Requested room, untrimmed.
        room: String,
    },

    /// A room source discovered a room on the caller's behalf.
    ///
    /// Ignored once the caller has issued any explicit command.
    RoomDiscovered {
        /// Discovered room, untrimmed.
        room: String,
    },

    /// Caller forced a fresh connect cycle.
    ReconnectRequested,

    /// Caller asked to stop and stay stopped.
    DisconnectRequested,

    /// The permission collaborator answered.
    PermissionResolved {
        /// Attempt this answer belongs to.
        attempt: AttemptId,
        /// Whether the address may be reached. Errors count as `false`.
        granted: bool,
    },

    /// The driver could not even start opening the transport.
    OpenFailed {
        /// Transport that failed to open.
        transport: TransportId,
        /// Diagnostic.
        reason: String,
    },

    /// Handshake completed.
    TransportOpened {
        /// Transport that opened.
        transport: TransportId,
    },

    /// A text frame arrived.
    TransportMessage {
        /// Transport the frame arrived on.
        transport: TransportId,
        /// Frame payload.
        payload: String,
    },

    /// The transport reported an error. A close always follows.
    TransportErrored {
        /// Transport that errored.
        transport: TransportId,
        /// Diagnostic.
        reason: String,
    },

    /// The transport closed.
    TransportClosed {
        /// Transport that closed.
        transport: TransportId,
        /// Close code, if the peer sent one.
        code: Option<u16>,
        /// Close reason or diagnostic.
        reason: String,
    },

    /// A scheduled retry timer elapsed.
    RetryFired {
        /// Timer that elapsed.
        timer: TimerId,
    },
}

/// Actions returned by the supervisor.
///
/// The driver executes these in order:
/// - `CheckPermission`: ask the permission collaborator, then post
///   [`SupervisorEvent::PermissionResolved`]
/// - `OpenTransport`: open a connection and post its lifecycle events
/// - `CloseTransport`: detach and gracefully close a connection, swallowing
///   close errors
/// - `ScheduleRetry` / `CancelRetry`: manage the single retry timer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorAction {
    /// Ask whether `address` may be reached.
    CheckPermission {
        /// Tag for the answer.
        attempt: AttemptId,
        /// Address in the permission collaborator's scheme.
        address: String,
    },

    /// Open a transport to `address`.
    OpenTransport {
        /// Tag for the transport's events.
        transport: TransportId,
        /// Stream address including the room parameter.
        address: String,
    },

    /// Close a transport. Its later events will be ignored.
    CloseTransport {
        /// Transport to close.
        transport: TransportId,
        /// Close code sent to the peer.
        code: u16,
        /// Close reason sent to the peer.
        reason: String,
    },

    /// Fire [`SupervisorEvent::RetryFired`] after `delay`.
    ScheduleRetry {
        /// Tag for the firing.
        timer: TimerId,
        /// How long to wait.
        delay: Duration,
    },

    /// Drop a scheduled retry.
    CancelRetry {
        /// Timer to cancel.
        timer: TimerId,
    },
}

impl fmt::Display for SupervisorAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CheckPermission { attempt, address } => {
                write!(f, "check-permission {attempt} {address}")
            },
            Self::OpenTransport { transport, address } => {
                write!(f, "open {transport} {address}")
            },
            Self::CloseTransport { transport, code, reason } => {
                write!(f, "close {transport} {code} {reason:?}")
            },
            Self::ScheduleRetry { timer, delay } => {
                write!(f, "schedule-retry {timer} {}ms", delay.as_millis())
            },
            Self::CancelRetry { timer } => write!(f, "cancel-retry {timer}"),
        }
    }
}
