//! Operations for interleaving tests.
//!
//! Operations are everything the outside world can do to a supervised session:
//! caller commands, collaborator answers, transport lifecycle events, stale
//! deliveries and the passage of time. They are generated by proptest, by
//! cargo-fuzz (via [`Arbitrary`]) and by seeded random walks, and applied by
//! [`crate::SimDriver`].

use arbitrary::Arbitrary;

/// Rooms used by generated operations. A small set keeps same-room and
/// switch-room paths both likely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum RoomPick {
    /// Blank: clears the room.
    Empty,
    /// `"lobby"`.
    Lobby,
    /// `"kitchen"`.
    Kitchen,
    /// `"lobby"` with surrounding whitespace.
    PaddedLobby,
}

impl RoomPick {
    /// The room string as a caller would pass it.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "  ",
            Self::Lobby => "lobby",
            Self::Kitchen => "kitchen",
            Self::PaddedLobby => "  lobby ",
        }
    }
}

/// Frames a transport may deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum FramePick {
    /// Well-formed gesture frame.
    Gesture,
    /// Gesture frame with a string confidence and non-string label.
    LooseGesture,
    /// Well-formed presence frame.
    Presence,
    /// Presence frame with an uncoercible count.
    BadPresence,
    /// Object of an unknown kind.
    Unknown,
    /// Not JSON.
    Garbage,
}

impl FramePick {
    /// The frame payload.
    pub fn payload(self) -> &'static str {
        match self {
            Self::Gesture => r#"{"type":"gesture","label":"wave","confidence":0.871}"#,
            Self::LooseGesture => r#"{"type":"gesture","label":7,"confidence":" 0.5 "}"#,
            Self::Presence => r#"{"type":"presence","subscribers":3}"#,
            Self::BadPresence => r#"{"type":"presence","subscribers":"lots"}"#,
            Self::Unknown => r#"{"type":"telemetry","cpu":0.2}"#,
            Self::Garbage => "{not json",
        }
    }
}

/// Events delivered for something the supervisor already let go of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum StalePick {
    /// A detached transport reports it opened.
    Opened,
    /// A detached transport delivers a gesture frame.
    Message,
    /// A detached transport reports an error.
    Errored,
    /// A detached transport reports it closed.
    Closed,
    /// A cancelled timer fires anyway.
    Timer,
}

/// One step applied to a simulated session.
#[derive(Debug, Clone, PartialEq, Eq, Arbitrary)]
pub enum Operation {
    /// Caller sets the room.
    SetRoom(RoomPick),
    /// A room source reports a room.
    Discover(RoomPick),
    /// Caller forces a reconnect.
    Reconnect,
    /// Caller disconnects.
    Disconnect,
    /// Oldest outstanding permission check is granted.
    Grant,
    /// Oldest outstanding permission check is denied.
    Deny,
    /// Newest attached transport completes its handshake.
    Open,
    /// Newest attached transport, still opening, fails to open.
    FailOpen,
    /// Newest attached transport delivers a frame.
    Message(FramePick),
    /// Newest attached transport errors.
    Error,
    /// Newest attached transport closes.
    Close {
        /// Close code reported by the peer.
        code: Option<u16>,
    },
    /// A stale event arrives.
    Stale(StalePick),
    /// Virtual time passes, firing due timers.
    Advance {
        /// How far to advance.
        millis: u16,
    },
}
