//! Deterministic simulation harness for Roomlink.
//!
//! Drives the sans-IO [`roomlink_core::Supervisor`] with a virtual clock and
//! scripted collaborators, so any interleaving of caller commands, permission
//! answers, transport events and timer firings can be replayed exactly.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks behavioral properties after every event:
//! at most one live transport, at most one pending retry, never both, and a
//! session at rest holds nothing. Use [`InvariantRegistry::standard()`].
//!
//! # Operations
//!
//! [`Operation`] is the alphabet of everything that can happen to a session.
//! It derives `Arbitrary` for fuzzing; [`scenario`] turns seeds into
//! reproducible random walks.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod operation;
pub mod scenario;
pub mod sim_driver;
pub mod sim_env;

pub use invariants::{
    ConnectedImpliesOpen, FiniteFacts, IdleHasNoResources, Invariant, InvariantRegistry,
    InvariantResult, NoTransportDuringBackoff, SessionSnapshot, SingleLiveTransport,
    SinglePendingRetry, Violation,
};
pub use operation::{FramePick, Operation, RoomPick, StalePick};
pub use sim_driver::SimDriver;
pub use sim_env::{SimEnv, SimInstant};
