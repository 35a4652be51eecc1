//! Roomlink core
//!
//! Sans-IO state machines for keeping a single room subscription alive on a
//! message stream and for interpreting the frames that arrive on it.
//!
//! # Architecture
//!
//! The [`Supervisor`] follows the action pattern: it receives
//! [`SupervisorEvent`]s (caller commands, permission results, transport
//! lifecycle notifications, retry timers), updates its explicit
//! [`SessionState`], and returns [`SupervisorAction`]s for a driver to execute.
//! It never performs I/O and never sleeps, so the same logic runs under the
//! tokio runtime in `roomlink-client` and under the deterministic simulation in
//! `roomlink-harness`.
//!
//! # Components
//!
//! - [`Supervisor`]: connect / back off / retry state machine
//! - [`interpreter`]: JSON frame decoding into [`Facts`]
//! - [`Backoff`]: saturating retry delay table
//! - [`address`]: transport and permission address construction
//! - [`env::Environment`]: time abstraction used by drivers

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod address;
pub mod backoff;
pub mod env;
pub mod error;
mod event;
pub mod facts;
pub mod interpreter;
mod supervisor;

pub use address::{DEFAULT_TRANSPORT_BASE, PermissionScheme};
pub use backoff::{Backoff, DEFAULT_BACKOFF_TABLE};
pub use error::AddressError;
pub use event::{AttemptId, CLOSE_NORMAL, SupervisorAction, SupervisorEvent, TimerId, TransportId};
pub use facts::Facts;
pub use interpreter::{IgnoreReason, Interpretation};
pub use supervisor::{SessionState, Supervisor, SupervisorConfig};
