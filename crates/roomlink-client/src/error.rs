//! Client error types.
//!
//! None of these reach a caller of a room command: transport and permission
//! failures degrade to `connected = false` and a retry. [`ClientError`] only
//! reports that the runtime task has gone away.

use thiserror::Error;

/// Errors returned by [`crate::RoomHandle`] commands.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The runtime task has exited; commands can no longer be delivered.
    #[error("room runtime has stopped")]
    RuntimeStopped,
}

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The address was rejected before any I/O.
    #[error("invalid transport address: {0}")]
    InvalidAddress(String),

    /// Opening could not begin, e.g. outside a tokio runtime.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Close could not be requested: the handle was already closed or its
    /// socket task had ended.
    #[error("close failed: {0}")]
    Close(String),
}

/// Permission collaborator errors. Treated exactly like a denial.
#[derive(Debug, Error)]
pub enum PermissionError {
    /// The address could not be understood.
    #[error("cannot check permission for {address:?}: {reason}")]
    InvalidAddress {
        /// Address that was checked.
        address: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The collaborator could not answer.
    #[error("permission check unavailable: {0}")]
    Unavailable(String),
}

/// Room discovery errors.
#[derive(Debug, Error)]
pub enum RoomSourceError {
    /// Reading the probe failed.
    #[error("room probe failed: {0}")]
    Io(#[from] std::io::Error),

    /// An environment variable held something other than UTF-8.
    #[error("environment variable {0} is not valid unicode")]
    NotUnicode(String),
}
