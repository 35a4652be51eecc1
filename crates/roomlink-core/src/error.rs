//! Error types for the Roomlink core.
//!
//! The supervisor itself never fails: every failure degrades to
//! `connected = false` plus a scheduled retry. The only typed error in the core
//! is [`AddressError`], produced while turning a transport base into a
//! per-room address, which the supervisor consumes to decide between the
//! configured base and the compiled-in default.

use thiserror::Error;

/// Errors building a transport address from a base and a room.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// The base could not be parsed as a URL
    #[error("malformed transport base {base:?}: {reason}")]
    Malformed {
        /// Base that failed to parse
        base: String,
        /// Parser diagnostic
        reason: String,
    },

    /// The base parsed but does not use a stream scheme
    #[error("unsupported transport scheme {scheme:?} (expected ws or wss)")]
    UnsupportedScheme {
        /// Scheme found in the base
        scheme: String,
    },

    /// The base has no host to connect to
    #[error("transport base {base:?} has no host")]
    MissingHost {
        /// Base without a host
        base: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_input() {
        let err = AddressError::UnsupportedScheme { scheme: "http".to_string() };
        assert_eq!(err.to_string(), "unsupported transport scheme \"http\" (expected ws or wss)");

        let err = AddressError::MissingHost { base: "ws:".to_string() };
        assert!(err.to_string().contains("ws:"));
    }
}
