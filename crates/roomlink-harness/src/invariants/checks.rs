//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold.
//! They verify WHAT must be true, not specific test scenarios.

use super::{Invariant, InvariantResult, SessionSnapshot, Violation};

/// At most one transport is attached, and it is the one the supervisor
/// considers live.
pub struct SingleLiveTransport;

impl Invariant for SingleLiveTransport {
    fn name(&self) -> &'static str {
        "single_live_transport"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        let attached = state.attached_transports.first().copied();
        if state.attached_transports.len() > 1 || attached != state.live_transport {
            return Err(Violation {
                invariant: self.name(),
                message: format!(
                    "attached transports {:?}, supervisor live transport {:?}",
                    state.attached_transports, state.live_transport
                ),
            });
        }
        Ok(())
    }
}

/// At most one retry timer is armed, and it is the one the supervisor
/// considers pending.
pub struct SinglePendingRetry;

impl Invariant for SinglePendingRetry {
    fn name(&self) -> &'static str {
        "single_pending_retry"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        let armed = state.armed_timers.first().copied();
        if state.armed_timers.len() > 1 || armed != state.pending_retry {
            return Err(Violation {
                invariant: self.name(),
                message: format!(
                    "armed timers {:?}, supervisor pending retry {:?}",
                    state.armed_timers, state.pending_retry
                ),
            });
        }
        Ok(())
    }
}

/// A transport and a retry timer never coexist.
pub struct NoTransportDuringBackoff;

impl Invariant for NoTransportDuringBackoff {
    fn name(&self) -> &'static str {
        "no_transport_during_backoff"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        if !state.attached_transports.is_empty() && !state.armed_timers.is_empty() {
            return Err(Violation {
                invariant: self.name(),
                message: format!(
                    "transports {:?} attached while timers {:?} armed",
                    state.attached_transports, state.armed_timers
                ),
            });
        }
        Ok(())
    }
}

/// `connected` implies an open, attached transport.
pub struct ConnectedImpliesOpen;

impl Invariant for ConnectedImpliesOpen {
    fn name(&self) -> &'static str {
        "connected_implies_open"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        if state.connected && (state.state != "open" || state.attached_transports.is_empty()) {
            return Err(Violation {
                invariant: self.name(),
                message: format!(
                    "connected in state {} with transports {:?}",
                    state.state, state.attached_transports
                ),
            });
        }
        Ok(())
    }
}

/// A session at rest holds nothing and reports nothing live.
pub struct IdleHasNoResources;

impl Invariant for IdleHasNoResources {
    fn name(&self) -> &'static str {
        "idle_has_no_resources"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        if state.is_at_rest()
            && (state.connected
                || !state.attached_transports.is_empty()
                || !state.armed_timers.is_empty())
        {
            return Err(Violation {
                invariant: self.name(),
                message: format!(
                    "{} but connected={} transports={:?} timers={:?}",
                    state.state, state.connected, state.attached_transports, state.armed_timers
                ),
            });
        }
        if state.room.is_empty() && state.state != "idle" {
            return Err(Violation {
                invariant: self.name(),
                message: format!("no room but state {}", state.state),
            });
        }
        Ok(())
    }
}

/// Numeric facts are always finite.
pub struct FiniteFacts;

impl Invariant for FiniteFacts {
    fn name(&self) -> &'static str {
        "finite_facts"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        if !state.confidence.is_finite() || !state.subscriber_count.is_finite() {
            return Err(Violation {
                invariant: self.name(),
                message: format!(
                    "confidence={} subscriber_count={}",
                    state.confidence, state.subscriber_count
                ),
            });
        }
        Ok(())
    }
}
