//! Session invariants.
//!
//! Each [`Invariant`] inspects a [`SessionSnapshot`] and reports a
//! [`Violation`] when the supervisor and the resources the driver saw it
//! create disagree. [`SimDriver`](crate::SimDriver) runs its registry after
//! every delivered event.
//!
//! # Usage
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! registry.assert_all(&driver.snapshot(), "after grant");
//! ```

mod checks;
mod snapshot;

pub use checks::{
    ConnectedImpliesOpen, FiniteFacts, IdleHasNoResources, NoTransportDuringBackoff,
    SingleLiveTransport, SinglePendingRetry,
};
pub use snapshot::SessionSnapshot;

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// A broken invariant.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Which invariant.
    pub invariant: &'static str,
    /// What the snapshot showed.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// An invariant that can be checked against a session snapshot.
pub trait Invariant: Send + Sync {
    /// Stable name, used in violation reports.
    fn name(&self) -> &'static str;

    /// Check one snapshot.
    fn check(&self, state: &SessionSnapshot) -> InvariantResult;
}

/// Set of invariants run together.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Create a registry with every standard invariant.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(SingleLiveTransport);
        registry.add(SinglePendingRetry);
        registry.add(NoTransportDuringBackoff);
        registry.add(ConnectedImpliesOpen);
        registry.add(IdleHasNoResources);
        registry.add(FiniteFacts);
        registry
    }

    /// Add an invariant to the registry.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Check all invariants, collecting every violation.
    pub fn check_all(&self, state: &SessionSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Check all invariants, panicking with every violation found.
    #[allow(clippy::panic)]
    pub fn assert_all(&self, state: &SessionSnapshot, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
            let messages = messages.join("\n  ");
            panic!("Invariant violation {context}:\n  {messages}\n  state: {state:?}");
        }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_has_invariants() {
        let registry = InvariantRegistry::standard();
        assert_eq!(registry.len(), 6);
    }

    #[test]
    fn fresh_session_passes_invariants() {
        let registry = InvariantRegistry::standard();
        let snapshot = SessionSnapshot { state: "idle", ..SessionSnapshot::default() };
        assert!(registry.check_all(&snapshot).is_ok());
    }

    #[test]
    fn check_all_reports_every_violation() {
        let registry = InvariantRegistry::standard();
        let snapshot = SessionSnapshot {
            state: "idle",
            connected: true,
            subscriber_count: f64::INFINITY,
            ..SessionSnapshot::default()
        };

        let names: Vec<_> =
            registry.check_all(&snapshot).unwrap_err().iter().map(|v| v.invariant).collect();
        assert_eq!(names, ["connected_implies_open", "idle_has_no_resources", "finite_facts"]);
    }
}
