//! Client configuration.

use std::time::Duration;

use roomlink_core::{Backoff, PermissionScheme, SupervisorConfig, address};

/// Default capacity of the runtime's command and event channels.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Runtime configuration.
///
/// Everything here is read once, when the runtime is built.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Room to connect to at startup. `None` or blank waits for a command or
    /// for room discovery.
    pub room: Option<String>,
    /// Stream endpoint template. `None` or unusable falls back to
    /// [`address::DEFAULT_TRANSPORT_BASE`].
    pub transport_base: Option<String>,
    /// How addresses are presented to the permission gate.
    pub permission_scheme: PermissionScheme,
    /// Retry delays. Empty selects the default table.
    pub backoff_table: Vec<Duration>,
    /// Capacity of the internal channels.
    pub event_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            room: None,
            transport_base: None,
            permission_scheme: PermissionScheme::default(),
            backoff_table: Vec::new(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl ClientConfig {
    /// Config for a fixed room on the default endpoint.
    pub fn for_room(room: impl Into<String>) -> Self {
        Self { room: Some(room.into()), ..Self::default() }
    }

    /// Set the stream endpoint template.
    #[must_use]
    pub fn with_transport_base(mut self, base: impl Into<String>) -> Self {
        self.transport_base = Some(base.into());
        self
    }

    /// Set the retry delays.
    #[must_use]
    pub fn with_backoff_table(mut self, table: Vec<Duration>) -> Self {
        self.backoff_table = table;
        self
    }

    /// Initial room, trimmed. Blank counts as absent.
    pub fn initial_room(&self) -> &str {
        self.room.as_deref().map(str::trim).unwrap_or_default()
    }

    /// Derive the supervisor's configuration.
    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            transport_base: address::normalize_base(self.transport_base.as_deref()),
            permission_scheme: self.permission_scheme,
            backoff: Backoff::new(self.backoff_table.clone()),
        }
    }

    /// Channel capacity, never zero.
    pub(crate) fn channel_capacity(&self) -> usize {
        self.event_capacity.max(1)
    }
}
