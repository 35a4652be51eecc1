//! Caller-facing handle to a running room runtime.

use roomlink_core::Facts;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};

use crate::error::ClientError;

/// Commands from a [`RoomHandle`] to the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    SetRoom(String),
    Reconnect,
    Disconnect,
    Shutdown,
}

/// A command and the acknowledgement the runtime sends once the resulting
/// status has been published.
pub(crate) type Request = (Command, oneshot::Sender<()>);

/// Observable state published after every processed event.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RoomStatus {
    /// Current room, empty when none.
    pub room: String,
    /// Supervisor state name.
    pub state: &'static str,
    /// Last-known facts.
    pub facts: Facts,
}

/// Cloneable handle for commanding and polling a room runtime.
///
/// Commands are applied in order, and each one returns only after the
/// runtime has processed it and published the resulting status, so getters
/// called right afterwards already reflect it. Getters never block.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    commands: mpsc::Sender<Request>,
    status: watch::Receiver<RoomStatus>,
}

impl RoomHandle {
    pub(crate) fn new(
        commands: mpsc::Sender<Request>,
        status: watch::Receiver<RoomStatus>,
    ) -> Self {
        Self { commands, status }
    }

    async fn send(&self, command: Command) -> Result<(), ClientError> {
        let (done, applied) = oneshot::channel();
        self.commands.send((command, done)).await.map_err(|_| ClientError::RuntimeStopped)?;
        // Dropped unanswered only when the runtime exits mid-command
        applied.await.map_err(|_| ClientError::RuntimeStopped)
    }

    /// Switch to `room`. Blank clears the room and disconnects.
    pub async fn set_room(&self, room: impl Into<String>) -> Result<(), ClientError> {
        self.send(Command::SetRoom(room.into())).await
    }

    /// Drop the current transport and start a fresh attempt immediately.
    pub async fn reconnect(&self) -> Result<(), ClientError> {
        self.send(Command::Reconnect).await
    }

    /// Close everything and stay stopped. The room is kept.
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        self.send(Command::Disconnect).await
    }

    /// Stop the runtime. Returns once the live transport has been closed.
    /// Later commands fail with [`ClientError::RuntimeStopped`].
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        self.send(Command::Shutdown).await
    }

    /// Current room.
    pub fn room(&self) -> String {
        self.status.borrow().room.clone()
    }

    /// Whether a transport is open.
    pub fn is_connected(&self) -> bool {
        self.status.borrow().facts.connected
    }

    /// Last gesture label.
    pub fn gesture(&self) -> String {
        self.status.borrow().facts.label.clone()
    }

    /// Last gesture confidence, rounded to two places.
    pub fn confidence(&self) -> f64 {
        self.status.borrow().facts.reported_confidence()
    }

    /// Last subscriber count.
    pub fn subscriber_count(&self) -> f64 {
        self.status.borrow().facts.subscriber_count
    }

    /// All last-known facts, confidence unrounded.
    pub fn facts(&self) -> Facts {
        self.status.borrow().facts.clone()
    }

    /// Full snapshot of the published state.
    pub fn status(&self) -> RoomStatus {
        self.status.borrow().clone()
    }

    /// Subscribe to status changes.
    pub fn watch(&self) -> watch::Receiver<RoomStatus> {
        self.status.clone()
    }
}
