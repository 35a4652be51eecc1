//! Tokio runtime for the room supervisor.
//!
//! The [`Runtime`] owns the [`Supervisor`] and is the only task that touches
//! it. Caller commands and the results of spawned work (permission checks,
//! transport notifications, retry timers) all arrive on channels and are
//! processed one at a time, so the supervisor never sees two events at once.
//!
//! ```text
//!   RoomHandle ──commands──┐
//!                          ├──> Runtime ──> Supervisor::handle ──> actions
//!   spawned tasks ─events──┘        ↑                                 │
//!                                   └──────── follow-up events ───────┘
//! ```
//!
//! After every event the runtime publishes a [`RoomStatus`] on a watch
//! channel, which is what [`RoomHandle`] getters read. Commands are
//! acknowledged only after that publish.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use roomlink_core::{
    CLOSE_NORMAL, Supervisor, SupervisorAction, SupervisorEvent, TimerId, TransportId,
    env::Environment,
};
use tokio::{
    sync::{mpsc, watch},
    task::{AbortHandle, JoinHandle},
};

use crate::{
    config::ClientConfig,
    handle::{Command, Request, RoomHandle, RoomStatus},
    permission::PermissionGate,
    room_source::RoomSource,
    transport::{Connector, TransportEvents, TransportHandle},
};

const REASON_SHUTDOWN: &str = "shutdown";

/// Event loop driving one [`Supervisor`].
pub struct Runtime<E: Environment> {
    supervisor: Supervisor,
    env: E,
    connector: Arc<dyn Connector>,
    permission: Arc<dyn PermissionGate>,
    room_source: Option<Arc<dyn RoomSource>>,
    commands: mpsc::Receiver<Request>,
    events: mpsc::Receiver<SupervisorEvent>,
    events_tx: mpsc::Sender<SupervisorEvent>,
    status: watch::Sender<RoomStatus>,
    /// Transports opened and not yet closed or detached.
    transports: HashMap<TransportId, Box<dyn TransportHandle>>,
    /// Retry timers scheduled and not yet fired or cancelled.
    timers: HashMap<TimerId, AbortHandle>,
    discovery: Option<AbortHandle>,
    attempt_started: Option<E::Instant>,
}

impl<E: Environment> Runtime<E> {
    /// Build a runtime and the handle that commands it.
    ///
    /// Nothing happens until [`Runtime::run`] (or [`Runtime::spawn`]) is
    /// called.
    pub fn new(
        config: &ClientConfig,
        env: E,
        connector: Arc<dyn Connector>,
        permission: Arc<dyn PermissionGate>,
    ) -> (Self, RoomHandle) {
        let capacity = config.channel_capacity();
        let (commands_tx, commands) = mpsc::channel(capacity);
        let (events_tx, events) = mpsc::channel(capacity);

        let supervisor = Supervisor::new(config.supervisor_config(), config.initial_room());
        let (status, status_rx) = watch::channel(status_of(&supervisor));

        let runtime = Self {
            supervisor,
            env,
            connector,
            permission,
            room_source: None,
            commands,
            events,
            events_tx,
            status,
            transports: HashMap::new(),
            timers: HashMap::new(),
            discovery: None,
            attempt_started: None,
        };
        (runtime, RoomHandle::new(commands_tx, status_rx))
    }

    /// Discover a room from `source` when none is configured.
    #[must_use]
    pub fn with_room_source(mut self, source: Arc<dyn RoomSource>) -> Self {
        self.room_source = Some(source);
        self
    }

    /// Run on a new tokio task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run until [`RoomHandle::shutdown`] is called or every handle is
    /// dropped.
    ///
    /// On exit the live transport is closed with reason `"shutdown"` and any
    /// pending retry is cancelled.
    pub async fn run(mut self) {
        self.start_discovery();
        let actions = self.supervisor.start();
        self.apply(actions);
        self.publish();

        let mut stopping = None;
        loop {
            let (event, done) = tokio::select! {
                biased;
                request = self.commands.recv() => match request {
                    Some((Command::SetRoom(room), done)) => {
                        (SupervisorEvent::RoomSet { room }, Some(done))
                    },
                    Some((Command::Reconnect, done)) => {
                        (SupervisorEvent::ReconnectRequested, Some(done))
                    },
                    Some((Command::Disconnect, done)) => {
                        (SupervisorEvent::DisconnectRequested, Some(done))
                    },
                    Some((Command::Shutdown, done)) => {
                        stopping = Some(done);
                        break;
                    },
                    None => break,
                },
                Some(event) = self.events.recv() => (event, None),
            };

            self.process(event);
            self.publish();
            if let Some(done) = done {
                // The caller may have stopped waiting
                let _ = done.send(());
            }
        }

        self.shutdown();
        if let Some(done) = stopping {
            let _ = done.send(());
        }
    }

    /// Feed `event` and every follow-up it causes through the supervisor.
    fn process(&mut self, event: SupervisorEvent) {
        let mut pending = VecDeque::from([event]);

        while let Some(event) = pending.pop_front() {
            self.observe(&event);
            let actions = self.supervisor.handle(event);
            pending.extend(actions.into_iter().filter_map(|action| self.execute(action)));
        }
    }

    fn apply(&mut self, actions: Vec<SupervisorAction>) {
        let followups: Vec<_> = actions.into_iter().filter_map(|a| self.execute(a)).collect();
        for event in followups {
            self.process(event);
        }
    }

    /// Driver-side bookkeeping before the supervisor sees an event.
    fn observe(&mut self, event: &SupervisorEvent) {
        match event {
            SupervisorEvent::TransportOpened { transport }
                if self.supervisor.live_transport() == Some(*transport) =>
            {
                if let Some(started) = self.attempt_started.take() {
                    let elapsed = self.env.now() - started;
                    tracing::debug!("Attempt for {transport} took {elapsed:?}");
                }
            },
            SupervisorEvent::TransportClosed { transport, .. } => {
                // The transport is gone; the handle has nothing left to close
                self.transports.remove(transport);
            },
            SupervisorEvent::RetryFired { timer } => {
                self.timers.remove(timer);
            },
            _ => {},
        }
    }

    /// Execute one action. Returns an event to feed back immediately when the
    /// action failed synchronously.
    fn execute(&mut self, action: SupervisorAction) -> Option<SupervisorEvent> {
        tracing::trace!("Executing {action}");

        match action {
            SupervisorAction::CheckPermission { attempt, address } => {
                self.attempt_started = Some(self.env.now());
                let permission = Arc::clone(&self.permission);
                let tx = self.events_tx.clone();
                tokio::spawn(async move {
                    let granted = match permission.check(&address).await {
                        Ok(granted) => granted,
                        Err(e) => {
                            tracing::warn!("Permission check failed, treating as denied: {e}");
                            false
                        },
                    };
                    // Runtime gone means nobody is waiting for the answer
                    let _ = tx.send(SupervisorEvent::PermissionResolved { attempt, granted }).await;
                });
                None
            },
            SupervisorAction::OpenTransport { transport, address } => {
                let events = TransportEvents::new(transport, self.events_tx.clone());
                match self.connector.open(&address, events) {
                    Ok(handle) => {
                        self.transports.insert(transport, handle);
                        None
                    },
                    Err(e) => {
                        Some(SupervisorEvent::OpenFailed { transport, reason: e.to_string() })
                    },
                }
            },
            SupervisorAction::CloseTransport { transport, code, reason } => {
                if let Some(mut handle) = self.transports.remove(&transport)
                    && let Err(e) = handle.close(code, &reason)
                {
                    tracing::debug!("Closing {transport} failed: {e}");
                }
                None
            },
            SupervisorAction::ScheduleRetry { timer, delay } => {
                let env = self.env.clone();
                let tx = self.events_tx.clone();
                let task = tokio::spawn(async move {
                    env.sleep(delay).await;
                    let _ = tx.send(SupervisorEvent::RetryFired { timer }).await;
                });
                self.timers.insert(timer, task.abort_handle());
                None
            },
            SupervisorAction::CancelRetry { timer } => {
                if let Some(task) = self.timers.remove(&timer) {
                    task.abort();
                }
                None
            },
        }
    }

    fn start_discovery(&mut self) {
        let Some(source) = self.room_source.take() else {
            return;
        };
        if !self.supervisor.room().is_empty() {
            return;
        }

        let tx = self.events_tx.clone();
        let task = tokio::spawn(async move {
            match source.discover().await {
                Ok(Some(room)) => {
                    let _ = tx.send(SupervisorEvent::RoomDiscovered { room }).await;
                },
                Ok(None) => tracing::info!("No room discovered"),
                Err(e) => tracing::warn!("Room discovery failed: {e}"),
            }
        });
        self.discovery = Some(task.abort_handle());
    }

    fn publish(&self) {
        let next = status_of(&self.supervisor);
        self.status.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    fn shutdown(&mut self) {
        // Everything is closed below with the shutdown reason instead
        drop(self.supervisor.disconnect());

        for (transport, mut handle) in self.transports.drain() {
            if let Err(e) = handle.close(CLOSE_NORMAL, REASON_SHUTDOWN) {
                tracing::debug!("Closing {transport} failed: {e}");
            }
        }
        for (_, task) in self.timers.drain() {
            task.abort();
        }
        if let Some(task) = self.discovery.take() {
            task.abort();
        }

        self.publish();
        tracing::info!("Room runtime stopped");
    }
}

fn status_of(supervisor: &Supervisor) -> RoomStatus {
    RoomStatus {
        room: supervisor.room().to_string(),
        state: supervisor.state().name(),
        facts: supervisor.facts().clone(),
    }
}
