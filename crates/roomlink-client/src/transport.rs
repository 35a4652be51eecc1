//! Message-stream transport.
//!
//! The runtime only needs two things from a transport: a way to start opening
//! one at an address, and a way to close it. Everything that happens afterwards
//! is reported asynchronously through [`TransportEvents`], tagged with the
//! [`TransportId`] the supervisor handed out, so a transport that has since been
//! detached cannot affect the session.
//!
//! [`WsConnector`] is the production implementation over `tokio-tungstenite`.

use futures::{SinkExt, StreamExt};
use roomlink_core::{SupervisorEvent, TransportId};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::{
    Message,
    client::IntoClientRequest,
    protocol::{CloseFrame, frame::coding::CloseCode},
};

use crate::error::TransportError;

/// Lifecycle notification from a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake completed.
    Opened,
    /// A text frame (or a UTF-8 binary frame) arrived.
    Message(String),
    /// The transport failed. A `Closed` is expected to follow.
    Errored(String),
    /// The transport is gone.
    Closed {
        /// Close code, when the peer sent one.
        code: Option<u16>,
        /// Close reason or a description of the failure.
        reason: String,
    },
}

/// Sink for one transport's lifecycle notifications.
#[derive(Debug, Clone)]
pub struct TransportEvents {
    transport: TransportId,
    tx: mpsc::Sender<SupervisorEvent>,
}

impl TransportEvents {
    pub(crate) fn new(transport: TransportId, tx: mpsc::Sender<SupervisorEvent>) -> Self {
        Self { transport, tx }
    }

    /// Transport these notifications are tagged with.
    pub fn transport(&self) -> TransportId {
        self.transport
    }

    /// Report a lifecycle notification.
    ///
    /// Returns `false` once the runtime has stopped listening.
    pub async fn emit(&self, event: TransportEvent) -> bool {
        let transport = self.transport;
        let event = match event {
            TransportEvent::Opened => SupervisorEvent::TransportOpened { transport },
            TransportEvent::Message(payload) => {
                SupervisorEvent::TransportMessage { transport, payload }
            },
            TransportEvent::Errored(reason) => {
                SupervisorEvent::TransportErrored { transport, reason }
            },
            TransportEvent::Closed { code, reason } => {
                SupervisorEvent::TransportClosed { transport, code, reason }
            },
        };
        self.tx.send(event).await.is_ok()
    }
}

/// An opening or open transport.
pub trait TransportHandle: Send {
    /// Ask the transport to close. After this call the handle is detached:
    /// its notifications may still arrive but are stale.
    ///
    /// # Errors
    ///
    /// Returns an error if the close request could not be delivered; callers
    /// log and move on.
    fn close(&mut self, code: u16, reason: &str) -> Result<(), TransportError>;
}

/// Opens transports.
pub trait Connector: Send + Sync {
    /// Start opening a transport to `address`.
    ///
    /// Must not block on network I/O: the handshake proceeds in the background
    /// and its outcome is reported through `events`.
    ///
    /// # Errors
    ///
    /// Returns an error if opening could not even begin (for example an
    /// address the transport cannot parse).
    fn open(
        &self,
        address: &str,
        events: TransportEvents,
    ) -> Result<Box<dyn TransportHandle>, TransportError>;
}

/// WebSocket connector.
///
/// Each open spawns one task that performs the handshake and then forwards
/// frames until the socket closes or the handle asks it to stop.
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

impl WsConnector {
    /// Create a connector, installing the ring crypto provider for `wss://`
    /// if none is installed yet.
    pub fn new() -> Self {
        // Err means a provider is already installed, which is fine
        let _ = rustls::crypto::ring::default_provider().install_default();
        Self
    }
}

impl Connector for WsConnector {
    fn open(
        &self,
        address: &str,
        events: TransportEvents,
    ) -> Result<Box<dyn TransportHandle>, TransportError> {
        let request = address
            .into_client_request()
            .map_err(|e| TransportError::InvalidAddress(format!("{address}: {e}")))?;

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        let (close_tx, close_rx) = oneshot::channel();
        let task = runtime.spawn(run_socket(request, events, close_rx));

        Ok(Box::new(WsHandle { close_tx: Some(close_tx), abort_handle: task.abort_handle() }))
    }
}

/// Handle to a socket task spawned by [`WsConnector`].
struct WsHandle {
    close_tx: Option<oneshot::Sender<(u16, String)>>,
    abort_handle: tokio::task::AbortHandle,
}

impl TransportHandle for WsHandle {
    fn close(&mut self, code: u16, reason: &str) -> Result<(), TransportError> {
        let Some(close_tx) = self.close_tx.take() else {
            return Err(TransportError::Close("already closed".to_string()));
        };
        if close_tx.send((code, reason.to_string())).is_err() {
            self.abort_handle.abort();
            return Err(TransportError::Close("socket task has ended".to_string()));
        }
        Ok(())
    }
}

impl Drop for WsHandle {
    fn drop(&mut self) {
        // A handle dropped without close() has no owner left to report to
        if self.close_tx.is_some() {
            self.abort_handle.abort();
        }
    }
}

type CloseRequest = oneshot::Receiver<(u16, String)>;

async fn run_socket(
    request: tokio_tungstenite::tungstenite::handshake::client::Request,
    events: TransportEvents,
    mut close_rx: CloseRequest,
) {
    let transport = events.transport();

    let socket = tokio::select! {
        result = tokio_tungstenite::connect_async(request) => match result {
            Ok((socket, _response)) => socket,
            Err(e) => {
                tracing::debug!("Handshake for {transport} failed: {e}");
                events.emit(TransportEvent::Errored(e.to_string())).await;
                let reason = format!("handshake failed: {e}");
                events.emit(TransportEvent::Closed { code: None, reason }).await;
                return;
            },
        },
        // Closed before the handshake finished; the runtime no longer cares
        _ = &mut close_rx => return,
    };

    if !events.emit(TransportEvent::Opened).await {
        return;
    }

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            request = &mut close_rx => {
                if let Ok((code, reason)) = request {
                    let frame = CloseFrame { code: CloseCode::from(code), reason: reason.into() };
                    if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                        tracing::debug!("Close frame for {transport} not sent: {e}");
                    }
                }
                return;
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if !events.emit(TransportEvent::Message(text.to_string())).await {
                        return;
                    }
                },
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => {
                        if !events.emit(TransportEvent::Message(text)).await {
                            return;
                        }
                    },
                    Err(_) => tracing::debug!("Dropping non-UTF-8 binary frame on {transport}"),
                },
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = match frame {
                        Some(frame) => (Some(u16::from(frame.code)), frame.reason.to_string()),
                        None => (None, String::new()),
                    };
                    events.emit(TransportEvent::Closed { code, reason }).await;
                    return;
                },
                // Ping/pong are answered by tungstenite
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {},
                Some(Err(e)) => {
                    events.emit(TransportEvent::Errored(e.to_string())).await;
                    events.emit(TransportEvent::Closed { code: None, reason: e.to_string() }).await;
                    return;
                },
                None => {
                    let reason = "stream ended".to_string();
                    events.emit(TransportEvent::Closed { code: None, reason }).await;
                    return;
                },
            },
        }
    }
}
