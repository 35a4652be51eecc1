//! Roomlink client
//!
//! Runs the [`roomlink_core::Supervisor`] on tokio against real collaborators:
//! a WebSocket transport, a permission gate and an optional room source.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use roomlink_client::{AllowAll, ClientConfig, Runtime, SystemEnv, WsConnector};
//!
//! # async fn example() -> Result<(), roomlink_client::ClientError> {
//! let config = ClientConfig::for_room("lobby");
//! let (runtime, handle) =
//!     Runtime::new(&config, SystemEnv::new(), Arc::new(WsConnector::new()), Arc::new(AllowAll));
//! runtime.spawn();
//!
//! handle.set_room("kitchen").await?;
//! let _label = handle.gesture();
//! handle.shutdown().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
mod handle;
pub mod permission;
pub mod room_source;
mod runtime;
mod system_env;
pub mod transport;

pub use config::ClientConfig;
pub use error::{ClientError, PermissionError, RoomSourceError, TransportError};
pub use handle::{RoomHandle, RoomStatus};
pub use permission::{AllowAll, HostAllowlist, PermissionGate};
pub use room_source::{
    EnvProbe, FileProbe, PollingLimits, PollingRoom, RoomProbe, RoomSource, StaticRoom,
};
pub use runtime::Runtime;
pub use system_env::SystemEnv;
pub use transport::{Connector, TransportEvent, TransportEvents, TransportHandle, WsConnector};
