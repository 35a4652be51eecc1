//! Room discovery.
//!
//! A [`RoomSource`] finds a room when none was configured. A [`RoomProbe`]
//! reads the current value once; [`StaticRoom`] consults it a single time,
//! [`PollingRoom`] keeps asking on an interval until it answers, gives up, or
//! runs out of time.

use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use roomlink_core::env::Environment;

use crate::error::RoomSourceError;

/// Reads the current room, if any.
pub trait RoomProbe: Send + Sync {
    /// One read. `Ok(None)` means "not available yet".
    fn probe(&self) -> Result<Option<String>, RoomSourceError>;
}

/// Reads the room from a file. A missing or blank file counts as absent.
#[derive(Debug, Clone)]
pub struct FileProbe {
    path: PathBuf,
}

impl FileProbe {
    /// Probe `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RoomProbe for FileProbe {
    fn probe(&self) -> Result<Option<String>, RoomSourceError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(non_blank(&contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Reads the room from an environment variable. Unset or blank counts as
/// absent.
#[derive(Debug, Clone)]
pub struct EnvProbe {
    var: String,
}

impl EnvProbe {
    /// Probe the variable `var`.
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl RoomProbe for EnvProbe {
    fn probe(&self) -> Result<Option<String>, RoomSourceError> {
        match std::env::var(&self.var) {
            Ok(value) => Ok(non_blank(&value)),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(std::env::VarError::NotUnicode(_)) => {
                Err(RoomSourceError::NotUnicode(self.var.clone()))
            },
        }
    }
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Discovers a room on the caller's behalf.
#[async_trait]
pub trait RoomSource: Send + Sync {
    /// Resolve a room. `Ok(None)` means discovery gave up.
    async fn discover(&self) -> Result<Option<String>, RoomSourceError>;
}

/// Reads a probe exactly once.
#[derive(Debug, Clone)]
pub struct StaticRoom<P> {
    probe: P,
}

impl<P: RoomProbe> StaticRoom<P> {
    /// Wrap `probe`.
    pub fn new(probe: P) -> Self {
        Self { probe }
    }
}

#[async_trait]
impl<P: RoomProbe> RoomSource for StaticRoom<P> {
    async fn discover(&self) -> Result<Option<String>, RoomSourceError> {
        self.probe.probe()
    }
}

/// Polling limits for [`PollingRoom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingLimits {
    /// Maximum number of reads.
    pub max_attempts: u32,
    /// Delay between reads.
    pub interval: Duration,
    /// Overall deadline, measured from the first read.
    pub timeout: Duration,
}

impl Default for PollingLimits {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            interval: Duration::from_millis(250),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Reads a probe repeatedly until it yields a room.
///
/// Probe errors are logged and count as an empty read.
#[derive(Debug, Clone)]
pub struct PollingRoom<P, E> {
    probe: P,
    env: E,
    limits: PollingLimits,
}

impl<P: RoomProbe, E: Environment> PollingRoom<P, E> {
    /// Poll `probe` within `limits`.
    pub fn new(probe: P, env: E, limits: PollingLimits) -> Self {
        Self { probe, env, limits }
    }
}

#[async_trait]
impl<P: RoomProbe, E: Environment> RoomSource for PollingRoom<P, E> {
    async fn discover(&self) -> Result<Option<String>, RoomSourceError> {
        let started = self.env.now();

        for attempt in 1..=self.limits.max_attempts {
            match self.probe.probe() {
                Ok(Some(room)) => {
                    tracing::debug!("Discovered room {room:?} on read {attempt}");
                    return Ok(Some(room));
                },
                Ok(None) => {},
                Err(e) => tracing::warn!("Room probe read {attempt} failed: {e}"),
            }

            if attempt == self.limits.max_attempts {
                break;
            }
            if self.env.now() - started + self.limits.interval > self.limits.timeout {
                tracing::debug!("Room discovery timed out after {attempt} reads");
                return Ok(None);
            }
            self.env.sleep(self.limits.interval).await;
        }

        tracing::debug!("Room discovery gave up after {} reads", self.limits.max_attempts);
        Ok(None)
    }
}
