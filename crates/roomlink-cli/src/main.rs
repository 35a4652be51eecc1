//! Roomlink command-line client.
//!
//! # Usage
//!
//! ```bash
//! # Follow one room on the default local endpoint
//! roomlink --room lobby
//!
//! # Wait for another process to write the room into a file
//! roomlink --base wss://stream.example.net/stream --room-file /run/room --json
//! ```
//!
//! While running, stdin accepts `room <name>`, `leave`, `reconnect`,
//! `disconnect`, `status` and `quit`.

mod commands;
mod output;

use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use commands::Command;
use roomlink_client::{
    AllowAll, ClientConfig, ClientError, EnvProbe, FileProbe, HostAllowlist, PermissionGate,
    PollingLimits, PollingRoom, RoomHandle, RoomProbe, RoomSource, RoomStatus, Runtime,
    StaticRoom, SystemEnv, WsConnector,
};
use roomlink_core::PermissionScheme;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Roomlink room subscriber
#[derive(Parser, Debug)]
#[command(name = "roomlink")]
#[command(about = "Follow the gesture and presence stream of a room")]
#[command(version)]
struct Args {
    /// Room to join at startup
    #[arg(short, long, env = "ROOMLINK_ROOM")]
    room: Option<String>,

    /// Stream endpoint template (ws:// or wss://)
    #[arg(short, long, env = "ROOMLINK_BASE")]
    base: Option<String>,

    /// Discover the room from this file when --room is not given
    #[arg(long, env = "ROOMLINK_ROOM_FILE")]
    room_file: Option<PathBuf>,

    /// Discover the room from this environment variable when --room is not given
    #[arg(long, env = "ROOMLINK_ROOM_ENV", conflicts_with = "room_file")]
    room_env: Option<String>,

    /// Reads before room discovery gives up (0 reads once and never waits)
    #[arg(long, env = "ROOMLINK_ROOM_POLL_ATTEMPTS", default_value = "20")]
    room_poll_attempts: u32,

    /// Delay between room discovery reads, in milliseconds
    #[arg(long, env = "ROOMLINK_ROOM_POLL_INTERVAL_MS", default_value = "250")]
    room_poll_interval_ms: u64,

    /// Overall room discovery deadline, in milliseconds
    #[arg(long, env = "ROOMLINK_ROOM_POLL_TIMEOUT_MS", default_value = "10000")]
    room_poll_timeout_ms: u64,

    /// Only grant stream addresses on these hosts (repeatable; none allows all)
    #[arg(long = "allow-host", env = "ROOMLINK_ALLOW_HOSTS", value_delimiter = ',')]
    allow_hosts: Vec<String>,

    /// How addresses are shown to the permission check (http or stream)
    #[arg(
        long,
        env = "ROOMLINK_PERMISSION_SCHEME",
        default_value = "http",
        value_parser = parse_scheme
    )]
    permission_scheme: PermissionScheme,

    /// Retry delays in milliseconds, comma separated
    #[arg(long, env = "ROOMLINK_BACKOFF_MS", value_delimiter = ',')]
    backoff_ms: Vec<u64>,

    /// How often to poll status, in milliseconds
    #[arg(long, env = "ROOMLINK_POLL_INTERVAL_MS", default_value = "500")]
    poll_interval_ms: u64,

    /// Print status lines as JSON
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn client_config(&self) -> ClientConfig {
        ClientConfig {
            room: self.room.clone(),
            transport_base: self.base.clone(),
            permission_scheme: self.permission_scheme,
            backoff_table: self.backoff_ms.iter().copied().map(Duration::from_millis).collect(),
            ..ClientConfig::default()
        }
    }

    fn permission_gate(&self) -> Arc<dyn PermissionGate> {
        if self.allow_hosts.is_empty() {
            Arc::new(AllowAll)
        } else {
            Arc::new(HostAllowlist::new(&self.allow_hosts))
        }
    }

    fn room_source(&self) -> Option<Arc<dyn RoomSource>> {
        if let Some(path) = &self.room_file {
            return Some(self.discovery(FileProbe::new(path)));
        }
        self.room_env.as_ref().map(|var| self.discovery(EnvProbe::new(var)))
    }

    fn discovery<P: RoomProbe + 'static>(&self, probe: P) -> Arc<dyn RoomSource> {
        if self.room_poll_attempts == 0 {
            return Arc::new(StaticRoom::new(probe));
        }
        let limits = PollingLimits {
            max_attempts: self.room_poll_attempts,
            interval: Duration::from_millis(self.room_poll_interval_ms),
            timeout: Duration::from_millis(self.room_poll_timeout_ms),
        };
        Arc::new(PollingRoom::new(probe, SystemEnv::new(), limits))
    }
}

fn parse_scheme(name: &str) -> Result<PermissionScheme, String> {
    PermissionScheme::from_name(name)
        .ok_or_else(|| format!("unknown permission scheme {name:?} (expected http or stream)"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    // stdout carries status lines
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    tracing::info!("Roomlink starting");

    let (mut runtime, handle) = Runtime::new(
        &args.client_config(),
        SystemEnv::new(),
        Arc::new(WsConnector::new()),
        args.permission_gate(),
    );
    if let Some(source) = args.room_source() {
        runtime = runtime.with_room_source(source);
    }
    let task = runtime.spawn();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut ticker = tokio::time::interval(Duration::from_millis(args.poll_interval_ms.max(1)));
    let mut last: Option<RoomStatus> = None;

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result?;
                tracing::info!("Interrupted");
                break;
            }

            _ = ticker.tick() => {
                let status = handle.status();
                if last.as_ref() != Some(&status) {
                    output::emit(&output::render(&status, args.json)?)?;
                    last = Some(status);
                }
            }

            line = lines.next_line(), if stdin_open => {
                let Some(line) = line? else {
                    tracing::debug!("stdin closed, commands disabled");
                    stdin_open = false;
                    continue;
                };
                match commands::parse(&line) {
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(Command::Status)) => {
                        output::emit(&output::render(&handle.status(), args.json)?)?;
                    },
                    Ok(Some(command)) => {
                        if let Err(e) = dispatch(&handle, command).await {
                            tracing::warn!("{e}");
                            break;
                        }
                    },
                    Ok(None) => {},
                    Err(e) => tracing::warn!("{e}"),
                }
            }
        }
    }

    // The runtime may already be gone if it stopped on its own
    if let Err(e) = handle.shutdown().await {
        tracing::debug!("Shutdown request not delivered: {e}");
    }
    task.await?;

    tracing::info!("Roomlink stopped");
    Ok(())
}

async fn dispatch(handle: &RoomHandle, command: Command) -> Result<(), ClientError> {
    match command {
        Command::Room(room) => handle.set_room(room).await,
        Command::Leave => handle.set_room("").await,
        Command::Reconnect => handle.reconnect().await,
        Command::Disconnect => handle.disconnect().await,
        Command::Status | Command::Quit => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("roomlink").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults() {
        let args = parse(&[]);
        let config = args.client_config();

        assert_eq!(config.room, None);
        assert_eq!(config.permission_scheme, PermissionScheme::HttpRewrite);
        assert!(config.backoff_table.is_empty());
        assert!(args.room_source().is_none());
        assert!(!args.json);
    }

    #[test]
    fn backoff_and_hosts_split_on_commas() {
        let args = parse(&["--backoff-ms", "100,200", "--allow-host", "a.example,b.example"]);

        assert_eq!(
            args.client_config().backoff_table,
            [Duration::from_millis(100), Duration::from_millis(200)]
        );
        assert_eq!(args.allow_hosts, ["a.example", "b.example"]);
    }

    #[test]
    fn permission_scheme_by_name() {
        let args = parse(&["--permission-scheme", "stream"]);
        assert_eq!(args.permission_scheme, PermissionScheme::Stream);

        let err = Args::try_parse_from(["roomlink", "--permission-scheme", "ftp"]);
        assert!(err.is_err());
    }

    #[test]
    fn room_file_selects_discovery() {
        let args = parse(&["--room-file", "/tmp/room", "--room-poll-attempts", "0"]);
        assert!(args.room_source().is_some());
    }

    #[test]
    fn room_file_and_env_conflict() {
        let args = ["roomlink", "--room-file", "/tmp/room", "--room-env", "ROOM"];
        assert!(Args::try_parse_from(args).is_err());
    }
}
