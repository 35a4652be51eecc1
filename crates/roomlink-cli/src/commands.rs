//! Line commands read from stdin while the client runs.

use thiserror::Error;

/// A parsed stdin command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Switch to a room.
    Room(String),
    /// Clear the room and close the transport.
    Leave,
    /// Start a fresh attempt immediately.
    Reconnect,
    /// Stop connecting until another command.
    Disconnect,
    /// Print the current status once, even if unchanged.
    Status,
    /// Shut down and exit.
    Quit,
}

/// Rejected input line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// `room` without a name.
    #[error("Usage: room <name>")]
    MissingRoom,

    /// Not a known command.
    #[error("Unknown command: {0}")]
    Unknown(String),
}

/// Parse one input line. Blank lines yield `None`.
///
/// A leading `/` is accepted so `/room lobby` and `room lobby` are the same.
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    let line = line.strip_prefix('/').unwrap_or(line);
    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else {
        return Ok(None);
    };

    let parsed = match command {
        "room" | "join" => match parts.next() {
            Some(room) => Command::Room(room.to_string()),
            None => return Err(CommandError::MissingRoom),
        },
        "leave" => Command::Leave,
        "reconnect" | "r" => Command::Reconnect,
        "disconnect" => Command::Disconnect,
        "status" | "s" => Command::Status,
        "quit" | "q" | "exit" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_takes_a_name() {
        assert_eq!(parse("room lobby"), Ok(Some(Command::Room("lobby".into()))));
        assert_eq!(parse("  /join kitchen  "), Ok(Some(Command::Room("kitchen".into()))));
    }

    #[test]
    fn room_without_name_is_rejected() {
        assert_eq!(parse("room"), Err(CommandError::MissingRoom));
        assert_eq!(parse("/room   "), Err(CommandError::MissingRoom));
    }

    #[test]
    fn short_forms() {
        assert_eq!(parse("r"), Ok(Some(Command::Reconnect)));
        assert_eq!(parse("/q"), Ok(Some(Command::Quit)));
        assert_eq!(parse("s"), Ok(Some(Command::Status)));
    }

    #[test]
    fn blank_lines_are_skipped() {
        assert_eq!(parse(""), Ok(None));
        assert_eq!(parse("   "), Ok(None));
        assert_eq!(parse("/"), Ok(None));
    }

    #[test]
    fn unknown_command_is_named() {
        let err = parse("dance now").unwrap_err();
        assert_eq!(err, CommandError::Unknown("dance".into()));
        assert_eq!(err.to_string(), "Unknown command: dance");
    }

    #[test]
    fn leave_and_disconnect_differ() {
        assert_eq!(parse("leave"), Ok(Some(Command::Leave)));
        assert_eq!(parse("disconnect"), Ok(Some(Command::Disconnect)));
    }
}
