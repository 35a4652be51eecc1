//! Status line formatting.

use std::io::{self, Write};

use roomlink_client::RoomStatus;

/// One line of human-readable status.
///
/// Confidence is rounded to two places, as callers of the handle see it.
pub fn text_line(status: &RoomStatus) -> String {
    let facts = &status.facts;
    let room = if status.room.is_empty() { "-" } else { status.room.as_str() };
    let gesture = if facts.label.is_empty() { "-" } else { facts.label.as_str() };
    format!(
        "room={room} state={} connected={} gesture={gesture} confidence={:.2} subscribers={}",
        status.state,
        facts.connected,
        facts.reported_confidence(),
        facts.subscriber_count,
    )
}

/// One line of JSON status, with confidence rounded like [`text_line`].
pub fn json_line(status: &RoomStatus) -> Result<String, serde_json::Error> {
    let mut reported = status.clone();
    reported.facts.confidence = status.facts.reported_confidence();
    serde_json::to_string(&reported)
}

/// Format `status` in the selected style.
pub fn render(status: &RoomStatus, json: bool) -> Result<String, serde_json::Error> {
    if json { json_line(status) } else { Ok(text_line(status)) }
}

/// Write a line to stdout and flush it.
pub fn emit(line: &str) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{line}")?;
    stdout.flush()
}

#[cfg(test)]
mod tests {
    use roomlink_core::Facts;

    use super::*;

    fn open_status() -> RoomStatus {
        RoomStatus {
            room: "lobby".into(),
            state: "open",
            facts: Facts {
                connected: true,
                label: "wave".into(),
                confidence: 0.875,
                subscriber_count: 3.0,
            },
        }
    }

    #[test]
    fn text_rounds_confidence() {
        assert_eq!(
            text_line(&open_status()),
            "room=lobby state=open connected=true gesture=wave confidence=0.88 subscribers=3"
        );
    }

    #[test]
    fn text_marks_missing_values() {
        let status = RoomStatus { state: "idle", ..RoomStatus::default() };
        assert_eq!(
            text_line(&status),
            "room=- state=idle connected=false gesture=- confidence=0.00 subscribers=0"
        );
    }

    #[test]
    fn json_carries_every_field() {
        let line = json_line(&open_status()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();

        assert_eq!(value["room"], "lobby");
        assert_eq!(value["state"], "open");
        assert_eq!(value["facts"]["connected"], true);
        assert_eq!(value["facts"]["label"], "wave");
        assert_eq!(value["facts"]["subscriber_count"], 3.0);
        assert!(!line.contains('\n'));
    }

    #[test]
    fn json_rounds_confidence() {
        let mut status = open_status();
        let line = json_line(&status).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["facts"]["confidence"], 0.88);

        status.facts.confidence = 0.871;
        let line = json_line(&status).unwrap();
        assert!(line.contains(r#""confidence":0.87,"#), "{line}");
    }

    #[test]
    fn render_selects_style() {
        let status = open_status();
        assert!(render(&status, false).unwrap().starts_with("room=lobby"));
        assert!(render(&status, true).unwrap().starts_with('{'));
    }
}
