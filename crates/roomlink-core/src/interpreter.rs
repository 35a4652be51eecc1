//! Inbound frame interpretation.
//!
//! Frames are JSON objects discriminated by a `type` field:
//!
//! ```text
//! {"type":"gesture","label":"wave","confidence":0.87}
//! {"type":"presence","subscribers":3}
//! ```
//!
//! Anything else (invalid JSON, non-objects, unknown or missing `type`) is
//! dropped without touching the facts. Numeric fields are coerced loosely, so
//! `"0.5"` and `true` are accepted as `0.5` and `1`; values that do not coerce
//! to a finite number fall back per field.

use serde_json::{Map, Value};

use crate::facts::Facts;

/// Frame kind carrying a classification.
pub const KIND_GESTURE: &str = "gesture";

/// Frame kind carrying the room population.
pub const KIND_PRESENCE: &str = "presence";

/// Outcome of interpreting one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpretation {
    /// Label and confidence were overwritten.
    Gesture,
    /// Subscriber count was updated (or kept, if the value was unusable).
    Presence,
    /// The frame was dropped; facts are unchanged.
    Ignored(IgnoreReason),
}

/// Why a frame was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Payload is not valid UTF-8 or not valid JSON.
    Malformed,
    /// Payload is valid JSON but not an object.
    NotAnObject,
    /// Object has no `type`, or a `type` this client does not know.
    UnknownKind,
}

/// Interpret a text frame, updating `facts` in place.
pub fn interpret(payload: &str, facts: &mut Facts) -> Interpretation {
    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!("Dropping malformed frame: {e}");
            return Interpretation::Ignored(IgnoreReason::Malformed);
        },
    };

    let Value::Object(fields) = value else {
        return Interpretation::Ignored(IgnoreReason::NotAnObject);
    };

    match fields.get("type").and_then(Value::as_str) {
        Some(KIND_GESTURE) => {
            apply_gesture(&fields, facts);
            Interpretation::Gesture
        },
        Some(KIND_PRESENCE) => {
            apply_presence(&fields, facts);
            Interpretation::Presence
        },
        other => {
            tracing::debug!("Dropping frame of unknown kind {other:?}");
            Interpretation::Ignored(IgnoreReason::UnknownKind)
        },
    }
}

/// Interpret a binary frame as UTF-8 text.
pub fn interpret_bytes(payload: &[u8], facts: &mut Facts) -> Interpretation {
    match std::str::from_utf8(payload) {
        Ok(text) => interpret(text, facts),
        Err(_) => Interpretation::Ignored(IgnoreReason::Malformed),
    }
}

fn apply_gesture(fields: &Map<String, Value>, facts: &mut Facts) {
    facts.label = fields.get("label").and_then(Value::as_str).unwrap_or_default().to_string();
    facts.confidence = coerce_finite(fields.get("confidence")).unwrap_or(0.0);
}

fn apply_presence(fields: &Map<String, Value>, facts: &mut Facts) {
    // Unusable counts keep the last good value rather than zeroing it
    if let Some(count) = coerce_finite(fields.get("subscribers")) {
        facts.subscriber_count = count;
    }
}

/// Loose numeric coercion. `None` for absent fields and for values that do
/// not yield a finite number.
fn coerce_finite(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() { 0.0 } else { trimmed.parse::<f64>().ok()? }
        },
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Null => 0.0,
        Value::Array(_) | Value::Object(_) => return None,
    };

    number.is_finite().then_some(number)
}
