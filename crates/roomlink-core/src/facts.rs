//! Last-known facts observed on the stream.

use serde::Serialize;

/// The latest values surfaced to the polling caller.
///
/// `confidence` and `subscriber_count` are always finite; the interpreter
/// refuses to store anything else.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Facts {
    /// True only while an opened transport has neither errored nor closed.
    pub connected: bool,
    /// Last classification label.
    pub label: String,
    /// Last classification confidence, unrounded.
    pub confidence: f64,
    /// Last reported number of subscribers in the room.
    pub subscriber_count: f64,
}

impl Facts {
    /// Restore every fact to its default.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Confidence as reported to callers.
    pub fn reported_confidence(&self) -> f64 {
        round_confidence(self.confidence)
    }
}

/// Round to two decimal places (halves round up), never yielding `-0.0`.
pub fn round_confidence(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let rounded = (value * 100.0 + 0.5).floor() / 100.0;
    // -0.0 == 0.0, so this also normalises the sign
    if rounded == 0.0 { 0.0 } else { rounded }
}
