//! Retry delay table.
//!
//! Delays come from a fixed, ordered table instead of a formula. Each
//! scheduled retry consumes the delay at the current index and then advances
//! the index by one, saturating at the last entry, so a run of failures waits
//! `1s, 2s, 3s, 5s, 5s, ...` with the default table.
//!
//! The index returns to zero after a successful open and whenever the caller
//! explicitly asks for a new connection.

use std::time::Duration;

/// Default retry delays.
pub const DEFAULT_BACKOFF_TABLE: [Duration; 4] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(3),
    Duration::from_secs(5),
];

/// Saturating cursor over a retry delay table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    table: Vec<Duration>,
    index: usize,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_BACKOFF_TABLE.to_vec())
    }
}

impl Backoff {
    /// Create a cursor over `table`, positioned at the first entry.
    ///
    /// An empty table is replaced by [`DEFAULT_BACKOFF_TABLE`].
    pub fn new(table: Vec<Duration>) -> Self {
        let table = if table.is_empty() { DEFAULT_BACKOFF_TABLE.to_vec() } else { table };
        Self { table, index: 0 }
    }

    /// Delay for the next retry, advancing the cursor.
    pub fn next_delay(&mut self) -> Duration {
        let last = self.table.len() - 1;
        let index = self.index.min(last);
        self.index = (index + 1).min(last);
        self.table[index]
    }

    /// Delay the next retry would use, without advancing.
    pub fn peek(&self) -> Duration {
        self.table[self.index.min(self.table.len() - 1)]
    }

    /// Return to the first entry.
    pub fn reset(&mut self) {
        self.index = 0;
    }

    /// Current position in the table.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The delays this cursor walks through.
    pub fn table(&self) -> &[Duration] {
        &self.table
    }
}
