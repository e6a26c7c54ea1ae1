//! Sync cursor for incremental event queries.
//!
//! The cursor is the "last synchronized server time": the lower bound used
//! as `modifiedSince` when asking the server for changes. It is advanced to
//! the current server time *before* each query is sent, so writes landing on
//! the server while a query is in flight are picked up by the next round
//! (possibly reported twice, never lost).

use pryv_types::ServerTime;

/// Sentinel "beginning of time" value for a fresh cursor.
pub const BEGINNING_OF_TIME: ServerTime = ServerTime::new(-1_000_000_000_000.0);

/// Tracks the high-water mark of synchronized server time.
///
/// The cursor never moves backwards on [`advance`](Self::advance), even if
/// the server clock estimate does (clock delta corrections).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncCursor {
    last_synced: ServerTime,
}

impl SyncCursor {
    /// Create a cursor at the beginning of time.
    pub fn new() -> Self {
        Self {
            last_synced: BEGINNING_OF_TIME,
        }
    }

    /// Create a cursor at a specific time.
    pub fn with_time(time: ServerTime) -> Self {
        Self { last_synced: time }
    }

    /// The current high-water mark.
    pub fn value(&self) -> ServerTime {
        self.last_synced
    }

    /// Advance the cursor to `now` and return the previous value.
    ///
    /// The returned value is the lower bound for the round being started.
    pub fn advance(&mut self, now: ServerTime) -> ServerTime {
        let previous = self.last_synced;
        self.last_synced = previous.max(now);
        previous
    }

    /// Move the cursor back to a round's lower bound after that round failed.
    ///
    /// Only ever moves backwards; a `bound` above the current value is ignored.
    pub fn rewind(&mut self, bound: ServerTime) {
        if bound < self.last_synced {
            self.last_synced = bound;
        }
    }

    /// Reset the cursor to the beginning of time.
    pub fn reset(&mut self) {
        self.last_synced = BEGINNING_OF_TIME;
    }
}

impl Default for SyncCursor {
    fn default() -> Self {
        Self::new()
    }
}
