//! Identity and ordering types for Pryv.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Identifier of an event.
///
/// Opaque string assigned by the server (cuid format in practice).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Create an EventId from any string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EventId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EventId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for EventId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self.0)
    }
}

/// Identifier of a stream.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(String);

impl StreamId {
    /// Create a StreamId from any string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StreamId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for StreamId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamId({})", self.0)
    }
}

/// A unique identifier for a monitor instance.
///
/// UUID v4 format. Used as the key under which a monitor subscribes to
/// a connection's push channel.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonitorId(uuid::Uuid);

impl MonitorId {
    /// Create a new random MonitorId.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for MonitorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MonitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for MonitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MonitorId({})", self.0)
    }
}

/// A point in time in the server's clock, in seconds since the Unix epoch.
///
/// The API exchanges times as fractional seconds. Local and server clocks
/// differ; see `Connection::server_time_at` for the translation.
#[derive(Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ServerTime(f64);

impl ServerTime {
    /// Create a ServerTime from seconds.
    pub const fn new(seconds: f64) -> Self {
        Self(seconds)
    }

    /// Get the number of seconds.
    pub fn seconds(&self) -> f64 {
        self.0
    }

    /// Return the later of two times.
    pub fn max(self, other: Self) -> Self {
        if other.0 > self.0 {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for ServerTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ServerTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServerTime({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_id_serializes_as_plain_string() {
        let id = EventId::new("ck2abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"ck2abc\"");
        let back: EventId = serde_json::from_str("\"ck2abc\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn event_id_borrows_as_str() {
        let mut set = std::collections::HashSet::new();
        set.insert(EventId::new("e1"));
        assert!(set.contains("e1"));
    }

    #[test]
    fn monitor_id_is_uuid_v4() {
        let id = MonitorId::new();
        assert_eq!(id.as_uuid().get_version_num(), 4);
        assert_ne!(id, MonitorId::new());
    }

    #[test]
    fn server_time_ordering() {
        let t1 = ServerTime::new(100.5);
        let t2 = ServerTime::new(200.0);
        assert!(t1 < t2);
        assert_eq!(t1.max(t2), t2);
        assert_eq!(t2.max(t1), t2);
    }

    #[test]
    fn server_time_is_transparent_number() {
        let t: ServerTime = serde_json::from_str("1385046854.282").unwrap();
        assert_eq!(t.seconds(), 1385046854.282);
    }
}
