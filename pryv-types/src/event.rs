//! Event records and auxiliary payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{EventId, Permission, ServerTime, StreamId};

/// Trash-state selector used by queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventState {
    /// Only non-trashed items (server default).
    #[default]
    Default,
    /// Only trashed items.
    Trashed,
    /// Both trashed and non-trashed items.
    All,
}

impl EventState {
    /// Query-string value for this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Trashed => "trashed",
            Self::All => "all",
        }
    }

    /// Whether an item with the given trashed flag is selected by this state.
    pub fn accepts(&self, trashed: bool) -> bool {
        match self {
            Self::Default => !trashed,
            Self::Trashed => trashed,
            Self::All => true,
        }
    }
}

/// An event as returned by the API.
///
/// Only `id` and `trashed` carry meaning for synchronization; every other
/// field is passed through untouched, including fields this crate does not
/// know about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Server-assigned identifier.
    pub id: EventId,
    /// Stream the event belongs to.
    pub stream_id: StreamId,
    /// Event time (server clock).
    pub time: ServerTime,
    /// Event type, e.g. `note/txt`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Duration in seconds; `None` for instantaneous or running events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Type-dependent content.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub content: Value,
    /// Free-form tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the event is in the trash.
    #[serde(default)]
    pub trashed: bool,
    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<ServerTime>,
    /// Access id of the creator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// Last modification time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<ServerTime>,
    /// Access id of the last modifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_by: Option<String>,
    /// Fields not modelled above (attachments, clientData, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Event {
    /// Create a minimal event. Mostly useful for tests and fixtures.
    pub fn new(
        id: impl Into<EventId>,
        stream_id: impl Into<StreamId>,
        time: ServerTime,
        event_type: &str,
    ) -> Self {
        Self {
            id: id.into(),
            stream_id: stream_id.into(),
            time,
            event_type: event_type.to_string(),
            duration: None,
            content: Value::Null,
            tags: Vec::new(),
            description: None,
            trashed: false,
            created: None,
            created_by: None,
            modified: None,
            modified_by: None,
            extra: Map::new(),
        }
    }

    /// Set the content.
    pub fn with_content(mut self, content: Value) -> Self {
        self.content = content;
        self
    }

    /// Set the trashed flag.
    pub fn with_trashed(mut self, trashed: bool) -> Self {
        self.trashed = trashed;
        self
    }
}

/// Data for creating an event (`POST /events`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    /// Target stream.
    pub stream_id: StreamId,
    /// Event type, e.g. `note/txt`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event time; the server uses its current time when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<ServerTime>,
    /// Duration in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Type-dependent content.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub content: Value,
    /// Free-form tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl NewEvent {
    /// Create an event of the given type in a stream.
    pub fn new(stream_id: impl Into<StreamId>, event_type: &str, content: Value) -> Self {
        Self {
            stream_id: stream_id.into(),
            event_type: event_type.to_string(),
            time: None,
            duration: None,
            content,
            tags: Vec::new(),
            description: None,
        }
    }
}

/// Information about the access token in use (`GET /access-info`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessInfo {
    /// Access name, unique per user.
    pub name: String,
    /// Access type: `personal`, `app` or `shared`.
    #[serde(rename = "type")]
    pub access_type: String,
    /// Granted permissions.
    #[serde(default)]
    pub permissions: Vec<Permission>,
    /// Other fields (token, user, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Returned when an already-trashed item is deleted for good.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDeletion {
    /// Id of the deleted item.
    pub id: String,
}
