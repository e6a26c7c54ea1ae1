//! Stream records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::StreamId;

/// A stream (folder-like container of events), with its children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stream {
    /// Stream identifier.
    pub id: StreamId,
    /// Display name, unique among siblings.
    pub name: String,
    /// Parent stream, `None` at the root.
    #[serde(default)]
    pub parent_id: Option<StreamId>,
    /// Child streams.
    #[serde(default)]
    pub children: Vec<Stream>,
    /// Whether the stream is in the trash.
    #[serde(default)]
    pub trashed: bool,
    /// Fields not modelled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Stream {
    /// Depth-first search for a stream by id in this subtree.
    pub fn find(&self, id: &StreamId) -> Option<&Stream> {
        if &self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Ids of this stream and all its descendants.
    pub fn subtree_ids(&self) -> Vec<StreamId> {
        let mut ids = vec![self.id.clone()];
        for child in &self.children {
            ids.extend(child.subtree_ids());
        }
        ids
    }
}

/// Data for creating a stream (`POST /streams`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStream {
    /// Requested id; the server derives one from the name when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<StreamId>,
    /// Display name, unique among siblings.
    pub name: String,
    /// Parent stream, `None` at the root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<StreamId>,
}

impl NewStream {
    /// A root stream with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            parent_id: None,
        }
    }

    /// Request a specific id.
    pub fn with_id(mut self, id: impl Into<StreamId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Place the stream under `parent_id`.
    pub fn with_parent(mut self, parent_id: impl Into<StreamId>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }
}
