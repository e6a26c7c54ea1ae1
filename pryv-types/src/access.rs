//! Access records and permissions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::StreamId;

/// One permission granted by an access.
///
/// A permission targets either a stream (with its descendants) or a tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    /// Target stream, `*` for all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<StreamId>,
    /// Target tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// `read`, `contribute`, `manage` or `create-only`.
    pub level: String,
    /// Fields not modelled above (defaultName, name, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Permission {
    /// Permission on a stream.
    pub fn stream(stream_id: impl Into<StreamId>, level: &str) -> Self {
        Self {
            stream_id: Some(stream_id.into()),
            tag: None,
            level: level.to_string(),
            extra: Map::new(),
        }
    }
}

/// An access as listed by `GET /accesses`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Access {
    /// Server-assigned identifier.
    pub id: String,
    /// Token to authenticate with.
    #[serde(default)]
    pub token: String,
    /// Access name, unique per user and type.
    pub name: String,
    /// `personal`, `app` or `shared`.
    #[serde(rename = "type")]
    pub access_type: String,
    /// Granted permissions.
    #[serde(default)]
    pub permissions: Vec<Permission>,
    /// Other fields (created, createdBy, lastUsed, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Data for creating an access (`POST /accesses`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccess {
    /// Access name.
    pub name: String,
    /// Access type; the server creates a `shared` access when absent.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub access_type: Option<String>,
    /// Permissions to grant.
    pub permissions: Vec<Permission>,
    /// Requested token; the server generates one when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl NewAccess {
    /// A shared access with the given permissions.
    pub fn shared(name: &str, permissions: Vec<Permission>) -> Self {
        Self {
            name: name.to_string(),
            access_type: Some("shared".to_string()),
            permissions,
            token: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn access_parses_api_payload() {
        let access: Access = serde_json::from_value(json!({
            "id": "acc1",
            "token": "tok1",
            "name": "testAccess",
            "type": "shared",
            "permissions": [{"streamId": "diary", "level": "read"}],
            "created": 1385046854.282,
            "lastUsed": 0
        }))
        .unwrap();

        assert_eq!(access.access_type, "shared");
        assert_eq!(access.permissions, vec![Permission::stream("diary", "read")]);
        assert_eq!(access.extra.get("lastUsed"), Some(&json!(0)));
    }

    #[test]
    fn tag_permission_keeps_unknown_fields() {
        let permission: Permission = serde_json::from_value(json!({
            "tag": "work",
            "level": "contribute",
            "feature": "selfRevoke"
        }))
        .unwrap();

        assert_eq!(permission.stream_id, None);
        assert_eq!(permission.tag.as_deref(), Some("work"));
        let back = serde_json::to_value(&permission).unwrap();
        assert_eq!(back, json!({"tag": "work", "level": "contribute", "feature": "selfRevoke"}));
    }

    #[test]
    fn new_access_omits_unset_fields() {
        let new = NewAccess::shared("reader", vec![Permission::stream("diary", "read")]);
        assert_eq!(
            serde_json::to_value(&new).unwrap(),
            json!({
                "name": "reader",
                "type": "shared",
                "permissions": [{"streamId": "diary", "level": "read"}]
            })
        );
    }
}
