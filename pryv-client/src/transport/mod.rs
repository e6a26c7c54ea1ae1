//! Transport abstraction for the Pryv API.
//!
//! This module provides a pluggable transport layer that abstracts the
//! underlying HTTP stack (reqwest, mock for testing).
//!
//! # Design
//!
//! The transport is request/response oriented: a [`Transport`] takes an
//! [`ApiRequest`] relative to a user's API endpoint and returns the decoded
//! JSON body together with the server-time and API-version headers. Mapping
//! API error payloads to errors is left to [`Connection`](crate::Connection).
//!
//! # Example
//!
//! ```ignore
//! let transport = MockTransport::new();
//! transport.queue_json(json!({"events": []}));
//! let response = transport
//!     .send("https://jane.pryv.me", "token", &ApiRequest::get("/events"))
//!     .await?;
//! ```

mod http;
mod mock;

pub use http::HttpTransport;
pub use mock::{MockTransport, SentRequest};

use async_trait::async_trait;
use pryv_types::ServerTime;
use serde_json::Value;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Could not reach the server.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The request did not complete in time.
    #[error("request timeout")]
    Timeout,

    /// The request could not be built or sent.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// The response body was not valid JSON.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

impl Method {
    /// Upper-case method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

/// A request against a user's API endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the API base URL, with leading slash.
    pub path: String,
    /// Query-string pairs, in order.
    pub query: Vec<(String, String)>,
    /// JSON body, if any.
    pub body: Option<Value>,
}

impl ApiRequest {
    fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            query: Vec::new(),
            body: None,
        }
    }

    /// GET request.
    pub fn get(path: &str) -> Self {
        Self::new(Method::Get, path)
    }

    /// POST request with a JSON body.
    pub fn post(path: &str, body: Value) -> Self {
        Self {
            body: Some(body),
            ..Self::new(Method::Post, path)
        }
    }

    /// PUT request with a JSON body.
    pub fn put(path: &str, body: Value) -> Self {
        Self {
            body: Some(body),
            ..Self::new(Method::Put, path)
        }
    }

    /// DELETE request.
    pub fn delete(path: &str) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Attach query-string pairs.
    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    /// Value of the first query pair named `key`.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A decoded API response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Value of the `server-time` header, if present.
    pub server_time: Option<ServerTime>,
    /// Value of the `api-version` header, if present.
    pub api_version: Option<String>,
    /// JSON body (`{}` when the body was empty).
    pub body: Value,
}

impl ApiResponse {
    /// A 200 response carrying `body`.
    pub fn ok(body: Value) -> Self {
        Self {
            status: 200,
            server_time: None,
            api_version: None,
            body,
        }
    }

    /// Set the status code.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Set the server-time header.
    pub fn with_server_time(mut self, time: ServerTime) -> Self {
        self.server_time = Some(time);
        self
    }

    /// Set the api-version header.
    pub fn with_api_version(mut self, version: &str) -> Self {
        self.api_version = Some(version.to_string());
        self
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport trait for issuing API calls.
///
/// Implementations handle the underlying HTTP mechanism (reqwest, mock,
/// etc). A non-2xx status is not a transport error; it is returned as a
/// response for the caller to interpret.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` to the API at `base_url`, authorized with `auth`.
    async fn send(
        &self,
        base_url: &str,
        auth: &str,
        request: &ApiRequest,
    ) -> Result<ApiResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_builders_set_method_and_body() {
        let get = ApiRequest::get("/events");
        assert_eq!(get.method, Method::Get);
        assert!(get.body.is_none());

        let post = ApiRequest::post("/events", json!({"streamId": "diary"}));
        assert_eq!(post.method, Method::Post);
        assert_eq!(post.body, Some(json!({"streamId": "diary"})));

        assert_eq!(ApiRequest::delete("/events/e1").method.as_str(), "DELETE");
    }

    #[test]
    fn query_value_finds_first_pair() {
        let request = ApiRequest::get("/events").with_query(vec![
            ("streams[]".into(), "a".into()),
            ("streams[]".into(), "b".into()),
            ("state".into(), "all".into()),
        ]);

        assert_eq!(request.query_value("streams[]"), Some("a"));
        assert_eq!(request.query_value("state"), Some("all"));
        assert_eq!(request.query_value("limit"), None);
    }

    #[test]
    fn response_success_range() {
        assert!(ApiResponse::ok(json!({})).is_success());
        assert!(ApiResponse::ok(json!({})).with_status(201).is_success());
        assert!(!ApiResponse::ok(json!({})).with_status(404).is_success());
    }
}
