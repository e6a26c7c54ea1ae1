//! Mock transport for testing.
//!
//! Allows queueing responses and capturing sent requests for verification.

use super::{ApiRequest, ApiResponse, Transport, TransportError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A request captured by [`MockTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentRequest {
    /// Base URL the request was sent to.
    pub base_url: String,
    /// Authorization token used.
    pub auth: String,
    /// The request itself.
    pub request: ApiRequest,
}

/// Mock transport for testing.
///
/// Responses are returned in the order they were queued. Sending with an
/// empty queue fails with [`TransportError::ConnectionFailed`].
#[derive(Debug, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    sent_requests: Vec<SentRequest>,
    response_queue: VecDeque<ApiResponse>,
    fail_next_send: Option<TransportError>,
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response to be returned by the next `send()` call.
    pub fn queue_response(&self, response: ApiResponse) {
        let mut inner = self.inner.lock().unwrap();
        inner.response_queue.push_back(response);
    }

    /// Queue a 200 response with the given JSON body.
    pub fn queue_json(&self, body: Value) {
        self.queue_response(ApiResponse::ok(body));
    }

    /// Get all requests that were sent.
    pub fn sent_requests(&self) -> Vec<SentRequest> {
        let inner = self.inner.lock().unwrap();
        inner.sent_requests.clone()
    }

    /// Get the last request that was sent.
    pub fn last_sent(&self) -> Option<SentRequest> {
        let inner = self.inner.lock().unwrap();
        inner.sent_requests.last().cloned()
    }

    /// Cause the next send() to fail with the given error.
    pub fn fail_next_send(&self, error: TransportError) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_send = Some(error);
    }

    /// Clear all state (requests, queue, failures).
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        *inner = MockTransportInner::default();
    }
}

impl Clone for MockTransport {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        base_url: &str,
        auth: &str,
        request: &ApiRequest,
    ) -> Result<ApiResponse, TransportError> {
        let mut inner = self.inner.lock().unwrap();

        inner.sent_requests.push(SentRequest {
            base_url: base_url.to_string(),
            auth: auth.to_string(),
            request: request.clone(),
        });

        // Check for forced failure
        if let Some(error) = inner.fail_next_send.take() {
            return Err(error);
        }

        inner
            .response_queue
            .pop_front()
            .ok_or_else(|| TransportError::ConnectionFailed("no queued response".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ===========================================
    // MockTransport Basic Tests
    // ===========================================

    #[tokio::test]
    async fn mock_transport_records_requests() {
        let transport = MockTransport::new();
        transport.queue_json(json!({"a": 1}));
        transport.queue_json(json!({"b": 2}));

        transport
            .send("https://u.pryv.me", "tok", &ApiRequest::get("/events"))
            .await
            .unwrap();
        transport
            .send("https://u.pryv.me", "tok", &ApiRequest::get("/streams"))
            .await
            .unwrap();

        let sent = transport.sent_requests();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].request.path, "/events");
        assert_eq!(sent[1].auth, "tok");
        assert_eq!(
            transport.last_sent().unwrap().request.path,
            "/streams".to_string()
        );
    }

    #[tokio::test]
    async fn mock_transport_returns_queued_responses_in_order() {
        let transport = MockTransport::new();
        transport.queue_json(json!({"n": 1}));
        transport.queue_response(ApiResponse::ok(json!({"n": 2})).with_status(201));

        let r1 = transport
            .send("u", "t", &ApiRequest::get("/x"))
            .await
            .unwrap();
        let r2 = transport
            .send("u", "t", &ApiRequest::get("/x"))
            .await
            .unwrap();

        assert_eq!(r1.body, json!({"n": 1}));
        assert_eq!(r2.status, 201);
    }

    #[tokio::test]
    async fn mock_transport_empty_queue_fails() {
        let transport = MockTransport::new();
        let result = transport.send("u", "t", &ApiRequest::get("/x")).await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
    }

    #[tokio::test]
    async fn mock_transport_fail_next_send() {
        let transport = MockTransport::new();
        transport.queue_json(json!({}));
        transport.fail_next_send(TransportError::Timeout);

        let result = transport.send("u", "t", &ApiRequest::get("/x")).await;
        assert!(matches!(result, Err(TransportError::Timeout)));

        // Failure is one-shot; the queued response is still there
        let result = transport.send("u", "t", &ApiRequest::get("/x")).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn mock_transport_clone_shares_state() {
        let transport = MockTransport::new();
        let clone = transport.clone();

        clone.queue_json(json!({}));
        transport
            .send("u", "t", &ApiRequest::get("/x"))
            .await
            .unwrap();

        assert_eq!(clone.sent_requests().len(), 1);
    }

    #[tokio::test]
    async fn mock_transport_reset() {
        let transport = MockTransport::new();
        transport.queue_json(json!({}));
        transport
            .send("u", "t", &ApiRequest::get("/x"))
            .await
            .unwrap();

        transport.reset();

        assert!(transport.sent_requests().is_empty());
        assert!(transport.last_sent().is_none());
    }
}
