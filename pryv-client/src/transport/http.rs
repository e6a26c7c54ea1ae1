//! HTTP transport backed by reqwest.

use super::{ApiRequest, ApiResponse, Method, Transport, TransportError};
use crate::config::HttpConfig;
use async_trait::async_trait;
use pryv_types::ServerTime;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Transport issuing real HTTP requests.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build a transport from HTTP settings.
    pub fn new(config: &HttpConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| TransportError::RequestFailed(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an existing reqwest client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        TransportError::ConnectionFailed(e.to_string())
    } else {
        TransportError::RequestFailed(e.to_string())
    }
}

fn header_str<'a>(response: &'a reqwest::Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        base_url: &str,
        auth: &str,
        request: &ApiRequest,
    ) -> Result<ApiResponse, TransportError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };
        let url = format!("{}{}", base_url.trim_end_matches('/'), request.path);

        let mut builder = self
            .client
            .request(method, &url)
            .header(reqwest::header::AUTHORIZATION, auth);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        tracing::debug!("{} {}", request.method.as_str(), url);

        let response = builder.send().await.map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let server_time = header_str(&response, "server-time")
            .and_then(|v| v.trim().parse::<f64>().ok())
            .map(ServerTime::new);
        let api_version = header_str(&response, "api-version").map(str::to_string);

        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        let body = if bytes.is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_slice(&bytes)
                .map_err(|e| TransportError::InvalidResponse(e.to_string()))?
        };

        Ok(ApiResponse {
            status,
            server_time,
            api_version,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned response and return the raw request head.
    async fn serve_once(
        status_line: &'static str,
        headers: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            let response = format!(
                "{status_line}\r\n{headers}content-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&buf).to_lowercase()
        });

        (format!("http://{addr}"), handle)
    }

    #[tokio::test]
    async fn sends_auth_and_query_and_reads_headers() {
        let (base_url, server) = serve_once(
            "HTTP/1.1 200 OK",
            "content-type: application/json\r\nserver-time: 1700000000.5\r\napi-version: 1.9.0\r\n",
            r#"{"events":[]}"#,
        )
        .await;

        let transport = HttpTransport::new(&HttpConfig::default()).unwrap();
        let request = ApiRequest::get("/events")
            .with_query(vec![("state".into(), "all".into())]);
        let response = transport.send(&base_url, "tok", &request).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.server_time, Some(ServerTime::new(1700000000.5)));
        assert_eq!(response.api_version.as_deref(), Some("1.9.0"));
        assert_eq!(response.body, json!({"events": []}));

        let head = server.await.unwrap();
        assert!(head.starts_with("get /events?state=all "));
        assert!(head.contains("authorization: tok"));
    }

    #[tokio::test]
    async fn error_status_is_not_a_transport_error() {
        let (base_url, _server) = serve_once(
            "HTTP/1.1 403 Forbidden",
            "content-type: application/json\r\n",
            r#"{"error":{"id":"forbidden","message":"nope"}}"#,
        )
        .await;

        let transport = HttpTransport::new(&HttpConfig::default()).unwrap();
        let response = transport
            .send(&base_url, "tok", &ApiRequest::get("/events"))
            .await
            .unwrap();

        assert_eq!(response.status, 403);
        assert_eq!(response.body["error"]["id"], json!("forbidden"));
    }

    #[tokio::test]
    async fn empty_body_decodes_as_empty_object() {
        let (base_url, _server) = serve_once("HTTP/1.1 200 OK", "", "").await;

        let transport = HttpTransport::new(&HttpConfig::default()).unwrap();
        let response = transport
            .send(&base_url, "tok", &ApiRequest::delete("/events/e1"))
            .await
            .unwrap();

        assert_eq!(response.body, json!({}));
    }

    #[tokio::test]
    async fn unreachable_host_is_connection_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HttpTransport::new(&HttpConfig::default()).unwrap();
        let result = transport
            .send(&format!("http://{addr}"), "tok", &ApiRequest::get("/"))
            .await;

        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
    }
}
