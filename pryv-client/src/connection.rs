//! Connection - authenticated access to one user's Pryv API.
//!
//! A [`Connection`] binds a [`Transport`] to an account and token. Besides
//! the typed API calls it tracks the server clock (from the `server-time`
//! header of every response) so that local times can be converted to server
//! times and back, and it owns the [`PushRegistry`] realtime subscribers
//! register with.
//!
//! # Example
//!
//! ```ignore
//! use pryv_client::{Connection, ConnectionSettings, HttpConfig, HttpTransport};
//!
//! let transport = HttpTransport::new(&HttpConfig::default())?;
//! let settings = ConnectionSettings::new("jane", "ck0q9s0u0000001").with_domain("pryv.me");
//! let connection = Connection::new(settings, transport)?;
//!
//! let events = connection
//!     .events_get(&FilterData::new().with_limit(20), &QueryOptions::default())
//!     .await?;
//! ```

use std::sync::{Arc, PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use pryv_core::{FilterData, QueryOptions};
use pryv_types::{
    Access, AccessInfo, ApiError, Event, EventId, EventState, ItemDeletion, NewAccess, NewEvent,
    NewStream, ServerTime, Stream, StreamId,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::ConnectionSettings;
use crate::push::PushRegistry;
use crate::transport::{ApiRequest, ApiResponse, Transport, TransportError};

/// Client errors.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The server answered with an error body.
    #[error("API error ({status}): {error}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error reported by the server.
        error: ApiError,
    },

    /// The response did not have the expected shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Connection settings are unusable.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Username or token missing.
    #[error("missing credentials")]
    MissingCredentials,

    /// An operation needs data that has not been fetched yet.
    #[error("not initialized: {0}")]
    NotInitialized(String),
}

/// Result of deleting an event or a stream.
#[derive(Debug, Clone, PartialEq)]
pub enum TrashOutcome<T = Event> {
    /// The item was moved to the trash.
    Trashed(T),
    /// The item was already trashed and is now deleted for good.
    Deleted(ItemDeletion),
}

/// One call of a batch request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchCall {
    /// API method id, e.g. `events.create`.
    pub method: String,
    /// Method parameters.
    pub params: Value,
}

impl BatchCall {
    /// Create a batch call.
    pub fn new(method: &str, params: Value) -> Self {
        Self {
            method: method.to_string(),
            params,
        }
    }
}

/// Clock and version information learned from responses.
#[derive(Debug, Clone, Default)]
struct ServerInfo {
    /// `local_now - server_time` in seconds.
    delta_secs: f64,
    api_version: Option<String>,
    last_seen: Option<SystemTime>,
}

/// Authenticated connection to one user's API.
pub struct Connection<T: Transport> {
    settings: RwLock<ConnectionSettings>,
    transport: T,
    server_info: RwLock<ServerInfo>,
    access_info: RwLock<Option<AccessInfo>>,
    push: Arc<PushRegistry>,
}

fn local_now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

/// Take `key` out of a response body and decode it.
fn take_field<D: DeserializeOwned>(body: &mut Value, key: &str) -> Result<D, ClientError> {
    let value = body
        .get_mut(key)
        .map(Value::take)
        .ok_or_else(|| ClientError::Protocol(format!("missing `{key}` in response")))?;
    serde_json::from_value(value)
        .map_err(|e| ClientError::Protocol(format!("invalid `{key}` in response: {e}")))
}

/// Decode a DELETE response: `item_key` when trashed, `deletion_key` when gone.
fn take_trash_outcome<D: DeserializeOwned>(
    mut body: Value,
    item_key: &str,
    deletion_key: &str,
) -> Result<TrashOutcome<D>, ClientError> {
    if body.get(item_key).is_some() {
        take_field(&mut body, item_key).map(TrashOutcome::Trashed)
    } else if body.get(deletion_key).is_some() {
        take_field(&mut body, deletion_key).map(TrashOutcome::Deleted)
    } else {
        Err(ClientError::Protocol(format!(
            "delete response has neither `{item_key}` nor `{deletion_key}`"
        )))
    }
}

fn to_payload<P: Serialize + ?Sized>(payload: &P) -> Result<Value, ClientError> {
    serde_json::to_value(payload).map_err(|e| ClientError::Protocol(e.to_string()))
}

impl<T: Transport> Connection<T> {
    /// Create a connection.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidSettings`] if the username, token or
    /// domain is empty.
    pub fn new(settings: ConnectionSettings, transport: T) -> Result<Self, ClientError> {
        if settings.username.is_empty() {
            return Err(ClientError::InvalidSettings("empty username".into()));
        }
        if settings.auth.is_empty() {
            return Err(ClientError::InvalidSettings("empty auth token".into()));
        }
        if settings.domain.is_empty() {
            return Err(ClientError::InvalidSettings("empty domain".into()));
        }

        Ok(Self {
            settings: RwLock::new(settings),
            transport,
            server_info: RwLock::new(ServerInfo::default()),
            access_info: RwLock::new(None),
            push: Arc::new(PushRegistry::new()),
        })
    }

    /// Replace username and token. Cached access info is discarded.
    pub fn attach_credentials(&self, username: &str, auth: &str) -> Result<(), ClientError> {
        if username.is_empty() || auth.is_empty() {
            return Err(ClientError::MissingCredentials);
        }
        {
            let mut settings = self.settings.write().unwrap_or_else(PoisonError::into_inner);
            settings.username = username.to_string();
            settings.auth = auth.to_string();
        }
        *self
            .access_info
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }

    /// A copy of the current settings.
    pub fn settings(&self) -> ConnectionSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Unique identifier: the API URL with the token, `https://user.domain:port/?auth=token`.
    pub fn id(&self) -> String {
        let settings = self.settings();
        format!("{}/?auth={}", settings.base_url(), settings.auth)
    }

    /// Short identifier `username:accessName`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotInitialized`] until [`access_info`](Self::access_info)
    /// has been fetched.
    pub fn short_id(&self) -> Result<String, ClientError> {
        let access = self.access_info.read().unwrap_or_else(PoisonError::into_inner);
        match access.as_ref() {
            Some(info) => Ok(format!("{}:{}", self.settings().username, info.name)),
            None => Err(ClientError::NotInitialized(
                "access info not fetched".into(),
            )),
        }
    }

    /// The transport in use.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The push registry shared by this connection's realtime subscribers.
    pub fn push_registry(&self) -> Arc<PushRegistry> {
        Arc::clone(&self.push)
    }

    // ===========================================
    // Server time
    // ===========================================

    /// Server time corresponding to a local time in milliseconds.
    pub fn server_time_at(&self, local_ms: f64) -> ServerTime {
        let delta = self.server_info_read().delta_secs;
        ServerTime::new(local_ms / 1000.0 - delta)
    }

    /// Current server time estimate.
    pub fn now_server_time(&self) -> ServerTime {
        self.server_time_at(local_now_secs() * 1000.0)
    }

    /// Local time in milliseconds corresponding to a server time.
    pub fn local_time(&self, server: ServerTime) -> f64 {
        let delta = self.server_info_read().delta_secs;
        (server.seconds() + delta) * 1000.0
    }

    /// API version reported by the last response, if any.
    pub fn api_version(&self) -> Option<String> {
        self.server_info_read().api_version.clone()
    }

    /// When the last successful response was received.
    pub fn last_seen(&self) -> Option<SystemTime> {
        self.server_info_read().last_seen
    }

    fn server_info_read(&self) -> std::sync::RwLockReadGuard<'_, ServerInfo> {
        self.server_info
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn record_server_info(&self, response: &ApiResponse) {
        let meta = response.body.get("meta");
        let server_time = response.server_time.or_else(|| {
            meta.and_then(|m| m.get("serverTime"))
                .and_then(Value::as_f64)
                .map(ServerTime::new)
        });
        let api_version = response.api_version.clone().or_else(|| {
            meta.and_then(|m| m.get("apiVersion"))
                .and_then(Value::as_str)
                .map(str::to_string)
        });

        let mut info = self
            .server_info
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(time) = server_time {
            info.delta_secs = local_now_secs() - time.seconds();
        }
        if api_version.is_some() {
            info.api_version = api_version;
        }
        info.last_seen = Some(SystemTime::now());
    }

    // ===========================================
    // Requests
    // ===========================================

    /// Issue an authenticated request and return the JSON body.
    ///
    /// Non-2xx responses become [`ClientError::Api`] when they carry an
    /// error body, [`ClientError::Protocol`] otherwise.
    pub async fn request(&self, request: ApiRequest) -> Result<Value, ClientError> {
        let (base_url, auth) = {
            let settings = self.settings.read().unwrap_or_else(PoisonError::into_inner);
            (settings.base_url(), settings.auth.clone())
        };

        let response = self.transport.send(&base_url, &auth, &request).await?;

        if !response.is_success() {
            tracing::debug!(
                "{} {} failed with status {}",
                request.method.as_str(),
                request.path,
                response.status
            );
            return Err(match ApiError::from_body(&response.body) {
                Some(error) => ClientError::Api {
                    status: response.status,
                    error,
                },
                None => ClientError::Protocol(format!(
                    "unexpected status {} without error body",
                    response.status
                )),
            });
        }

        self.record_server_info(&response);
        Ok(response.body)
    }

    /// Get events matching `filter` with `options` applied on top.
    ///
    /// A filter with an empty stream list matches nothing; no request is sent.
    pub async fn events_get(
        &self,
        filter: &FilterData,
        options: &QueryOptions,
    ) -> Result<Vec<Event>, ClientError> {
        let data = filter.merged(options);
        if data.is_dead_end() {
            tracing::debug!("Skipping events query: filter matches no stream");
            return Ok(Vec::new());
        }

        let mut body = self
            .request(ApiRequest::get("/events").with_query(data.to_query()))
            .await?;
        take_field(&mut body, "events")
    }

    /// Get one event by id.
    pub async fn event_get(&self, id: &EventId) -> Result<Event, ClientError> {
        let mut body = self
            .request(ApiRequest::get(&format!("/events/{id}")))
            .await?;
        take_field(&mut body, "event")
    }

    /// Create an event.
    pub async fn event_create(&self, event: &NewEvent) -> Result<Event, ClientError> {
        let mut body = self
            .request(ApiRequest::post("/events", to_payload(event)?))
            .await?;
        take_field(&mut body, "event")
    }

    /// Update an event with a partial record.
    pub async fn event_update(&self, id: &EventId, changes: &Value) -> Result<Event, ClientError> {
        let mut body = self
            .request(ApiRequest::put(&format!("/events/{id}"), changes.clone()))
            .await?;
        take_field(&mut body, "event")
    }

    /// Trash an event, or delete it for good if it is already trashed.
    pub async fn event_trash(&self, id: &EventId) -> Result<TrashOutcome, ClientError> {
        let body = self
            .request(ApiRequest::delete(&format!("/events/{id}")))
            .await?;
        take_trash_outcome(body, "event", "eventDeletion")
    }

    /// Get the stream tree, optionally below `parent_id`.
    pub async fn streams_get(
        &self,
        parent_id: Option<&StreamId>,
        state: EventState,
    ) -> Result<Vec<Stream>, ClientError> {
        let mut query = Vec::new();
        if let Some(parent) = parent_id {
            query.push(("parentId".to_string(), parent.to_string()));
        }
        if state != EventState::Default {
            query.push(("state".to_string(), state.as_str().to_string()));
        }

        let mut body = self
            .request(ApiRequest::get("/streams").with_query(query))
            .await?;
        take_field(&mut body, "streams")
    }

    /// Create a stream.
    pub async fn stream_create(&self, stream: &NewStream) -> Result<Stream, ClientError> {
        let mut body = self
            .request(ApiRequest::post("/streams", to_payload(stream)?))
            .await?;
        take_field(&mut body, "stream")
    }

    /// Update a stream with a partial record. Setting `parentId` moves it.
    pub async fn stream_update(
        &self,
        id: &StreamId,
        changes: &Value,
    ) -> Result<Stream, ClientError> {
        let mut body = self
            .request(ApiRequest::put(&format!("/streams/{id}"), changes.clone()))
            .await?;
        take_field(&mut body, "stream")
    }

    /// Trash a stream, or delete it for good if it is already trashed.
    ///
    /// When deleting for good, `merge_events_with_parent` decides whether
    /// the stream's events move to its parent or are deleted with it; the
    /// server requires it if the stream has events.
    pub async fn stream_trash(
        &self,
        id: &StreamId,
        merge_events_with_parent: Option<bool>,
    ) -> Result<TrashOutcome<Stream>, ClientError> {
        let mut request = ApiRequest::delete(&format!("/streams/{id}"));
        if let Some(merge) = merge_events_with_parent {
            request = request.with_query(vec![(
                "mergeEventsWithParent".to_string(),
                merge.to_string(),
            )]);
        }
        let body = self.request(request).await?;
        take_trash_outcome(body, "stream", "streamDeletion")
    }

    /// Information about the token in use. Fetched once, then cached.
    pub async fn access_info(&self) -> Result<AccessInfo, ClientError> {
        let cached = self
            .access_info
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(info) = cached {
            return Ok(info);
        }

        let mut body = self.request(ApiRequest::get("/access-info")).await?;
        if let Some(fields) = body.as_object_mut() {
            fields.remove("meta");
        }
        let info: AccessInfo = serde_json::from_value(body)
            .map_err(|e| ClientError::Protocol(format!("invalid access info: {e}")))?;

        *self
            .access_info
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(info.clone());
        Ok(info)
    }

    /// Accesses managed by the token in use.
    pub async fn accesses_get(&self) -> Result<Vec<Access>, ClientError> {
        let mut body = self.request(ApiRequest::get("/accesses")).await?;
        take_field(&mut body, "accesses")
    }

    /// Create an access.
    pub async fn access_create(&self, access: &NewAccess) -> Result<Access, ClientError> {
        let mut body = self
            .request(ApiRequest::post("/accesses", to_payload(access)?))
            .await?;
        take_field(&mut body, "access")
    }

    /// Update an access with a partial record.
    pub async fn access_update(&self, id: &str, changes: &Value) -> Result<Access, ClientError> {
        if id.is_empty() {
            return Err(ClientError::Protocol("access id is empty".into()));
        }
        let mut body = self
            .request(ApiRequest::put(&format!("/accesses/{id}"), changes.clone()))
            .await?;
        take_field(&mut body, "access")
    }

    /// Delete an access. Accesses are not trashed; the first delete removes it.
    pub async fn access_delete(&self, id: &str) -> Result<ItemDeletion, ClientError> {
        if id.is_empty() {
            return Err(ClientError::Protocol("access id is empty".into()));
        }
        let mut body = self
            .request(ApiRequest::delete(&format!("/accesses/{id}")))
            .await?;
        take_field(&mut body, "accessDeletion")
    }

    /// Run several API methods in one request. Results are in call order.
    pub async fn batch_call(&self, calls: &[BatchCall]) -> Result<Vec<Value>, ClientError> {
        let mut body = self.request(ApiRequest::post("/", to_payload(calls)?)).await?;
        take_field(&mut body, "results")
    }
}

impl<T: Transport> std::fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let settings = self.settings();
        f.debug_struct("Connection")
            .field("username", &settings.username)
            .field("domain", &settings.domain)
            .finish_non_exhaustive()
    }
}
