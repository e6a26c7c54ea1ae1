//! # pryv-client
//!
//! Client library for the Pryv personal-data API.
//!
//! This is the main library that applications use to read, write and watch
//! events.
//!
//! ## Features
//!
//! - **Connection**: Authenticated API calls with server clock tracking
//! - **Monitor**: Local mirror of the events matching a filter, kept current
//!   from push signals and filter changes
//! - **Transport Abstraction**: Pluggable HTTP layer (reqwest, mock)
//! - **Pure State Machine**: Uses pryv-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use pryv_client::{ClientConfig, Connection, Filter, HttpTransport, Monitor};
//!
//! let config = ClientConfig::from_file(Path::new("pryv.toml"))?;
//! let transport = HttpTransport::new(&config.http)?;
//! let connection = Arc::new(Connection::new(config.connection, transport)?);
//!
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! let monitor = Monitor::new(connection, Arc::new(Filter::default()), tx)?;
//! monitor.start().await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod connection;
pub mod filter;
pub mod monitor;
pub mod push;
pub mod source;
pub mod transport;

pub use config::{ClientConfig, ConfigError, ConnectionSettings, HttpConfig};
pub use connection::{BatchCall, ClientError, Connection, TrashOutcome};
pub use filter::Filter;
pub use monitor::{Monitor, MonitorError, Notification, NotificationSink};
pub use push::{PushRegistry, PushSignal, PushSubscriber, SubscriptionId};
pub use source::EventSource;
pub use transport::{
    ApiRequest, ApiResponse, HttpTransport, Method, MockTransport, SentRequest, Transport,
    TransportError,
};

pub use pryv_core::{EventsChanged, FilterChange, FilterComparison, FilterData, QueryOptions};
pub use pryv_types::{
    Access, Event, EventId, EventState, ItemDeletion, NewAccess, NewEvent, NewStream, Permission,
    ServerTime, Stream, StreamId,
};
