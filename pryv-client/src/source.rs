//! The query surface a [`Monitor`](crate::Monitor) needs.

use std::sync::Arc;

use async_trait::async_trait;
use pryv_core::{FilterData, QueryOptions};
use pryv_types::{Event, ServerTime};

use crate::connection::{ClientError, Connection};
use crate::push::PushRegistry;
use crate::transport::Transport;

/// Something that can answer event queries and tell the server time.
///
/// [`Connection`] is the production implementation; tests script their own.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Events matching `filter` with `options` applied on top.
    async fn query_events(
        &self,
        filter: &FilterData,
        options: &QueryOptions,
    ) -> Result<Vec<Event>, ClientError>;

    /// Current server time estimate.
    fn server_time(&self) -> ServerTime;

    /// Push channel to register with, if the source has one.
    fn push_registry(&self) -> Option<Arc<PushRegistry>> {
        None
    }
}

#[async_trait]
impl<T: Transport> EventSource for Connection<T> {
    async fn query_events(
        &self,
        filter: &FilterData,
        options: &QueryOptions,
    ) -> Result<Vec<Event>, ClientError> {
        self.events_get(filter, options).await
    }

    fn server_time(&self) -> ServerTime {
        self.now_server_time()
    }

    fn push_registry(&self) -> Option<Arc<PushRegistry>> {
        Some(Connection::push_registry(self))
    }
}
