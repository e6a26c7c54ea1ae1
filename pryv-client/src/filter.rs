//! Observable filter.
//!
//! [`Filter`] holds the current [`FilterData`] and broadcasts a
//! [`FilterChange`] on every mutation that actually changes it. Monitors
//! subscribe to the broadcast to run a full reconciliation.

use std::sync::{PoisonError, RwLock};

use pryv_core::{FilterChange, FilterData, FilterError};
use pryv_types::{ServerTime, StreamId};
use tokio::sync::broadcast;

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// A filter that notifies its observers when it changes.
#[derive(Debug)]
pub struct Filter {
    data: RwLock<FilterData>,
    changes: broadcast::Sender<FilterChange>,
}

impl Filter {
    /// Create an observable filter.
    pub fn new(data: FilterData) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            data: RwLock::new(data),
            changes,
        }
    }

    /// A copy of the current filter data.
    pub fn data(&self) -> FilterData {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Receive every future change.
    pub fn subscribe(&self) -> broadcast::Receiver<FilterChange> {
        self.changes.subscribe()
    }

    /// Replace the filter data.
    pub fn set(&self, data: FilterData) -> Option<FilterChange> {
        self.update(|current| *current = data)
    }

    /// Mutate the filter data in place.
    ///
    /// Returns the broadcast change, or `None` if the data is unchanged.
    pub fn update<F>(&self, mutate: F) -> Option<FilterChange>
    where
        F: FnOnce(&mut FilterData),
    {
        let change = {
            let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
            let previous = data.clone();
            mutate(&mut data);
            FilterChange::between(&previous, &data)?
        };

        tracing::debug!(
            "Filter changed (time frame {:?}, streams {:?}, {} observers)",
            change.comparison.time_frame,
            change.comparison.streams,
            self.changes.receiver_count()
        );
        // No receivers is not an error
        let _ = self.changes.send(change.clone());
        Some(change)
    }

    /// Restrict to streams, `None` for all.
    pub fn set_streams(&self, streams: Option<Vec<StreamId>>) -> Option<FilterChange> {
        self.update(|data| data.streams = streams)
    }

    /// Set the time frame.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvalidTimeFrame`] if `from` is after `to`;
    /// the filter is left unchanged.
    pub fn set_time_frame(
        &self,
        from: Option<ServerTime>,
        to: Option<ServerTime>,
    ) -> Result<Option<FilterChange>, FilterError> {
        let checked = FilterData::new().with_time_frame(from, to)?;
        Ok(self.update(|data| {
            data.from_time = checked.from_time;
            data.to_time = checked.to_time;
        }))
    }

    /// Restrict to tags, `None` for any.
    pub fn set_tags(&self, tags: Option<Vec<String>>) -> Option<FilterChange> {
        self.update(|data| data.tags = tags)
    }

    /// Restrict to event types, `None` for any.
    pub fn set_types(&self, types: Option<Vec<String>>) -> Option<FilterChange> {
        self.update(|data| data.types = types)
    }

    /// Set the result limit.
    pub fn set_limit(&self, limit: Option<u32>) -> Option<FilterChange> {
        self.update(|data| data.limit = limit)
    }
}

impl Default for Filter {
    fn default() -> Self {
        Self::new(FilterData::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[tokio::test]
    async fn change_is_broadcast() {
        let filter = Filter::default();
        let mut rx = filter.subscribe();

        let change = filter
            .set_streams(Some(vec![StreamId::new("diary")]))
            .unwrap();
        let received = rx.recv().await.unwrap();

        assert_eq!(received, change);
        assert_eq!(received.previous.streams, None);
        assert_eq!(
            received.current.streams,
            Some(vec![StreamId::new("diary")])
        );
        // Restricting from all streams to one narrows the set
        assert_eq!(received.comparison.streams, Ordering::Greater);
    }

    #[test]
    fn unchanged_data_is_not_broadcast() {
        let filter = Filter::new(FilterData::new().with_limit(10));
        let mut rx = filter.subscribe();

        assert!(filter.set_limit(Some(10)).is_none());
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[test]
    fn invalid_time_frame_leaves_filter_unchanged() {
        let filter = Filter::default();
        let result = filter.set_time_frame(Some(ServerTime::new(20.0)), Some(ServerTime::new(10.0)));

        assert!(matches!(result, Err(FilterError::InvalidTimeFrame { .. })));
        assert_eq!(filter.data(), FilterData::new());
    }

    #[test]
    fn widening_time_frame_is_reported() {
        let filter = Filter::default();
        filter
            .set_time_frame(Some(ServerTime::new(10.0)), Some(ServerTime::new(20.0)))
            .unwrap();

        let change = filter
            .set_time_frame(Some(ServerTime::new(0.0)), Some(ServerTime::new(20.0)))
            .unwrap()
            .unwrap();

        assert!(change.comparison.widens());
        assert_eq!(filter.data().from_time, Some(ServerTime::new(0.0)));
    }

    #[test]
    fn set_without_observers_still_applies() {
        let filter = Filter::default();
        filter.set_tags(Some(vec!["work".into()]));
        filter.set_types(Some(vec!["note/txt".into()]));

        let data = filter.data();
        assert_eq!(data.tags, Some(vec!["work".to_string()]));
        assert_eq!(data.types, Some(vec!["note/txt".to_string()]));
    }
}
