//! Event filter algebra.
//!
//! [`FilterData`] describes which events are of interest: a set of streams,
//! a time frame, a trash state and a few paging/selection parameters. This
//! module turns it into query parameters, compares two filters to tell
//! whether the matched set grew or shrank, and matches individual events.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use pryv_types::{Event, EventState, ServerTime, StreamId};
use thiserror::Error;

/// `modifiedSince` override used for full snapshots.
///
/// Combined with [`EventState::All`], it makes the server return every
/// matching event regardless of its default paging.
pub const SNAPSHOT_MODIFIED_SINCE: ServerTime = ServerTime::new(-100_000_000.0);

/// Filter errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    /// `from` is after `to`.
    #[error("invalid time frame: from {from} is after to {to}")]
    InvalidTimeFrame {
        /// Start of the frame.
        from: ServerTime,
        /// End of the frame.
        to: ServerTime,
    },
}

/// A point-in-time description of which events match.
///
/// `streams: None` matches every stream, `Some(vec![])` matches none.
/// Missing time bounds are open-ended.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterData {
    /// Streams to include, `None` for all.
    pub streams: Option<Vec<StreamId>>,
    /// Earliest event time (inclusive).
    pub from_time: Option<ServerTime>,
    /// Latest event time (inclusive).
    pub to_time: Option<ServerTime>,
    /// Trash state selector.
    pub state: EventState,
    /// Only events modified after this time.
    pub modified_since: Option<ServerTime>,
    /// Only events carrying any of these tags.
    pub tags: Option<Vec<String>>,
    /// Only events of these types.
    pub types: Option<Vec<String>>,
    /// Maximum number of events returned.
    pub limit: Option<u32>,
    /// Number of events to skip.
    pub skip: Option<u32>,
    /// Return oldest first.
    pub sort_ascending: Option<bool>,
}

impl FilterData {
    /// A filter matching every non-trashed event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to the given streams.
    pub fn with_streams<I, S>(mut self, streams: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<StreamId>,
    {
        self.streams = Some(streams.into_iter().map(Into::into).collect());
        self
    }

    /// Restrict to a time frame. Either bound may be open.
    pub fn with_time_frame(
        mut self,
        from: Option<ServerTime>,
        to: Option<ServerTime>,
    ) -> Result<Self, FilterError> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(FilterError::InvalidTimeFrame { from, to });
            }
        }
        self.from_time = from;
        self.to_time = to;
        Ok(self)
    }

    /// Select a trash state.
    pub fn with_state(mut self, state: EventState) -> Self {
        self.state = state;
        self
    }

    /// Limit the number of events returned.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether this filter can never match anything (empty stream list).
    pub fn is_dead_end(&self) -> bool {
        matches!(&self.streams, Some(s) if s.is_empty())
    }

    /// Apply per-query overrides. Override values win over the filter's.
    pub fn merged(&self, options: &QueryOptions) -> FilterData {
        let mut data = self.clone();
        if let Some(since) = options.modified_since {
            data.modified_since = Some(since);
        }
        if let Some(state) = options.state {
            data.state = state;
        }
        data
    }

    /// Encode as query-string pairs.
    ///
    /// Unset fields are omitted. Lists are sent as repeated `key[]` pairs.
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();

        let mut push_list = |key: &str, values: &[String]| {
            for value in values {
                query.push((format!("{key}[]"), value.clone()));
            }
        };

        if let Some(streams) = &self.streams {
            let ids: Vec<String> = streams.iter().map(|s| s.to_string()).collect();
            push_list("streams", &ids);
        }
        if let Some(tags) = &self.tags {
            push_list("tags", tags);
        }
        if let Some(types) = &self.types {
            push_list("types", types);
        }

        if let Some(from) = self.from_time {
            query.push(("fromTime".into(), from.to_string()));
        }
        if let Some(to) = self.to_time {
            query.push(("toTime".into(), to.to_string()));
        }
        if self.state != EventState::Default {
            query.push(("state".into(), self.state.as_str().into()));
        }
        if let Some(since) = self.modified_since {
            query.push(("modifiedSince".into(), since.to_string()));
        }
        if let Some(limit) = self.limit {
            query.push(("limit".into(), limit.to_string()));
        }
        if let Some(skip) = self.skip {
            query.push(("skip".into(), skip.to_string()));
        }
        if let Some(ascending) = self.sort_ascending {
            query.push(("sortAscending".into(), ascending.to_string()));
        }

        query
    }

    /// Compare the sets matched by `self` and `other`.
    ///
    /// For each dimension: `Equal` when identical, `Greater` when `self`
    /// strictly covers `other`, `Less` when `other` matches something `self`
    /// does not.
    pub fn compare(&self, other: &FilterData) -> FilterComparison {
        FilterComparison {
            time_frame: self.compare_time_frame(other),
            streams: self.compare_streams(other),
        }
    }

    fn compare_time_frame(&self, other: &FilterData) -> Ordering {
        if self.from_time == other.from_time && self.to_time == other.to_time {
            return Ordering::Equal;
        }
        let from_covers = match (self.from_time, other.from_time) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(mine), Some(theirs)) => mine <= theirs,
        };
        let to_covers = match (self.to_time, other.to_time) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(mine), Some(theirs)) => mine >= theirs,
        };
        if from_covers && to_covers {
            Ordering::Greater
        } else {
            Ordering::Less
        }
    }

    fn compare_streams(&self, other: &FilterData) -> Ordering {
        match (&self.streams, &other.streams) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(mine), Some(theirs)) => {
                let mine: BTreeSet<&StreamId> = mine.iter().collect();
                let theirs: BTreeSet<&StreamId> = theirs.iter().collect();
                if mine == theirs {
                    Ordering::Equal
                } else if theirs.is_subset(&mine) {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
        }
    }

    /// Whether an event is matched by this filter.
    ///
    /// Checks trash state, stream membership and time frame (inclusive).
    /// Tags and types are left to the server.
    pub fn matches(&self, event: &Event) -> bool {
        if !self.state.accepts(event.trashed) {
            return false;
        }
        if let Some(streams) = &self.streams {
            if !streams.contains(&event.stream_id) {
                return false;
            }
        }
        if let Some(from) = self.from_time {
            if event.time < from {
                return false;
            }
        }
        if let Some(to) = self.to_time {
            if event.time > to {
                return false;
            }
        }
        true
    }
}

/// Result of [`FilterData::compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterComparison {
    /// Time frame coverage.
    pub time_frame: Ordering,
    /// Stream coverage.
    pub streams: Ordering,
}

impl FilterComparison {
    /// Whether the other filter may match events this one does not.
    pub fn widens(&self) -> bool {
        self.time_frame == Ordering::Less || self.streams == Ordering::Less
    }
}

/// Per-query overrides applied on top of a filter.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct QueryOptions {
    /// Override for `modifiedSince`.
    pub modified_since: Option<ServerTime>,
    /// Override for the trash state.
    pub state: Option<EventState>,
}

impl QueryOptions {
    /// Full snapshot: every state, no effective modification bound.
    pub fn snapshot() -> Self {
        Self {
            modified_since: Some(SNAPSHOT_MODIFIED_SINCE),
            state: Some(EventState::All),
        }
    }

    /// Changes since `since`, trashed events included.
    pub fn changes_since(since: ServerTime) -> Self {
        Self {
            modified_since: Some(since),
            state: Some(EventState::All),
        }
    }
}

/// Describes a mutation of an observable filter.
///
/// Carried to consumers as `filterInfo` in filter-triggered notifications.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterChange {
    /// Filter before the mutation.
    pub previous: FilterData,
    /// Filter after the mutation.
    pub current: FilterData,
    /// `previous.compare(&current)`.
    pub comparison: FilterComparison,
}

impl FilterChange {
    /// Describe the change from `previous` to `current`, or `None` if equal.
    pub fn between(previous: &FilterData, current: &FilterData) -> Option<Self> {
        if previous == current {
            return None;
        }
        Some(Self {
            previous: previous.clone(),
            current: current.clone(),
            comparison: previous.compare(current),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(from: Option<f64>, to: Option<f64>) -> FilterData {
        FilterData::new()
            .with_time_frame(from.map(ServerTime::new), to.map(ServerTime::new))
            .unwrap()
    }

    fn streams(ids: Option<&[&str]>) -> FilterData {
        let mut data = FilterData::new();
        data.streams = ids.map(|ids| ids.iter().map(|s| StreamId::new(*s)).collect());
        data
    }

    fn event(stream: &str, time: f64) -> Event {
        Event::new("e", stream, ServerTime::new(time), "note/txt")
    }

    // ===========================================
    // Query Encoding Tests
    // ===========================================

    #[test]
    fn query_omits_unset_fields() {
        assert!(FilterData::new().to_query().is_empty());
    }

    #[test]
    fn query_encodes_lists_as_repeated_keys() {
        let data = FilterData::new().with_streams(["a", "b"]);
        assert_eq!(
            data.to_query(),
            vec![
                ("streams[]".to_string(), "a".to_string()),
                ("streams[]".to_string(), "b".to_string()),
            ]
        );
    }

    #[test]
    fn query_encodes_scalars() {
        let mut data = frame(Some(0.0), Some(20.5)).with_state(EventState::All);
        data.modified_since = Some(ServerTime::new(1.0));
        data.limit = Some(10);

        let query = data.to_query();
        assert!(query.contains(&("fromTime".into(), "0".into())));
        assert!(query.contains(&("toTime".into(), "20.5".into())));
        assert!(query.contains(&("state".into(), "all".into())));
        assert!(query.contains(&("modifiedSince".into(), "1".into())));
        assert!(query.contains(&("limit".into(), "10".into())));
        assert_eq!(query.len(), 5);
    }

    #[test]
    fn merged_overrides_win() {
        let mut data = FilterData::new().with_streams(["a"]);
        data.modified_since = Some(ServerTime::new(5.0));

        let merged = data.merged(&QueryOptions::changes_since(ServerTime::new(42.0)));
        assert_eq!(merged.modified_since, Some(ServerTime::new(42.0)));
        assert_eq!(merged.state, EventState::All);
        assert_eq!(merged.streams, data.streams);

        let untouched = data.merged(&QueryOptions::default());
        assert_eq!(untouched, data);
    }

    #[test]
    fn invalid_time_frame_is_rejected() {
        let result =
            FilterData::new().with_time_frame(Some(ServerTime::new(2.0)), Some(ServerTime::new(1.0)));
        assert!(matches!(result, Err(FilterError::InvalidTimeFrame { .. })));
    }

    #[test]
    fn dead_end_filter() {
        assert!(streams(Some(&[])).is_dead_end());
        assert!(!streams(None).is_dead_end());
        assert!(!streams(Some(&["a"])).is_dead_end());
    }

    // ===========================================
    // Comparison Tests
    // ===========================================

    #[test]
    fn identical_filters_compare_equal() {
        let f1 = frame(Some(0.0), Some(1.0)).with_streams(["a", "b", "c"]);
        let f2 = frame(Some(0.0), Some(1.0)).with_streams(["c", "b", "a"]);
        let c = f1.compare(&f2);
        assert_eq!(c.time_frame, Ordering::Equal);
        assert_eq!(c.streams, Ordering::Equal);
        assert!(!c.widens());
    }

    #[test]
    fn wider_other_compares_less() {
        let f1 = frame(Some(0.0), Some(1.0)).with_streams(["a", "b", "c"]);

        let f2 = frame(Some(0.0), None).with_streams(["a", "b", "c", "d"]);
        let c = f1.compare(&f2);
        assert_eq!(c.time_frame, Ordering::Less);
        assert_eq!(c.streams, Ordering::Less);
        assert!(c.widens());

        let f3 = frame(Some(0.0), Some(2.0));
        assert_eq!(f1.compare(&f3).time_frame, Ordering::Less);
        // No stream restriction means all streams
        assert_eq!(f1.compare(&f3).streams, Ordering::Less);
    }

    #[test]
    fn shifted_time_frame_compares_less() {
        let f1 = frame(Some(1.0), Some(2.0));
        let f2 = frame(Some(0.0), Some(2.0));
        assert_eq!(f1.compare(&f2).time_frame, Ordering::Less);
    }

    #[test]
    fn narrower_other_compares_greater() {
        let f1 = frame(None, None).with_streams(["a", "b", "c"]);

        let f2 = frame(Some(0.0), Some(2.0)).with_streams(["a"]);
        let c = f1.compare(&f2);
        assert_eq!(c.time_frame, Ordering::Greater);
        assert_eq!(c.streams, Ordering::Greater);

        let f3 = frame(Some(0.0), Some(3.0)).with_streams(Vec::<&str>::new());
        let c = f1.compare(&f3);
        assert_eq!(c.time_frame, Ordering::Greater);
        assert_eq!(c.streams, Ordering::Greater);
    }

    #[test]
    fn unrestricted_streams_versus_lists() {
        assert_eq!(streams(None).compare(&streams(Some(&[]))).streams, Ordering::Greater);
        assert_eq!(streams(None).compare(&streams(Some(&["a"]))).streams, Ordering::Greater);
        assert_eq!(streams(Some(&[])).compare(&streams(None)).streams, Ordering::Less);
    }

    #[test]
    fn filter_change_between_equal_filters_is_none() {
        let f = FilterData::new().with_streams(["a"]);
        assert!(FilterChange::between(&f, &f.clone()).is_none());

        let g = FilterData::new().with_streams(["a", "b"]);
        let change = FilterChange::between(&f, &g).unwrap();
        assert_eq!(change.comparison.streams, Ordering::Less);
        assert_eq!(change.current, g);
    }

    // ===========================================
    // Event Matching Tests
    // ===========================================

    #[test]
    fn event_in_filter_time_frame() {
        let f1 = frame(Some(0.0), Some(2.0)).with_streams(["a", "b", "c"]);
        let f2 = frame(None, None);

        assert!(f1.matches(&event("a", 1.0)));
        assert!(f2.matches(&event("a", 1.0)));
        assert!(!f1.matches(&event("a", 3.0)));
    }

    #[test]
    fn event_in_filter_streams() {
        let f1 = frame(Some(0.0), Some(2.0)).with_streams(["a", "b", "c"]);
        assert!(!f1.matches(&event("e", 1.0)));
    }

    #[test]
    fn time_frame_bounds_are_inclusive() {
        let f = frame(Some(1.0), Some(2.0));
        assert!(f.matches(&event("a", 1.0)));
        assert!(f.matches(&event("a", 2.0)));
    }

    #[test]
    fn trashed_events_follow_state() {
        let trashed = event("a", 1.0).with_trashed(true);
        assert!(!FilterData::new().matches(&trashed));
        assert!(FilterData::new().with_state(EventState::All).matches(&trashed));
        assert!(FilterData::new().with_state(EventState::Trashed).matches(&trashed));
    }
}
