//! The active set: a local mirror of the events matching a filter.
//!
//! This module holds the diff engine behind the monitor. It owns a map from
//! event id to the last-known record and merges query results into it,
//! returning the categorized changes:
//! - [`ActiveSet::apply_changes`] for incremental (modified-since) results
//! - [`ActiveSet::reconcile`] for full snapshots after a filter change
//!
//! Each call computes and applies its result in one step; there is no state
//! in which part of a query result has been merged.
//!
//! Records are stored as `Arc<Event>` so that notifications can share them
//! cheaply and so that entries untouched by a round keep their identity.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use pryv_types::{Event, EventId};

/// Changes found by an incremental round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventsChanged {
    /// Events not previously in the set, now added.
    pub created: Vec<Arc<Event>>,
    /// Known events whose record was replaced.
    pub modified: Vec<Arc<Event>>,
    /// Events reported as trashed, no longer in the set.
    pub trashed: Vec<Arc<Event>>,
}

impl EventsChanged {
    /// Total number of events across all buckets.
    pub fn len(&self) -> usize {
        self.created.len() + self.modified.len() + self.trashed.len()
    }

    /// Whether all buckets are empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Changes found by a full reconciliation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    /// Events that now match and were not in the set.
    pub enter: Vec<Arc<Event>>,
    /// Events that no longer match, removed from the set.
    pub leave: Vec<Arc<Event>>,
}

impl Reconciliation {
    /// Whether nothing entered or left.
    pub fn is_empty(&self) -> bool {
        self.enter.is_empty() && self.leave.is_empty()
    }
}

/// Map of non-trashed events last observed as matching the filter.
#[derive(Debug, Clone, Default)]
pub struct ActiveSet {
    events: BTreeMap<EventId, Arc<Event>>,
}

impl ActiveSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events in the set.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Whether an event id is in the set.
    pub fn contains(&self, id: &str) -> bool {
        self.events.contains_key(id)
    }

    /// Look up an event by id.
    pub fn get(&self, id: &str) -> Option<&Arc<Event>> {
        self.events.get(id)
    }

    /// All events, ordered by id.
    pub fn events(&self) -> Vec<Arc<Event>> {
        self.events.values().cloned().collect()
    }

    /// All ids, ordered.
    pub fn ids(&self) -> Vec<EventId> {
        self.events.keys().cloned().collect()
    }

    /// Drop every event.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Replace the contents with a full snapshot.
    ///
    /// Trashed records are skipped. Returns the loaded events in source order.
    pub fn load(&mut self, events: Vec<Event>) -> Vec<Arc<Event>> {
        self.events.clear();
        let mut loaded = Vec::with_capacity(events.len());
        for event in events {
            if event.trashed {
                continue;
            }
            let event = Arc::new(event);
            self.events.insert(event.id.clone(), Arc::clone(&event));
            loaded.push(event);
        }
        loaded
    }

    /// Merge the result of a modified-since query.
    ///
    /// Every input event lands in exactly one bucket:
    /// - known and trashed → `trashed` (removed)
    /// - known and not trashed → `modified` (replaced)
    /// - unknown and not trashed → `created` (inserted)
    /// - unknown and trashed → `trashed` (never inserted)
    pub fn apply_changes(&mut self, events: Vec<Event>) -> EventsChanged {
        let mut changes = EventsChanged::default();

        for event in events {
            let event = Arc::new(event);
            let known = self.events.contains_key(&event.id);

            match (known, event.trashed) {
                (true, true) => {
                    self.events.remove(&event.id);
                    changes.trashed.push(event);
                }
                (true, false) => {
                    self.events.insert(event.id.clone(), Arc::clone(&event));
                    changes.modified.push(event);
                }
                (false, false) => {
                    self.events.insert(event.id.clone(), Arc::clone(&event));
                    changes.created.push(event);
                }
                (false, true) => {
                    changes.trashed.push(event);
                }
            }
        }

        changes
    }

    /// Diff the set against a full snapshot of the matching events.
    ///
    /// Events already in the set are left untouched (same `Arc`). Trashed
    /// records in the snapshot count as absent.
    pub fn reconcile(&mut self, events: Vec<Event>) -> Reconciliation {
        let mut to_remove: BTreeSet<EventId> = self.events.keys().cloned().collect();
        let mut result = Reconciliation::default();

        for event in events {
            if event.trashed {
                continue;
            }
            if self.events.contains_key(&event.id) {
                to_remove.remove(&event.id);
            } else {
                let event = Arc::new(event);
                self.events.insert(event.id.clone(), Arc::clone(&event));
                result.enter.push(event);
            }
        }

        for id in to_remove {
            if let Some(event) = self.events.remove(&id) {
                result.leave.push(event);
            }
        }

        result
    }
}
