//! Monitor lifecycle state machine.
//!
//! This module provides a pure, side-effect-free state machine for the
//! monitor lifecycle. The state machine takes events as input and produces
//! a new state plus a list of actions to execute.
//!
//! The actual I/O (queries, push registration) is performed by pryv-client,
//! not by this module.
//!
//! Each start opens a new *session*. Query rounds remember the session they
//! were started in; a response is only applied if that session is still the
//! active one, so responses arriving after a stop or restart are dropped.

/// Monitor lifecycle - NO I/O, just state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Not monitoring.
    Stopped {
        /// Last session that was active (0 if never started).
        session: u64,
    },
    /// Monitoring; rounds tagged with `session` may be applied.
    Active {
        /// Current session number.
        session: u64,
    },
}

impl MonitorState {
    /// Create a new state machine in the Stopped state.
    pub fn new() -> Self {
        Self::Stopped { session: 0 }
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (pryv-client)
    /// is responsible for executing the returned actions.
    pub fn on_event(self, event: MonitorEvent) -> (Self, Vec<Action>) {
        match (self, event) {
            (Self::Stopped { session }, MonitorEvent::StartRequested) => (
                Self::Active {
                    session: session.wrapping_add(1),
                },
                vec![
                    Action::ResetCursor,
                    Action::ClearActiveSet,
                    Action::Subscribe,
                    Action::FetchSnapshot,
                ],
            ),
            // Restart: already subscribed, just reload
            (Self::Active { session }, MonitorEvent::StartRequested) => (
                Self::Active {
                    session: session.wrapping_add(1),
                },
                vec![
                    Action::ResetCursor,
                    Action::ClearActiveSet,
                    Action::FetchSnapshot,
                ],
            ),
            (Self::Active { session }, MonitorEvent::StopRequested) => (
                Self::Stopped { session },
                vec![Action::Unsubscribe, Action::ClearActiveSet],
            ),
            (state @ Self::Active { .. }, MonitorEvent::RealtimeSignal) => {
                (state, vec![Action::FetchChanges])
            }
            (state @ Self::Active { .. }, MonitorEvent::FilterChanged) => {
                (state, vec![Action::FetchAndCompare])
            }

            // Signals while stopped are ignored
            (state, _) => (state, vec![]),
        }
    }

    /// Check if currently monitoring.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    /// The current (or last) session number.
    pub fn session(&self) -> u64 {
        match self {
            Self::Stopped { session } | Self::Active { session } => *session,
        }
    }

    /// Whether a round started in `session` may still apply its result.
    pub fn accepts_round(&self, session: u64) -> bool {
        matches!(self, Self::Active { session: current } if *current == session)
    }
}

impl Default for MonitorState {
    fn default() -> Self {
        Self::new()
    }
}

/// Events that drive the monitor lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorEvent {
    /// `start()` called.
    StartRequested,
    /// `stop()` called.
    StopRequested,
    /// The push channel reported remote event changes.
    RealtimeSignal,
    /// The observed filter was mutated.
    FilterChanged,
}

/// Actions to be executed by the monitor.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Reset the sync cursor to the beginning of time.
    ResetCursor,
    /// Drop every event from the active set.
    ClearActiveSet,
    /// Register with the push channel and the filter.
    Subscribe,
    /// Deregister from the push channel and the filter.
    Unsubscribe,
    /// Query a full snapshot and load it.
    FetchSnapshot,
    /// Query changes since the cursor (incremental reconciliation).
    FetchChanges,
    /// Query a full snapshot and diff it (full reconciliation).
    FetchAndCompare,
}
