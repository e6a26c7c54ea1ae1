//! Monitor - keeps a local mirror of the events matching a filter.
//!
//! A [`Monitor`] loads a snapshot of the events matching a [`Filter`] on
//! [`start`](Monitor::start), then keeps it current:
//! - push signals from the source trigger an incremental round (changes
//!   since the cursor), reported as [`Notification::EventsChanged`]
//! - filter mutations trigger a full reconciliation, reported as
//!   [`Notification::FilterChanged`]
//!
//! # Architecture
//!
//! The monitor uses the pure lifecycle machine and diff engine from
//! pryv-core and interprets their actions against an [`EventSource`].
//!
//! ```text
//! push / filter → Monitor → EventSource → Connection → Transport
//!                    ↓
//!               pryv-core (MonitorState, ActiveSet, SyncCursor)
//! ```
//!
//! Rounds are serialized: each holds the round lock across query and apply,
//! so the active set is never seen half-updated and results are applied in
//! trigger order. A round only applies its result if the session it started
//! in is still current; responses that land after `stop()` are dropped.
//!
//! # Example
//!
//! ```ignore
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! let filter = Arc::new(Filter::new(FilterData::new().with_streams(["diary"])));
//! let monitor = Monitor::new(Arc::new(connection), filter, tx)?;
//!
//! monitor.start().await;
//! while let Some(notification) = rx.recv().await {
//!     // Loaded, EventsChanged, FilterChanged, Error
//! }
//! ```

use std::sync::{Arc, Mutex, PoisonError, Weak};

use pryv_core::{
    Action, ActiveSet, EventsChanged, FilterChange, MonitorEvent, MonitorState, QueryOptions,
    SyncCursor,
};
use pryv_types::{Event, EventState, MonitorId, ServerTime};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::connection::ClientError;
use crate::filter::Filter;
use crate::push::{PushRegistry, PushSignal, PushSubscriber, SubscriptionId};
use crate::source::EventSource;

/// What a monitor reports.
#[derive(Debug, Clone)]
pub enum Notification {
    /// Initial snapshot loaded by `start()`.
    Loaded(Vec<Arc<Event>>),
    /// A round failed. The active set is unchanged.
    Error(ClientError),
    /// Result of an incremental round.
    EventsChanged(EventsChanged),
    /// Result of a full reconciliation after a filter change.
    FilterChanged {
        /// Events that now match.
        enter: Vec<Arc<Event>>,
        /// Events that no longer match.
        leave: Vec<Arc<Event>>,
        /// The filter change that triggered the round.
        filter_info: FilterChange,
    },
}

/// Receiver of monitor notifications.
pub trait NotificationSink: Send + Sync {
    /// Deliver a notification. Must not block.
    fn notify(&self, notification: Notification);
}

impl NotificationSink for UnboundedSender<Notification> {
    fn notify(&self, notification: Notification) {
        // Receiver gone: nobody is listening any more
        let _ = self.send(notification);
    }
}

/// Monitor construction errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MonitorError {
    /// Only filters selecting non-trashed events can be monitored.
    #[error("cannot monitor a filter with state {0:?}")]
    UnsupportedState(EventState),
}

/// Cursor and active set, guarded together by the round lock.
#[derive(Debug, Default)]
struct RoundState {
    cursor: SyncCursor,
    active: ActiveSet,
}

#[derive(Default)]
struct Subscriptions {
    push: Option<(Arc<PushRegistry>, SubscriptionId)>,
    filter_listener: Option<JoinHandle<()>>,
    runtime: Option<Handle>,
}

impl Subscriptions {
    fn release(&mut self) {
        if let Some((registry, id)) = self.push.take() {
            registry.unsubscribe(id);
        }
        if let Some(listener) = self.filter_listener.take() {
            listener.abort();
        }
        self.runtime = None;
    }
}

struct MonitorInner<S: EventSource + 'static> {
    id: MonitorId,
    source: Arc<S>,
    filter: Arc<Filter>,
    sink: Box<dyn NotificationSink>,
    lifecycle: Mutex<MonitorState>,
    round: tokio::sync::Mutex<RoundState>,
    subscriptions: Mutex<Subscriptions>,
}

/// Keeps a local mirror of the events matching a filter.
///
/// Dropping the monitor stops it.
pub struct Monitor<S: EventSource + 'static> {
    inner: Arc<MonitorInner<S>>,
}

impl<S: EventSource + 'static> Monitor<S> {
    /// Create a stopped monitor.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::UnsupportedState`] if the filter selects
    /// trashed events.
    pub fn new(
        source: Arc<S>,
        filter: Arc<Filter>,
        sink: impl NotificationSink + 'static,
    ) -> Result<Self, MonitorError> {
        let state = filter.data().state;
        if state != EventState::Default {
            return Err(MonitorError::UnsupportedState(state));
        }

        Ok(Self {
            inner: Arc::new(MonitorInner {
                id: MonitorId::new(),
                source,
                filter,
                sink: Box::new(sink),
                lifecycle: Mutex::new(MonitorState::new()),
                round: tokio::sync::Mutex::new(RoundState::default()),
                subscriptions: Mutex::new(Subscriptions::default()),
            }),
        })
    }

    /// Unique id of this monitor.
    pub fn id(&self) -> MonitorId {
        self.inner.id
    }

    /// The observed filter.
    pub fn filter(&self) -> Arc<Filter> {
        Arc::clone(&self.inner.filter)
    }

    /// Whether the monitor is started.
    pub fn is_active(&self) -> bool {
        self.inner.lifecycle().is_active()
    }

    /// Start (or restart) monitoring and load the initial snapshot.
    ///
    /// Emits [`Notification::Loaded`] or [`Notification::Error`]. On error
    /// the monitor stays started with an empty set; call `start()` again
    /// to retry the load.
    pub async fn start(&self) {
        self.inner.handle(MonitorEvent::StartRequested, None).await;
    }

    /// Stop monitoring and discard the active set.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Run an incremental round, as a push signal would.
    pub async fn on_realtime_signal(&self) {
        self.inner.handle(MonitorEvent::RealtimeSignal, None).await;
    }

    /// Run a full reconciliation, reporting `change` as its cause.
    pub async fn on_filter_changed(&self, change: FilterChange) {
        self.inner
            .handle(MonitorEvent::FilterChanged, Some(change))
            .await;
    }

    /// Events currently in the active set. Empty when stopped.
    pub async fn events(&self) -> Vec<Arc<Event>> {
        if !self.is_active() {
            return Vec::new();
        }
        self.inner.round.lock().await.active.events()
    }
}

impl<S: EventSource + 'static> Drop for Monitor<S> {
    fn drop(&mut self) {
        self.inner.stop();
    }
}

impl<S: EventSource + 'static> std::fmt::Debug for Monitor<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("id", &self.inner.id)
            .field("state", &self.inner.lifecycle())
            .finish_non_exhaustive()
    }
}

impl<S: EventSource + 'static> MonitorInner<S> {
    fn lifecycle(&self) -> MonitorState {
        *self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, event: MonitorEvent) -> (u64, Vec<Action>) {
        let mut state = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        let (next, actions) = state.on_event(event);
        *state = next;
        (next.session(), actions)
    }

    fn accepts(&self, session: u64) -> bool {
        self.lifecycle().accepts_round(session)
    }

    fn stop(&self) {
        let (_, actions) = self.transition(MonitorEvent::StopRequested);
        for action in actions {
            match action {
                Action::Unsubscribe => self.unsubscribe(),
                Action::ClearActiveSet => {
                    // A running round clears the set itself once it sees the stop
                    if let Ok(mut round) = self.round.try_lock() {
                        round.active.clear();
                    }
                }
                _ => {}
            }
        }
        tracing::debug!("Monitor {} stopped", self.id);
    }

    /// Drive the lifecycle with `event` and execute the resulting actions.
    async fn handle(self: &Arc<Self>, event: MonitorEvent, mut change: Option<FilterChange>) {
        let (session, actions) = self.transition(event);

        let mut needs_round = false;
        for action in &actions {
            match action {
                Action::Subscribe => self.subscribe(),
                Action::Unsubscribe => self.unsubscribe(),
                _ => needs_round = true,
            }
        }
        if !needs_round {
            return;
        }

        let mut round = self.round.lock().await;
        for action in actions {
            match action {
                Action::Subscribe | Action::Unsubscribe => {}
                Action::ResetCursor => round.cursor.reset(),
                Action::ClearActiveSet => round.active.clear(),
                Action::FetchSnapshot => self.snapshot_round(&mut round, session).await,
                Action::FetchChanges => self.changes_round(&mut round, session).await,
                Action::FetchAndCompare => match change.take() {
                    Some(change) => self.compare_round(&mut round, session, change).await,
                    None => tracing::warn!("Monitor {}: filter round without change", self.id),
                },
            }
        }

        // stop() could not clear the set while this round held the lock
        if !self.lifecycle().is_active() {
            round.active.clear();
        }
    }

    /// Whether a round that started in `session` may apply its result.
    ///
    /// A round overtaken by `stop()` clears the set on the way out.
    fn round_is_current(&self, round: &mut RoundState, session: u64) -> bool {
        if self.accepts(session) {
            return true;
        }
        tracing::warn!(
            "Monitor {}: dropping response from stale session {}",
            self.id,
            session
        );
        if !self.lifecycle().is_active() {
            round.active.clear();
        }
        false
    }

    fn round_failed(&self, round: &mut RoundState, lower: ServerTime, error: ClientError) {
        tracing::warn!("Monitor {}: round failed: {}", self.id, error);
        round.cursor.rewind(lower);
        self.sink.notify(Notification::Error(error));
    }

    async fn snapshot_round(&self, round: &mut RoundState, session: u64) {
        if !self.round_is_current(round, session) {
            return;
        }
        let lower = round.cursor.advance(self.source.server_time());
        let filter = self.filter.data();
        tracing::debug!("Monitor {}: loading snapshot", self.id);

        let result = self
            .source
            .query_events(&filter, &QueryOptions::snapshot())
            .await;
        if !self.round_is_current(round, session) {
            return;
        }

        match result {
            Ok(events) => {
                let loaded = round.active.load(events);
                tracing::debug!("Monitor {}: loaded {} events", self.id, loaded.len());
                self.sink.notify(Notification::Loaded(loaded));
            }
            Err(e) => self.round_failed(round, lower, e),
        }
    }

    async fn changes_round(&self, round: &mut RoundState, session: u64) {
        if !self.round_is_current(round, session) {
            return;
        }
        let lower = round.cursor.advance(self.source.server_time());
        let filter = self.filter.data();
        tracing::debug!("Monitor {}: fetching changes since {}", self.id, lower);

        let result = self
            .source
            .query_events(&filter, &QueryOptions::changes_since(lower))
            .await;
        if !self.round_is_current(round, session) {
            return;
        }

        match result {
            Ok(events) => {
                let changes = round.active.apply_changes(events);
                tracing::debug!(
                    "Monitor {}: {} created, {} modified, {} trashed",
                    self.id,
                    changes.created.len(),
                    changes.modified.len(),
                    changes.trashed.len()
                );
                self.sink.notify(Notification::EventsChanged(changes));
            }
            Err(e) => self.round_failed(round, lower, e),
        }
    }

    async fn compare_round(&self, round: &mut RoundState, session: u64, change: FilterChange) {
        if !self.round_is_current(round, session) {
            return;
        }
        let lower = round.cursor.advance(self.source.server_time());
        let filter = self.filter.data();
        tracing::debug!("Monitor {}: reconciling after filter change", self.id);

        let result = self
            .source
            .query_events(&filter, &QueryOptions::snapshot())
            .await;
        if !self.round_is_current(round, session) {
            return;
        }

        match result {
            Ok(events) => {
                let diff = round.active.reconcile(events);
                tracing::debug!(
                    "Monitor {}: {} entered, {} left",
                    self.id,
                    diff.enter.len(),
                    diff.leave.len()
                );
                self.sink.notify(Notification::FilterChanged {
                    enter: diff.enter,
                    leave: diff.leave,
                    filter_info: change,
                });
            }
            Err(e) => self.round_failed(round, lower, e),
        }
    }

    fn subscribe(self: &Arc<Self>) {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::warn!(
                    "Monitor {}: no runtime, push and filter changes are not observed: {}",
                    self.id,
                    e
                );
                return;
            }
        };

        let mut subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // A stop() racing with start() can leave the previous subscriptions in place
        subscriptions.release();

        if let Some(registry) = self.source.push_registry() {
            let weak = Arc::downgrade(self) as Weak<dyn PushSubscriber>;
            let id = registry.subscribe(weak);
            subscriptions.push = Some((registry, id));
        }

        let mut changes = self.filter.subscribe();
        let weak = Arc::downgrade(self);
        subscriptions.filter_listener = Some(runtime.spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        let Some(inner) = weak.upgrade() else { break };
                        inner
                            .handle(MonitorEvent::FilterChanged, Some(change))
                            .await;
                    }
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!("Filter listener lagged, {} changes skipped", missed);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }));
        subscriptions.runtime = Some(runtime);

        tracing::debug!("Monitor {} subscribed", self.id);
    }

    fn unsubscribe(&self) {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .release();
    }
}

impl<S: EventSource + 'static> PushSubscriber for MonitorInner<S> {
    fn on_push(self: Arc<Self>, signal: &PushSignal) {
        match signal {
            PushSignal::EventsChanged => {
                let runtime = self
                    .subscriptions
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .runtime
                    .clone();
                if let Some(runtime) = runtime {
                    runtime.spawn(async move {
                        self.handle(MonitorEvent::RealtimeSignal, None).await;
                    });
                }
            }
            PushSignal::Error(message) => {
                tracing::warn!("Monitor {}: push channel error: {}", self.id, message);
            }
            PushSignal::Connected | PushSignal::StreamsChanged => {}
        }
    }
}
