//! # pryv-core
//!
//! Pure synchronization logic for the Pryv client (no I/O, instant tests).
//!
//! This crate implements the filter algebra, the sync cursor, the active-set
//! diff engine and the monitor lifecycle machine without any network access,
//! enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual I/O (HTTP requests, push channel) is performed by `pryv-client`,
//! which interprets the actions produced by these state machines.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod active_set;
pub mod cursor;
pub mod filter;
pub mod state;

pub use active_set::{ActiveSet, EventsChanged, Reconciliation};
pub use cursor::{SyncCursor, BEGINNING_OF_TIME};
pub use filter::{
    FilterChange, FilterComparison, FilterData, FilterError, QueryOptions,
    SNAPSHOT_MODIFIED_SINCE,
};
pub use state::{Action, MonitorEvent, MonitorState};
