//! # pryv-types
//!
//! Data types for the Pryv personal-data API.
//!
//! This crate provides the foundational types used across all Pryv crates:
//! - [`EventId`], [`StreamId`], [`MonitorId`], [`ServerTime`] - Identity and ordering types
//! - [`Event`], [`Stream`] - Records exchanged with the API
//! - [`Access`], [`Permission`], [`AccessInfo`] - Access management
//! - [`NewEvent`], [`NewStream`], [`NewAccess`], [`ItemDeletion`] - Auxiliary API payloads
//! - [`ApiError`] - Errors reported by the server

#![warn(missing_docs)]
#![warn(clippy::all)]

mod access;
mod error;
mod event;
mod ids;
mod stream;

pub use access::{Access, NewAccess, Permission};
pub use error::ApiError;
pub use event::{AccessInfo, Event, EventState, ItemDeletion, NewEvent};
pub use ids::{EventId, MonitorId, ServerTime, StreamId};
pub use stream::{NewStream, Stream};
