//! # marksync Core
//!
//! Pure data model for the marksync engine: bookmarks, the wire format
//! exchanged with the sync server, version tokens, and reconciliation.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`Bookmark`] - A device-local bookmark record, keyed by URL
//! - [`WireChange`] - One mutation as exchanged with the server
//! - [`ChangeRecord`] - A queued, not-yet-synced local mutation
//! - [`SyncVersion`] - The "last absorbed server state" token
//! - [`SyncRequest`] / [`SyncResponse`] - Sync round-trip payloads
//!
//! ## Reconciliation
//!
//! Remote changes are merged with [`reconcile`]: the server wins for content,
//! the device keeps its own usage counters.

pub mod bookmark;
pub mod change;
pub mod error;
pub mod reconcile;
pub mod types;
pub mod wire;

pub use bookmark::Bookmark;
pub use change::ChangeRecord;
pub use error::{CoreError, Result};
pub use reconcile::reconcile;
pub use types::{now_millis, SyncVersion};
pub use wire::{decode_response, encode_request, SyncRequest, SyncResponse, WireChange, WireContent};
