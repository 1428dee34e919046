//! # marksync Sync
//!
//! Local-first sync engine: reconciles the device's bookmark store with the
//! remote authoritative store over a version-stamped delta protocol.
//!
//! ## Overview
//!
//! Local edits are recorded in a durable pending-change queue keyed by URL.
//! The [`SyncManager`] sends either that queue (incremental sync) or every
//! local record (full sync, when the device has never synced) together with
//! the last absorbed server version, applies the server's changes with
//! last-writer-wins [`reconcile`](marksync_core::reconcile), and advances the
//! version token.
//!
//! ## Key Properties
//!
//! - **Single-flight**: at most one round trip is outstanding; a second one
//!   is rejected, never queued
//! - **Snapshot isolation**: edits made during a round trip are diverted to
//!   an overflow queue and merged back when it ends, success or failure
//! - **Monotonic version**: a server reporting an older version never pulls
//!   the local token back
//! - **No lost edits**: a failed exchange leaves the version and the
//!   pending set untouched
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use marksync_core::Bookmark;
//! use marksync_store::SqliteStore;
//! use marksync_sync::{HttpTransport, NetworkStatus, SyncConfig, SyncManager, TokenAuthGate};
//!
//! async fn example() -> marksync_sync::Result<()> {
//!     let config = SyncConfig::default();
//!     let store = Arc::new(SqliteStore::open("bookmarks.db")?);
//!     let auth = Arc::new(TokenAuthGate::new());
//!     let transport = HttpTransport::new(&config, auth.clone())?;
//!     let manager = SyncManager::new(store, transport, auth, Arc::new(NetworkStatus::default()), &config);
//!
//!     manager.init().await?;
//!     manager
//!         .record_bookmark_change(&[Bookmark::new("https://example.com", "Example")], false)
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod changes;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod events;
pub mod http;
pub mod manager;
pub mod transport;

pub use auth::{decode_claims, AuthGate, StaticAuthGate, TokenAuthGate};
pub use changes::LocalChangeManager;
pub use config::{Environment, SyncConfig, DEFAULT_SYNC_PATH};
pub use connectivity::{Connectivity, NetworkStatus};
pub use error::{ErrorKind, Ineligibility, Result, SyncError};
pub use events::{ChangeSource, EventBus, SyncEvent};
pub use http::HttpTransport;
pub use manager::{ApplyStats, SkipReason, SyncManager, SyncMode, SyncOutcome, SyncReport};
pub use transport::{memory::MockTransport, Transport};
