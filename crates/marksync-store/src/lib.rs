//! # marksync Store
//!
//! Storage abstraction for marksync. The sync engine persists two things:
//! bookmark records ([`BookmarkStore`]) and its own bookkeeping, the version
//! token and the pending-change queue ([`SyncStateStore`]).
//!
//! ## Key Types
//!
//! - [`BookmarkStore`] - Async keyed storage of bookmark records
//! - [`SyncStateStore`] - Async storage of the version token and pending queue
//! - [`SqliteStore`] - SQLite-based persistent storage with a read cache
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`StoreEvent`] - Broadcast after every bookmark mutation
//!
//! ## Usage
//!
//! ```rust,no_run
//! use marksync_core::Bookmark;
//! use marksync_store::{BookmarkStore, SqliteStore};
//!
//! async fn example() {
//!     let store = SqliteStore::open("bookmarks.db").unwrap();
//!     let mut events = store.subscribe();
//!
//!     store.put(&Bookmark::new("https://example.com", "Example")).await.unwrap();
//!     let _event = events.recv().await;
//! }
//! ```

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{BookmarkStore, StoreEvent, SyncStateStore, EVENT_CHANNEL_CAPACITY};
