//! Store traits: the abstract interface for bookmark and sync-state persistence.
//!
//! The sync engine is storage-agnostic. Implementations include SQLite
//! (primary) and in-memory (for tests).

use std::collections::BTreeMap;

use async_trait::async_trait;
use marksync_core::{Bookmark, ChangeRecord, SyncVersion};
use tokio::sync::broadcast;

use crate::error::Result;

/// Capacity of the store-changed broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Notification broadcast after a bookmark mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// One or more records were inserted or replaced.
    Put { urls: Vec<String> },
    /// A record was removed.
    Deleted { url: String },
    /// Every record was removed.
    Cleared,
}

/// Durable keyed storage of bookmark records.
///
/// Every mutation broadcasts a [`StoreEvent`]. Having no subscribers is not
/// an error.
#[async_trait]
pub trait BookmarkStore: Send + Sync {
    /// All records, keyed by URL.
    async fn get_all(&self) -> Result<BTreeMap<String, Bookmark>>;

    /// The record for `url`, if any.
    async fn get(&self, url: &str) -> Result<Option<Bookmark>>;

    /// Insert or replace a record.
    async fn put(&self, bookmark: &Bookmark) -> Result<()>;

    /// Insert or replace several records at once.
    async fn put_many(&self, bookmarks: &[Bookmark]) -> Result<()>;

    /// Remove the record for `url`.
    ///
    /// Returns `true` if a record existed.
    async fn delete(&self, url: &str) -> Result<bool>;

    /// Subscribe to store-changed notifications.
    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}

/// Durable storage for the sync engine's own state: the version token and
/// the pending-change queue.
///
/// The queue holds at most one [`ChangeRecord`] per URL; writes replace.
#[async_trait]
pub trait SyncStateStore: Send + Sync {
    /// The persisted version token, or the sentinel if none was saved.
    async fn load_sync_version(&self) -> Result<SyncVersion>;

    /// Persist the version token.
    async fn save_sync_version(&self, version: SyncVersion) -> Result<()>;

    /// The durable pending-change set, keyed by URL.
    async fn load_pending_changes(&self) -> Result<BTreeMap<String, ChangeRecord>>;

    /// Insert or replace the pending change for `record.url()`.
    async fn put_pending_change(&self, record: &ChangeRecord) -> Result<()>;

    /// Insert or replace several pending changes as one batch.
    async fn put_pending_changes(&self, records: &[ChangeRecord]) -> Result<()>;

    /// Empty the durable pending-change set.
    async fn clear_pending_changes(&self) -> Result<()>;
}
