//! In-memory implementation of the store traits.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tokio::sync::broadcast;

use marksync_core::{Bookmark, ChangeRecord, SyncVersion};

use crate::error::{Result, StoreError};
use crate::traits::{BookmarkStore, StoreEvent, SyncStateStore, EVENT_CHANNEL_CAPACITY};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
    events: broadcast::Sender<StoreEvent>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Bookmark records keyed by URL.
    bookmarks: BTreeMap<String, Bookmark>,

    /// Durable pending-change set keyed by URL.
    pending: BTreeMap<String, ChangeRecord>,

    /// Last absorbed server version.
    version: SyncVersion,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
            events,
        }
    }

    /// Create a store pre-populated with `bookmarks`.
    pub fn with_bookmarks(bookmarks: impl IntoIterator<Item = Bookmark>) -> Self {
        let store = Self::new();
        if let Ok(mut inner) = store.inner.write() {
            inner.bookmarks = bookmarks.into_iter().map(|b| (b.url.clone(), b)).collect();
        }
        store
    }

    /// Remove every bookmark record.
    pub fn clear(&self) -> Result<()> {
        self.write()?.bookmarks.clear();
        self.notify(StoreEvent::Cleared);
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner.write().map_err(|_| StoreError::Poisoned)
    }

    fn notify(&self, event: StoreEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookmarkStore for MemoryStore {
    async fn get_all(&self) -> Result<BTreeMap<String, Bookmark>> {
        Ok(self.read()?.bookmarks.clone())
    }

    async fn get(&self, url: &str) -> Result<Option<Bookmark>> {
        Ok(self.read()?.bookmarks.get(url).cloned())
    }

    async fn put(&self, bookmark: &Bookmark) -> Result<()> {
        self.write()?
            .bookmarks
            .insert(bookmark.url.clone(), bookmark.clone());
        self.notify(StoreEvent::Put {
            urls: vec![bookmark.url.clone()],
        });
        Ok(())
    }

    async fn put_many(&self, bookmarks: &[Bookmark]) -> Result<()> {
        if bookmarks.is_empty() {
            return Ok(());
        }
        {
            let mut inner = self.write()?;
            for bookmark in bookmarks {
                inner.bookmarks.insert(bookmark.url.clone(), bookmark.clone());
            }
        }
        self.notify(StoreEvent::Put {
            urls: bookmarks.iter().map(|b| b.url.clone()).collect(),
        });
        Ok(())
    }

    async fn delete(&self, url: &str) -> Result<bool> {
        let existed = self.write()?.bookmarks.remove(url).is_some();
        if existed {
            self.notify(StoreEvent::Deleted {
                url: url.to_string(),
            });
        }
        Ok(existed)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl SyncStateStore for MemoryStore {
    async fn load_sync_version(&self) -> Result<SyncVersion> {
        Ok(self.read()?.version)
    }

    async fn save_sync_version(&self, version: SyncVersion) -> Result<()> {
        self.write()?.version = version;
        Ok(())
    }

    async fn load_pending_changes(&self) -> Result<BTreeMap<String, ChangeRecord>> {
        Ok(self.read()?.pending.clone())
    }

    async fn put_pending_change(&self, record: &ChangeRecord) -> Result<()> {
        self.write()?
            .pending
            .insert(record.url().to_string(), record.clone());
        Ok(())
    }

    async fn put_pending_changes(&self, records: &[ChangeRecord]) -> Result<()> {
        let mut inner = self.write()?;
        for record in records {
            inner.pending.insert(record.url().to_string(), record.clone());
        }
        Ok(())
    }

    async fn clear_pending_changes(&self) -> Result<()> {
        self.write()?.pending.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bookmark(url: &str) -> Bookmark {
        Bookmark::new(url, "Title").with_saved_at(1_000)
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = MemoryStore::new();
        let b = bookmark("https://a.example");

        store.put(&b).await.unwrap();

        assert_eq!(store.get("https://a.example").await.unwrap(), Some(b));
        assert!(store.get("https://missing.example").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_replaces_by_url() {
        let store = MemoryStore::new();
        store.put(&bookmark("https://a.example")).await.unwrap();

        let mut updated = bookmark("https://a.example");
        updated.title = "Updated".into();
        store.put(&updated).await.unwrap();

        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all["https://a.example"].title, "Updated");
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryStore::with_bookmarks([bookmark("https://a.example")]);

        assert!(store.delete("https://a.example").await.unwrap());
        assert!(!store.delete("https://a.example").await.unwrap());
        assert!(store.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_events() {
        let store = MemoryStore::new();
        let mut events = store.subscribe();

        store
            .put_many(&[bookmark("https://a.example"), bookmark("https://b.example")])
            .await
            .unwrap();
        store.delete("https://a.example").await.unwrap();
        store.clear().unwrap();

        assert_eq!(
            events.recv().await.unwrap(),
            StoreEvent::Put {
                urls: vec!["https://a.example".into(), "https://b.example".into()]
            }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            StoreEvent::Deleted {
                url: "https://a.example".into()
            }
        );
        assert_eq!(events.recv().await.unwrap(), StoreEvent::Cleared);
    }

    #[tokio::test]
    async fn test_mutation_without_subscribers() {
        let store = MemoryStore::new();
        store.put(&bookmark("https://a.example")).await.unwrap();
    }

    #[tokio::test]
    async fn test_sync_version() {
        let store = MemoryStore::new();
        assert_eq!(
            store.load_sync_version().await.unwrap(),
            SyncVersion::NEVER_SYNCED
        );

        store.save_sync_version(SyncVersion(42)).await.unwrap();
        assert_eq!(store.load_sync_version().await.unwrap(), SyncVersion(42));
    }

    #[tokio::test]
    async fn test_pending_changes_keyed_by_url() {
        let store = MemoryStore::new();
        let b = bookmark("https://a.example");

        store
            .put_pending_change(&ChangeRecord::new(&b, false, 10))
            .await
            .unwrap();
        store
            .put_pending_changes(&[
                ChangeRecord::new(&b, true, 20),
                ChangeRecord::new(&bookmark("https://b.example"), false, 30),
            ])
            .await
            .unwrap();

        let pending = store.load_pending_changes().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert!(pending["https://a.example"].change.is_deleted);
        assert_eq!(pending["https://a.example"].timestamp, 20);

        store.clear_pending_changes().await.unwrap();
        assert!(store.load_pending_changes().await.unwrap().is_empty());
    }
}
