//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use tokio::sync::{broadcast, watch};

use marksync_core::{Bookmark, ChangeRecord, SyncVersion, WireChange};
use marksync_store::{BookmarkStore, MemoryStore, Result, StoreError, StoreEvent, SyncStateStore};
use marksync_sync::{
    MockTransport, NetworkStatus, StaticAuthGate, SyncConfig, SyncEvent, SyncManager,
};

/// A sync manager wired to in-memory parts, with handles on every part.
pub struct SyncFixture<S = MemoryStore> {
    pub store: Arc<S>,
    pub transport: Arc<MockTransport>,
    pub auth: Arc<StaticAuthGate>,
    pub network: Arc<NetworkStatus>,
    pub manager: Arc<SyncManager<S, Arc<MockTransport>>>,
}

impl SyncFixture<MemoryStore> {
    /// A logged-in, online device whose stored version is `version`.
    pub async fn new(version: u64) -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), version).await
    }
}

impl<S: BookmarkStore + SyncStateStore> SyncFixture<S> {
    /// Same as [`SyncFixture::new`] over a caller-supplied store.
    pub async fn with_store(store: Arc<S>, version: u64) -> Self {
        store
            .save_sync_version(SyncVersion(version))
            .await
            .expect("seed version");

        let transport = Arc::new(MockTransport::new());
        let auth = Arc::new(StaticAuthGate::valid());
        let network = Arc::new(NetworkStatus::default());
        let manager = SyncManager::new(
            store.clone(),
            transport.clone(),
            auth.clone(),
            network.clone(),
            &SyncConfig::default(),
        );
        manager.init().await.expect("init");

        Self {
            store,
            transport,
            auth,
            network,
            manager: Arc::new(manager),
        }
    }

    /// Put `bookmarks` straight into the store, bypassing the sync engine.
    pub async fn seed(&self, bookmarks: &[Bookmark]) {
        self.store.put_many(bookmarks).await.expect("seed bookmarks");
    }
}

/// A bookmark with a fixed creation time.
pub fn bookmark(url: &str, title: &str) -> Bookmark {
    Bookmark::new(url, title).with_saved_at(1_700_000_000_000)
}

/// A server-side content change for `url`.
pub fn remote_change(url: &str, title: &str, version: i64) -> WireChange {
    WireChange::from_bookmark(
        &bookmark(url, title).with_tags(["remote"]).with_excerpt("from server"),
        false,
        version,
    )
}

/// A server-side tombstone for `url`.
pub fn tombstone(url: &str, version: i64) -> WireChange {
    WireChange::from_bookmark(&bookmark(url, ""), true, version)
}

/// A JWT-shaped token whose `exp` claim is `exp` (seconds since the epoch).
pub fn jwt(exp: i64) -> String {
    let claims = serde_json::json!({ "sub": "test-user", "exp": exp });
    format!(
        "{}.{}.signature",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}

/// Every event currently buffered in `rx`.
pub fn drain<T: Clone>(rx: &mut broadcast::Receiver<T>) -> Vec<T> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Count of `event` in `events`.
pub fn count(events: &[SyncEvent], event: &SyncEvent) -> usize {
    events.iter().filter(|e| *e == event).count()
}

/// A memory store whose bookmark writes fail for chosen URLs.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failing: Mutex<BTreeSet<String>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write of `url` fail.
    pub fn fail_writes_for(&self, url: &str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(url.to_string());
        }
    }

    fn check(&self, url: &str) -> Result<()> {
        let failing = self.failing.lock().map_err(|_| StoreError::Poisoned)?;
        if failing.contains(url) {
            return Err(StoreError::Serialization(format!("injected failure for {}", url)));
        }
        Ok(())
    }
}

#[async_trait]
impl BookmarkStore for FlakyStore {
    async fn get_all(&self) -> Result<BTreeMap<String, Bookmark>> {
        self.inner.get_all().await
    }

    async fn get(&self, url: &str) -> Result<Option<Bookmark>> {
        self.inner.get(url).await
    }

    async fn put(&self, bookmark: &Bookmark) -> Result<()> {
        self.check(&bookmark.url)?;
        self.inner.put(bookmark).await
    }

    async fn put_many(&self, bookmarks: &[Bookmark]) -> Result<()> {
        for bookmark in bookmarks {
            self.check(&bookmark.url)?;
        }
        self.inner.put_many(bookmarks).await
    }

    async fn delete(&self, url: &str) -> Result<bool> {
        self.check(url)?;
        self.inner.delete(url).await
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.subscribe()
    }
}

#[async_trait]
impl SyncStateStore for FlakyStore {
    async fn load_sync_version(&self) -> Result<SyncVersion> {
        self.inner.load_sync_version().await
    }

    async fn save_sync_version(&self, version: SyncVersion) -> Result<()> {
        self.inner.save_sync_version(version).await
    }

    async fn load_pending_changes(&self) -> Result<BTreeMap<String, ChangeRecord>> {
        self.inner.load_pending_changes().await
    }

    async fn put_pending_change(&self, record: &ChangeRecord) -> Result<()> {
        self.inner.put_pending_change(record).await
    }

    async fn put_pending_changes(&self, records: &[ChangeRecord]) -> Result<()> {
        self.inner.put_pending_changes(records).await
    }

    async fn clear_pending_changes(&self) -> Result<()> {
        self.inner.clear_pending_changes().await
    }
}

/// A memory store whose single-record bookmark writes can be held open.
///
/// While the gate is closed every `put` parks until [`open`](Self::open).
/// Lets a test act while the sync manager is in the middle of applying a
/// server response.
pub struct GatedStore {
    inner: MemoryStore,
    closed: watch::Sender<bool>,
    parked: watch::Sender<usize>,
}

impl GatedStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            closed: watch::Sender::new(false),
            parked: watch::Sender::new(0),
        }
    }

    /// Hold subsequent `put` calls.
    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    /// Release held `put` calls.
    pub fn open(&self) {
        self.closed.send_replace(false);
    }

    /// Wait until at least `n` writes have parked at the gate.
    pub async fn wait_for_parked(&self, n: usize) {
        let mut parked = self.parked.subscribe();
        let _ = parked.wait_for(|p| *p >= n).await;
    }

    async fn pass(&self) {
        let closed = *self.closed.borrow();
        if closed {
            self.parked.send_modify(|p| *p += 1);
            let mut gate = self.closed.subscribe();
            let _ = gate.wait_for(|c| !*c).await;
        }
    }
}

impl Default for GatedStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookmarkStore for GatedStore {
    async fn get_all(&self) -> Result<BTreeMap<String, Bookmark>> {
        self.inner.get_all().await
    }

    async fn get(&self, url: &str) -> Result<Option<Bookmark>> {
        self.inner.get(url).await
    }

    async fn put(&self, bookmark: &Bookmark) -> Result<()> {
        self.pass().await;
        self.inner.put(bookmark).await
    }

    async fn put_many(&self, bookmarks: &[Bookmark]) -> Result<()> {
        self.inner.put_many(bookmarks).await
    }

    async fn delete(&self, url: &str) -> Result<bool> {
        self.inner.delete(url).await
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.subscribe()
    }
}

#[async_trait]
impl SyncStateStore for GatedStore {
    async fn load_sync_version(&self) -> Result<SyncVersion> {
        self.inner.load_sync_version().await
    }

    async fn save_sync_version(&self, version: SyncVersion) -> Result<()> {
        self.inner.save_sync_version(version).await
    }

    async fn load_pending_changes(&self) -> Result<BTreeMap<String, ChangeRecord>> {
        self.inner.load_pending_changes().await
    }

    async fn put_pending_change(&self, record: &ChangeRecord) -> Result<()> {
        self.inner.put_pending_change(record).await
    }

    async fn put_pending_changes(&self, records: &[ChangeRecord]) -> Result<()> {
        self.inner.put_pending_changes(records).await
    }

    async fn clear_pending_changes(&self) -> Result<()> {
        self.inner.clear_pending_changes().await
    }
}
