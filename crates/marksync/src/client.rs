//! The bookmark sync client.
//!
//! [`BookmarkSync`] wires a bookmark store, a transport, a token auth gate
//! and a [`SyncManager`] together and exposes the operations an application
//! performs on its bookmarks. Every local mutation is written to the store
//! first and then reported to the sync engine.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::broadcast;

use marksync_core::{now_millis, Bookmark};
use marksync_store::{BookmarkStore, SqliteStore, StoreEvent, SyncStateStore};
use marksync_sync::{
    AuthGate, Connectivity, HttpTransport, NetworkStatus, SyncError, SyncEvent, SyncManager, SyncReport,
    TokenAuthGate, Transport,
};

use crate::config::ClientConfig;
use crate::error::Result;

/// Local-first bookmark collection kept in sync with the server.
pub struct BookmarkSync<S, T> {
    store: Arc<S>,
    auth: Arc<TokenAuthGate>,
    manager: Arc<SyncManager<S, T>>,
}

impl BookmarkSync<SqliteStore, HttpTransport> {
    /// Open the SQLite database at `config.database_path` and connect to
    /// `config.sync`'s server.
    ///
    /// The device starts logged out and assumed online.
    pub async fn open(config: &ClientConfig) -> Result<Self> {
        let store = Arc::new(SqliteStore::open(&config.database_path)?);
        let auth = Arc::new(TokenAuthGate::new());
        let transport = HttpTransport::new(&config.sync, auth.clone())?;

        Self::with_parts(
            store,
            transport,
            auth,
            Arc::new(NetworkStatus::default()),
            config,
        )
        .await
    }
}

impl<S, T> BookmarkSync<S, T>
where
    S: BookmarkStore + SyncStateStore,
    T: Transport,
{
    /// Assemble a client from explicit parts and load the sync state.
    pub async fn with_parts(
        store: Arc<S>,
        transport: T,
        auth: Arc<TokenAuthGate>,
        connectivity: Arc<dyn Connectivity>,
        config: &ClientConfig,
    ) -> Result<Self> {
        let manager = SyncManager::new(
            store.clone(),
            transport,
            auth.clone(),
            connectivity,
            &config.sync,
        );
        manager.init().await?;

        Ok(Self {
            store,
            auth,
            manager: Arc::new(manager),
        })
    }

    /// Save or replace a bookmark.
    pub async fn save_bookmark(&self, bookmark: Bookmark) -> Result<()> {
        self.save_bookmarks(vec![bookmark]).await
    }

    /// Save or replace several bookmarks.
    pub async fn save_bookmarks(&self, bookmarks: Vec<Bookmark>) -> Result<()> {
        if bookmarks.is_empty() {
            return Ok(());
        }
        self.store.put_many(&bookmarks).await?;
        self.sync_after_change(&bookmarks, false).await
    }

    /// Delete the bookmark for `url`.
    ///
    /// Returns `false` if no such bookmark exists.
    pub async fn delete_bookmark(&self, url: &str) -> Result<bool> {
        let Some(existing) = self.store.get(url).await? else {
            return Ok(false);
        };
        self.store.delete(url).await?;
        self.sync_after_change(std::slice::from_ref(&existing), true)
            .await?;
        Ok(true)
    }

    /// Count one local use of the bookmark for `url`.
    ///
    /// Usage data never leaves the device, so nothing is queued.
    pub async fn record_usage(&self, url: &str) -> Result<Option<Bookmark>> {
        let Some(mut bookmark) = self.store.get(url).await? else {
            return Ok(None);
        };
        bookmark.touch(now_millis());
        self.store.put(&bookmark).await?;
        Ok(Some(bookmark))
    }

    /// All bookmarks, keyed by URL.
    pub async fn bookmarks(&self) -> Result<BTreeMap<String, Bookmark>> {
        Ok(self.store.get_all().await?)
    }

    pub async fn bookmark(&self, url: &str) -> Result<Option<Bookmark>> {
        Ok(self.store.get(url).await?)
    }

    /// Sync now, surfacing every failure.
    pub async fn force_sync(&self) -> Result<SyncReport> {
        Ok(self.manager.force_sync().await?)
    }

    /// Number of local changes waiting to be sent.
    pub async fn pending_count(&self) -> Result<usize> {
        Ok(self.manager.changes().change_count().await?)
    }

    /// Store a credential.
    pub async fn login(&self, token: impl Into<String>) {
        self.auth.set_token(token).await;
        tracing::info!("logged in");
    }

    /// Drop the credential and all sync state, so nothing queued for this
    /// account is replayed to the next one. Bookmarks stay.
    pub async fn logout(&self) -> Result<()> {
        self.auth.clear().await;
        self.manager.cleanup().await?;
        tracing::info!("logged out");
        Ok(())
    }

    pub async fn is_logged_in(&self) -> bool {
        self.auth.is_valid().await
    }

    /// Sync lifecycle notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.manager.subscribe()
    }

    /// Store-changed notifications.
    pub fn store_events(&self) -> broadcast::Receiver<StoreEvent> {
        self.store.subscribe()
    }

    pub fn manager(&self) -> &Arc<SyncManager<S, T>> {
        &self.manager
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Report a local mutation to the sync engine.
    ///
    /// The record is already stored, so a failed round trip is not an error
    /// here: the change stays queued for the next attempt. Failing to queue
    /// it is.
    async fn sync_after_change(&self, bookmarks: &[Bookmark], is_deleted: bool) -> Result<()> {
        match self
            .manager
            .record_bookmark_change(bookmarks, is_deleted)
            .await
        {
            Ok(report) => {
                tracing::debug!(outcome = ?report.outcome, sent = report.sent, "change reported");
                Ok(())
            }
            Err(SyncError::Store(e)) => Err(e.into()),
            Err(e) => {
                tracing::warn!(error = %e, "background sync failed, changes stay queued");
                Ok(())
            }
        }
    }
}
