//! The sync manager: single-flight orchestration of sync round trips.
//!
//! ## State machine
//!
//! ```text
//! Idle --claim--> Syncing --finally--> Idle
//! ```
//!
//! A second claim while Syncing fails fast with
//! [`SyncError::AlreadySyncing`]. Whatever happens inside a round trip, the
//! overflow queue is merged back and the claim released before the result
//! is returned.
//!
//! ## Round trip
//!
//! 1. Claim the single-flight flag.
//! 2. Check eligibility (online and authenticated).
//! 3. Divert new local changes, then snapshot the outgoing list.
//! 4. Exchange `{lastSyncVersion, changes}` with the server.
//! 5. Apply the server's changes to the bookmark store.
//! 6. Persist the next version; clear the pending set (incremental only).
//! 7. Merge diverted changes, release the flag.
//!
//! Steps 5 and 6 run under a commit lock shared with `cleanup`, so a reset
//! either lands before them (and the response is discarded) or after them.
//! Background syncs emit [`SyncEvent::SyncFinished`] on every path past
//! the claim, including skips.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};

use marksync_core::{now_millis, reconcile, Bookmark, SyncRequest, SyncVersion, WireChange};
use marksync_store::{BookmarkStore, SyncStateStore};

use crate::auth::AuthGate;
use crate::changes::LocalChangeManager;
use crate::config::SyncConfig;
use crate::connectivity::Connectivity;
use crate::error::{Ineligibility, Result, SyncError};
use crate::events::{ChangeSource, EventBus, SyncEvent};
use crate::transport::Transport;

/// Which outgoing list a round trip sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// The durable pending-change set.
    Incremental,
    /// Every record in the bookmark store.
    Full,
}

/// Why a round trip was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotEligible(Ineligibility),
    NothingToSync,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed,
    Skipped(SkipReason),
}

/// What applying the server's changes did to the local store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStats {
    /// Records inserted or updated.
    pub upserted: usize,
    /// Records removed by tombstones.
    pub deleted: usize,
    /// Tombstones for records that did not exist.
    pub ignored: usize,
    /// Changes that could not be applied.
    pub failed: usize,
}

impl ApplyStats {
    /// True if any local record was inserted, updated or removed.
    pub fn changed(&self) -> bool {
        self.upserted + self.deleted > 0
    }
}

/// Result of one sync call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub mode: SyncMode,
    pub outcome: SyncOutcome,
    /// Number of changes sent to the server.
    pub sent: usize,
    pub applied: ApplyStats,
    /// Version held after the call.
    pub version: SyncVersion,
}

impl SyncReport {
    fn skipped(mode: SyncMode, reason: SkipReason, version: SyncVersion) -> Self {
        Self {
            mode,
            outcome: SyncOutcome::Skipped(reason),
            sent: 0,
            applied: ApplyStats::default(),
            version,
        }
    }

    /// True if a round trip with the server completed.
    pub fn is_completed(&self) -> bool {
        self.outcome == SyncOutcome::Completed
    }
}

enum Applied {
    Upserted,
    Deleted,
    Ignored,
}

/// Releases the single-flight flag when dropped, so a cancelled round trip
/// cannot wedge the manager.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Orchestrates sync round trips between the local store and the server.
///
/// One instance per device, shared by `Arc`. All state (version token,
/// single-flight flag, change queues) is owned here.
pub struct SyncManager<S, T> {
    store: Arc<S>,
    transport: T,
    changes: LocalChangeManager<S>,
    auth: Arc<dyn AuthGate>,
    connectivity: Arc<dyn Connectivity>,
    events: EventBus,
    version: AtomicU64,
    syncing: AtomicBool,
    /// Bumped by `cleanup`; a round trip that sees it change discards its
    /// result.
    generation: AtomicU64,
    /// Serializes `cleanup` with the apply-and-persist tail of a round trip.
    commit: Mutex<()>,
}

impl<S, T> SyncManager<S, T>
where
    S: BookmarkStore + SyncStateStore,
    T: Transport,
{
    /// Create a manager. Call [`init`](Self::init) before syncing.
    pub fn new(
        store: Arc<S>,
        transport: T,
        auth: Arc<dyn AuthGate>,
        connectivity: Arc<dyn Connectivity>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            changes: LocalChangeManager::new(store.clone()),
            store,
            transport,
            auth,
            connectivity,
            events: EventBus::new(config.event_capacity),
            version: AtomicU64::new(0),
            syncing: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            commit: Mutex::new(()),
        }
    }

    /// Load the persisted version token.
    pub async fn init(&self) -> Result<SyncVersion> {
        let version = self.store.load_sync_version().await?;
        self.version.store(version.get(), Ordering::SeqCst);
        tracing::info!(%version, "sync manager initialized");
        Ok(version)
    }

    /// Forget all sync state: version back to 0, both queues emptied.
    ///
    /// A round trip in flight keeps running but its response is discarded.
    /// If it is already applying its response, this waits for it to finish
    /// and then resets.
    pub async fn cleanup(&self) -> Result<()> {
        let _commit = self.commit.lock().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.version.store(0, Ordering::SeqCst);
        self.store
            .save_sync_version(SyncVersion::NEVER_SYNCED)
            .await?;
        self.changes.cleanup().await?;
        tracing::info!("sync state reset");
        Ok(())
    }

    /// The version of the last absorbed server state.
    pub fn version(&self) -> SyncVersion {
        SyncVersion(self.version.load(Ordering::SeqCst))
    }

    /// True while a round trip is in flight.
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn changes(&self) -> &LocalChangeManager<S> {
        &self.changes
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// True if the device is online and holds a valid credential.
    pub async fn can_sync(&self) -> bool {
        self.eligibility().await.is_ok()
    }

    async fn eligibility(&self) -> std::result::Result<(), Ineligibility> {
        if !self.connectivity.is_online() {
            return Err(Ineligibility::Offline);
        }
        if !self.auth.is_valid().await {
            return Err(Ineligibility::Unauthenticated);
        }
        Ok(())
    }

    /// User- or system-initiated sync.
    ///
    /// A device that never synced does a full sync; otherwise the pending
    /// set is sent even if empty. Ineligibility is an error here.
    pub async fn force_sync(&self) -> Result<SyncReport> {
        if self.version().is_never_synced() {
            self.sync_all_local_bookmarks(true).await
        } else {
            self.sync_change(true).await
        }
    }

    /// Report local mutations of `bookmarks` and sync them.
    ///
    /// A device that never synced skips the queue and does a full sync,
    /// which already carries every record. If that full sync is rejected
    /// because another round trip is in flight, the mutations are queued
    /// instead so they are not lost once the in-flight sync sets a version.
    pub async fn record_bookmark_change(
        &self,
        bookmarks: &[Bookmark],
        is_deleted: bool,
    ) -> Result<SyncReport> {
        if self.version().is_never_synced() {
            return match self.sync_all_local_bookmarks(false).await {
                Err(SyncError::AlreadySyncing) => {
                    self.enqueue_all(bookmarks, is_deleted).await?;
                    Err(SyncError::AlreadySyncing)
                }
                other => other,
            };
        }

        self.enqueue_all(bookmarks, is_deleted).await?;
        self.sync_change(false).await
    }

    async fn enqueue_all(&self, bookmarks: &[Bookmark], is_deleted: bool) -> Result<()> {
        for bookmark in bookmarks {
            self.changes.add_change(bookmark, is_deleted).await?;
        }
        Ok(())
    }

    /// Incremental sync: send the durable pending-change set.
    pub async fn sync_change(&self, force: bool) -> Result<SyncReport> {
        self.sync(SyncMode::Incremental, force).await
    }

    /// Full sync: send every record in the bookmark store.
    ///
    /// The pending-change set is left untouched.
    pub async fn sync_all_local_bookmarks(&self, force: bool) -> Result<SyncReport> {
        self.sync(SyncMode::Full, force).await
    }

    async fn sync(&self, mode: SyncMode, force: bool) -> Result<SyncReport> {
        if self
            .syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!(?mode, "sync already in progress");
            return Err(SyncError::AlreadySyncing);
        }
        let in_flight = InFlight(&self.syncing);
        let generation = self.generation.load(Ordering::SeqCst);

        let result = match self.eligibility().await {
            Ok(()) => {
                self.changes.begin_diverting().await;
                self.round_trip(mode, force, generation).await
            }
            Err(reason) => {
                tracing::warn!(%reason, ?mode, force, "cannot sync");
                if force {
                    Err(SyncError::NotEligible(reason))
                } else {
                    Ok(SyncReport::skipped(
                        mode,
                        SkipReason::NotEligible(reason),
                        self.version(),
                    ))
                }
            }
        };

        // Runs on every path past the claim. A round trip cancelled after
        // diverting left its overflow behind; this picks it up too.
        let merged = self.changes.merge_temp_queue().await;
        drop(in_flight);
        if !force {
            self.events.emit(SyncEvent::SyncFinished);
        }

        let report = result?;
        if let Err(e) = merged {
            tracing::error!(error = %e, "failed to merge diverted changes");
            return Err(e.into());
        }
        Ok(report)
    }

    async fn round_trip(
        &self,
        mode: SyncMode,
        force: bool,
        generation: u64,
    ) -> Result<SyncReport> {
        let changes: Vec<WireChange> = match mode {
            SyncMode::Incremental => self
                .changes
                .pending_changes()
                .await?
                .into_values()
                .map(|record| record.change)
                .collect(),
            SyncMode::Full => {
                let now = now_millis();
                self.store
                    .get_all()
                    .await?
                    .values()
                    .map(|bookmark| WireChange::from_bookmark(bookmark, false, now))
                    .collect()
            }
        };

        if mode == SyncMode::Incremental && changes.is_empty() && !force {
            tracing::info!("no pending changes to sync");
            return Ok(SyncReport::skipped(
                mode,
                SkipReason::NothingToSync,
                self.version(),
            ));
        }

        if !force {
            self.events.emit(SyncEvent::SyncStarted);
        }

        let request = SyncRequest {
            last_sync_version: self.version(),
            changes,
        };
        let sent = request.changes.len();
        tracing::info!(?mode, changes = sent, last_sync_version = %request.last_sync_version, "starting sync");

        let response = match self.transport.exchange(&request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, ?mode, "sync round trip failed");
                return Err(e);
            }
        };

        // Held until the version is persisted; `cleanup` takes it too.
        let _commit = self.commit.lock().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::warn!("sync state was reset during the round trip, discarding response");
            return Ok(SyncReport {
                mode,
                outcome: SyncOutcome::Completed,
                sent,
                applied: ApplyStats::default(),
                version: self.version(),
            });
        }

        let applied = self.apply_server_changes(&response.changes).await;

        let local = self.version();
        let next = SyncVersion::next(local, response.current_version, now_millis());
        if !response.current_version.is_never_synced() && response.current_version < local {
            tracing::warn!(
                server = %response.current_version,
                local = %local,
                "server version regressed, keeping local version"
            );
        }

        self.store.save_sync_version(next).await?;
        self.version.store(next.get(), Ordering::SeqCst);
        if mode == SyncMode::Incremental {
            self.changes.clear_changes().await?;
        }

        tracing::info!(
            ?mode,
            sent,
            upserted = applied.upserted,
            deleted = applied.deleted,
            failed = applied.failed,
            version = %next,
            "sync completed"
        );

        Ok(SyncReport {
            mode,
            outcome: SyncOutcome::Completed,
            sent,
            applied,
            version: next,
        })
    }

    /// Apply the server's changes to the bookmark store, best effort per
    /// record.
    ///
    /// Emits one [`SyncEvent::BookmarksChanged`] after the batch if any
    /// record was inserted, updated or removed.
    pub async fn apply_server_changes(&self, changes: &[WireChange]) -> ApplyStats {
        let mut stats = ApplyStats::default();

        for change in changes {
            match self.apply_one(change).await {
                Ok(Applied::Upserted) => stats.upserted += 1,
                Ok(Applied::Deleted) => stats.deleted += 1,
                Ok(Applied::Ignored) => stats.ignored += 1,
                Err(e) => {
                    tracing::warn!(url = %change.url(), error = %e, "failed to apply server change");
                    stats.failed += 1;
                }
            }
        }

        if stats.changed() {
            self.events.emit(SyncEvent::BookmarksChanged {
                source: ChangeSource::Sync,
            });
        }
        stats
    }

    async fn apply_one(&self, change: &WireChange) -> Result<Applied> {
        let url = change.url();
        let local = self.store.get(url).await?;

        if change.is_tombstone() {
            if local.is_none() {
                tracing::debug!(url = %url, "tombstone for unknown bookmark");
                return Ok(Applied::Ignored);
            }
            return Ok(if self.store.delete(url).await? {
                tracing::debug!(url = %url, "deleted bookmark from server change");
                Applied::Deleted
            } else {
                Applied::Ignored
            });
        }

        let merged = reconcile(local.as_ref(), &change.content, now_millis());
        self.store.put(&merged).await?;
        tracing::debug!(url = %url, "applied server change");
        Ok(Applied::Upserted)
    }
}
