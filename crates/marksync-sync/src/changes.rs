//! Local change queue.
//!
//! Pending mutations are kept in two places:
//!
//! - the durable pending-change set in the [`SyncStateStore`], one record
//!   per URL, which is what an incremental sync sends;
//! - an in-memory overflow queue that receives mutations while a round trip
//!   is in flight, so the snapshot the round trip is sending never changes
//!   underneath it.
//!
//! The sync manager flips the queue into diverting mode before it reads the
//! snapshot and merges the overflow back once the round trip ends.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use marksync_core::{now_millis, Bookmark, ChangeRecord};
use marksync_store::{Result, SyncStateStore};

#[derive(Debug, Default)]
struct QueueState {
    diverting: bool,
    overflow: BTreeMap<String, ChangeRecord>,
}

/// Durable queue of not-yet-synced local mutations.
pub struct LocalChangeManager<S> {
    store: Arc<S>,
    state: Mutex<QueueState>,
}

impl<S: SyncStateStore> LocalChangeManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            state: Mutex::new(QueueState::default()),
        }
    }

    /// Record a pending mutation of `bookmark`, stamped with the current time.
    pub async fn add_change(&self, bookmark: &Bookmark, is_deleted: bool) -> Result<()> {
        self.enqueue(ChangeRecord::new(bookmark, is_deleted, now_millis()))
            .await
    }

    /// Record a prepared change.
    ///
    /// Replaces any pending change for the same URL.
    pub async fn enqueue(&self, record: ChangeRecord) -> Result<()> {
        let mut state = self.state.lock().await;
        let url = record.url().to_string();

        if state.diverting {
            tracing::debug!(url = %url, "sync in flight, diverting change to overflow");
            state.overflow.insert(url, record);
            return Ok(());
        }

        self.store.put_pending_change(&record).await?;
        // A leftover from a failed merge is older than this write.
        state.overflow.remove(&url);
        tracing::debug!(url = %url, deleted = record.change.is_deleted, "queued change");
        Ok(())
    }

    /// The durable pending-change set.
    pub async fn pending_changes(&self) -> Result<BTreeMap<String, ChangeRecord>> {
        self.store.load_pending_changes().await
    }

    /// Number of entries in the durable pending-change set.
    pub async fn change_count(&self) -> Result<usize> {
        Ok(self.pending_changes().await?.len())
    }

    /// Empty the durable pending-change set.
    pub async fn clear_changes(&self) -> Result<()> {
        self.store.clear_pending_changes().await
    }

    /// Send subsequent changes to the overflow queue until the next
    /// [`merge_temp_queue`](Self::merge_temp_queue).
    pub async fn begin_diverting(&self) {
        self.state.lock().await.diverting = true;
    }

    /// True while changes are being diverted.
    pub async fn is_diverting(&self) -> bool {
        self.state.lock().await.diverting
    }

    /// Number of changes waiting in the overflow queue.
    pub async fn overflow_count(&self) -> usize {
        self.state.lock().await.overflow.len()
    }

    /// Move every overflow entry into the durable set and stop diverting.
    ///
    /// Returns the number of entries moved. If the durable write fails the
    /// entries stay in the overflow queue for the next merge.
    pub async fn merge_temp_queue(&self) -> Result<usize> {
        let mut state = self.state.lock().await;
        state.diverting = false;
        if state.overflow.is_empty() {
            return Ok(0);
        }

        let records: Vec<ChangeRecord> = state.overflow.values().cloned().collect();
        self.store.put_pending_changes(&records).await?;
        state.overflow.clear();

        tracing::debug!(count = records.len(), "merged overflow changes into pending set");
        Ok(records.len())
    }

    /// Discard the overflow queue and the durable set.
    pub async fn cleanup(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.overflow.clear();
        self.store.clear_pending_changes().await
    }
}
