//! Sync notifications.

use tokio::sync::broadcast;

/// What caused a bookmark change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSource {
    /// Records were written while applying server changes.
    Sync,
}

/// Notification emitted by the sync manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A non-forced round trip is starting.
    SyncStarted,
    /// A non-forced sync call has ended, successfully or not. Also sent
    /// when the call was skipped, without a preceding
    /// [`SyncEvent::SyncStarted`].
    SyncFinished,
    /// Local records were inserted, updated or removed.
    BookmarksChanged { source: ChangeSource },
}

/// Broadcast channel for [`SyncEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    /// Send `event` to every current subscriber.
    pub fn emit(&self, event: SyncEvent) {
        tracing::trace!(?event, "emitting sync event");
        // No receivers is fine.
        let _ = self.sender.send(event);
    }
}
