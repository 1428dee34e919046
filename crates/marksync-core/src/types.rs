//! Strong type definitions for marksync.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The version token of the last server state this device has fully absorbed.
///
/// `0` is a sentinel meaning "never synced". The token only moves forward
/// locally: a server that reports an older version does not pull it back.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncVersion(pub u64);

impl SyncVersion {
    /// Sentinel for a device that has never completed a sync.
    pub const NEVER_SYNCED: Self = Self(0);

    /// Wrap a raw version value.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The raw value.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// True if this device has never completed a sync.
    pub const fn is_never_synced(self) -> bool {
        self.0 == 0
    }

    /// Compute the version to persist after a round trip.
    ///
    /// - A server that reports `0` has no versioning of its own, so the
    ///   wall-clock instant `now` is used instead.
    /// - A server version below `local` is ignored and `local` is kept.
    /// - Otherwise the server version is adopted.
    pub fn next(local: SyncVersion, server: SyncVersion, now: i64) -> SyncVersion {
        if server.is_never_synced() {
            // Never hand back the sentinel, even with a broken clock.
            SyncVersion(u64::try_from(now).unwrap_or(0).max(local.0).max(1))
        } else if server < local {
            local
        } else {
            server
        }
    }
}

impl fmt::Debug for SyncVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SyncVersion({})", self.0)
    }
}

impl fmt::Display for SyncVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SyncVersion {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Current Unix time in milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
