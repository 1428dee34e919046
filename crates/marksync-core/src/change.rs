//! Queued local mutations.

use serde::{Deserialize, Serialize};

use crate::bookmark::Bookmark;
use crate::wire::WireChange;

/// A local mutation waiting to be sent to the server.
///
/// At most one record per URL lives in the durable queue: a newer mutation
/// replaces the older one before it ever reaches the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    /// When the record was enqueued (Unix ms).
    pub timestamp: i64,
    /// The change as it will be sent.
    pub change: WireChange,
}

impl ChangeRecord {
    /// Build a record for `bookmark`, stamped with `now` as both enqueue
    /// time and logical version.
    pub fn new(bookmark: &Bookmark, is_deleted: bool, now: i64) -> Self {
        Self {
            timestamp: now,
            change: WireChange::from_bookmark(bookmark, is_deleted, now),
        }
    }

    /// The queue key.
    pub fn url(&self) -> &str {
        self.change.url()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_is_keyed_by_url() {
        let bookmark = Bookmark::new("https://a.example", "A");
        let record = ChangeRecord::new(&bookmark, true, 123);
        assert_eq!(record.url(), "https://a.example");
        assert_eq!(record.timestamp, 123);
        assert_eq!(record.change.version, 123);
        assert!(record.change.is_deleted);
    }
}
