//! Last-writer-wins reconciliation of a remote change with a local record.
//!
//! The server is authoritative for content. The only exception is usage
//! data (`use_count`, `last_used`), which the server never sees and which is
//! therefore always carried over from the local record.

use crate::bookmark::Bookmark;
use crate::wire::WireContent;

/// Merge a remote content snapshot into the (optional) local record.
///
/// `now` stands in for `saved_at` when the server does not know the
/// creation instant.
pub fn reconcile(local: Option<&Bookmark>, remote: &WireContent, now: i64) -> Bookmark {
    Bookmark {
        url: remote.url.clone(),
        title: remote.title.clone(),
        tags: remote.tags.clone(),
        excerpt: remote.excerpt.clone(),
        embedding: remote.embedding.clone(),
        saved_at: if remote.saved_at != 0 { remote.saved_at } else { now },
        use_count: local.map_or(0, |b| b.use_count),
        last_used: local.and_then(|b| b.last_used),
        api_service: remote.api_service.clone(),
        embed_model: remote.embed_model.clone(),
    }
}
