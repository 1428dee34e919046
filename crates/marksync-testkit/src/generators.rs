//! Proptest generators for property-based testing.

use proptest::prelude::*;

use marksync_core::{Bookmark, SyncVersion, WireChange, WireContent};

/// Generate a bookmark URL from a small pool, so collisions are common.
pub fn url() -> impl Strategy<Value = String> {
    (0u8..8).prop_map(|n| format!("https://site-{}.example/page", n))
}

/// Generate a tag.
pub fn tag() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,11}".prop_map(String::from)
}

/// Generate a reasonable timestamp (Unix ms, 2001 to 2065).
pub fn timestamp() -> impl Strategy<Value = i64> {
    1_000_000_000_000i64..=3_000_000_000_000
}

/// Generate a sync version, including the never-synced sentinel.
pub fn sync_version() -> impl Strategy<Value = SyncVersion> {
    prop_oneof![
        1 => Just(SyncVersion::NEVER_SYNCED),
        4 => (1u64..=3_000_000_000_000).prop_map(SyncVersion),
    ]
}

/// Generate an optional embedding.
pub fn embedding() -> impl Strategy<Value = Option<Vec<f64>>> {
    prop::option::of(prop::collection::vec(-1.0f64..1.0, 4))
}

/// Generate a local bookmark, usage fields included.
pub fn bookmark() -> impl Strategy<Value = Bookmark> {
    (
        url(),
        ".{0,40}",
        prop::collection::vec(tag(), 0..5),
        ".{0,80}",
        embedding(),
        timestamp(),
        0u32..1_000,
        prop::option::of(timestamp()),
    )
        .prop_map(
            |(url, title, tags, excerpt, embedding, saved_at, use_count, last_used)| {
                let mut bookmark = Bookmark::new(url, title)
                    .with_tags(tags)
                    .with_excerpt(excerpt)
                    .with_saved_at(saved_at);
                if let Some(embedding) = embedding {
                    bookmark = bookmark.with_embedding(embedding, "openai", "text-embedding-3-small");
                }
                bookmark.use_count = use_count;
                bookmark.last_used = last_used;
                bookmark
            },
        )
}

/// Generate server content. `savedAt` is sometimes `0` (unknown).
pub fn wire_content() -> impl Strategy<Value = WireContent> {
    (
        bookmark(),
        prop_oneof![1 => Just(0i64), 4 => timestamp()],
    )
        .prop_map(|(bookmark, saved_at)| {
            let mut content = WireContent::from_bookmark(&bookmark);
            content.saved_at = saved_at;
            content
        })
}

/// Generate a server change, tombstone or content.
pub fn wire_change() -> impl Strategy<Value = WireChange> {
    (bookmark(), any::<bool>(), timestamp())
        .prop_map(|(bookmark, is_deleted, version)| {
            WireChange::from_bookmark(&bookmark, is_deleted, version)
        })
}
