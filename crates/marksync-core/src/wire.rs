//! Wire format for the sync round trip.
//!
//! All payloads are JSON with camelCase field names:
//!
//! ```text
//! SyncRequest  { lastSyncVersion, changes: [WireChange] }
//! SyncResponse { changes: [WireChange], currentVersion }
//! WireChange   { content: WireContent, version, isDeleted }
//! ```

use serde::{Deserialize, Deserializer, Serialize};

use crate::bookmark::Bookmark;
use crate::error::{CoreError, Result};
use crate::types::SyncVersion;

/// The content snapshot carried by a [`WireChange`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireContent {
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub excerpt: String,
    #[serde(default)]
    pub embedding: Option<Vec<f64>>,
    /// Creation instant (Unix ms); `0` when unknown.
    #[serde(default, deserialize_with = "null_as_default")]
    pub saved_at: i64,
    #[serde(default)]
    pub api_service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed_model: Option<String>,
}

impl WireContent {
    /// Snapshot the server-visible fields of a local bookmark.
    pub fn from_bookmark(bookmark: &Bookmark) -> Self {
        Self {
            url: bookmark.url.clone(),
            title: bookmark.title.clone(),
            tags: bookmark.tags.clone(),
            excerpt: bookmark.excerpt.clone(),
            embedding: bookmark.embedding.clone(),
            saved_at: bookmark.saved_at,
            api_service: bookmark.api_service.clone(),
            embed_model: bookmark.embed_model.clone(),
        }
    }
}

/// One mutation as exchanged with the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireChange {
    pub content: WireContent,
    /// The instant the mutation was made. A logical version, not a clock
    /// guarantee.
    pub version: i64,
    #[serde(default)]
    pub is_deleted: bool,
}

impl WireChange {
    /// Convert a local bookmark to a wire change stamped with `version`.
    pub fn from_bookmark(bookmark: &Bookmark, is_deleted: bool, version: i64) -> Self {
        Self {
            content: WireContent::from_bookmark(bookmark),
            version,
            is_deleted,
        }
    }

    /// The URL this change applies to.
    pub fn url(&self) -> &str {
        &self.content.url
    }

    /// True if this change is a tombstone.
    pub fn is_tombstone(&self) -> bool {
        self.is_deleted
    }
}

/// Request body sent to the sync endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub last_sync_version: SyncVersion,
    pub changes: Vec<WireChange>,
}

/// Response body returned by the sync endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub changes: Vec<WireChange>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub current_version: SyncVersion,
}

impl SyncResponse {
    /// A response with the given changes and server version.
    pub fn new(changes: Vec<WireChange>, current_version: u64) -> Self {
        Self {
            changes,
            current_version: SyncVersion(current_version),
        }
    }
}

/// Encode a sync request as JSON bytes.
pub fn encode_request(request: &SyncRequest) -> Result<Vec<u8>> {
    serde_json::to_vec(request).map_err(|e| CoreError::Encoding(e.to_string()))
}

/// Decode a sync response from JSON bytes.
pub fn decode_response(bytes: &[u8]) -> Result<SyncResponse> {
    serde_json::from_slice(bytes).map_err(|e| CoreError::Decoding(e.to_string()))
}

/// Treat an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
