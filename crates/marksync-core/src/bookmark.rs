//! The device-local bookmark record.

use serde::{Deserialize, Serialize};

/// A bookmark as held in the local store.
///
/// Identity is the URL. `use_count` and `last_used` are local usage data and
/// never travel to the server; every other field is server-authoritative once
/// the bookmark has synced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    /// Unique key within the local store.
    pub url: String,
    /// Page title.
    pub title: String,
    /// Ordered tag list.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Short summary of the page.
    #[serde(default)]
    pub excerpt: String,
    /// Embedding vector, if one has been generated.
    #[serde(default)]
    pub embedding: Option<Vec<f64>>,
    /// Creation instant (Unix ms). Immutable after creation.
    pub saved_at: i64,
    /// How many times the bookmark was opened on this device.
    #[serde(default)]
    pub use_count: u32,
    /// Last time the bookmark was opened on this device (Unix ms).
    #[serde(default)]
    pub last_used: Option<i64>,
    /// Service that produced the embedding.
    #[serde(default)]
    pub api_service: Option<String>,
    /// Model that produced the embedding.
    #[serde(default)]
    pub embed_model: Option<String>,
}

impl Bookmark {
    /// Create a bookmark saved now, with no tags, excerpt or embedding.
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            tags: Vec::new(),
            excerpt: String::new(),
            embedding: None,
            saved_at: crate::now_millis(),
            use_count: 0,
            last_used: None,
            api_service: None,
            embed_model: None,
        }
    }

    /// Set the tags.
    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Set the excerpt.
    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.excerpt = excerpt.into();
        self
    }

    /// Set the embedding along with the service and model that produced it.
    pub fn with_embedding(
        mut self,
        embedding: Vec<f64>,
        api_service: impl Into<String>,
        embed_model: impl Into<String>,
    ) -> Self {
        self.embedding = Some(embedding);
        self.api_service = Some(api_service.into());
        self.embed_model = Some(embed_model.into());
        self
    }

    /// Set the creation instant.
    pub fn with_saved_at(mut self, saved_at: i64) -> Self {
        self.saved_at = saved_at;
        self
    }

    /// Record one local use of the bookmark at `now`.
    pub fn touch(&mut self, now: i64) {
        self.use_count = self.use_count.saturating_add(1);
        self.last_used = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let b = Bookmark::new("https://example.com", "Example")
            .with_tags(["rust", "sync"])
            .with_excerpt("An example page")
            .with_saved_at(1_000);

        assert_eq!(b.url, "https://example.com");
        assert_eq!(b.tags, vec!["rust".to_string(), "sync".to_string()]);
        assert_eq!(b.excerpt, "An example page");
        assert_eq!(b.saved_at, 1_000);
        assert_eq!(b.use_count, 0);
        assert!(b.last_used.is_none());
    }

    #[test]
    fn test_touch() {
        let mut b = Bookmark::new("https://example.com", "Example");
        b.touch(10);
        b.touch(20);
        assert_eq!(b.use_count, 2);
        assert_eq!(b.last_used, Some(20));
    }
}
