//! SQLite implementation of the store traits.
//!
//! This is the primary storage backend for marksync. It uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::broadcast;

use marksync_core::{Bookmark, ChangeRecord, SyncVersion};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{BookmarkStore, StoreEvent, SyncStateStore, EVENT_CHANNEL_CAPACITY};

/// `sync_meta` key holding the version token.
const LAST_SYNC_VERSION_KEY: &str = "last_sync_version";

type BookmarkMap = BTreeMap<String, Bookmark>;

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
///
/// `get_all` results are cached until the next bookmark write. The cache is
/// only touched while the connection lock is held, so a reader can never
/// repopulate it with rows older than a concurrent write.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    cache: Arc<Mutex<Option<BookmarkMap>>>,
    events: broadcast::Sender<StoreEvent>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        tracing::debug!(path = %path.display(), "opened bookmark database");
        Self::from_connection(conn)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        migration::migrate(&mut conn)?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            cache: Arc::new(Mutex::new(None)),
            events,
        })
    }

    /// Remove every bookmark record.
    pub async fn clear_bookmarks(&self) -> Result<()> {
        self.write_bookmarks(|conn| {
            conn.execute("DELETE FROM bookmarks", [])?;
            Ok(())
        })
        .await?;
        self.notify(StoreEvent::Cleared);
        Ok(())
    }

    /// Execute a blocking operation on the connection.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection, &Mutex<Option<BookmarkMap>>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        let cache = self.cache.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&mut *conn, &*cache)
        })
        .await?
    }

    /// Execute a bookmark write and drop the read cache.
    async fn write_bookmarks<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.run(move |conn, cache| {
            let out = f(conn)?;
            *cache.lock().map_err(|_| StoreError::Poisoned)? = None;
            Ok(out)
        })
        .await
    }

    fn notify(&self, event: StoreEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }
}

fn encode_cbor<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn decode_cbor<T: serde::de::DeserializeOwned>(bytes: &[u8], column: usize) -> rusqlite::Result<T> {
    ciborium::from_reader(bytes).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Blob, Box::new(e))
    })
}

const BOOKMARK_COLUMNS: &str = "url, title, tags, excerpt, embedding, saved_at, use_count, \
                                last_used, api_service, embed_model";

fn row_to_bookmark(row: &rusqlite::Row<'_>) -> rusqlite::Result<Bookmark> {
    let tags: Vec<u8> = row.get(2)?;
    let embedding: Option<Vec<u8>> = row.get(4)?;

    Ok(Bookmark {
        url: row.get(0)?,
        title: row.get(1)?,
        tags: decode_cbor(&tags, 2)?,
        excerpt: row.get(3)?,
        embedding: embedding.map(|bytes| decode_cbor(&bytes, 4)).transpose()?,
        saved_at: row.get(5)?,
        use_count: row.get(6)?,
        last_used: row.get(7)?,
        api_service: row.get(8)?,
        embed_model: row.get(9)?,
    })
}

fn insert_bookmark(conn: &Connection, bookmark: &Bookmark) -> Result<()> {
    let tags = encode_cbor(&bookmark.tags)?;
    let embedding = bookmark.embedding.as_ref().map(encode_cbor).transpose()?;

    conn.execute(
        "INSERT OR REPLACE INTO bookmarks (
            url, title, tags, excerpt, embedding, saved_at, use_count,
            last_used, api_service, embed_model
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            bookmark.url,
            bookmark.title,
            tags,
            bookmark.excerpt,
            embedding,
            bookmark.saved_at,
            bookmark.use_count,
            bookmark.last_used,
            bookmark.api_service,
            bookmark.embed_model,
        ],
    )?;
    Ok(())
}

fn insert_pending(conn: &Connection, record: &ChangeRecord) -> Result<()> {
    let json = serde_json::to_string(record)?;
    conn.execute(
        "INSERT OR REPLACE INTO pending_changes (url, timestamp, record) VALUES (?1, ?2, ?3)",
        params![record.url(), record.timestamp, json],
    )?;
    Ok(())
}

#[async_trait]
impl BookmarkStore for SqliteStore {
    async fn get_all(&self) -> Result<BTreeMap<String, Bookmark>> {
        self.run(|conn, cache| {
            let mut cache = cache.lock().map_err(|_| StoreError::Poisoned)?;
            if let Some(all) = cache.as_ref() {
                return Ok(all.clone());
            }

            let mut stmt = conn.prepare(&format!("SELECT {} FROM bookmarks", BOOKMARK_COLUMNS))?;
            let all = stmt
                .query_map([], row_to_bookmark)?
                .map(|r| r.map(|b| (b.url.clone(), b)))
                .collect::<rusqlite::Result<BookmarkMap>>()?;

            *cache = Some(all.clone());
            Ok(all)
        })
        .await
    }

    async fn get(&self, url: &str) -> Result<Option<Bookmark>> {
        let url = url.to_string();
        self.run(move |conn, _| {
            conn.query_row(
                &format!("SELECT {} FROM bookmarks WHERE url = ?1", BOOKMARK_COLUMNS),
                params![url],
                row_to_bookmark,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn put(&self, bookmark: &Bookmark) -> Result<()> {
        let owned = bookmark.clone();
        self.write_bookmarks(move |conn| insert_bookmark(conn, &owned))
            .await?;
        self.notify(StoreEvent::Put {
            urls: vec![bookmark.url.clone()],
        });
        Ok(())
    }

    async fn put_many(&self, bookmarks: &[Bookmark]) -> Result<()> {
        if bookmarks.is_empty() {
            return Ok(());
        }
        let owned = bookmarks.to_vec();
        self.write_bookmarks(move |conn| {
            let tx = conn.transaction()?;
            for bookmark in &owned {
                insert_bookmark(&tx, bookmark)?;
            }
            tx.commit()?;
            Ok(())
        })
        .await?;
        self.notify(StoreEvent::Put {
            urls: bookmarks.iter().map(|b| b.url.clone()).collect(),
        });
        Ok(())
    }

    async fn delete(&self, url: &str) -> Result<bool> {
        let owned = url.to_string();
        let removed = self
            .write_bookmarks(move |conn| {
                Ok(conn.execute("DELETE FROM bookmarks WHERE url = ?1", params![owned])? > 0)
            })
            .await?;
        if removed {
            self.notify(StoreEvent::Deleted {
                url: url.to_string(),
            });
        }
        Ok(removed)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl SyncStateStore for SqliteStore {
    async fn load_sync_version(&self) -> Result<SyncVersion> {
        self.run(|conn, _| {
            let value: Option<i64> = conn
                .query_row(
                    "SELECT value FROM sync_meta WHERE key = ?1",
                    params![LAST_SYNC_VERSION_KEY],
                    |row| row.get(0),
                )
                .optional()?;
            // A negative value can only come from a corrupted row.
            Ok(SyncVersion(value.and_then(|v| u64::try_from(v).ok()).unwrap_or(0)))
        })
        .await
    }

    async fn save_sync_version(&self, version: SyncVersion) -> Result<()> {
        let value = i64::try_from(version.get())
            .map_err(|_| StoreError::Serialization(format!("version {} out of range", version)))?;
        self.run(move |conn, _| {
            conn.execute(
                "INSERT OR REPLACE INTO sync_meta (key, value) VALUES (?1, ?2)",
                params![LAST_SYNC_VERSION_KEY, value],
            )?;
            Ok(())
        })
        .await
    }

    async fn load_pending_changes(&self) -> Result<BTreeMap<String, ChangeRecord>> {
        self.run(|conn, _| {
            let mut stmt = conn.prepare("SELECT url, record FROM pending_changes")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut pending = BTreeMap::new();
            for (url, json) in rows {
                let record: ChangeRecord = serde_json::from_str(&json)?;
                pending.insert(url, record);
            }
            Ok(pending)
        })
        .await
    }

    async fn put_pending_change(&self, record: &ChangeRecord) -> Result<()> {
        let record = record.clone();
        self.run(move |conn, _| insert_pending(conn, &record)).await
    }

    async fn put_pending_changes(&self, records: &[ChangeRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let records = records.to_vec();
        self.run(move |conn, _| {
            let tx = conn.transaction()?;
            for record in &records {
                insert_pending(&tx, record)?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn clear_pending_changes(&self) -> Result<()> {
        self.run(|conn, _| {
            conn.execute("DELETE FROM pending_changes", [])?;
            Ok(())
        })
        .await
    }
}
