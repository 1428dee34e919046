//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use marksync_core::now_millis;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    // Create migrations table if it doesn't exist
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    // Get current version
    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    // Refuse to downgrade a database written by a newer build
    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    // Apply migrations
    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
            tracing::debug!(version, "applied schema migration");
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Bookmark records, keyed by URL
        CREATE TABLE bookmarks (
            url TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            tags BLOB NOT NULL,               -- CBOR array of strings
            excerpt TEXT NOT NULL,
            embedding BLOB,                   -- CBOR array of f64, nullable
            saved_at INTEGER NOT NULL,        -- Unix ms
            use_count INTEGER NOT NULL DEFAULT 0,
            last_used INTEGER,                -- Unix ms, nullable
            api_service TEXT,
            embed_model TEXT
        );

        -- Durable pending-change queue, one row per URL
        CREATE TABLE pending_changes (
            url TEXT PRIMARY KEY,
            timestamp INTEGER NOT NULL,       -- enqueue time (Unix ms)
            record TEXT NOT NULL              -- JSON-encoded ChangeRecord
        );

        -- Key/value sync bookkeeping (lastSyncVersion)
        CREATE TABLE sync_meta (
            key TEXT PRIMARY KEY,
            value INTEGER NOT NULL
        );

        CREATE INDEX idx_bookmarks_saved_at ON bookmarks(saved_at);
        "#,
    )?;

    Ok(())
}
