//! # marksync
//!
//! Local-first bookmark sync. Bookmarks live in a local SQLite database and
//! are reconciled with a remote authoritative store whenever the device is
//! online and logged in.
//!
//! ## Overview
//!
//! - **Local first**: every edit is written locally before any network I/O
//! - **Delta sync**: only changes since the last absorbed server version are
//!   sent, except on a device's very first sync
//! - **Last writer wins**: the server is authoritative for content; usage
//!   counters stay on the device
//!
//! ## Usage
//!
//! ```rust,no_run
//! use marksync::{init_tracing, Bookmark, BookmarkSync, ClientConfig};
//!
//! async fn example() -> marksync::Result<()> {
//!     let config = ClientConfig::from_env()?;
//!     init_tracing(&config);
//!
//!     let client = BookmarkSync::open(&config).await?;
//!     client.login("eyJhbGciOi...").await;
//!
//!     client
//!         .save_bookmark(Bookmark::new("https://example.com", "Example").with_tags(["demo"]))
//!         .await?;
//!     let report = client.force_sync().await?;
//!     println!("synced to version {}", report.version);
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `marksync::core` - Data model and wire format
//! - `marksync::store` - Storage abstraction and SQLite
//! - `marksync::sync` - Sync engine, transports and auth

pub mod client;
pub mod config;
pub mod error;
pub mod logging;

// Re-export component crates
pub use marksync_core as core;
pub use marksync_store as store;
pub use marksync_sync as sync;

// Re-export main types for convenience
pub use client::BookmarkSync;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use logging::init_tracing;

// Re-export commonly used types
pub use marksync_core::{Bookmark, SyncVersion};
pub use marksync_sync::{Environment, SyncConfig, SyncEvent, SyncReport};
