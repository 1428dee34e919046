//! # marksync Testkit
//!
//! Testing utilities for marksync.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: A sync manager wired to in-memory parts, plus helpers for
//!   building bookmarks, server changes and tokens
//! - **Generators**: Proptest strategies for property-based testing
//!
//! Cross-crate scenario tests live in this crate's `tests/` directory.
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use marksync_core::{reconcile, SyncVersion};
//! use marksync_testkit::generators::{bookmark, wire_content};
//!
//! proptest! {
//!     #[test]
//!     fn usage_survives_reconcile(local in bookmark(), remote in wire_content()) {
//!         let merged = reconcile(Some(&local), &remote, 0);
//!         prop_assert_eq!(merged.use_count, local.use_count);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use marksync_core::SyncResponse;
//! use marksync_testkit::fixtures::{bookmark, SyncFixture};
//!
//! async fn example() {
//!     let fixture = SyncFixture::new(42).await;
//!     fixture.transport.push_response(SyncResponse::new(Vec::new(), 43));
//!     fixture
//!         .manager
//!         .record_bookmark_change(&[bookmark("https://a.example", "A")], false)
//!         .await
//!         .unwrap();
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{
    bookmark, drain, jwt, remote_change, tombstone, FlakyStore, GatedStore, SyncFixture,
};
