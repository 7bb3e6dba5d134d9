//! # Cover Blob Store
//!
//! Persistent key-to-blob storage for rendered cover art.
//!
//! ## Overview
//!
//! This crate owns the on-disk half of the cover cache:
//! - SQLite schema and migrations for the `covers` table
//! - [`BlobStore`]: capacity-bounded, TTL-bounded blob storage with lazy
//!   expiration at read time and an oldest-expiry-first trim pass
//! - A monthly purge that rotates stale entries regardless of capacity
//!
//! Keys are opaque 63-bit integers produced by the cache layer; this crate
//! only relies on their shape (non-negative, unique per logical cover).

pub mod db;
pub mod error;
pub mod store;

pub use db::{create_pool, create_test_pool, StoreConfig};
pub use error::{Result, StoreError};
pub use store::{BlobStore, OBJECT_TTL_SECS};
