//! # Cover Cache
//!
//! On-device, persistent cover-art cache for a media player: given an item
//! and a requested display size, return a previously rendered cover bitmap
//! or render, downsample, and store one.
//!
//! ## Overview
//!
//! - [`key`]: packs `(kind, id, size class)` into a single collision-free
//!   63-bit cache key
//! - [`resolve`]: prioritized chain of strategies locating raw cover art
//!   (sibling file, embedded picture, shared picture pool)
//! - [`scale`]: decode-time downsampling under a per-class pixel budget and
//!   deterministic JPEG re-encoding for storage
//! - [`cache`]: the [`CoverCache`] facade tying it to the persistent
//!   [`cover_store::BlobStore`]
//!
//! ## Usage
//!
//! ```ignore
//! use cover_cache::{CoverCache, Item, MemorySettings, ResolverConfig,
//!                   RotationEpoch, SizeTable, SourceMask, SourceResolver};
//! use cover_store::{create_pool, BlobStore, StoreConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = create_pool(StoreConfig::new("/cache/covercache.db")).await?;
//! let store = BlobStore::new(pool, 300 * 1024 * 1024);
//!
//! let resolver = SourceResolver::new(
//!     SourceMask::ALL,
//!     ResolverConfig::new("/storage/Download"),
//!     Arc::new(MemorySettings::new()),
//! );
//! // Dimensions come from the display layer at startup
//! let cache = CoverCache::new(store, resolver, SizeTable::new(96, 320, 1080));
//!
//! let song = Item::song("/storage/10-MUSIC/gentle/track.mp3", "Track");
//! let cover = cache.get_or_create(&song, 320, RotationEpoch::current()).await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod error;
pub mod item;
pub mod key;
pub mod placeholder;
pub mod resolve;
pub mod scale;
pub mod settings;

pub use cache::CoverCache;
pub use error::{CacheError, Result};
pub use item::{Item, ItemKind};
pub use key::{CoverKey, SizeClass, SizeTable, MAX_ITEM_ID};
pub use resolve::{ResolverConfig, RotationEpoch, SourceMask, SourceResolver};
pub use scale::{Downsampler, JPEG_QUALITY};
pub use settings::{MemorySettings, SettingsStore};
