//! Cover cache facade: lookup, resolve, downsample, store, re-read.
//!
//! The only entry point other subsystems call. Construction takes the shared
//! [`BlobStore`] handle rather than reaching for a global; the process is
//! expected to build one `CoverCache` and share it. All operations are
//! blocking at the filesystem level with no timeout, so callers needing
//! responsiveness run them off a worker.

use crate::error::Result;
use crate::item::{Item, ItemKind};
use crate::key::{CoverKey, SizeClass, SizeTable};
use crate::placeholder;
use crate::resolve::{RotationEpoch, SourceResolver};
use crate::scale::Downsampler;
use cover_store::{BlobStore, StoreError};
use image::DynamicImage;
use tracing::{debug, warn};

pub struct CoverCache {
    store: BlobStore,
    resolver: SourceResolver,
    scaler: Downsampler,
    sizes: SizeTable,
}

impl CoverCache {
    pub fn new(store: BlobStore, resolver: SourceResolver, sizes: SizeTable) -> Self {
        Self {
            store,
            resolver,
            scaler: Downsampler::new(sizes),
            sizes,
        }
    }

    /// Return the cover for an item at one of the registered sizes,
    /// rendering and caching it on a miss.
    ///
    /// `Ok(None)` means the item genuinely has no cover — not an error.
    /// On a miss the resolved artwork is downsampled, stored, and then read
    /// back, so callers always observe the normalized persisted
    /// representation rather than the freshly rendered bitmap.
    ///
    /// # Errors
    ///
    /// [`crate::CacheError::InvalidSize`] for an unregistered `size_px`;
    /// store write failures propagate.
    pub async fn get_or_create(
        &self,
        item: &Item,
        size_px: u32,
        epoch: RotationEpoch,
    ) -> Result<Option<DynamicImage>> {
        let class = self.sizes.class_of(size_px)?;
        let item_key = CoverKey::new(item.kind, item.id, class).encode();

        if let Some(cover) = self.read_decoded(item_key).await? {
            return Ok(Some(cover));
        }

        // Shared pool row, computed from the remembered pool size: probing
        // it here avoids a directory scan on every lookup for pool-served
        // songs, whose per-item key never gets a row
        if let Some((kind, id)) = self.resolver.cached_pool_pick(item, epoch).await {
            let shared_key = CoverKey::new(kind, id, class).encode();
            if let Some(cover) = self.read_decoded(shared_key).await? {
                return Ok(Some(cover));
            }
        }

        let Some(resolved) = self.resolver.resolve(item, epoch).await else {
            return Ok(None);
        };

        let store_key = match resolved.identity {
            Some((kind, id)) => CoverKey::new(kind, id, class).encode(),
            None => item_key,
        };

        let bitmap = match self.scaler.process(&resolved.bytes, class) {
            Ok(bitmap) => bitmap,
            Err(e) => {
                // Undecodable source bytes degrade to "no cover"
                warn!(path = %item.path.display(), error = %e, "Resolved cover failed to decode");
                return Ok(None);
            }
        };

        let blob = self.scaler.encode(&bitmap)?;
        match self.store.put(store_key, &blob).await {
            Ok(()) => {}
            Err(StoreError::DuplicateKey { key }) => {
                // Two concurrent misses both rendered; the winner's row is
                // authoritative and ours was wasted work, not a failure
                debug!(key, "Lost insert race, using existing cover row");
            }
            Err(e) => return Err(e.into()),
        }

        Ok(self.read_decoded(store_key).await?)
    }

    /// Return a synthesized text placeholder for the item, cached under its
    /// own kind so it never shadows real artwork.
    ///
    /// A store write failure degrades to serving the unstored bitmap for
    /// this call instead of propagating.
    pub async fn get_placeholder(&self, item: &Item, size_px: u32) -> Result<Option<DynamicImage>> {
        let class = self.sizes.class_of(size_px)?;
        let key = CoverKey::new(ItemKind::Placeholder, item.id, class).encode();

        if let Some(cover) = self.read_decoded(key).await? {
            return Ok(Some(cover));
        }

        let bitmap =
            DynamicImage::ImageRgb8(placeholder::render(&item.title, self.sizes.dimension(class)));
        let blob = self.scaler.encode(&bitmap)?;

        match self.store.put(key, &blob).await {
            Ok(()) | Err(StoreError::DuplicateKey { .. }) => {}
            Err(e) => {
                warn!(key, error = %e, "Placeholder write failed, serving unstored bitmap");
                return Ok(Some(bitmap));
            }
        }

        Ok(self.read_decoded(key).await?.or(Some(bitmap)))
    }

    /// Drop every cached cover and release the store handle.
    pub async fn evict_all(&self) -> Result<()> {
        self.store.evict_all().await?;
        Ok(())
    }

    /// Monthly purge of entries predating the current rotation epoch.
    pub async fn evict_expired(&self) -> Result<()> {
        self.store.evict_expired().await?;
        Ok(())
    }

    /// Read a stored blob and decode it.
    ///
    /// A store read failure is conservatively a miss; a blob that no longer
    /// decodes is purged so the next lookup re-renders it.
    async fn read_decoded(&self, key: u64) -> Result<Option<DynamicImage>> {
        let blob = match self.store.get(key).await {
            Ok(blob) => blob,
            Err(e) => {
                warn!(key, error = %e, "Store read failed, treating as cache miss");
                return Ok(None);
            }
        };
        let Some(blob) = blob else {
            return Ok(None);
        };

        match image::load_from_memory(&blob) {
            Ok(cover) => Ok(Some(cover)),
            Err(e) => {
                warn!(key, error = %e, "Stored cover no longer decodes, purging row");
                if let Err(e) = self.store.delete(key).await {
                    warn!(key, error = %e, "Failed to purge corrupt cover row");
                }
                Ok(None)
            }
        }
    }
}

impl std::fmt::Debug for CoverCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoverCache")
            .field("sizes", &self.sizes)
            .finish_non_exhaustive()
    }
}
