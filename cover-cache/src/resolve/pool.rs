//! Pool-fallback strategy: a shared picture pool for songs without art.
//!
//! The pool directory sits next to the library-root marker component of the
//! song's path (`…/10-MUSIC/…` maps to `…/10-MPIC`). Its image files,
//! sorted by name, form a stable list; a song picks entry
//! `(item id + rotation epoch) mod pool size`. The mapping is stable within
//! one epoch and (likely) rotates when the epoch advances. The discovered
//! pool size is remembered in the settings store so later lookups can
//! compute their pick without re-enumerating the directory.

use super::{has_image_extension, CoverStrategy, Resolved, RotationEpoch};
use crate::item::{Item, ItemKind};
use crate::settings::SettingsStore;
use async_trait::async_trait;
use bytes::Bytes;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, warn};

/// Settings key recording the last discovered pool size.
pub const POOL_SIZE_KEY: &str = "mpic_size";

pub struct PoolStrategy {
    marker: String,
    pool_dir_name: String,
    settings: Arc<dyn SettingsStore>,
}

impl PoolStrategy {
    pub fn new(
        marker: impl Into<String>,
        pool_dir_name: impl Into<String>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            marker: marker.into(),
            pool_dir_name: pool_dir_name.into(),
            settings,
        }
    }

    /// Deterministic pool index for an item.
    pub fn index_for(item_id: u64, epoch: RotationEpoch, pool_size: u64) -> u64 {
        (item_id + epoch.0 as u64) % pool_size
    }

    /// The pool index computed from the settings-remembered pool size, with
    /// no filesystem access. `None` until a scan has recorded a size.
    pub async fn cached_pick(&self, item: &Item, epoch: RotationEpoch) -> Option<u64> {
        let size = self.settings.get_int(POOL_SIZE_KEY, 0).await;
        (size > 0).then(|| Self::index_for(item.id, epoch, size as u64))
    }

    /// Derive the pool directory from the song path: everything up to the
    /// library marker component, with the marker replaced by the pool name.
    fn pool_dir(&self, song_path: &Path) -> Option<PathBuf> {
        let marker = OsStr::new(&self.marker);
        let mut prefix = PathBuf::new();
        for component in song_path.components() {
            if component.as_os_str() == marker {
                return Some(prefix.join(&self.pool_dir_name));
            }
            prefix.push(component);
        }
        None
    }

    /// Image files in the pool directory, sorted lexicographically by name.
    async fn scan(&self, dir: &Path) -> Option<Vec<PathBuf>> {
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Pool directory not readable");
                return None;
            }
        };

        let mut files = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let path = entry.path();
                    if has_image_extension(&path) {
                        files.push(path);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Pool scan aborted");
                    return None;
                }
            }
        }

        if files.is_empty() {
            warn!(dir = %dir.display(), "Pool directory has no images");
            return None;
        }

        files.sort_by_key(|p| p.file_name().map(OsStr::to_os_string));
        Some(files)
    }
}

#[async_trait]
impl CoverStrategy for PoolStrategy {
    fn name(&self) -> &'static str {
        "pool"
    }

    async fn resolve(&self, item: &Item, epoch: RotationEpoch) -> Option<Resolved> {
        let dir = self.pool_dir(&item.path)?;
        let files = self.scan(&dir).await?;

        let size = files.len() as u64;
        self.settings.put_int(POOL_SIZE_KEY, size as i64).await;

        let index = Self::index_for(item.id, epoch, size);
        let picture = &files[index as usize];
        debug!(index, pool_size = size, file = %picture.display(), "Pool picked");

        match fs::read(picture).await {
            Ok(bytes) => Some(Resolved {
                bytes: Bytes::from(bytes),
                identity: Some((ItemKind::PoolEntry, index)),
            }),
            Err(e) => {
                warn!(file = %picture.display(), error = %e, "Failed to read pool picture");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemorySettings;
    use tempfile::TempDir;

    fn strategy(settings: Arc<MemorySettings>) -> PoolStrategy {
        PoolStrategy::new("10-MUSIC", "10-MPIC", settings)
    }

    fn pool_item(root: &Path, id: u64) -> Item {
        Item {
            kind: ItemKind::Song,
            id,
            path: root.join("10-MUSIC").join("gentle").join("song.mp3"),
            title: "Song".to_string(),
        }
    }

    async fn make_pool(root: &Path, names: &[&str]) {
        let pool = root.join("10-MPIC");
        fs::create_dir_all(&pool).await.unwrap();
        for name in names {
            fs::write(pool.join(name), format!("image {name}")).await.unwrap();
        }
    }

    #[test]
    fn test_index_is_congruent_modulo_pool_size() {
        let epoch = RotationEpoch(3);
        // Two ids congruent modulo 5 map to the same pool index
        assert_eq!(
            PoolStrategy::index_for(7, epoch, 5),
            PoolStrategy::index_for(12, epoch, 5)
        );
        assert_eq!(PoolStrategy::index_for(7, epoch, 5), 0);
        // A different epoch (likely) rotates the pick
        assert_eq!(PoolStrategy::index_for(7, RotationEpoch(4), 5), 1);
    }

    #[test]
    fn test_pool_dir_derivation() {
        let strategy = strategy(Arc::new(MemorySettings::new()));

        let derived = strategy
            .pool_dir(Path::new("/sd/card/10-MUSIC/gentle/song.mp3"))
            .unwrap();
        assert_eq!(derived, Path::new("/sd/card/10-MPIC"));

        // No marker component, no pool
        assert!(strategy.pool_dir(Path::new("/sd/card/music/song.mp3")).is_none());
    }

    #[tokio::test]
    async fn test_resolve_picks_sorted_entry_and_records_size() {
        let root = TempDir::new().unwrap();
        make_pool(root.path(), &["c.png", "a.jpg", "b.jpeg", "notes.txt"]).await;

        let settings = Arc::new(MemorySettings::new());
        let strategy = strategy(settings.clone());

        // id 4, epoch 0, pool size 3 (txt filtered out): index 1 -> "b.jpeg"
        let resolved = strategy
            .resolve(&pool_item(root.path(), 4), RotationEpoch(0))
            .await
            .unwrap();

        assert_eq!(&resolved.bytes[..], b"image b.jpeg");
        assert_eq!(resolved.identity, Some((ItemKind::PoolEntry, 1)));
        assert_eq!(settings.get_int(POOL_SIZE_KEY, 0).await, 3);
    }

    #[tokio::test]
    async fn test_cached_pick_uses_settings_without_scanning() {
        let settings = Arc::new(MemorySettings::new());
        let strategy = strategy(settings.clone());
        let item = pool_item(Path::new("/nonexistent"), 9);

        // Nothing remembered yet
        assert!(strategy.cached_pick(&item, RotationEpoch(1)).await.is_none());

        settings.put_int(POOL_SIZE_KEY, 5).await;
        // (9 + 1) % 5 == 0; no pool directory exists, the pick is pure math
        assert_eq!(strategy.cached_pick(&item, RotationEpoch(1)).await, Some(0));
    }

    #[tokio::test]
    async fn test_empty_pool_is_a_miss() {
        let root = TempDir::new().unwrap();
        make_pool(root.path(), &["readme.txt"]).await;

        let miss = strategy(Arc::new(MemorySettings::new()))
            .resolve(&pool_item(root.path(), 1), RotationEpoch(0))
            .await;
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_song_outside_library_marker_is_a_miss() {
        let miss = strategy(Arc::new(MemorySettings::new()))
            .resolve(&Item::song("/plain/track.mp3", "Track"), RotationEpoch(0))
            .await;
        assert!(miss.is_none());
    }
}
