//! Cover source resolution: a priority-ordered, first-success chain of
//! strategies that locate raw cover-art bytes for an item.
//!
//! Strategies are independently toggled by a [`SourceMask`]. Each one
//! handles its own I/O errors and reports "nothing found"; the chain then
//! moves on. When every enabled strategy misses, the item simply has no
//! cover — that is a result, not an error.

mod embedded;
mod pool;
mod sibling;

pub use pool::{PoolStrategy, POOL_SIZE_KEY};
pub use sibling::SiblingStrategy;

use crate::item::{Item, ItemKind};
use crate::settings::SettingsStore;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Datelike, Local};
use embedded::EmbeddedStrategy;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Bitmask selecting which resolution strategies are enabled.
///
/// Bit values are a compatibility contract with the original store format's
/// cover-mode setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceMask(pub u32);

impl SourceMask {
    /// Platform-native art provider (injected, none by default)
    pub const NATIVE: SourceMask = SourceMask(0x1);
    /// Image file next to the song with the same stem
    pub const SIBLING: SourceMask = SourceMask(0x2);
    /// Shared picture-pool fallback
    pub const POOL: SourceMask = SourceMask(0x4);
    /// Cover embedded in the media container
    pub const EMBEDDED: SourceMask = SourceMask(0x8);
    /// Every strategy
    pub const ALL: SourceMask = SourceMask(0xF);

    pub fn contains(self, other: SourceMask) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for SourceMask {
    type Output = SourceMask;

    fn bitor(self, rhs: SourceMask) -> SourceMask {
        SourceMask(self.0 | rhs.0)
    }
}

/// Coarse time bucket (calendar month, 0-11) rotating which pool picture a
/// song maps to. Passed explicitly so resolution stays deterministic and
/// testable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationEpoch(pub u32);

impl RotationEpoch {
    /// The epoch for the current local calendar month.
    pub fn current() -> Self {
        Self(Local::now().month0())
    }
}

/// Raw cover bytes produced by a strategy.
///
/// `identity` overrides where the rendered cover is cached: the pool
/// strategy sets it to `(PoolEntry, pool index)` so songs sharing a pool
/// picture share one cache row. `None` means "cache under the item's own
/// key".
#[derive(Debug, Clone)]
pub struct Resolved {
    pub bytes: Bytes,
    pub identity: Option<(ItemKind, u64)>,
}

/// A single cover-art source.
#[async_trait]
pub trait CoverStrategy: Send + Sync {
    /// Strategy name, for logging.
    fn name(&self) -> &'static str;

    /// Produce raw cover bytes for the item, or `None`. Implementations
    /// swallow their own I/O errors; a failure is just a miss.
    async fn resolve(&self, item: &Item, epoch: RotationEpoch) -> Option<Resolved>;
}

/// Filesystem layout knobs for the file-based strategies.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// The public downloads directory; sibling matches there are false
    /// positives and are skipped
    pub downloads_dir: PathBuf,
    /// Path component marking the library root (pool derivation)
    pub library_marker: String,
    /// Name of the picture-pool directory next to the library marker
    pub pool_dir_name: String,
}

impl ResolverConfig {
    pub fn new(downloads_dir: impl Into<PathBuf>) -> Self {
        Self {
            downloads_dir: downloads_dir.into(),
            library_marker: "10-MUSIC".to_string(),
            pool_dir_name: "10-MPIC".to_string(),
        }
    }

    pub fn library_marker(mut self, marker: impl Into<String>) -> Self {
        self.library_marker = marker.into();
        self
    }

    pub fn pool_dir_name(mut self, name: impl Into<String>) -> Self {
        self.pool_dir_name = name.into();
        self
    }
}

/// Priority-ordered chain over the enabled strategies: native (if injected),
/// sibling file, embedded picture, pool fallback.
pub struct SourceResolver {
    mask: SourceMask,
    native: Option<Box<dyn CoverStrategy>>,
    sibling: Option<SiblingStrategy>,
    embedded: Option<EmbeddedStrategy>,
    pool: Option<PoolStrategy>,
}

impl SourceResolver {
    pub fn new(
        mask: SourceMask,
        config: ResolverConfig,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            mask,
            native: None,
            sibling: mask
                .contains(SourceMask::SIBLING)
                .then(|| SiblingStrategy::new(config.downloads_dir.clone())),
            embedded: mask.contains(SourceMask::EMBEDDED).then(|| EmbeddedStrategy),
            pool: mask.contains(SourceMask::POOL).then(|| {
                PoolStrategy::new(config.library_marker, config.pool_dir_name, settings)
            }),
        }
    }

    /// Inject a platform-native art provider. Only honored when the mask
    /// has the [`SourceMask::NATIVE`] bit.
    pub fn with_native(mut self, strategy: Box<dyn CoverStrategy>) -> Self {
        if self.mask.contains(SourceMask::NATIVE) {
            self.native = Some(strategy);
        } else {
            debug!("Native strategy injected but not enabled by mask");
        }
        self
    }

    /// First-success fold over the enabled strategies.
    pub async fn resolve(&self, item: &Item, epoch: RotationEpoch) -> Option<Resolved> {
        for strategy in self.enabled() {
            if let Some(resolved) = strategy.resolve(item, epoch).await {
                debug!(strategy = strategy.name(), path = %item.path.display(), "Cover resolved");
                return Some(resolved);
            }
        }
        debug!(path = %item.path.display(), "No cover found by any strategy");
        None
    }

    /// The pool identity the item would cache under, computed from the
    /// settings-remembered pool size without touching the filesystem.
    ///
    /// Lets the facade probe the shared cache row before paying for a
    /// directory scan. `None` when the pool strategy is disabled or no pool
    /// size has been discovered yet.
    pub async fn cached_pool_pick(
        &self,
        item: &Item,
        epoch: RotationEpoch,
    ) -> Option<(ItemKind, u64)> {
        let pool = self.pool.as_ref()?;
        let index = pool.cached_pick(item, epoch).await?;
        Some((ItemKind::PoolEntry, index))
    }

    fn enabled(&self) -> impl Iterator<Item = &dyn CoverStrategy> {
        self.native
            .as_deref()
            .into_iter()
            .chain(self.sibling.as_ref().map(|s| s as &dyn CoverStrategy))
            .chain(self.embedded.as_ref().map(|s| s as &dyn CoverStrategy))
            .chain(self.pool.as_ref().map(|s| s as &dyn CoverStrategy))
    }
}

/// Extensions recognized as cover images, matched case-insensitively.
pub(crate) const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

pub(crate) fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let ext = e.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}
