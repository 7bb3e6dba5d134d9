//! Sibling-file strategy: an image next to the song with the same stem.

use super::{has_image_extension, CoverStrategy, Resolved, RotationEpoch};
use crate::item::Item;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, warn};

/// Accepts the first directory entry whose file stem equals the song's stem
/// and whose extension is a recognized image extension.
///
/// Skipped entirely when the song sits in the public downloads directory:
/// same-named images dumped there are false positives in most cases.
pub struct SiblingStrategy {
    downloads_dir: PathBuf,
}

impl SiblingStrategy {
    pub fn new(downloads_dir: PathBuf) -> Self {
        Self { downloads_dir }
    }
}

#[async_trait]
impl CoverStrategy for SiblingStrategy {
    fn name(&self) -> &'static str {
        "sibling"
    }

    async fn resolve(&self, item: &Item, _epoch: RotationEpoch) -> Option<Resolved> {
        let parent = item.path.parent()?;
        if parent == self.downloads_dir {
            debug!(path = %item.path.display(), "Skipping sibling search in downloads directory");
            return None;
        }
        let stem = item.path.file_stem()?;

        let mut entries = match fs::read_dir(parent).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %parent.display(), error = %e, "Sibling search failed to list directory");
                return None;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(dir = %parent.display(), error = %e, "Sibling search aborted");
                    break;
                }
            };

            let candidate = entry.path();
            if candidate.file_stem() == Some(stem) && has_image_extension(&candidate) {
                return match fs::read(&candidate).await {
                    Ok(bytes) => Some(Resolved {
                        bytes: Bytes::from(bytes),
                        identity: None,
                    }),
                    Err(e) => {
                        warn!(file = %candidate.display(), error = %e, "Failed to read sibling cover");
                        None
                    }
                };
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    async fn write(dir: &Path, name: &str, contents: &[u8]) {
        fs::write(dir.join(name), contents).await.unwrap();
    }

    fn strategy(downloads: &Path) -> SiblingStrategy {
        SiblingStrategy::new(downloads.to_path_buf())
    }

    fn song_in(dir: &Path) -> Item {
        Item::song(dir.join("track.mp3"), "Track")
    }

    #[tokio::test]
    async fn test_finds_same_stem_image() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "track.mp3", b"not audio").await;
        write(dir.path(), "track.jpg", b"jpeg bytes").await;

        let resolved = strategy(Path::new("/downloads"))
            .resolve(&song_in(dir.path()), RotationEpoch(0))
            .await
            .unwrap();

        assert_eq!(&resolved.bytes[..], b"jpeg bytes");
        assert!(resolved.identity.is_none());
    }

    #[tokio::test]
    async fn test_ignores_other_stems_and_non_images() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "track.mp3", b"not audio").await;
        write(dir.path(), "other.jpg", b"wrong stem").await;
        write(dir.path(), "track.txt", b"wrong extension").await;

        let miss = strategy(Path::new("/downloads"))
            .resolve(&song_in(dir.path()), RotationEpoch(0))
            .await;
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_downloads_directory_is_excluded() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "track.mp3", b"not audio").await;
        write(dir.path(), "track.jpg", b"jpeg bytes").await;

        // Same layout, but the parent is the configured downloads dir
        let miss = strategy(dir.path())
            .resolve(&song_in(dir.path()), RotationEpoch(0))
            .await;
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_missing_directory_is_a_miss() {
        let miss = strategy(Path::new("/downloads"))
            .resolve(&Item::song("/nonexistent/track.mp3", "Track"), RotationEpoch(0))
            .await;
        assert!(miss.is_none());
    }
}
