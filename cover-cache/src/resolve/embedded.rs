//! Embedded-picture strategy: cover art stored inside the media container.

use super::{CoverStrategy, Resolved, RotationEpoch};
use crate::item::Item;
use async_trait::async_trait;
use bytes::Bytes;
use lofty::file::TaggedFileExt;
use lofty::picture::PictureType;
use lofty::probe::Probe;
use std::io::Cursor;
use tokio::fs;
use tracing::debug;

/// Probes the media file with lofty and takes the front cover, or the first
/// picture when no front cover is tagged. Succeeds only on non-empty bytes.
pub(super) struct EmbeddedStrategy;

#[async_trait]
impl CoverStrategy for EmbeddedStrategy {
    fn name(&self) -> &'static str {
        "embedded"
    }

    async fn resolve(&self, item: &Item, _epoch: RotationEpoch) -> Option<Resolved> {
        let data = match fs::read(&item.path).await {
            Ok(data) => data,
            Err(e) => {
                debug!(path = %item.path.display(), error = %e, "Embedded probe failed to read file");
                return None;
            }
        };

        let tagged = match Probe::new(Cursor::new(&data)).guess_file_type() {
            Ok(probe) => match probe.read() {
                Ok(tagged) => tagged,
                Err(e) => {
                    debug!(path = %item.path.display(), error = %e, "Embedded probe failed to parse container");
                    return None;
                }
            },
            Err(e) => {
                debug!(path = %item.path.display(), error = %e, "Embedded probe failed to guess file type");
                return None;
            }
        };

        let tag = tagged.primary_tag().or_else(|| tagged.first_tag())?;
        let picture = tag
            .pictures()
            .iter()
            .find(|p| p.pic_type() == PictureType::CoverFront)
            .or_else(|| tag.pictures().first())?;

        if picture.data().is_empty() {
            return None;
        }

        Some(Resolved {
            bytes: Bytes::copy_from_slice(picture.data()),
            identity: None,
        })
    }
}
