//! Media items a cover can be requested for.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::key::MAX_ITEM_ID;

/// Kind of object a cached cover belongs to.
///
/// Discriminants are part of the packed key layout and must stay below 16
/// (see [`crate::key`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ItemKind {
    /// A single track
    Song = 0,
    /// An album
    Album = 1,
    /// A shared picture-pool entry; its id is the pool index, so multiple
    /// songs mapping to the same pool picture share one cache row
    PoolEntry = 2,
    /// A synthesized text placeholder
    Placeholder = 3,
}

impl ItemKind {
    pub(crate) fn from_bits(bits: u8) -> Option<ItemKind> {
        match bits {
            0 => Some(ItemKind::Song),
            1 => Some(ItemKind::Album),
            2 => Some(ItemKind::PoolEntry),
            3 => Some(ItemKind::Placeholder),
            _ => None,
        }
    }
}

/// Identity of a media item, as supplied by the metadata layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub kind: ItemKind,
    /// 57-bit identifier, typically a content hash of the path
    pub id: u64,
    /// Path of the underlying media file
    pub path: PathBuf,
    /// Display title, used for placeholder synthesis
    pub title: String,
}

impl Item {
    /// A song item whose id is derived from its path.
    pub fn song(path: impl Into<PathBuf>, title: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            kind: ItemKind::Song,
            id: Self::hash_id(&path),
            path,
            title: title.into(),
        }
    }

    /// Deterministic id for a path, masked to the key codec's id range.
    pub fn hash_id(path: &Path) -> u64 {
        let digest = Sha256::digest(path.to_string_lossy().as_bytes());
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(raw) & MAX_ITEM_ID
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_id_is_deterministic_and_bounded() {
        let a = Item::hash_id(Path::new("/music/track.mp3"));
        let b = Item::hash_id(Path::new("/music/track.mp3"));
        let c = Item::hash_id(Path::new("/music/other.mp3"));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a <= MAX_ITEM_ID);
    }

    #[test]
    fn test_song_constructor_hashes_path() {
        let item = Item::song("/music/track.mp3", "Track");
        assert_eq!(item.kind, ItemKind::Song);
        assert_eq!(item.id, Item::hash_id(Path::new("/music/track.mp3")));
    }
}
