//! Cache key codec: packs `(kind, id, size class)` into one 63-bit integer.
//!
//! ## Layout contract
//!
//! ```text
//! bit 62..=59   item kind   (4 bits,  kind < 16)
//! bit 58..=57   size class  (2 bits,  3 classes)
//! bit 56..=0    item id     (57 bits, id < 2^57)
//! ```
//!
//! The fields occupy disjoint bit ranges, so the encoding is injective over
//! the declared bounds and raw integer comparison never aliases two distinct
//! logical keys. The top bit is always clear, so every key fits a signed
//! 64-bit database column. Values outside the bounds are a programming
//! error, enforced by assertion rather than tolerated at runtime.

use crate::error::{CacheError, Result};
use crate::item::ItemKind;

const ID_BITS: u32 = 57;
const CLASS_BITS: u32 = 2;
const CLASS_SHIFT: u32 = ID_BITS;
const KIND_SHIFT: u32 = ID_BITS + CLASS_BITS;

/// Largest item id the key layout can carry.
pub const MAX_ITEM_ID: u64 = (1 << ID_BITS) - 1;

/// Canonical display size a cover may be requested at.
///
/// The concrete pixel dimensions are bound at startup via [`SizeTable`];
/// the class itself is what ends up in the cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum SizeClass {
    Small = 0,
    Medium = 1,
    Large = 2,
}

impl SizeClass {
    fn from_bits(bits: u8) -> Option<SizeClass> {
        match bits {
            0 => Some(SizeClass::Small),
            1 => Some(SizeClass::Medium),
            2 => Some(SizeClass::Large),
            _ => None,
        }
    }
}

/// The three registered pixel dimensions, supplied by the display layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeTable {
    small: u32,
    medium: u32,
    large: u32,
}

impl SizeTable {
    /// Register the three canonical dimensions.
    ///
    /// The dimensions must be distinct; equal values would make
    /// [`SizeTable::class_of`] ambiguous.
    pub fn new(small: u32, medium: u32, large: u32) -> Self {
        assert!(
            small != medium && medium != large && small != large,
            "size classes must have distinct pixel dimensions"
        );
        Self { small, medium, large }
    }

    /// Map a requested pixel size to its class.
    ///
    /// # Errors
    ///
    /// [`CacheError::InvalidSize`] if `px` is not one of the three
    /// registered dimensions.
    pub fn class_of(&self, px: u32) -> Result<SizeClass> {
        if px == self.small {
            Ok(SizeClass::Small)
        } else if px == self.medium {
            Ok(SizeClass::Medium)
        } else if px == self.large {
            Ok(SizeClass::Large)
        } else {
            Err(CacheError::InvalidSize(px))
        }
    }

    /// Pixel dimension registered for a class.
    pub fn dimension(&self, class: SizeClass) -> u32 {
        match class {
            SizeClass::Small => self.small,
            SizeClass::Medium => self.medium,
            SizeClass::Large => self.large,
        }
    }
}

/// Composite cover identity: `(kind, id, size class)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoverKey {
    pub kind: ItemKind,
    pub id: u64,
    pub class: SizeClass,
}

impl CoverKey {
    /// # Panics
    ///
    /// If `id` exceeds [`MAX_ITEM_ID`]; ids handed to this module must
    /// already be masked to the key range (see [`crate::item::Item::hash_id`]).
    pub fn new(kind: ItemKind, id: u64, class: SizeClass) -> Self {
        assert!(id <= MAX_ITEM_ID, "item id {id} exceeds key range");
        Self { kind, id, class }
    }

    /// Pack into the 63-bit integer form. Pure and deterministic.
    pub fn encode(&self) -> u64 {
        ((self.kind as u64) << KIND_SHIFT) | ((self.class as u64) << CLASS_SHIFT) | self.id
    }

    /// Invert [`CoverKey::encode`]. Returns `None` for bit patterns that do
    /// not correspond to a known kind or class.
    pub fn decode(raw: u64) -> Option<CoverKey> {
        let kind = ItemKind::from_bits((raw >> KIND_SHIFT) as u8)?;
        let class = SizeClass::from_bits(((raw >> CLASS_SHIFT) & ((1 << CLASS_BITS) - 1)) as u8)?;
        let id = raw & MAX_ITEM_ID;
        Some(CoverKey { kind, id, class })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KINDS: [ItemKind; 4] = [
        ItemKind::Song,
        ItemKind::Album,
        ItemKind::PoolEntry,
        ItemKind::Placeholder,
    ];
    const CLASSES: [SizeClass; 3] = [SizeClass::Small, SizeClass::Medium, SizeClass::Large];

    #[test]
    fn test_encode_decode_roundtrip() {
        for kind in KINDS {
            for class in CLASSES {
                for id in [0, 1, 13_646, MAX_ITEM_ID / 2, MAX_ITEM_ID] {
                    let key = CoverKey::new(kind, id, class);
                    assert_eq!(CoverKey::decode(key.encode()), Some(key));
                }
            }
        }
    }

    #[test]
    fn test_encode_is_injective_over_domain() {
        use std::collections::HashSet;

        let mut seen = HashSet::new();
        for kind in KINDS {
            for class in CLASSES {
                for id in [0, 1, 2, 999, MAX_ITEM_ID - 1, MAX_ITEM_ID] {
                    let raw = CoverKey::new(kind, id, class).encode();
                    assert!(seen.insert(raw), "key collision for {kind:?}/{class:?}/{id}");
                }
            }
        }
    }

    #[test]
    fn test_encoded_key_fits_signed_64() {
        let max = CoverKey::new(ItemKind::Placeholder, MAX_ITEM_ID, SizeClass::Large).encode();
        assert!(max < (1 << 63), "top bit must stay clear");
    }

    #[test]
    #[should_panic(expected = "exceeds key range")]
    fn test_oversized_id_is_a_contract_violation() {
        CoverKey::new(ItemKind::Song, MAX_ITEM_ID + 1, SizeClass::Small);
    }

    #[test]
    fn test_class_of_accepts_registered_sizes_only() {
        let sizes = SizeTable::new(96, 320, 1080);

        assert_eq!(sizes.class_of(96).unwrap(), SizeClass::Small);
        assert_eq!(sizes.class_of(320).unwrap(), SizeClass::Medium);
        assert_eq!(sizes.class_of(1080).unwrap(), SizeClass::Large);

        for px in [0, 95, 97, 500, 4096] {
            assert!(matches!(
                sizes.class_of(px),
                Err(CacheError::InvalidSize(p)) if p == px
            ));
        }
    }

    #[test]
    fn test_dimension_inverts_class_of() {
        let sizes = SizeTable::new(96, 320, 1080);
        for class in CLASSES {
            assert_eq!(sizes.class_of(sizes.dimension(class)).unwrap(), class);
        }
    }

    #[test]
    #[should_panic(expected = "distinct pixel dimensions")]
    fn test_size_table_rejects_ambiguous_dimensions() {
        SizeTable::new(96, 96, 1080);
    }
}
