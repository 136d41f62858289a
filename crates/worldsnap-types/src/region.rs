//! Spatial keys for the captured world.
//!
//! The world is partitioned into fixed-size square regions of
//! [`REGION_SIZE`] blocks along each horizontal axis. A [`RegionKey`] names
//! one region; a [`BlockPos`] names a single block.
//!
//! # Packing
//!
//! A region key packs losslessly into a `u64`: the low 32 bits hold the
//! two's-complement bits of `x`, the high 32 bits those of `z`. The packed
//! form is what the persisted-region set stores and what external tooling
//! passes around.

use serde::{Deserialize, Serialize};

/// Width of a region along the X and Z axes, in blocks.
pub const REGION_SIZE: i32 = 16;

/// Mask selecting the low 32 bits of a packed key.
const LOW_HALF: u64 = 0xFFFF_FFFF;

/// Integer coordinates identifying one fixed-size region of the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegionKey {
    /// Region coordinate along the X axis.
    pub x: i32,
    /// Region coordinate along the Z axis.
    pub z: i32,
}

impl RegionKey {
    /// Create a region key from region coordinates.
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Return the region that contains the given block.
    pub const fn containing(pos: BlockPos) -> Self {
        Self {
            x: pos.x.div_euclid(REGION_SIZE),
            z: pos.z.div_euclid(REGION_SIZE),
        }
    }

    /// Pack this key into a single `u64`.
    pub fn pack(self) -> u64 {
        let x = u64::from(u32::from_ne_bytes(self.x.to_ne_bytes()));
        let z = u64::from(u32::from_ne_bytes(self.z.to_ne_bytes()));
        // `z` occupies only the low half, so rotating moves it intact into
        // the high half.
        x | z.rotate_left(32)
    }

    /// Recover a key from its packed form.
    pub fn unpack(packed: u64) -> Self {
        Self {
            x: low_half_as_i32(packed),
            z: low_half_as_i32(packed.rotate_right(32)),
        }
    }
}

impl core::fmt::Display for RegionKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "[{}, {}]", self.x, self.z)
    }
}

impl From<RegionKey> for u64 {
    fn from(key: RegionKey) -> Self {
        key.pack()
    }
}

impl From<u64> for RegionKey {
    fn from(packed: u64) -> Self {
        Self::unpack(packed)
    }
}

/// Reinterpret the low 32 bits of `value` as a signed coordinate.
fn low_half_as_i32(value: u64) -> i32 {
    let word = u32::try_from(value & LOW_HALF).unwrap_or_default();
    i32::from_ne_bytes(word.to_ne_bytes())
}

/// Position of a single block in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    /// X coordinate.
    pub x: i32,
    /// Y (vertical) coordinate.
    pub y: i32,
    /// Z coordinate.
    pub z: i32,
}

impl BlockPos {
    /// Create a block position.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Return the region this block belongs to.
    pub const fn region(self) -> RegionKey {
        RegionKey::containing(self)
    }
}

impl core::fmt::Display for BlockPos {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}
