//! Block grid primitives: positions, identities, faces, and the immutable
//! block snapshot exchanged with the world model.

use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// BlockPos
// ---------------------------------------------------------------------------

/// A cell in the integer block grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    /// Grid X.
    pub x: i32,
    /// Grid Y.
    pub y: i32,
    /// Grid Z.
    pub z: i32,
}

impl BlockPos {
    /// Creates a position from grid coordinates.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The continuous-space center of this cell (corner + 0.5 on each axis).
    pub fn center(self) -> Vec3 {
        Vec3::new(
            self.x as f32 + 0.5,
            self.y as f32 + 0.5,
            self.z as f32 + 0.5,
        )
    }

    /// The cell containing a continuous-space point.
    pub fn containing(point: Vec3) -> Self {
        Self {
            x: point.x.floor() as i32,
            y: point.y.floor() as i32,
            z: point.z.floor() as i32,
        }
    }
}

// ---------------------------------------------------------------------------
// BlockFace
// ---------------------------------------------------------------------------

/// A side of a block. Discriminants are the dig-protocol wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BlockFace {
    /// −Y side.
    Bottom = 0,
    /// +Y side.
    Top = 1,
    /// −Z side.
    North = 2,
    /// +Z side.
    South = 3,
    /// −X side.
    West = 4,
    /// +X side.
    East = 5,
}

impl BlockFace {
    /// The protocol wire value for this face.
    pub const fn wire(self) -> u8 {
        self as u8
    }

    /// The outward unit normal of this face.
    pub const fn normal(self) -> IVec3 {
        match self {
            Self::Bottom => IVec3::new(0, -1, 0),
            Self::Top => IVec3::new(0, 1, 0),
            Self::North => IVec3::new(0, 0, -1),
            Self::South => IVec3::new(0, 0, 1),
            Self::West => IVec3::new(-1, 0, 0),
            Self::East => IVec3::new(1, 0, 0),
        }
    }

    /// The face whose outward normal equals `normal`, if it is axis-aligned
    /// and unit-length.
    pub fn from_normal(normal: IVec3) -> Option<Self> {
        match (normal.x, normal.y, normal.z) {
            (0, -1, 0) => Some(Self::Bottom),
            (0, 1, 0) => Some(Self::Top),
            (0, 0, -1) => Some(Self::North),
            (0, 0, 1) => Some(Self::South),
            (-1, 0, 0) => Some(Self::West),
            (1, 0, 0) => Some(Self::East),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// BlockId
// ---------------------------------------------------------------------------

/// Lightweight block type identifier.
///
/// `Air` (0) represents empty space; all other values are concrete block
/// types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId(pub u16);

impl BlockId {
    /// Air / empty cell.
    pub const AIR: Self = Self(0);
    /// Stone (for tests/demos).
    pub const STONE: Self = Self(1);
    /// Short foliage without collision geometry (for tests/demos).
    pub const GRASS_TUFT: Self = Self(2);

    /// Returns `true` if this identifier is air (empty).
    pub fn is_air(self) -> bool {
        self.0 == 0
    }
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// Immutable snapshot of one block as observed in the world model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Block type.
    pub id: BlockId,
    /// Grid position.
    pub position: BlockPos,
    /// Whether this block type can be excavated at all.
    pub diggable: bool,
    /// Whether the block has collision geometry. Collision-free blocks
    /// (short foliage) are treated permissively by face resolution.
    pub has_collision: bool,
}

impl Block {
    /// Returns `true` if the snapshot is empty space.
    pub fn is_air(&self) -> bool {
        self.id.is_air()
    }
}
