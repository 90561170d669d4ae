//! World-space positions and the grid cell key.
//!
//! Sound events sit on integer block positions; agents and rays move in
//! continuous space. The grid index buckets block positions into 16-unit
//! cubic cells by arithmetic shift.

use serde::{Deserialize, Serialize};

/// Bits each coordinate is shifted by to find its grid cell (16 units).
pub const CELL_SHIFT: u32 = 4;

/// Integer block coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    /// East-west coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
    /// North-south coordinate.
    pub z: i32,
}

impl BlockPos {
    /// Create a block position.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The grid cell containing this block.
    pub const fn cell(self) -> CellKey {
        CellKey {
            x: self.x >> CELL_SHIFT,
            y: self.y >> CELL_SHIFT,
            z: self.z >> CELL_SHIFT,
        }
    }

    /// The center point of the block.
    pub fn center(self) -> Vec3 {
        Vec3::new(
            f64::from(self.x) + 0.5,
            f64::from(self.y) + 0.5,
            f64::from(self.z) + 0.5,
        )
    }

    /// Squared Euclidean distance between two block positions.
    pub fn distance_sq(self, other: Self) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        let dz = f64::from(self.z) - f64::from(other.z);
        dz.mul_add(dz, dx.mul_add(dx, dy * dy))
    }
}

impl core::fmt::Display for BlockPos {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Continuous world-space point or direction.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    /// East-west component.
    pub x: f64,
    /// Vertical component.
    pub y: f64,
    /// North-south component.
    pub z: f64,
}

impl Vec3 {
    /// Create a vector.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// `self + dir * scale`.
    pub fn offset(self, dir: Self, scale: f64) -> Self {
        Self::new(
            dir.x.mul_add(scale, self.x),
            dir.y.mul_add(scale, self.y),
            dir.z.mul_add(scale, self.z),
        )
    }

    /// Squared length.
    pub fn length_sq(self) -> f64 {
        self.z.mul_add(self.z, self.x.mul_add(self.x, self.y * self.y))
    }

    /// Euclidean length.
    pub fn length(self) -> f64 {
        self.length_sq().sqrt()
    }

    /// Squared distance to another point.
    pub fn distance_sq(self, other: Self) -> f64 {
        (self - other).length_sq()
    }

    /// Distance to another point.
    pub fn distance(self, other: Self) -> f64 {
        self.distance_sq(other).sqrt()
    }

    /// Unit vector in the same direction, or `None` for a zero vector.
    pub fn normalized(self) -> Option<Self> {
        let len = self.length();
        if len <= f64::EPSILON || !len.is_finite() {
            return None;
        }
        Some(Self::new(self.x / len, self.y / len, self.z / len))
    }

    /// The block containing this point.
    ///
    /// Non-finite or out-of-range components saturate at the `i32` bounds.
    #[allow(clippy::cast_possible_truncation)]
    pub fn block(self) -> BlockPos {
        // `as` from f64 to i32 saturates and maps NaN to 0.
        BlockPos::new(
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        )
    }
}

impl core::ops::Sub for Vec3 {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

/// Grid cell coordinate: a block position shifted right by [`CELL_SHIFT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellKey {
    /// Cell column along x.
    pub x: i32,
    /// Cell layer along y.
    pub y: i32,
    /// Cell row along z.
    pub z: i32,
}

impl CellKey {
    /// The 3x3x3 block of cells centered on this one, self included.
    pub fn neighborhood(self) -> impl Iterator<Item = Self> {
        (-1_i32..=1).flat_map(move |dx| {
            (-1_i32..=1).flat_map(move |dy| {
                (-1_i32..=1).map(move |dz| Self {
                    x: self.x.saturating_add(dx),
                    y: self.y.saturating_add(dy),
                    z: self.z.saturating_add(dz),
                })
            })
        })
    }
}
