//! Geometry collaborator contract used by occlusion attenuation.
//!
//! The core never owns world geometry. It asks a [`Geometry`]
//! implementation to clip a segment against collidable blocks and reports
//! back what surface was hit.

use earshot_types::{BlockPos, Vec3, WorldKey};

use crate::surface::SurfaceInfo;

/// Errors a geometry lookup may report.
///
/// Attenuation never propagates these; a failed lookup is treated as a
/// solid hit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    /// The world instance is not loaded.
    #[error("world {0} is not loaded")]
    WorldUnavailable(WorldKey),

    /// The region the ray crosses is not loaded.
    #[error("region around {0} is not loaded")]
    RegionUnavailable(BlockPos),

    /// Any other inconsistency in world state.
    #[error("geometry lookup failed: {0}")]
    Inconsistent(String),
}

/// The first surface a clipped segment ran into.
#[derive(Debug, Clone, PartialEq)]
pub struct RayHit {
    /// Point on the segment where the surface was entered.
    pub point: Vec3,
    /// The block that was hit.
    pub block: BlockPos,
    /// Description of the block.
    pub surface: SurfaceInfo,
}

/// World geometry as seen by sound rays.
pub trait Geometry: Send + Sync {
    /// Clip the segment `from -> to` against collidable geometry and
    /// fluids in `world`.
    ///
    /// Returns the first hit, or `None` if the segment is clear. The block
    /// containing `from` is never reported.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError`] when world state cannot be queried.
    fn clip(&self, world: &WorldKey, from: Vec3, to: Vec3) -> Result<Option<RayHit>, GeometryError>;

    /// Revision counter for `world`'s geometry.
    ///
    /// Must change whenever a block that could affect a ray changes.
    /// Cached attenuation results are keyed by it. Implementations that
    /// never change geometry can keep the default.
    fn revision(&self, _world: &WorldKey) -> u64 {
        0
    }
}

/// Geometry with nothing in it; every ray is clear.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAir;

impl Geometry for OpenAir {
    fn clip(&self, _world: &WorldKey, _from: Vec3, _to: Vec3) -> Result<Option<RayHit>, GeometryError> {
        Ok(None)
    }
}
