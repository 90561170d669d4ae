//! Sparse voxel geometry.
//!
//! A [`Geometry`] backed by an in-memory block map per world instance.
//! The engine's sandbox world and the test suites use it; a game host
//! would supply its own implementation instead.
//!
//! Rays are walked voxel by voxel (Amanatides-Woo traversal), so the first
//! occupied block along the segment is always the one reported.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use earshot_types::{BlockPos, Vec3, WorldKey};
use tracing::error;

use crate::geometry::{Geometry, GeometryError, RayHit};
use crate::surface::SurfaceInfo;

#[derive(Debug, Default)]
struct VoxelWorld {
    blocks: BTreeMap<BlockPos, SurfaceInfo>,
    revision: u64,
}

/// In-memory block geometry for one or more world instances.
#[derive(Debug, Default)]
pub struct VoxelGeometry {
    worlds: RwLock<BTreeMap<WorldKey, VoxelWorld>>,
}

impl VoxelGeometry {
    /// Create geometry with no worlds loaded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load an empty world instance. Loading an existing world is a no-op.
    pub fn add_world(&self, world: &WorldKey) {
        self.write_worlds().entry(world.clone()).or_default();
    }

    /// Place a block, loading the world if needed. Bumps the revision.
    pub fn set_block(&self, world: &WorldKey, pos: BlockPos, surface: SurfaceInfo) {
        let mut worlds = self.write_worlds();
        let entry = worlds.entry(world.clone()).or_default();
        entry.blocks.insert(pos, surface);
        entry.revision = entry.revision.wrapping_add(1);
    }

    /// Remove a block. Bumps the revision if something was removed.
    pub fn clear_block(&self, world: &WorldKey, pos: BlockPos) {
        let mut worlds = self.write_worlds();
        if let Some(entry) = worlds.get_mut(world)
            && entry.blocks.remove(&pos).is_some()
        {
            entry.revision = entry.revision.wrapping_add(1);
        }
    }

    /// Number of blocks placed in `world`.
    pub fn block_count(&self, world: &WorldKey) -> usize {
        let worlds = self.read_worlds();
        worlds.get(world).map_or(0, |w| w.blocks.len())
    }

    fn read_worlds(&self) -> RwLockReadGuard<'_, BTreeMap<WorldKey, VoxelWorld>> {
        self.worlds.read().unwrap_or_else(|poisoned| {
            error!("voxel geometry lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write_worlds(&self) -> RwLockWriteGuard<'_, BTreeMap<WorldKey, VoxelWorld>> {
        self.worlds.write().unwrap_or_else(|poisoned| {
            error!("voxel geometry lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl Geometry for VoxelGeometry {
    fn clip(&self, world: &WorldKey, from: Vec3, to: Vec3) -> Result<Option<RayHit>, GeometryError> {
        let worlds = self.read_worlds();
        let voxels = worlds
            .get(world)
            .ok_or_else(|| GeometryError::WorldUnavailable(world.clone()))?;
        Ok(traverse(&voxels.blocks, from, to))
    }

    fn revision(&self, world: &WorldKey) -> u64 {
        let worlds = self.read_worlds();
        worlds.get(world).map_or(0, |w| w.revision)
    }
}

/// Per-axis traversal state.
#[derive(Debug, Clone, Copy)]
struct Axis {
    step: i32,
    t_max: f64,
    t_delta: f64,
}

impl Axis {
    fn new(origin: f64, cell: i32, dir: f64) -> Self {
        if dir > 0.0 {
            Self {
                step: 1,
                t_max: (f64::from(cell) + 1.0 - origin) / dir,
                t_delta: 1.0 / dir,
            }
        } else if dir < 0.0 {
            Self {
                step: -1,
                t_max: (f64::from(cell) - origin) / dir,
                t_delta: -1.0 / dir,
            }
        } else {
            Self {
                step: 0,
                t_max: f64::INFINITY,
                t_delta: f64::INFINITY,
            }
        }
    }
}

fn traverse(blocks: &BTreeMap<BlockPos, SurfaceInfo>, from: Vec3, to: Vec3) -> Option<RayHit> {
    let length = from.distance(to);
    let dir = (to - from).normalized()?;
    let mut cell = from.block();
    let end = to.block();

    let mut ax = Axis::new(from.x, cell.x, dir.x);
    let mut ay = Axis::new(from.y, cell.y, dir.y);
    let mut az = Axis::new(from.z, cell.z, dir.z);

    // Each step crosses one face; a segment cannot cross more faces than
    // the sum of its spans plus a small margin.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let max_steps = ((length * 3.0).ceil() as u64).saturating_add(3);

    for _ in 0..max_steps {
        if cell == end {
            return None;
        }
        let t = if ax.t_max <= ay.t_max && ax.t_max <= az.t_max {
            let t = ax.t_max;
            cell.x = cell.x.saturating_add(ax.step);
            ax.t_max += ax.t_delta;
            t
        } else if ay.t_max <= az.t_max {
            let t = ay.t_max;
            cell.y = cell.y.saturating_add(ay.step);
            ay.t_max += ay.t_delta;
            t
        } else {
            let t = az.t_max;
            cell.z = cell.z.saturating_add(az.step);
            az.t_max += az.t_delta;
            t
        };

        if t > length {
            return None;
        }
        if let Some(surface) = blocks.get(&cell) {
            return Some(RayHit {
                point: from.offset(dir, t),
                block: cell,
                surface: surface.clone(),
            });
        }
    }
    None
}
