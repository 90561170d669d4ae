//! The sandbox arena: a walled yard with a door, a glass window and a
//! wool-lined pen, so occlusion has something to chew on.

use earshot_sound::{SurfaceInfo, VoxelGeometry};
use earshot_types::{BlockPos, WorldKey};
use tracing::info;

/// Half-width of the arena in blocks.
pub const ARENA_HALF: i32 = 24;

/// Floor height agents walk on.
pub const FLOOR_Y: i32 = 64;

const WALL_HEIGHT: i32 = 4;

/// Lay out the arena blocks for `world`. Returns the number of blocks
/// placed.
pub fn build(geometry: &VoxelGeometry, world: &WorldKey) -> usize {
    geometry.add_world(world);
    let top = FLOOR_Y.saturating_add(WALL_HEIGHT);

    // Dividing wall along x = 0, with a door at z = 0 and a window at z = 8.
    for z in -ARENA_HALF..=ARENA_HALF {
        for y in FLOOR_Y..top {
            let surface = match (z, y.saturating_sub(FLOOR_Y)) {
                (0, 0 | 1) => SurfaceInfo::block("minecraft:oak_door"),
                (8, 1 | 2) => SurfaceInfo::block("minecraft:glass_pane"),
                _ => SurfaceInfo::block("minecraft:stone_bricks"),
            };
            geometry.set_block(world, BlockPos::new(0, y, z), surface);
        }
    }

    // Wool-lined pen in the east half.
    for x in 12..=16 {
        for z in [12, 16] {
            geometry.set_block(world, BlockPos::new(x, FLOOR_Y, z), SurfaceInfo::block("minecraft:white_wool"));
            geometry.set_block(world, BlockPos::new(z, FLOOR_Y, x), SurfaceInfo::block("minecraft:white_wool"));
        }
    }

    // A shallow pool in the west half.
    let water = SurfaceInfo {
        liquid: true,
        collidable: false,
        ..SurfaceInfo::block("minecraft:water")
    };
    for x in -16..=-12 {
        for z in -16..=-12 {
            geometry.set_block(world, BlockPos::new(x, FLOOR_Y, z), water.clone());
        }
    }

    let placed = geometry.block_count(world);
    info!(%world, blocks = placed, "Arena built");
    placed
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use earshot_sound::{Emission, Geometry, SoundRegistry, SoundSettings};

    use super::*;

    #[test]
    fn wall_muffles_but_door_lets_more_through() {
        let world = WorldKey::new("overworld");
        let geometry = Arc::new(VoxelGeometry::new());
        assert!(build(&geometry, &world) > 0);
        let registry = SoundRegistry::new(SoundSettings::default(), geometry as Arc<dyn Geometry>);

        let through_wall = Emission {
            world: &world,
            source: BlockPos::new(-4, FLOOR_Y.saturating_add(2), 4),
            id: None,
            range: 16.0,
            weight: 1.0,
        };
        let muffled = registry.attenuate(&through_wall, BlockPos::new(4, FLOOR_Y.saturating_add(2), 4));
        let through_door = Emission {
            source: BlockPos::new(-4, FLOOR_Y, 0),
            ..through_wall
        };
        let open = registry.attenuate(&through_door, BlockPos::new(4, FLOOR_Y, 0));
        assert!(muffled.range < open.range);
        assert!(open.range < 16.0);
    }
}
