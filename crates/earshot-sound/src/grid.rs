//! Spatial bucketing of resident sound events.
//!
//! Events are bucketed per world instance by their 16-unit [`CellKey`].
//! Events whose range exceeds [`LARGE_RANGE_THRESHOLD`] are audible from far
//! outside any 3x3x3 neighborhood, so they are kept in a per-world overflow
//! list instead and every query scans that list in full.
//!
//! A position index supports the dedup pass: all events sitting on one
//! block of one world are found without scanning the registry.

use std::collections::{BTreeMap, HashMap};

use earshot_types::{BlockPos, CellKey, SoundEvent, WorldKey};

/// Range above which an event skips cell bucketing.
pub const LARGE_RANGE_THRESHOLD: f64 = 64.0;

/// Handle of a resident event inside the registry.
pub(crate) type EventKey = u64;

#[derive(Debug, Default)]
struct WorldIndex {
    cells: HashMap<CellKey, Vec<EventKey>>,
    overflow: Vec<EventKey>,
    by_pos: HashMap<BlockPos, Vec<EventKey>>,
}

impl WorldIndex {
    fn is_empty(&self) -> bool {
        self.cells.is_empty() && self.overflow.is_empty() && self.by_pos.is_empty()
    }
}

/// Grid, overflow and position indexes for all world instances.
#[derive(Debug, Default)]
pub(crate) struct GridIndex {
    worlds: BTreeMap<WorldKey, WorldIndex>,
}

impl GridIndex {
    /// Whether an event goes to the overflow list rather than a cell.
    pub(crate) const fn is_large(event: &SoundEvent) -> bool {
        event.range > LARGE_RANGE_THRESHOLD
    }

    pub(crate) fn insert(&mut self, key: EventKey, event: &SoundEvent) {
        let world = self.worlds.entry(event.world.clone()).or_default();
        if Self::is_large(event) {
            world.overflow.push(key);
        } else {
            world.cells.entry(event.pos.cell()).or_default().push(key);
        }
        world.by_pos.entry(event.pos).or_default().push(key);
    }

    pub(crate) fn remove(&mut self, key: EventKey, event: &SoundEvent) {
        let Some(world) = self.worlds.get_mut(&event.world) else {
            return;
        };
        if Self::is_large(event) {
            world.overflow.retain(|k| *k != key);
        } else {
            let cell = event.pos.cell();
            if let Some(bucket) = world.cells.get_mut(&cell) {
                bucket.retain(|k| *k != key);
                if bucket.is_empty() {
                    world.cells.remove(&cell);
                }
            }
        }
        if let Some(keys) = world.by_pos.get_mut(&event.pos) {
            keys.retain(|k| *k != key);
            if keys.is_empty() {
                world.by_pos.remove(&event.pos);
            }
        }
        if world.is_empty() {
            self.worlds.remove(&event.world);
        }
    }

    /// Events sitting exactly on `pos` in `world`.
    pub(crate) fn at(&self, world: &WorldKey, pos: BlockPos) -> &[EventKey] {
        self.worlds
            .get(world)
            .and_then(|w| w.by_pos.get(&pos))
            .map_or(&[], Vec::as_slice)
    }

    /// Candidate events for a listener: the 3x3x3 cell neighborhood plus
    /// the world's overflow list.
    pub(crate) fn candidates(&self, world: &WorldKey, listener: BlockPos) -> Vec<EventKey> {
        let Some(index) = self.worlds.get(world) else {
            return Vec::new();
        };
        let mut keys = Vec::new();
        for cell in listener.cell().neighborhood() {
            if let Some(bucket) = index.cells.get(&cell) {
                keys.extend_from_slice(bucket);
            }
        }
        keys.extend_from_slice(&index.overflow);
        keys
    }

    /// Number of cell-bucketed and overflow events.
    pub(crate) fn counts(&self) -> (usize, usize) {
        self.worlds.values().fold((0, 0), |(cells, overflow), w| {
            let bucketed: usize = w.cells.values().map(Vec::len).sum();
            (cells.saturating_add(bucketed), overflow.saturating_add(w.overflow.len()))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use earshot_types::SoundId;

    use super::*;

    fn event(x: i32, range: f64) -> SoundEvent {
        SoundEvent::new(
            SoundId::parse("block.stone.break").unwrap(),
            BlockPos::new(x, 64, 0),
            WorldKey::new("overworld"),
            20,
            range,
            1.0,
        )
    }

    #[test]
    fn small_events_are_bucketed_large_ones_overflow() {
        let mut grid = GridIndex::default();
        grid.insert(1, &event(0, 16.0));
        grid.insert(2, &event(0, 64.0));
        grid.insert(3, &event(0, 64.5));
        assert_eq!(grid.counts(), (2, 1));
    }

    #[test]
    fn candidates_cover_neighborhood_and_overflow() {
        let mut grid = GridIndex::default();
        grid.insert(1, &event(10, 16.0)); // same cell as listener
        grid.insert(2, &event(20, 16.0)); // neighbor cell
        grid.insert(3, &event(40, 16.0)); // two cells away
        grid.insert(4, &event(500, 100.0)); // overflow
        let mut keys = grid.candidates(&WorldKey::new("overworld"), BlockPos::new(0, 64, 0));
        keys.sort_unstable();
        assert_eq!(keys, vec![1, 2, 4]);
        assert!(grid.candidates(&WorldKey::new("nether"), BlockPos::new(0, 64, 0)).is_empty());
    }

    #[test]
    fn removal_cleans_every_index() {
        let mut grid = GridIndex::default();
        let small = event(3, 16.0);
        let large = event(3, 80.0);
        grid.insert(1, &small);
        grid.insert(2, &large);
        assert_eq!(grid.at(&small.world, small.pos), &[1, 2]);
        grid.remove(1, &small);
        assert_eq!(grid.at(&small.world, small.pos), &[2]);
        grid.remove(2, &large);
        assert!(grid.at(&small.world, small.pos).is_empty());
        assert_eq!(grid.counts(), (0, 0));
        assert!(grid.worlds.is_empty());
    }
}
