//! The spatial sound registry.
//!
//! A capacity-bounded cache of live sound events, bucketed by grid cell,
//! with weighted eviction, same-spot deduplication and an occlusion-aware
//! nearest-event query.
//!
//! # Locking
//!
//! Events and indexes sit behind one [`RwLock`]: any number of
//! `find_nearest` readers, or a single writer. The attenuation memo is a
//! concurrent map so readers can fill it while holding the read lock.
//! A poisoned lock is logged and recovered rather than propagated.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use earshot_types::{BlockPos, HeardSound, SoundEvent, WorldKey};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::attenuation::{Attenuated, Attenuator, Emission};
use crate::geometry::Geometry;
use crate::grid::{EventKey, GridIndex};
use crate::profile::SoundProfile;
use crate::settings::{SettingsCell, SoundSettings, valid_amount};

/// Scores closer than this are a tie, broken by distance.
pub const SCORE_TIE_EPSILON: f64 = 0.001;

/// What happened to an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertOutcome {
    /// Stored in free capacity.
    Inserted,
    /// Stored after removing lighter events at the same spot.
    Replaced,
    /// Stored after evicting the most disposable resident.
    InsertedWithEviction,
    /// The identifier is not on the configured whitelist.
    RejectedNotWhitelisted,
    /// An event at least as heavy already occupies the spot.
    RejectedDuplicate,
    /// The registry is full and the event is not worth an eviction.
    RejectedCapacity,
    /// Zero lifetime, or a negative or non-finite range or weight.
    RejectedInvalid,
}

impl InsertOutcome {
    /// Whether the event is now resident.
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::Inserted | Self::Replaced | Self::InsertedWithEviction)
    }
}

/// Point-in-time registry counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RegistryStats {
    /// Resident events across all worlds.
    pub resident: usize,
    /// Events bucketed by grid cell.
    pub bucketed: usize,
    /// Events on overflow lists.
    pub overflow: usize,
    /// Memoized attenuation results.
    pub cached: usize,
}

#[derive(Debug, Default)]
struct RegistryState {
    events: BTreeMap<EventKey, SoundEvent>,
    grid: GridIndex,
    next_key: EventKey,
}

impl RegistryState {
    fn store(&mut self, event: SoundEvent) -> EventKey {
        let key = self.next_key;
        self.next_key = self.next_key.wrapping_add(1);
        self.grid.insert(key, &event);
        self.events.insert(key, event);
        key
    }

    fn evict(&mut self, key: EventKey) -> Option<SoundEvent> {
        let event = self.events.remove(&key)?;
        self.grid.remove(key, &event);
        Some(event)
    }

    /// Resident with the lowest eviction metric. Ties go to the oldest.
    fn most_disposable(&self) -> Option<(EventKey, f64)> {
        self.events
            .iter()
            .map(|(key, event)| (*key, event.eviction_metric()))
            .fold(None, |best, (key, metric)| match best {
                Some((_, lowest)) if lowest <= metric => best,
                _ => Some((key, metric)),
            })
    }

    /// Make room for `incoming`, evicting one resident if it is worth it.
    ///
    /// Returns `None` when the event must be rejected, otherwise whether an
    /// eviction happened.
    fn make_room(&mut self, capacity: usize, incoming: &SoundEvent) -> Option<bool> {
        if self.events.len() < capacity {
            return Some(false);
        }
        let (key, lowest) = self.most_disposable()?;
        if incoming.eviction_metric() > lowest {
            if let Some(evicted) = self.evict(key) {
                debug!(
                    evicted = ?evicted.id(),
                    pos = %evicted.pos,
                    metric = lowest,
                    "Evicted sound event"
                );
            }
            Some(true)
        } else {
            None
        }
    }
}

/// Capacity-bounded, spatially indexed cache of live sound events.
#[derive(Debug)]
pub struct SoundRegistry {
    state: RwLock<RegistryState>,
    settings: SettingsCell,
    attenuator: Attenuator,
}

impl SoundRegistry {
    /// Create an empty registry.
    pub fn new(settings: SoundSettings, geometry: Arc<dyn Geometry>) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            settings: SettingsCell::new(settings),
            attenuator: Attenuator::new(geometry),
        }
    }

    /// The current settings snapshot.
    pub fn settings(&self) -> Arc<SoundSettings> {
        self.settings.snapshot()
    }

    /// Swap in new settings.
    ///
    /// The attenuation memo is cleared, and if the new capacity is lower
    /// than the resident count the most disposable events are evicted
    /// until it fits.
    pub fn reload(&self, settings: SoundSettings) {
        let capacity = settings.capacity;
        self.settings.replace(settings);
        self.attenuator.clear();

        let mut state = self.write_state();
        let mut trimmed = 0_usize;
        while state.events.len() > capacity {
            let Some((key, _)) = state.most_disposable() else {
                break;
            };
            state.evict(key);
            trimmed = trimmed.saturating_add(1);
        }
        info!(capacity, trimmed, "Sound settings reloaded");
    }

    /// Insert an event.
    ///
    /// Registered events are deduplicated against the same identifier at
    /// the same spot; virtual events go through [`Self::insert_virtual`].
    pub fn insert(&self, event: SoundEvent) -> InsertOutcome {
        if event.is_virtual() {
            return self.insert_virtual(event);
        }
        let settings = self.settings.snapshot();
        if let Some(outcome) = precheck(&settings, &event) {
            return outcome;
        }

        let mut state = self.write_state();
        let duplicate = state
            .grid
            .at(&event.world, event.pos)
            .iter()
            .copied()
            .find(|key| state.events.get(key).is_some_and(|resident| resident.origin == event.origin));

        let mut replaced = false;
        if let Some(key) = duplicate {
            let heavier = state.events.get(&key).is_some_and(|resident| resident.weight >= event.weight);
            if heavier {
                debug!(sound = ?event.id(), pos = %event.pos, "Rejected duplicate sound event");
                return InsertOutcome::RejectedDuplicate;
            }
            state.evict(key);
            replaced = true;
        }

        admit(&mut state, settings.capacity, event, replaced)
    }

    /// Insert an event deduplicated by position alone.
    ///
    /// Any resident at the same spot with weight at least as high drops
    /// the insert. Otherwise every lighter resident at the spot is removed
    /// and the event goes through the capacity pass.
    pub fn insert_virtual(&self, event: SoundEvent) -> InsertOutcome {
        let settings = self.settings.snapshot();
        if let Some(outcome) = precheck(&settings, &event) {
            return outcome;
        }

        let mut state = self.write_state();
        let occupants: Vec<EventKey> = state.grid.at(&event.world, event.pos).to_vec();
        let blocked = occupants
            .iter()
            .any(|key| state.events.get(key).is_some_and(|resident| resident.weight >= event.weight));
        if blocked {
            debug!(pos = %event.pos, weight = event.weight, "Rejected virtual sound event");
            return InsertOutcome::RejectedDuplicate;
        }
        for key in &occupants {
            state.evict(*key);
        }

        admit(&mut state, settings.capacity, event, !occupants.is_empty())
    }

    /// Age every event by one tick, dropping the expired ones.
    ///
    /// Returns the number of events removed.
    pub fn decay(&self) -> usize {
        let mut state = self.write_state();
        let mut expired = Vec::new();
        for (key, event) in &mut state.events {
            event.ticks_remaining = event.ticks_remaining.saturating_sub(1);
            if event.ticks_remaining == 0 {
                expired.push(*key);
            }
        }
        for key in &expired {
            state.evict(*key);
        }
        expired.len()
    }

    /// Occlusion-attenuated range and weight of an emission at `listener`.
    pub fn attenuate(&self, emission: &Emission<'_>, listener: BlockPos) -> Attenuated {
        let settings = self.settings.snapshot();
        self.attenuator.attenuate(&settings, emission, listener)
    }

    /// The most interesting event audible at `listener`.
    ///
    /// Candidates come from the listener's 3x3x3 cell neighborhood and the
    /// world's overflow list. Each is filtered by the whitelist, given the
    /// profile's override if any, attenuated, and dropped if the listener
    /// is beyond the attenuated range. The highest weight (plus novelty
    /// bonus) wins; near-ties prefer the closer event.
    pub fn find_nearest(
        &self,
        profile: Option<&SoundProfile>,
        world: &WorldKey,
        listener: BlockPos,
    ) -> Option<HeardSound> {
        let settings = self.settings.snapshot();
        let state = self.read_state();
        let mut candidates = state.grid.candidates(world, listener);
        candidates.sort_unstable();

        let mut best: Option<(f64, f64, HeardSound)> = None;
        for key in candidates {
            let Some(event) = state.events.get(&key) else {
                continue;
            };
            if !settings.allows(event.id()) {
                continue;
            }
            let base = event
                .id()
                .and_then(|id| profile.and_then(|p| p.override_for(id)));
            let emission = Emission {
                world,
                source: event.pos,
                id: event.id(),
                range: base.map_or(event.range, |b| b.range),
                weight: base.map_or(event.weight, |b| b.weight),
            };
            let heard = self.attenuator.attenuate(&settings, &emission, listener);

            let distance_sq = event.pos.distance_sq(listener);
            if distance_sq > heard.range * heard.range {
                continue;
            }
            let mut score = heard.weight;
            if settings.is_novel(event.ticks_remaining) {
                score += settings.novelty_bonus;
            }

            let better = match &best {
                None => true,
                Some((best_score, best_distance, _)) => {
                    if (score - best_score).abs() < SCORE_TIE_EPSILON {
                        distance_sq < *best_distance
                    } else {
                        score > *best_score
                    }
                }
            };
            if better {
                best = Some((
                    score,
                    distance_sq,
                    HeardSound {
                        origin: event.origin.clone(),
                        pos: event.pos,
                        ticks_remaining: event.ticks_remaining,
                        range: heard.range,
                        weight: heard.weight,
                    },
                ));
            }
        }
        best.map(|(_, _, heard)| heard)
    }

    /// Number of resident events.
    pub fn len(&self) -> usize {
        self.read_state().events.len()
    }

    /// Whether no events are resident.
    pub fn is_empty(&self) -> bool {
        self.read_state().events.is_empty()
    }

    /// Copies of every event resident in `world`, oldest first.
    pub fn events_in(&self, world: &WorldKey) -> Vec<SoundEvent> {
        self.read_state()
            .events
            .values()
            .filter(|event| &event.world == world)
            .cloned()
            .collect()
    }

    /// Drop every event of an unloaded world instance.
    ///
    /// Returns the number of events removed.
    pub fn clear_world(&self, world: &WorldKey) -> usize {
        let mut state = self.write_state();
        let keys: Vec<EventKey> = state
            .events
            .iter()
            .filter(|(_, event)| &event.world == world)
            .map(|(key, _)| *key)
            .collect();
        for key in &keys {
            state.evict(*key);
        }
        keys.len()
    }

    /// Current counters.
    pub fn stats(&self) -> RegistryStats {
        let state = self.read_state();
        let (bucketed, overflow) = state.grid.counts();
        RegistryStats {
            resident: state.events.len(),
            bucketed,
            overflow,
            cached: self.attenuator.cache_len(),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(|poisoned| {
            error!("sound registry lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(|poisoned| {
            error!("sound registry lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

/// Checks shared by both insert paths that need no lock.
fn precheck(settings: &SoundSettings, event: &SoundEvent) -> Option<InsertOutcome> {
    if event.ticks_remaining == 0 || !valid_amount(event.range) || !valid_amount(event.weight) {
        debug!(sound = ?event.id(), pos = %event.pos, "Rejected invalid sound event");
        return Some(InsertOutcome::RejectedInvalid);
    }
    if !settings.allows(event.id()) {
        debug!(sound = ?event.id(), "Rejected sound event not on whitelist");
        return Some(InsertOutcome::RejectedNotWhitelisted);
    }
    None
}

/// Capacity pass and indexing.
fn admit(state: &mut RegistryState, capacity: usize, event: SoundEvent, replaced: bool) -> InsertOutcome {
    let Some(evicted) = state.make_room(capacity, &event) else {
        debug!(
            sound = ?event.id(),
            metric = event.eviction_metric(),
            "Rejected sound event at capacity"
        );
        return InsertOutcome::RejectedCapacity;
    };
    state.store(event);
    if evicted {
        InsertOutcome::InsertedWithEviction
    } else if replaced {
        InsertOutcome::Replaced
    } else {
        InsertOutcome::Inserted
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;

    use earshot_types::{AgentId, SoundId, SoundOrigin};

    use super::*;
    use crate::geometry::OpenAir;
    use crate::settings::SoundDefaults;
    use crate::surface::SurfaceInfo;
    use crate::voxel::VoxelGeometry;

    fn overworld() -> WorldKey {
        WorldKey::new("overworld")
    }

    fn id(raw: &str) -> SoundId {
        SoundId::parse(raw).unwrap()
    }

    fn registry(capacity: usize) -> SoundRegistry {
        let settings = SoundSettings {
            capacity,
            ..SoundSettings::default()
        };
        SoundRegistry::new(settings, Arc::new(OpenAir))
    }

    fn event(name: &str, pos: BlockPos, ttl: u32, range: f64, weight: f64) -> SoundEvent {
        SoundEvent::new(id(name), pos, overworld(), ttl, range, weight)
    }

    #[test]
    fn dedup_keeps_the_heavier_event() {
        let registry = registry(8);
        let pos = BlockPos::new(1, 64, 1);
        assert_eq!(registry.insert(event("block.glass.break", pos, 20, 16.0, 2.0)), InsertOutcome::Inserted);
        assert_eq!(
            registry.insert(event("block.glass.break", pos, 20, 16.0, 2.0)),
            InsertOutcome::RejectedDuplicate
        );
        assert_eq!(registry.insert(event("block.glass.break", pos, 20, 16.0, 3.0)), InsertOutcome::Replaced);
        // a different identifier on the same spot is not a duplicate
        assert_eq!(registry.insert(event("block.stone.break", pos, 20, 16.0, 1.0)), InsertOutcome::Inserted);

        let resident = registry.events_in(&overworld());
        assert_eq!(resident.len(), 2);
        assert!(resident.iter().any(|e| (e.weight - 3.0).abs() < 1e-12));
    }

    #[test]
    fn eviction_removes_only_the_minimum() {
        let registry = registry(2);
        registry.insert(event("a.low", BlockPos::new(0, 64, 0), 20, 16.0, 1.0));
        registry.insert(event("a.high", BlockPos::new(1, 64, 0), 20, 16.0, 5.0));

        assert_eq!(
            registry.insert(event("a.tiny", BlockPos::new(2, 64, 0), 20, 16.0, 0.5)),
            InsertOutcome::RejectedCapacity
        );
        assert_eq!(
            registry.insert(event("a.mid", BlockPos::new(3, 64, 0), 20, 16.0, 2.0)),
            InsertOutcome::InsertedWithEviction
        );
        let names: BTreeSet<String> = registry
            .events_in(&overworld())
            .iter()
            .filter_map(|e| e.id().map(|id| id.path().to_owned()))
            .collect();
        assert_eq!(names, BTreeSet::from(["a.high".to_owned(), "a.mid".to_owned()]));
    }

    #[test]
    fn whitelist_and_invalid_events_are_rejected() {
        let settings = SoundSettings {
            whitelist: Some(BTreeSet::from([id("block.glass.break")])),
            ..SoundSettings::default()
        };
        let registry = SoundRegistry::new(settings, Arc::new(OpenAir));
        let pos = BlockPos::new(0, 64, 0);
        assert_eq!(
            registry.insert(event("block.stone.break", pos, 20, 16.0, 1.0)),
            InsertOutcome::RejectedNotWhitelisted
        );
        assert_eq!(
            registry.insert(event("block.glass.break", pos, 0, 16.0, 1.0)),
            InsertOutcome::RejectedInvalid
        );
        assert_eq!(
            registry.insert(event("block.glass.break", pos, 20, f64::NAN, 1.0)),
            InsertOutcome::RejectedInvalid
        );
        let voice = SoundEvent::new_virtual(pos, overworld(), 20, 12.0, 1.2, None, None);
        assert_eq!(registry.insert(voice), InsertOutcome::Inserted);
    }

    #[test]
    fn virtual_insert_dedups_by_position_and_weight() {
        let registry = registry(8);
        let pos = BlockPos::new(4, 64, 4);
        registry.insert(event("block.stone.step", pos, 20, 16.0, 0.5));
        registry.insert(event("block.glass.break", pos, 20, 16.0, 0.8));

        let speaker = AgentId::new();
        let voice = SoundEvent::new_virtual(pos, overworld(), 20, 12.0, 1.2, Some(speaker), Some("talk".to_owned()));
        assert_eq!(registry.insert_virtual(voice.clone()), InsertOutcome::Replaced);
        let resident = registry.events_in(&overworld());
        assert_eq!(resident.len(), 1);
        assert_eq!(resident[0].source_agent(), Some(speaker));

        assert_eq!(registry.insert_virtual(voice), InsertOutcome::RejectedDuplicate);
    }

    #[test]
    fn decay_expires_events() {
        let registry = registry(8);
        registry.insert(event("a.short", BlockPos::new(0, 64, 0), 1, 16.0, 1.0));
        registry.insert(event("a.long", BlockPos::new(1, 64, 0), 3, 16.0, 1.0));
        assert_eq!(registry.decay(), 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.events_in(&overworld())[0].ticks_remaining, 2);
        assert_eq!(registry.decay(), 0);
        assert_eq!(registry.decay(), 1);
        assert!(registry.is_empty());
        assert_eq!(registry.stats(), RegistryStats::default());
    }

    #[test]
    fn nearer_event_wins_a_near_tie() {
        let registry = registry(8);
        let listener = BlockPos::new(0, 64, 0);
        registry.insert(event("a.near", BlockPos::new(5, 64, 0), 100, 16.0, 2.0));
        registry.insert(event("a.far", BlockPos::new(50, 64, 0), 100, 80.0, 2.0005));

        let heard = registry.find_nearest(None, &overworld(), listener).unwrap();
        assert_eq!(heard.pos, BlockPos::new(5, 64, 0));
    }

    #[test]
    fn clear_score_lead_beats_distance() {
        let registry = registry(8);
        let listener = BlockPos::new(0, 64, 0);
        registry.insert(event("a.near", BlockPos::new(2, 64, 0), 100, 16.0, 1.0));
        registry.insert(event("a.far", BlockPos::new(12, 64, 0), 100, 16.0, 1.5));
        let heard = registry.find_nearest(None, &overworld(), listener).unwrap();
        assert_eq!(heard.pos, BlockPos::new(12, 64, 0));
    }

    #[test]
    fn novelty_bonus_favours_fresh_events() {
        let registry = registry(8);
        let settings = registry.settings();
        let listener = BlockPos::new(0, 64, 0);
        let fresh_pos = BlockPos::new(3, 64, 0);
        registry.insert(event("a.fresh", fresh_pos, settings.lifetime_ticks, 16.0, 1.0));
        registry.insert(event(
            "a.stale",
            BlockPos::new(4, 64, 0),
            100,
            16.0,
            1.0 + settings.novelty_bonus - 0.01,
        ));

        // only the fresh event is novel, until it has aged novelty_window ticks
        let window = settings.novelty_window_ticks;
        for _ in 0..window {
            let heard = registry.find_nearest(None, &overworld(), listener).unwrap();
            assert_eq!(heard.pos, fresh_pos);
            registry.decay();
        }
        let heard = registry.find_nearest(None, &overworld(), listener).unwrap();
        assert_eq!(heard.pos, BlockPos::new(4, 64, 0));
    }

    #[test]
    fn out_of_range_and_other_world_events_are_inaudible() {
        let registry = registry(8);
        registry.insert(event("a.quiet", BlockPos::new(10, 64, 0), 20, 4.0, 5.0));
        registry.insert(SoundEvent::new(
            id("a.elsewhere"),
            BlockPos::new(1, 64, 0),
            WorldKey::new("nether"),
            20,
            16.0,
            5.0,
        ));
        assert!(registry.find_nearest(None, &overworld(), BlockPos::new(0, 64, 0)).is_none());
    }

    #[test]
    fn profile_override_replaces_base_values() {
        let registry = registry(8);
        registry.insert(event("block.glass.break", BlockPos::new(20, 64, 0), 20, 8.0, 1.0));
        let listener = BlockPos::new(0, 64, 0);
        assert!(registry.find_nearest(None, &overworld(), listener).is_none());

        let mut profile = SoundProfile::default();
        profile.sounds.insert(
            id("block.glass.break"),
            SoundDefaults {
                range: 32.0,
                weight: 4.0,
            },
        );
        let heard = registry.find_nearest(Some(&profile), &overworld(), listener).unwrap();
        assert!((heard.weight - 4.0).abs() < 1e-12);
        assert!(matches!(heard.origin, SoundOrigin::Registered(_)));
    }

    #[test]
    fn walls_shrink_audible_range() {
        let geometry = Arc::new(VoxelGeometry::new());
        let world = overworld();
        geometry.add_world(&world);
        let registry = SoundRegistry::new(SoundSettings::default(), Arc::clone(&geometry) as Arc<dyn Geometry>);
        registry.insert(event("block.stone.break", BlockPos::new(10, 64, 0), 20, 16.0, 1.0));
        let listener = BlockPos::new(0, 64, 0);
        assert!(registry.find_nearest(None, &world, listener).is_some());

        geometry.set_block(&world, BlockPos::new(5, 64, 0), SurfaceInfo::block("minecraft:stone"));
        // range halves to 8, listener is 10 away
        assert!(registry.find_nearest(None, &world, listener).is_none());
    }

    #[test]
    fn reload_trims_to_new_capacity_and_clears_cache() {
        let registry = registry(4);
        for x in 0..4 {
            registry.insert(event("a.step", BlockPos::new(x, 64, 0), 20, 16.0, f64::from(x)));
        }
        registry.find_nearest(None, &overworld(), BlockPos::new(0, 64, 0));
        assert!(registry.stats().cached > 0);

        registry.reload(SoundSettings {
            capacity: 2,
            ..SoundSettings::default()
        });
        let stats = registry.stats();
        assert_eq!(stats.resident, 2);
        assert_eq!(stats.cached, 0);
        assert!(registry.events_in(&overworld()).iter().all(|e| e.weight >= 2.0));
    }

    #[test]
    fn clear_world_drops_only_that_world() {
        let registry = registry(8);
        registry.insert(event("a.one", BlockPos::new(0, 64, 0), 20, 16.0, 1.0));
        registry.insert(SoundEvent::new(
            id("a.two"),
            BlockPos::new(0, 64, 0),
            WorldKey::new("nether"),
            20,
            100.0,
            1.0,
        ));
        assert_eq!(registry.clear_world(&WorldKey::new("nether")), 1);
        let stats = registry.stats();
        assert_eq!((stats.resident, stats.bucketed, stats.overflow), (1, 1, 0));
    }
}
