//! Occlusion attenuation.
//!
//! A ray is cast from the centre of the source block to the centre of the
//! listener block. Each surface it passes through scales range and weight
//! by its category multiplier, then the ray is re-cast from just past the
//! hit. Results are memoized per (world, geometry revision, listener,
//! source, identifier, base values); a geometry change bumps the revision
//! and so misses the stale entries.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use earshot_types::{BlockPos, SoundId, WorldKey};
use tracing::debug;

use crate::geometry::Geometry;
use crate::settings::SoundSettings;
use crate::surface::SurfaceCategory;

/// Range below which the walk stops.
pub const MIN_RANGE: f64 = 0.1;

/// Weight below which the walk stops.
pub const MIN_WEIGHT: f64 = 0.01;

/// Distance the ray is advanced past each hit before re-clipping.
pub const STEP_PAST_HIT: f64 = 0.1;

/// A sound as emitted, before any listener-specific attenuation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Emission<'a> {
    /// World instance the sound lives in.
    pub world: &'a WorldKey,
    /// Block the sound was emitted at.
    pub source: BlockPos,
    /// Identifier, `None` for virtual events.
    pub id: Option<&'a SoundId>,
    /// Base range before occlusion.
    pub range: f64,
    /// Base weight before occlusion.
    pub weight: f64,
}

/// Range and weight after occlusion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attenuated {
    /// Attenuated range, never negative.
    pub range: f64,
    /// Attenuated weight, never negative.
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    world: WorldKey,
    revision: u64,
    listener: BlockPos,
    source: BlockPos,
    id: Option<SoundId>,
    range_bits: u64,
    weight_bits: u64,
}

/// Ray walker with a concurrent memo.
pub struct Attenuator {
    geometry: Arc<dyn Geometry>,
    cache: DashMap<CacheKey, Attenuated>,
}

impl fmt::Debug for Attenuator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attenuator")
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl Attenuator {
    /// Create an attenuator over a geometry collaborator.
    pub fn new(geometry: Arc<dyn Geometry>) -> Self {
        Self {
            geometry,
            cache: DashMap::new(),
        }
    }

    /// Attenuated range and weight of `emission` as heard at `listener`.
    ///
    /// Identical arguments against unchanged geometry and settings always
    /// return identical results.
    pub fn attenuate(&self, settings: &SoundSettings, emission: &Emission<'_>, listener: BlockPos) -> Attenuated {
        if settings.cache_limit == 0 {
            return self.walk(settings, emission, listener);
        }

        let key = CacheKey {
            world: emission.world.clone(),
            revision: self.geometry.revision(emission.world),
            listener,
            source: emission.source,
            id: emission.id.cloned(),
            range_bits: emission.range.to_bits(),
            weight_bits: emission.weight.to_bits(),
        };
        if let Some(cached) = self.cache.get(&key).map(|entry| *entry.value()) {
            return cached;
        }

        let result = self.walk(settings, emission, listener);
        if self.cache.len() >= settings.cache_limit {
            debug!(entries = self.cache.len(), "Attenuation cache full, flushing");
            self.cache.clear();
        }
        self.cache.insert(key, result);
        result
    }

    /// Number of memoized results.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Drop every memoized result.
    pub fn clear(&self) {
        self.cache.clear();
    }

    fn walk(&self, settings: &SoundSettings, emission: &Emission<'_>, listener: BlockPos) -> Attenuated {
        let target = listener.center();
        let mut cursor = emission.source.center();
        let mut range = emission.range;
        let mut weight = emission.weight;
        let mut last_block = None;

        for _ in 0..settings.max_iterations {
            if range < MIN_RANGE || weight < MIN_WEIGHT {
                break;
            }
            let hit = match self.geometry.clip(emission.world, cursor, target) {
                Ok(Some(hit)) => hit,
                Ok(None) => break,
                Err(err) => {
                    debug!(world = %emission.world, error = %err, "Geometry lookup failed, treating as solid");
                    let factor = settings.surfaces.multiplier(SurfaceCategory::Solid);
                    range *= factor;
                    weight *= factor;
                    break;
                }
            };
            if last_block == Some(hit.block) {
                break;
            }
            last_block = Some(hit.block);

            let factor = settings.surfaces.multiplier(settings.surfaces.classify(&hit.surface));
            range *= factor;
            weight *= factor;

            let Some(dir) = (target - hit.point).normalized() else {
                break;
            };
            cursor = hit.point.offset(dir, STEP_PAST_HIT);
        }

        Attenuated {
            range: range.max(0.0),
            weight: weight.max(0.0),
        }
    }
}
