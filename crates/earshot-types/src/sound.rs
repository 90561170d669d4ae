//! The sound event record cached by the registry.
//!
//! Stored range and weight are always the unattenuated values. Listener
//! specific attenuation is computed at query time and returned in a
//! [`HeardSound`], never written back.

use serde::{Deserialize, Serialize};

use crate::ids::{AgentId, SoundId, WorldKey};
use crate::position::BlockPos;

/// Where a sound event came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoundOrigin {
    /// A game sound registered under an identifier.
    Registered(SoundId),
    /// A synthesized event (voice activity, animation noise) with no
    /// identifier entry.
    Virtual {
        /// Agent that produced the noise, if known.
        source: Option<AgentId>,
        /// Animation tag that triggered the noise, if any.
        animation: Option<String>,
    },
}

/// A timed, positioned, weighted record an agent may find interesting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundEvent {
    /// Identifier or virtual source.
    pub origin: SoundOrigin,
    /// Block the sound was emitted at.
    pub pos: BlockPos,
    /// World instance the sound lives in.
    pub world: WorldKey,
    /// Ticks left before the record expires. Live records are positive.
    pub ticks_remaining: u32,
    /// Base hearing range in blocks.
    pub range: f64,
    /// Base salience weight.
    pub weight: f64,
}

impl SoundEvent {
    /// Build a registered (identifier-keyed) sound event.
    pub const fn new(
        id: SoundId,
        pos: BlockPos,
        world: WorldKey,
        ticks_remaining: u32,
        range: f64,
        weight: f64,
    ) -> Self {
        Self {
            origin: SoundOrigin::Registered(id),
            pos,
            world,
            ticks_remaining,
            range,
            weight,
        }
    }

    /// Build a virtual sound event.
    pub const fn new_virtual(
        pos: BlockPos,
        world: WorldKey,
        ticks_remaining: u32,
        range: f64,
        weight: f64,
        source: Option<AgentId>,
        animation: Option<String>,
    ) -> Self {
        Self {
            origin: SoundOrigin::Virtual { source, animation },
            pos,
            world,
            ticks_remaining,
            range,
            weight,
        }
    }

    /// The sound identifier, `None` for virtual events.
    pub const fn id(&self) -> Option<&SoundId> {
        match &self.origin {
            SoundOrigin::Registered(id) => Some(id),
            SoundOrigin::Virtual { .. } => None,
        }
    }

    /// Whether this is a synthesized event.
    pub const fn is_virtual(&self) -> bool {
        matches!(self.origin, SoundOrigin::Virtual { .. })
    }

    /// Agent that produced a virtual event.
    pub const fn source_agent(&self) -> Option<AgentId> {
        match &self.origin {
            SoundOrigin::Virtual { source, .. } => *source,
            SoundOrigin::Registered(_) => None,
        }
    }

    /// Disposability used for capacity eviction: `weight + range / 1000`.
    ///
    /// The lowest metric is evicted first.
    pub fn eviction_metric(&self) -> f64 {
        self.weight + self.range / 1000.0
    }
}

/// Listener-specific view of a sound event returned by nearest-event
/// queries. Range and weight are the attenuated values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeardSound {
    /// Identifier or virtual source of the underlying event.
    pub origin: SoundOrigin,
    /// Block the sound was emitted at.
    pub pos: BlockPos,
    /// Ticks left on the underlying record.
    pub ticks_remaining: u32,
    /// Range after occlusion and profile overrides.
    pub range: f64,
    /// Weight after occlusion and profile overrides.
    pub weight: f64,
}

impl HeardSound {
    /// The sound identifier, `None` for virtual events.
    pub const fn id(&self) -> Option<&SoundId> {
        match &self.origin {
            SoundOrigin::Registered(id) => Some(id),
            SoundOrigin::Virtual { .. } => None,
        }
    }
}
