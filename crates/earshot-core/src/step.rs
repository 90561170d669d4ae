//! Step driver: the per-tick pass that keeps every subsystem current.
//!
//! Each step runs these phases in order:
//!
//! 1. **Clock** -- advance the world clock by one tick.
//! 2. **Decay** -- age every resident sound event and drop the expired.
//! 3. **Regroup** -- for each world instance, re-run leader election when
//!    the re-grouping interval has elapsed. Relay inboxes are pruned in the
//!    same pass.
//! 4. **Raids** -- for each world instance, count down ticking raids and
//!    sweep raids of dead leaders.
//!
//! Perception, relays and raid scheduling are agent-driven and happen
//! between steps through the shared handles.

use std::sync::Arc;

use earshot_groups::{CandidateProvider, GroupCoordinator, GroupSnapshot};
use earshot_raid::{RaidBoard, RaidTick};
use earshot_sound::{Geometry, RegistryStats, SoundRegistry};
use earshot_types::{AgentOracle, WorldKey};
use serde::Serialize;
use tracing::{debug, info};

use crate::clock::{ClockError, WorldClock};
use crate::config::{ConfigError, SimulationConfig};

/// Errors that can occur during a step.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// A clock operation failed.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },
}

/// What one step did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepSummary {
    /// Tick the step ran at.
    pub tick: u64,
    /// Sound events that expired during decay.
    pub expired: usize,
    /// One snapshot per world instance that was re-grouped.
    pub regrouped: Vec<GroupSnapshot>,
    /// Raid countdown totals across all world instances.
    pub raids: RaidTick,
    /// Registry counters after the step.
    pub registry: RegistryStats,
    /// Relays still waiting in leader inboxes after the step.
    pub pending_relays: usize,
}

/// Owns the world clock and the shared subsystem handles.
#[derive(Debug)]
pub struct Simulation {
    clock: WorldClock,
    worlds: Vec<WorldKey>,
    sounds: Arc<SoundRegistry>,
    groups: Arc<GroupCoordinator>,
    raids: Arc<RaidBoard>,
}

impl Simulation {
    /// Build every subsystem from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration does not validate.
    pub fn new(
        config: &SimulationConfig,
        geometry: Arc<dyn Geometry>,
        oracle: Arc<dyn AgentOracle>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let settings = config.sound_settings()?;
        let worlds = config.world_keys();
        info!(
            name = %config.world.name,
            worlds = worlds.len(),
            capacity = settings.capacity,
            regroup_interval = config.groups.regroup_interval(),
            countdown = config.raids.effective_countdown(),
            "Simulation initialized"
        );
        Ok(Self {
            clock: WorldClock::new(),
            worlds,
            sounds: Arc::new(SoundRegistry::new(settings, geometry)),
            groups: Arc::new(GroupCoordinator::new(config.groups.clone(), Arc::clone(&oracle))),
            raids: Arc::new(RaidBoard::new(config.raids.clone(), oracle)),
        })
    }

    /// Resume the clock at `tick` instead of 0.
    #[must_use]
    pub const fn starting_at(mut self, tick: u64) -> Self {
        self.clock = WorldClock::from_tick(tick);
        self
    }

    /// Current tick.
    pub const fn tick(&self) -> u64 {
        self.clock.tick()
    }

    /// Whether the current tick lands on a multiple of `interval`.
    pub const fn is_every(&self, interval: u64) -> bool {
        self.clock.is_every(interval)
    }

    /// World instances stepped each tick.
    pub fn worlds(&self) -> &[WorldKey] {
        &self.worlds
    }

    /// Shared sound registry.
    pub const fn sounds(&self) -> &Arc<SoundRegistry> {
        &self.sounds
    }

    /// Shared group coordinator.
    pub const fn groups(&self) -> &Arc<GroupCoordinator> {
        &self.groups
    }

    /// Shared raid board.
    pub const fn raids(&self) -> &Arc<RaidBoard> {
        &self.raids
    }

    /// Swap in the `sounds` section of a reloaded configuration.
    ///
    /// Group and raid tunables are fixed for the life of the simulation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Sound`] and leaves the registry untouched if
    /// the new section does not compile.
    pub fn reload_sounds(&self, config: &SimulationConfig) -> Result<(), ConfigError> {
        let settings = config.sound_settings()?;
        self.sounds.reload(settings);
        info!(tick = self.tick(), "Sound settings reloaded");
        Ok(())
    }

    /// Run one step.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::Clock`] if the tick counter would overflow.
    pub fn step(&mut self, provider: &dyn CandidateProvider) -> Result<StepSummary, StepError> {
        let tick = self.clock.advance()?;
        debug!(tick, "Step started");

        let expired = self.sounds.decay();

        let mut regrouped = Vec::new();
        let mut raids = RaidTick::default();
        for world in &self.worlds {
            if let Some(snapshot) = self.groups.regroup(world, tick, provider) {
                regrouped.push(snapshot);
            }
            let pass = self.raids.tick(world, tick);
            raids.ticking = raids.ticking.saturating_add(pass.ticking);
            raids.advanced = raids.advanced.saturating_add(pass.advanced);
            raids.swept = raids.swept.saturating_add(pass.swept);
        }

        let summary = StepSummary {
            tick,
            expired,
            regrouped,
            raids,
            registry: self.sounds.stats(),
            pending_relays: self.groups.pending_relays(),
        };
        debug!(
            tick,
            expired,
            regrouped = summary.regrouped.len(),
            raids_advanced = raids.advanced,
            resident = summary.registry.resident,
            "Step completed"
        );
        Ok(summary)
    }
}
