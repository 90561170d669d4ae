//! Ingestion boundary: turning "a sound played here" into registry events.
//!
//! Callers pass what they know; missing range and weight come from the
//! per-identifier defaults table, then from the global fallback. Every
//! event gets the configured lifetime.

use earshot_types::{AgentId, BlockPos, SoundEvent, SoundId, WorldKey};
use tracing::debug;

use crate::registry::{InsertOutcome, SoundRegistry};

impl SoundRegistry {
    /// Register a game sound.
    ///
    /// `source` is the agent that caused the sound, when known. It is only
    /// logged; registered events are matched by identifier, not by source.
    pub fn register_sound_event(
        &self,
        id: SoundId,
        pos: BlockPos,
        world: WorldKey,
        source: Option<AgentId>,
        range: Option<f64>,
        weight: Option<f64>,
    ) -> InsertOutcome {
        let settings = self.settings();
        let defaults = settings.defaults_for(&id);
        let event = SoundEvent::new(
            id,
            pos,
            world,
            settings.lifetime_ticks,
            range.unwrap_or(defaults.range),
            weight.unwrap_or(defaults.weight),
        );
        let outcome = self.insert(event);
        debug!(?source, %pos, ?outcome, "Registered sound event");
        outcome
    }

    /// Register a synthesized sound such as voice activity or animation
    /// noise, using the configured virtual defaults.
    pub fn register_virtual(
        &self,
        pos: BlockPos,
        world: WorldKey,
        source: Option<AgentId>,
        animation: Option<String>,
    ) -> InsertOutcome {
        let settings = self.settings();
        let defaults = settings.virtual_defaults;
        let event = SoundEvent::new_virtual(
            pos,
            world,
            settings.lifetime_ticks,
            defaults.range,
            defaults.weight,
            source,
            animation,
        );
        let outcome = self.insert_virtual(event);
        debug!(?source, %pos, ?outcome, "Registered virtual sound");
        outcome
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use super::*;
    use crate::geometry::OpenAir;
    use crate::settings::{SoundConfig, SoundDefaultsConfig, SoundSettings};

    fn overworld() -> WorldKey {
        WorldKey::new("overworld")
    }

    #[test]
    fn defaults_fill_missing_values() {
        let config = SoundConfig {
            defaults: BTreeMap::from([(
                "block.glass.break".to_owned(),
                SoundDefaultsConfig {
                    range: Some(32.0),
                    weight: Some(3.0),
                },
            )]),
            ..SoundConfig::default()
        };
        let registry = SoundRegistry::new(SoundSettings::compile(&config).unwrap(), Arc::new(OpenAir));

        let glass = SoundId::parse("block.glass.break").unwrap();
        let outcome =
            registry.register_sound_event(glass, BlockPos::new(0, 64, 0), overworld(), None, None, Some(5.0));
        assert_eq!(outcome, InsertOutcome::Inserted);

        let stone = SoundId::parse("block.stone.break").unwrap();
        registry.register_sound_event(stone, BlockPos::new(1, 64, 0), overworld(), None, None, None);

        let events = registry.events_in(&overworld());
        assert!((events[0].range - 32.0).abs() < 1e-12);
        assert!((events[0].weight - 5.0).abs() < 1e-12);
        assert!((events[1].range - 16.0).abs() < 1e-12);
        assert!((events[1].weight - 1.0).abs() < 1e-12);
        assert!(events.iter().all(|e| e.ticks_remaining == 200));
    }

    #[test]
    fn virtual_registration_carries_source() {
        let registry = SoundRegistry::new(SoundSettings::default(), Arc::new(OpenAir));
        let speaker = AgentId::new();
        let outcome = registry.register_virtual(BlockPos::new(2, 64, 2), overworld(), Some(speaker), None);
        assert!(outcome.is_accepted());

        let events = registry.events_in(&overworld());
        assert_eq!(events[0].source_agent(), Some(speaker));
        assert!(events[0].id().is_none());
        assert!((events[0].range - 12.0).abs() < 1e-12);
    }
}
