//! Configuration loading and typed config structures for Earshot.
//!
//! The canonical configuration lives in `earshot-config.yaml` at the
//! project root. Each subsystem owns the struct for its own section
//! (`sounds`, `groups`, `raids`); this module ties them together with the
//! world and logging sections and provides the loader.

use std::path::Path;

use earshot_groups::GroupConfig;
use earshot_raid::RaidConfig;
use earshot_sound::{SettingsError, SoundConfig, SoundSettings};
use earshot_types::WorldKey;
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The `sounds` section does not compile.
    #[error("invalid sounds section: {source}")]
    Sound {
        /// The underlying settings error.
        #[from]
        source: SettingsError,
    },

    /// A world or logging value is out of range.
    #[error("invalid config value `{field}`: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
///
/// Mirrors the structure of `earshot-config.yaml`. Every section is
/// optional and falls back to its defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// World-level settings (name, seed, timing, world instances).
    #[serde(default)]
    pub world: WorldConfig,

    /// Sound registry settings.
    #[serde(default)]
    pub sounds: SoundConfig,

    /// Group coordination settings.
    #[serde(default)]
    pub groups: GroupConfig,

    /// Raid escalation settings.
    #[serde(default)]
    pub raids: RaidConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `EARSHOT_LOG` overrides `logging.level`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.logging.apply_env_overrides();
        Ok(config)
    }

    /// Check cross-field constraints the deserializer cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero tick interval or an
    /// empty world list, and [`ConfigError::Sound`] if the `sounds`
    /// section does not compile.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.world.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "world.tick_interval_ms",
                reason: "must be greater than zero".to_owned(),
            });
        }
        if self.world.worlds.is_empty() {
            return Err(ConfigError::Invalid {
                field: "world.worlds",
                reason: "at least one world instance is required".to_owned(),
            });
        }
        if self.groups.group_radius.is_nan() || self.groups.group_radius < 0.0 {
            return Err(ConfigError::Invalid {
                field: "groups.group_radius",
                reason: format!("expected a non-negative radius, got {}", self.groups.group_radius),
            });
        }
        self.sound_settings()?;
        Ok(())
    }

    /// Compile the `sounds` section into registry settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Sound`] if the section is structurally
    /// invalid.
    pub fn sound_settings(&self) -> Result<SoundSettings, ConfigError> {
        Ok(SoundSettings::compile(&self.sounds)?)
    }

    /// World instances the driver steps, in configured order.
    pub fn world_keys(&self) -> Vec<WorldKey> {
        self.world.worlds.iter().map(WorldKey::new).collect()
    }
}

/// World-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorldConfig {
    /// Human-readable simulation name.
    #[serde(default = "default_world_name")]
    pub name: String,

    /// Random seed for the sandbox population.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Real-time milliseconds per tick.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Stop after this many ticks. 0 runs until interrupted.
    #[serde(default)]
    pub max_ticks: u64,

    /// World instance names stepped each tick.
    #[serde(default = "default_worlds")]
    pub worlds: Vec<String>,

    /// Sandbox agents spawned per world instance.
    #[serde(default = "default_agents_per_world")]
    pub agents_per_world: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: default_world_name(),
            seed: default_seed(),
            tick_interval_ms: default_tick_interval_ms(),
            max_ticks: 0,
            worlds: default_worlds(),
            agents_per_world: default_agents_per_world(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit a summary line every N ticks.
    #[serde(default = "default_summary_interval_ticks")]
    pub summary_interval_ticks: u64,

    /// Emit JSON log lines instead of the human-readable format.
    #[serde(default)]
    pub json: bool,
}

impl LoggingConfig {
    /// Apply environment variable overrides.
    ///
    /// - `EARSHOT_LOG` overrides `level`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("EARSHOT_LOG") {
            self.level = val;
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            summary_interval_ticks: default_summary_interval_ticks(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_world_name() -> String {
    "Earshot Sandbox".to_owned()
}

const fn default_seed() -> u64 {
    42
}

const fn default_tick_interval_ms() -> u64 {
    50
}

fn default_worlds() -> Vec<String> {
    vec!["overworld".to_owned()]
}

const fn default_agents_per_world() -> u32 {
    24
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_summary_interval_ticks() -> u64 {
    100
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SimulationConfig::default();
        assert_eq!(config.world.seed, 42);
        assert_eq!(config.world.tick_interval_ms, 50);
        assert_eq!(config.world_keys(), vec![WorldKey::new("overworld")]);
        assert_eq!(config.groups.scan_cooldown, 40);
        assert_eq!(config.raids.countdown_ticks, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r"
world:
  name: Test Arena
  seed: 7
  tick_interval_ms: 20
  max_ticks: 500
  worlds:
    - overworld
    - nether
  agents_per_world: 12

sounds:
  capacity: 64
  lifetime_ticks: 120
  whitelist:
    - block.glass.break

groups:
  scan_cooldown: 20
  group_radius: 10.0
  max_leaders: 3

raids:
  countdown_ticks: 30
  sweep_interval: 50

logging:
  summary_interval_ticks: 25
";
        let config = SimulationConfig::parse(yaml).unwrap();
        assert_eq!(config.world.name, "Test Arena");
        assert_eq!(config.world.max_ticks, 500);
        assert_eq!(config.world_keys().len(), 2);
        assert_eq!(config.world.agents_per_world, 12);
        assert_eq!(config.sounds.capacity, 64);
        assert_eq!(config.groups.regroup_interval(), 10);
        assert_eq!(config.groups.max_group_size, 8);
        assert_eq!(config.raids.sweep_interval, 50);
        assert_eq!(config.logging.summary_interval_ticks, 25);

        let settings = config.sound_settings().unwrap();
        assert_eq!(settings.capacity, 64);
        assert_eq!(settings.lifetime_ticks, 120);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_yaml_uses_defaults() {
        let config: SimulationConfig = serde_yml::from_str("{}").unwrap();
        assert_eq!(config.world, WorldConfig::default());
        assert_eq!(config.groups, GroupConfig::default());
    }

    #[test]
    fn zero_tick_interval_is_rejected() {
        let config = SimulationConfig::parse("world:\n  tick_interval_ms: 0\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "world.tick_interval_ms", .. }));
    }

    #[test]
    fn empty_world_list_is_rejected() {
        let config = SimulationConfig::parse("world:\n  worlds: []\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field: "world.worlds", .. })));
    }

    #[test]
    fn broken_sounds_section_is_rejected() {
        let config = SimulationConfig::parse("sounds:\n  capacity: 0\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Sound { .. })));
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        assert!(matches!(SimulationConfig::parse("world: [unclosed"), Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = SimulationConfig::from_file(Path::new("/nonexistent/earshot-config.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
