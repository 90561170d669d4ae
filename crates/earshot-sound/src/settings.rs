//! Sound settings: raw configuration and the compiled snapshot.
//!
//! [`SoundConfig`] mirrors the `sounds` section of `earshot-config.yaml`.
//! [`SoundSettings::compile`] turns it into validated lookup tables.
//! Structurally broken settings (zero capacity, non-finite globals) are
//! errors; individual bad entries are skipped with a warning so one typo
//! in a table never takes the whole table down.
//!
//! The registry holds the compiled settings behind an `Arc` in a
//! [`SettingsCell`] and swaps the whole snapshot on reload. Every
//! operation reads the snapshot once, so concurrent readers never see a
//! half-applied table.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock};

use earshot_types::SoundId;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::profile::{ProfileBook, ProfileConfig};
use crate::surface::{SurfaceConfig, SurfaceRules};

/// Errors that make a settings table unusable as a whole.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    /// A global value is out of its valid range.
    #[error("invalid sound setting `{field}`: {reason}")]
    InvalidValue {
        /// Name of the offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// Raw `sounds` configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundConfig {
    /// Maximum number of resident sound events.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Lifetime given to newly registered events, in ticks.
    #[serde(default = "default_lifetime_ticks")]
    pub lifetime_ticks: u32,

    /// Events younger than this many ticks earn the novelty bonus.
    #[serde(default = "default_novelty_window_ticks")]
    pub novelty_window_ticks: u32,

    /// Score bonus for novel events.
    #[serde(default = "default_novelty_bonus")]
    pub novelty_bonus: f64,

    /// Allowed sound identifiers. Empty means every identifier is allowed.
    #[serde(default)]
    pub whitelist: Vec<String>,

    /// Range used when neither the caller nor the table supplies one.
    #[serde(default = "default_range")]
    pub default_range: f64,

    /// Weight used when neither the caller nor the table supplies one.
    #[serde(default = "default_weight")]
    pub default_weight: f64,

    /// Per-identifier range and weight defaults.
    #[serde(default)]
    pub defaults: BTreeMap<String, SoundDefaultsConfig>,

    /// Range and weight for virtual (voice, animation) events.
    #[serde(default = "default_virtual")]
    pub virtual_defaults: SoundDefaultsConfig,

    /// Occlusion ray-walk limits.
    #[serde(default)]
    pub attenuation: AttenuationConfig,

    /// Surface categories and multipliers.
    #[serde(default)]
    pub surfaces: SurfaceConfig,

    /// Listener profiles, matched first-match-wins.
    #[serde(default)]
    pub profiles: Vec<ProfileConfig>,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            lifetime_ticks: default_lifetime_ticks(),
            novelty_window_ticks: default_novelty_window_ticks(),
            novelty_bonus: default_novelty_bonus(),
            whitelist: Vec::new(),
            default_range: default_range(),
            default_weight: default_weight(),
            defaults: BTreeMap::new(),
            virtual_defaults: default_virtual(),
            attenuation: AttenuationConfig::default(),
            surfaces: SurfaceConfig::default(),
            profiles: Vec::new(),
        }
    }
}

/// A range/weight pair where either half may be left to the fallback.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SoundDefaultsConfig {
    /// Hearing range in blocks.
    #[serde(default)]
    pub range: Option<f64>,
    /// Salience weight.
    #[serde(default)]
    pub weight: Option<f64>,
}

/// Occlusion ray-walk limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttenuationConfig {
    /// Maximum surfaces a single ray is walked through.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Attenuation memo size at which it is flushed.
    #[serde(default = "default_cache_limit")]
    pub cache_limit: usize,
}

impl Default for AttenuationConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            cache_limit: default_cache_limit(),
        }
    }
}

/// A resolved range/weight pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundDefaults {
    /// Hearing range in blocks.
    pub range: f64,
    /// Salience weight.
    pub weight: f64,
}

/// Compiled, immutable sound settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SoundSettings {
    /// Maximum number of resident events.
    pub capacity: usize,
    /// Lifetime of newly registered events.
    pub lifetime_ticks: u32,
    /// Novelty window in ticks.
    pub novelty_window_ticks: u32,
    /// Novelty score bonus.
    pub novelty_bonus: f64,
    /// Allowed identifiers; `None` when no whitelist is configured.
    pub whitelist: Option<BTreeSet<SoundId>>,
    /// Fallback range and weight.
    pub fallback: SoundDefaults,
    /// Per-identifier defaults, already merged with the fallback.
    pub defaults: BTreeMap<SoundId, SoundDefaults>,
    /// Defaults for virtual events.
    pub virtual_defaults: SoundDefaults,
    /// Maximum surfaces walked per ray.
    pub max_iterations: u32,
    /// Attenuation memo flush threshold.
    pub cache_limit: usize,
    /// Surface classification rules.
    pub surfaces: SurfaceRules,
    /// Listener profiles.
    pub profiles: ProfileBook,
}

impl SoundSettings {
    /// Compile raw configuration into settings.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::InvalidValue`] when capacity or lifetime
    /// is zero, or a global range, weight, or bonus is negative or not
    /// finite.
    pub fn compile(config: &SoundConfig) -> Result<Self, SettingsError> {
        if config.capacity == 0 {
            return Err(SettingsError::InvalidValue {
                field: "capacity",
                reason: "must be at least 1".to_owned(),
            });
        }
        if config.lifetime_ticks == 0 {
            return Err(SettingsError::InvalidValue {
                field: "lifetime_ticks",
                reason: "must be at least 1".to_owned(),
            });
        }
        let novelty_bonus = non_negative("novelty_bonus", config.novelty_bonus)?;
        let fallback = SoundDefaults {
            range: non_negative("default_range", config.default_range)?,
            weight: non_negative("default_weight", config.default_weight)?,
        };

        let whitelist = if config.whitelist.is_empty() {
            None
        } else {
            let mut allowed = BTreeSet::new();
            for raw in &config.whitelist {
                match SoundId::parse(raw) {
                    Ok(id) => {
                        allowed.insert(id);
                    }
                    Err(err) => warn!(entry = raw, error = %err, "Skipping malformed whitelist entry"),
                }
            }
            Some(allowed)
        };

        let mut defaults = BTreeMap::new();
        for (raw, entry) in &config.defaults {
            let id = match SoundId::parse(raw) {
                Ok(id) => id,
                Err(err) => {
                    warn!(entry = raw, error = %err, "Skipping malformed sound default");
                    continue;
                }
            };
            match resolve_pair(*entry, fallback) {
                Some(pair) => {
                    defaults.insert(id, pair);
                }
                None => warn!(sound = %id, "Skipping sound default with out-of-range values"),
            }
        }

        let virtual_defaults = resolve_pair(config.virtual_defaults, fallback).unwrap_or_else(|| {
            warn!("Virtual sound defaults out of range, using fallback");
            fallback
        });

        Ok(Self {
            capacity: config.capacity,
            lifetime_ticks: config.lifetime_ticks,
            novelty_window_ticks: config.novelty_window_ticks,
            novelty_bonus,
            whitelist,
            fallback,
            defaults,
            virtual_defaults,
            max_iterations: config.attenuation.max_iterations,
            cache_limit: config.attenuation.cache_limit,
            surfaces: SurfaceRules::compile(&config.surfaces),
            profiles: ProfileBook::compile(&config.profiles),
        })
    }

    /// Whether an identifier passes the whitelist.
    ///
    /// Virtual events (no identifier) always pass.
    pub fn allows(&self, id: Option<&SoundId>) -> bool {
        match (&self.whitelist, id) {
            (Some(allowed), Some(id)) => allowed.contains(id),
            _ => true,
        }
    }

    /// Default range and weight for an identifier.
    pub fn defaults_for(&self, id: &SoundId) -> SoundDefaults {
        self.defaults.get(id).copied().unwrap_or(self.fallback)
    }

    /// Whether an event with `ticks_remaining` still earns the novelty bonus.
    pub const fn is_novel(&self, ticks_remaining: u32) -> bool {
        ticks_remaining > self.lifetime_ticks.saturating_sub(self.novelty_window_ticks)
    }
}

impl Default for SoundSettings {
    fn default() -> Self {
        let config = SoundConfig::default();
        let fallback = SoundDefaults {
            range: config.default_range,
            weight: config.default_weight,
        };
        Self {
            capacity: config.capacity,
            lifetime_ticks: config.lifetime_ticks,
            novelty_window_ticks: config.novelty_window_ticks,
            novelty_bonus: config.novelty_bonus,
            whitelist: None,
            fallback,
            defaults: BTreeMap::new(),
            virtual_defaults: resolve_pair(config.virtual_defaults, fallback).unwrap_or(fallback),
            max_iterations: config.attenuation.max_iterations,
            cache_limit: config.attenuation.cache_limit,
            surfaces: SurfaceRules::compile(&config.surfaces),
            profiles: ProfileBook::default(),
        }
    }
}

/// Shared, atomically replaceable settings snapshot.
#[derive(Debug)]
pub struct SettingsCell {
    current: RwLock<Arc<SoundSettings>>,
}

impl SettingsCell {
    /// Wrap an initial snapshot.
    pub fn new(settings: SoundSettings) -> Self {
        Self {
            current: RwLock::new(Arc::new(settings)),
        }
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<SoundSettings> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Replace the snapshot, returning the previous one.
    pub fn replace(&self, settings: SoundSettings) -> Arc<SoundSettings> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, Arc::new(settings))
    }
}

/// Validate a finite, non-negative number.
pub(crate) const fn valid_amount(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

fn non_negative(field: &'static str, value: f64) -> Result<f64, SettingsError> {
    if valid_amount(value) {
        Ok(value)
    } else {
        Err(SettingsError::InvalidValue {
            field,
            reason: format!("{value} is not a finite non-negative number"),
        })
    }
}

fn resolve_pair(entry: SoundDefaultsConfig, fallback: SoundDefaults) -> Option<SoundDefaults> {
    let range = entry.range.unwrap_or(fallback.range);
    let weight = entry.weight.unwrap_or(fallback.weight);
    (valid_amount(range) && valid_amount(weight)).then_some(SoundDefaults { range, weight })
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_capacity() -> usize {
    256
}

const fn default_lifetime_ticks() -> u32 {
    200
}

const fn default_novelty_window_ticks() -> u32 {
    20
}

const fn default_novelty_bonus() -> f64 {
    0.25
}

const fn default_range() -> f64 {
    16.0
}

const fn default_weight() -> f64 {
    1.0
}

const fn default_virtual() -> SoundDefaultsConfig {
    SoundDefaultsConfig {
        range: Some(12.0),
        weight: Some(1.2),
    }
}

const fn default_max_iterations() -> u32 {
    8
}

const fn default_cache_limit() -> usize {
    65_536
}
