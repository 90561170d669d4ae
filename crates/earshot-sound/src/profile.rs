//! Listener profiles.
//!
//! A profile overrides per-sound range and weight for a class of agents
//! (and carries per-posture detection ranges consumed by stealth logic
//! outside this crate). Profiles are chosen by an ordered matcher chain:
//! the first matcher that accepts the agent wins.

use std::collections::BTreeMap;
use std::sync::Arc;

use earshot_types::SoundId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::settings::{SoundDefaults, valid_amount};

/// Body posture of the agent making noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Posture {
    /// Upright, normal movement.
    Standing,
    /// Sneaking.
    Sneaking,
    /// Crawling or swimming low.
    Crawling,
}

/// Range/weight overrides and detection ranges for one class of agents.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SoundProfile {
    /// Profile name for diagnostics.
    pub name: String,
    /// Per-sound overrides that replace base range and weight before
    /// attenuation.
    pub sounds: BTreeMap<SoundId, SoundDefaults>,
    /// Detection range per posture of the observed agent.
    pub detection_ranges: BTreeMap<Posture, f64>,
}

impl SoundProfile {
    /// Override for a sound identifier, if any.
    pub fn override_for(&self, id: &SoundId) -> Option<SoundDefaults> {
        self.sounds.get(id).copied()
    }

    /// Detection range override for a posture, if any.
    pub fn detection_range(&self, posture: Posture) -> Option<f64> {
        self.detection_ranges.get(&posture).copied()
    }
}

/// Predicate selecting which agents a profile applies to.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileMatcher {
    /// Agent type equals the string exactly.
    EntityType(String),
    /// Every key in the pattern is present in the agent's data with an
    /// equal (or recursively subset) value.
    DataSubset(Value),
    /// Every inner matcher accepts.
    All(Vec<ProfileMatcher>),
}

impl ProfileMatcher {
    /// Whether the matcher accepts an agent.
    pub fn matches(&self, entity_type: &str, data: &Value) -> bool {
        match self {
            Self::EntityType(expected) => expected == entity_type,
            Self::DataSubset(pattern) => is_subset(pattern, data),
            Self::All(matchers) => matchers.iter().all(|m| m.matches(entity_type, data)),
        }
    }
}

/// Structured subset match.
///
/// Objects match when every pattern key matches; arrays match when every
/// pattern element matches some data element; scalars compare equal.
fn is_subset(pattern: &Value, data: &Value) -> bool {
    match (pattern, data) {
        (Value::Object(want), Value::Object(have)) => want
            .iter()
            .all(|(key, value)| have.get(key).is_some_and(|found| is_subset(value, found))),
        (Value::Array(want), Value::Array(have)) => want
            .iter()
            .all(|value| have.iter().any(|found| is_subset(value, found))),
        (want, have) => want == have,
    }
}

/// Raw profile entry as written in configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Profile name.
    pub name: String,
    /// Match agents of this type.
    #[serde(default)]
    pub entity_type: Option<String>,
    /// Match agents whose data contains this structure.
    #[serde(default)]
    pub data: Option<Value>,
    /// Per-sound overrides keyed by identifier.
    #[serde(default)]
    pub sounds: BTreeMap<String, ProfileSoundConfig>,
    /// Detection range per posture.
    #[serde(default)]
    pub detection: BTreeMap<Posture, f64>,
}

/// A per-sound override; both halves are required.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileSoundConfig {
    /// Overriding range.
    pub range: f64,
    /// Overriding weight.
    pub weight: f64,
}

/// Ordered (matcher, profile) chain, evaluated first-match-wins.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProfileBook {
    entries: Vec<(ProfileMatcher, Arc<SoundProfile>)>,
}

impl ProfileBook {
    /// Compile raw profile entries.
    ///
    /// An entry with neither `entity_type` nor `data` would match every
    /// agent and shadow the rest of the chain, so it is skipped. Bad sound
    /// keys and out-of-range numbers are skipped per entry.
    pub fn compile(configs: &[ProfileConfig]) -> Self {
        let mut book = Self::default();
        for config in configs {
            let mut matchers = Vec::new();
            if let Some(entity_type) = &config.entity_type {
                matchers.push(ProfileMatcher::EntityType(entity_type.clone()));
            }
            if let Some(data) = &config.data {
                matchers.push(ProfileMatcher::DataSubset(data.clone()));
            }
            let matcher = if matchers.len() > 1 {
                ProfileMatcher::All(matchers)
            } else if let Some(single) = matchers.pop() {
                single
            } else {
                warn!(profile = config.name, "Skipping profile with no matcher");
                continue;
            };

            let mut profile = SoundProfile {
                name: config.name.clone(),
                ..SoundProfile::default()
            };
            for (raw, entry) in &config.sounds {
                let id = match SoundId::parse(raw) {
                    Ok(id) => id,
                    Err(err) => {
                        warn!(profile = config.name, entry = raw, error = %err, "Skipping malformed profile sound");
                        continue;
                    }
                };
                if !valid_amount(entry.range) || !valid_amount(entry.weight) {
                    warn!(profile = config.name, sound = %id, "Skipping out-of-range profile sound");
                    continue;
                }
                profile.sounds.insert(
                    id,
                    SoundDefaults {
                        range: entry.range,
                        weight: entry.weight,
                    },
                );
            }
            for (posture, range) in &config.detection {
                if valid_amount(*range) {
                    profile.detection_ranges.insert(*posture, *range);
                } else {
                    warn!(profile = config.name, ?posture, "Skipping out-of-range detection range");
                }
            }
            book.push(matcher, profile);
        }
        book
    }

    /// Append an entry at the end of the chain.
    pub fn push(&mut self, matcher: ProfileMatcher, profile: SoundProfile) {
        self.entries.push((matcher, Arc::new(profile)));
    }

    /// First profile whose matcher accepts the agent.
    pub fn resolve(&self, entity_type: &str, data: &Value) -> Option<Arc<SoundProfile>> {
        self.entries
            .iter()
            .find(|(matcher, _)| matcher.matches(entity_type, data))
            .map(|(_, profile)| Arc::clone(profile))
    }

    /// Number of entries in the chain.
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the chain is empty.
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn subset_match_is_recursive() {
        let data = json!({"variant": "husk", "equipment": {"head": "iron_helmet", "hand": "sword"}, "tags": ["a", "b"]});
        assert!(is_subset(&json!({"variant": "husk"}), &data));
        assert!(is_subset(&json!({"equipment": {"head": "iron_helmet"}}), &data));
        assert!(is_subset(&json!({"tags": ["b"]}), &data));
        assert!(!is_subset(&json!({"tags": ["c"]}), &data));
        assert!(!is_subset(&json!({"variant": "drowned"}), &data));
        assert!(!is_subset(&json!({"missing": 1}), &data));
    }

    #[test]
    fn first_match_wins() {
        let configs = vec![
            ProfileConfig {
                name: "husk".to_owned(),
                entity_type: Some("zombie".to_owned()),
                data: Some(json!({"variant": "husk"})),
                ..ProfileConfig::default()
            },
            ProfileConfig {
                name: "zombie".to_owned(),
                entity_type: Some("zombie".to_owned()),
                ..ProfileConfig::default()
            },
        ];
        let book = ProfileBook::compile(&configs);
        assert_eq!(book.len(), 2);

        let husk = book.resolve("zombie", &json!({"variant": "husk"})).unwrap();
        assert_eq!(husk.name, "husk");
        let plain = book.resolve("zombie", &json!({})).unwrap();
        assert_eq!(plain.name, "zombie");
        assert!(book.resolve("skeleton", &json!({})).is_none());
    }

    #[test]
    fn bad_profile_entries_are_skipped() {
        let mut sounds = BTreeMap::new();
        sounds.insert("block.glass.break".to_owned(), ProfileSoundConfig { range: 40.0, weight: 3.0 });
        sounds.insert("Bad Key".to_owned(), ProfileSoundConfig { range: 1.0, weight: 1.0 });
        sounds.insert("block.stone.break".to_owned(), ProfileSoundConfig { range: f64::INFINITY, weight: 1.0 });
        let mut detection = BTreeMap::new();
        detection.insert(Posture::Sneaking, 4.0);
        detection.insert(Posture::Crawling, -1.0);

        let configs = vec![
            ProfileConfig {
                name: "matches nothing".to_owned(),
                ..ProfileConfig::default()
            },
            ProfileConfig {
                name: "listener".to_owned(),
                entity_type: Some("zombie".to_owned()),
                data: None,
                sounds,
                detection,
            },
        ];
        let book = ProfileBook::compile(&configs);
        assert_eq!(book.len(), 1);
        let profile = book.resolve("zombie", &Value::Null).unwrap();
        assert_eq!(profile.sounds.len(), 1);
        let glass = profile.override_for(&SoundId::parse("block.glass.break").unwrap()).unwrap();
        assert!((glass.range - 40.0).abs() < 1e-12);
        assert_eq!(profile.detection_range(Posture::Sneaking), Some(4.0));
        assert_eq!(profile.detection_range(Posture::Crawling), None);
    }
}
