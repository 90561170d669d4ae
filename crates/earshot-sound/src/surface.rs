//! Surface classification for occlusion.
//!
//! Every surface a sound ray passes through is sorted into one
//! [`SurfaceCategory`], and the category's multiplier is applied to both
//! range and weight. Classification checks, in order: configured
//! identifier lists, configured tag lists, then name-fragment heuristics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// How a surface muffles sound passing through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceCategory {
    /// Wool, carpet and other soft absorbers.
    Fiber,
    /// Water, lava and other fluids.
    Liquid,
    /// Doors, panes, bars, ladders, rails.
    Thin,
    /// Ordinary full blocks.
    Solid,
    /// Leaves, scaffolding, cobwebs and similar porous blocks.
    Permeable,
    /// Surfaces that do not muffle at all.
    None,
}

impl SurfaceCategory {
    /// All categories, in classification priority order.
    pub const ALL: [Self; 6] = [
        Self::Fiber,
        Self::Liquid,
        Self::Thin,
        Self::Solid,
        Self::Permeable,
        Self::None,
    ];
}

/// What the geometry collaborator reports about a surface a ray hit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SurfaceInfo {
    /// Block identifier such as `minecraft:oak_door`.
    pub id: String,
    /// Block tags such as `minecraft:wool`.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Whether the surface is a fluid.
    #[serde(default)]
    pub liquid: bool,
    /// Whether the surface blocks movement.
    #[serde(default = "default_true")]
    pub collidable: bool,
}

impl SurfaceInfo {
    /// A collidable, non-liquid surface with no tags.
    pub fn block(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tags: Vec::new(),
            liquid: false,
            collidable: true,
        }
    }

    /// Add a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// Name fragments that mark a soft, absorbing surface.
const FIBER_FRAGMENTS: &[&str] = &["wool", "carpet", "sponge", "hay_block"];

/// Name fragments that mark a thin surface.
const THIN_FRAGMENTS: &[&str] = &[
    "door", "pane", "bars", "ladder", "rail", "fence", "sign", "banner",
];

/// Name fragments that mark a porous surface.
const PERMEABLE_FRAGMENTS: &[&str] = &[
    "leaves", "scaffolding", "cobweb", "vine", "tall_grass", "sapling",
];

/// Raw surface configuration as written in YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceConfig {
    /// Multiplier per category, applied to both range and weight.
    #[serde(default = "default_multipliers")]
    pub multipliers: BTreeMap<SurfaceCategory, f64>,

    /// Explicit identifier and tag lists per category.
    #[serde(default)]
    pub lists: BTreeMap<SurfaceCategory, SurfaceListConfig>,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            multipliers: default_multipliers(),
            lists: BTreeMap::new(),
        }
    }
}

/// Identifiers and tags assigned to one category.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SurfaceListConfig {
    /// Block identifiers (`namespace:path`).
    #[serde(default)]
    pub ids: Vec<String>,
    /// Block tags, with or without a leading `#`.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Compiled surface rules used during attenuation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SurfaceRules {
    multipliers: BTreeMap<SurfaceCategory, f64>,
    ids: BTreeMap<String, SurfaceCategory>,
    tags: BTreeMap<String, SurfaceCategory>,
}

impl SurfaceRules {
    /// Compile raw configuration.
    ///
    /// Multipliers outside `[0, 1]` or non-finite fall back to the default
    /// for that category. An identifier or tag listed under two categories
    /// keeps the first one in [`SurfaceCategory::ALL`] order.
    pub fn compile(config: &SurfaceConfig) -> Self {
        let defaults = default_multipliers();
        let mut multipliers = BTreeMap::new();
        for category in SurfaceCategory::ALL {
            let fallback = defaults.get(&category).copied().unwrap_or(1.0);
            let value = match config.multipliers.get(&category) {
                Some(&m) if m.is_finite() && (0.0..=1.0).contains(&m) => m,
                Some(&m) => {
                    warn!(?category, multiplier = m, fallback, "Surface multiplier out of range, using default");
                    fallback
                }
                None => fallback,
            };
            multipliers.insert(category, value);
        }

        let mut ids = BTreeMap::new();
        let mut tags = BTreeMap::new();
        for category in SurfaceCategory::ALL {
            let Some(list) = config.lists.get(&category) else {
                continue;
            };
            for id in &list.ids {
                let key = normalize_key(id);
                if key.is_empty() {
                    warn!(?category, "Skipping empty surface identifier");
                    continue;
                }
                ids.entry(key).or_insert(category);
            }
            for tag in &list.tags {
                let key = normalize_key(tag.trim_start_matches('#'));
                if key.is_empty() {
                    warn!(?category, "Skipping empty surface tag");
                    continue;
                }
                tags.entry(key).or_insert(category);
            }
        }

        Self {
            multipliers,
            ids,
            tags,
        }
    }

    /// Multiplier applied for a category.
    pub fn multiplier(&self, category: SurfaceCategory) -> f64 {
        self.multipliers.get(&category).copied().unwrap_or(1.0)
    }

    /// Classify a surface.
    pub fn classify(&self, surface: &SurfaceInfo) -> SurfaceCategory {
        let id = normalize_key(&surface.id);
        if let Some(category) = self.ids.get(&id) {
            return *category;
        }
        for tag in &surface.tags {
            let key = normalize_key(tag.trim_start_matches('#'));
            if let Some(category) = self.tags.get(&key) {
                return *category;
            }
        }
        classify_heuristic(surface, &id)
    }
}

fn classify_heuristic(surface: &SurfaceInfo, id: &str) -> SurfaceCategory {
    let path = id.split_once(':').map_or(id, |(_, path)| path);
    let has = |fragments: &[&str]| fragments.iter().any(|f| path.contains(f));

    if surface.liquid {
        SurfaceCategory::Liquid
    } else if has(FIBER_FRAGMENTS) {
        SurfaceCategory::Fiber
    } else if has(THIN_FRAGMENTS) {
        SurfaceCategory::Thin
    } else if has(PERMEABLE_FRAGMENTS) {
        SurfaceCategory::Permeable
    } else if !surface.collidable {
        SurfaceCategory::None
    } else {
        SurfaceCategory::Solid
    }
}

/// Lowercase and default the namespace, so `Stone` and `minecraft:stone`
/// compare equal.
fn normalize_key(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    if lower.is_empty() || lower.contains(':') {
        lower
    } else {
        format!("{}:{lower}", earshot_types::DEFAULT_NAMESPACE)
    }
}

fn default_multipliers() -> BTreeMap<SurfaceCategory, f64> {
    BTreeMap::from([
        (SurfaceCategory::Fiber, 0.25),
        (SurfaceCategory::Liquid, 0.6),
        (SurfaceCategory::Thin, 0.8),
        (SurfaceCategory::Solid, 0.5),
        (SurfaceCategory::Permeable, 0.9),
        (SurfaceCategory::None, 1.0),
    ])
}

const fn default_true() -> bool {
    true
}
