//! Group coordination parameters (`groups` section of the config file).

use serde::{Deserialize, Serialize};

/// Tunables for leader election and group formation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupConfig {
    /// Base scan cooldown in ticks. Re-grouping runs every
    /// `max(1, scan_cooldown / 2)` ticks.
    #[serde(default = "default_scan_cooldown")]
    pub scan_cooldown: u64,

    /// Followers join a leader within this distance.
    #[serde(default = "default_group_radius")]
    pub group_radius: f64,

    /// Leaders must be at least `group_radius * leader_spacing_multiplier`
    /// apart.
    #[serde(default = "default_leader_spacing_multiplier")]
    pub leader_spacing_multiplier: f64,

    /// Maximum number of leaders per world instance.
    #[serde(default = "default_max_leaders")]
    pub max_leaders: usize,

    /// Maximum group size, leader included.
    #[serde(default = "default_max_group_size")]
    pub max_group_size: usize,

    /// Angular sectors used to pick scouts.
    #[serde(default = "default_num_edge_sectors")]
    pub num_edge_sectors: u32,

    /// Scouts picked per populated sector.
    #[serde(default = "default_edge_mobs_per_sector")]
    pub edge_mobs_per_sector: usize,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            scan_cooldown: default_scan_cooldown(),
            group_radius: default_group_radius(),
            leader_spacing_multiplier: default_leader_spacing_multiplier(),
            max_leaders: default_max_leaders(),
            max_group_size: default_max_group_size(),
            num_edge_sectors: default_num_edge_sectors(),
            edge_mobs_per_sector: default_edge_mobs_per_sector(),
        }
    }
}

impl GroupConfig {
    /// Ticks between re-grouping passes.
    pub const fn regroup_interval(&self) -> u64 {
        let half = self.scan_cooldown / 2;
        if half == 0 { 1 } else { half }
    }

    /// Minimum squared distance between two leaders.
    pub fn leader_spacing_sq(&self) -> f64 {
        let spacing = self.group_radius * self.leader_spacing_multiplier;
        spacing * spacing
    }

    /// Squared follower radius.
    pub fn group_radius_sq(&self) -> f64 {
        self.group_radius * self.group_radius
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_scan_cooldown() -> u64 {
    40
}

const fn default_group_radius() -> f64 {
    16.0
}

const fn default_leader_spacing_multiplier() -> f64 {
    1.5
}

const fn default_max_leaders() -> usize {
    8
}

const fn default_max_group_size() -> usize {
    8
}

const fn default_num_edge_sectors() -> u32 {
    4
}

const fn default_edge_mobs_per_sector() -> usize {
    1
}
