//! Raid parameters (`raids` section of the config file).

use serde::{Deserialize, Serialize};

/// Tunables for raid escalation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaidConfig {
    /// Ticks a scheduled raid counts down before advancing. 0 is treated
    /// as 1.
    #[serde(default = "default_countdown_ticks")]
    pub countdown_ticks: u32,

    /// Ticks between sweeps that drop raids of dead leaders.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval: u64,
}

impl Default for RaidConfig {
    fn default() -> Self {
        Self {
            countdown_ticks: default_countdown_ticks(),
            sweep_interval: default_sweep_interval(),
        }
    }
}

impl RaidConfig {
    /// Countdown given to new raids.
    pub const fn effective_countdown(&self) -> u32 {
        if self.countdown_ticks == 0 { 1 } else { self.countdown_ticks }
    }
}

const fn default_countdown_ticks() -> u32 {
    100
}

const fn default_sweep_interval() -> u64 {
    200
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn zero_countdown_is_clamped() {
        let config: RaidConfig = serde_yml::from_str("countdown_ticks: 0\n").unwrap();
        assert_eq!(config.effective_countdown(), 1);
        assert_eq!(config.sweep_interval, 200);
        assert_eq!(RaidConfig::default().effective_countdown(), 100);
    }
}
