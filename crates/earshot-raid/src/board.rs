//! Raid records and the countdown pass.
//!
//! Each leader may have one raid per world instance. A raid is scheduled
//! in [`RaidPhase::Ticking`], counts down once per [`RaidBoard::tick`],
//! and flips to [`RaidPhase::Advancing`] on the tick its countdown reaches
//! zero. It stays advancing until cleared or rescheduled.
//!
//! Leaders are held by identity. Every read re-checks liveness through the
//! [`AgentOracle`], and a periodic sweep removes raids of dead leaders.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use earshot_types::{AgentId, AgentOracle, BlockPos, WorldKey};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::config::RaidConfig;

/// Raid state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RaidPhase {
    /// Counting down.
    Ticking,
    /// Countdown finished; the group moves on the target.
    Advancing,
}

/// One leader's raid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RaidRecord {
    /// Owning leader.
    pub leader: AgentId,
    /// Where the raid goes.
    pub target: BlockPos,
    /// Ticks left before advancing.
    pub countdown: u32,
    /// Current phase.
    pub phase: RaidPhase,
    /// Tick the raid was scheduled.
    pub created_at: u64,
}

/// Counts from one countdown pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RaidTick {
    /// Raids still ticking after the pass.
    pub ticking: usize,
    /// Raids that moved to advancing in this pass.
    pub advanced: usize,
    /// Raids removed by the liveness sweep.
    pub swept: usize,
}

#[derive(Debug, Default)]
struct WorldRaids {
    records: HashMap<AgentId, RaidRecord>,
    last_sweep: u64,
}

/// Per-world table of leader raids.
pub struct RaidBoard {
    config: RaidConfig,
    oracle: Arc<dyn AgentOracle>,
    worlds: RwLock<BTreeMap<WorldKey, WorldRaids>>,
}

impl std::fmt::Debug for RaidBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaidBoard")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RaidBoard {
    /// Create an empty board.
    pub fn new(config: RaidConfig, oracle: Arc<dyn AgentOracle>) -> Self {
        Self {
            config,
            oracle,
            worlds: RwLock::new(BTreeMap::new()),
        }
    }

    /// Create or replace `leader`'s raid in `world`, ticking from the
    /// configured countdown.
    pub fn schedule_raid(&self, world: &WorldKey, leader: AgentId, target: BlockPos, now: u64) {
        let countdown = self.config.effective_countdown();
        let record = RaidRecord {
            leader,
            target,
            countdown,
            phase: RaidPhase::Ticking,
            created_at: now,
        };
        let replaced = self
            .write_worlds()
            .entry(world.clone())
            .or_default()
            .records
            .insert(leader, record)
            .is_some();
        info!(%world, %leader, %target, countdown, replaced, "Raid scheduled");
    }

    /// Advance every ticking raid in `world` by one tick.
    ///
    /// Runs the liveness sweep when `sweep_interval` ticks have passed
    /// since the last one. The sweep cadence is kept per world even while
    /// it has no raids.
    pub fn tick(&self, world: &WorldKey, now: u64) -> RaidTick {
        let mut worlds = self.write_worlds();
        let raids = worlds.entry(world.clone()).or_default();

        let mut summary = RaidTick::default();
        if now.saturating_sub(raids.last_sweep) >= self.config.sweep_interval {
            raids.last_sweep = now;
            let before = raids.records.len();
            raids.records.retain(|leader, _| self.oracle.is_alive(*leader));
            summary.swept = before.saturating_sub(raids.records.len());
            if summary.swept > 0 {
                debug!(%world, swept = summary.swept, "Swept raids of dead leaders");
            }
        }

        for record in raids.records.values_mut() {
            if record.phase != RaidPhase::Ticking {
                continue;
            }
            record.countdown = record.countdown.saturating_sub(1);
            if record.countdown == 0 {
                record.phase = RaidPhase::Advancing;
                summary.advanced = summary.advanced.saturating_add(1);
                info!(%world, leader = %record.leader, target = %record.target, "Raid advancing");
            } else {
                summary.ticking = summary.ticking.saturating_add(1);
            }
        }
        summary
    }

    /// Copy of the leader's raid, if any and the leader is live.
    pub fn record(&self, world: &WorldKey, leader: AgentId) -> Option<RaidRecord> {
        if !self.oracle.is_alive(leader) {
            return None;
        }
        self.read_worlds()
            .get(world)
            .and_then(|raids| raids.records.get(&leader))
            .cloned()
    }

    /// Whether the leader's raid is counting down.
    pub fn is_ticking(&self, world: &WorldKey, leader: AgentId) -> bool {
        self.phase(world, leader) == Some(RaidPhase::Ticking)
    }

    /// Whether the leader's raid is advancing.
    pub fn is_advancing(&self, world: &WorldKey, leader: AgentId) -> bool {
        self.phase(world, leader) == Some(RaidPhase::Advancing)
    }

    /// Target of the leader's raid.
    pub fn target(&self, world: &WorldKey, leader: AgentId) -> Option<BlockPos> {
        self.record(world, leader).map(|r| r.target)
    }

    /// Remove the leader's raid. Returns whether one existed.
    pub fn clear(&self, world: &WorldKey, leader: AgentId) -> bool {
        let mut worlds = self.write_worlds();
        let Some(raids) = worlds.get_mut(world) else {
            return false;
        };
        let removed = raids.records.remove(&leader).is_some();
        if removed {
            debug!(%world, %leader, "Raid cleared");
        }
        removed
    }

    /// Number of raids across all worlds, live or not.
    pub fn len(&self) -> usize {
        self.read_worlds().values().map(|raids| raids.records.len()).sum()
    }

    /// Whether there are no raids.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn phase(&self, world: &WorldKey, leader: AgentId) -> Option<RaidPhase> {
        self.record(world, leader).map(|r| r.phase)
    }

    fn read_worlds(&self) -> RwLockReadGuard<'_, BTreeMap<WorldKey, WorldRaids>> {
        self.worlds.read().unwrap_or_else(|poisoned| {
            error!("raid table lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write_worlds(&self) -> RwLockWriteGuard<'_, BTreeMap<WorldKey, WorldRaids>> {
        self.worlds.write().unwrap_or_else(|poisoned| {
            error!("raid table lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    use earshot_types::AllAlive;

    use super::*;

    fn overworld() -> WorldKey {
        WorldKey::new("overworld")
    }

    fn board(countdown_ticks: u32) -> RaidBoard {
        let config = RaidConfig {
            countdown_ticks,
            ..RaidConfig::default()
        };
        RaidBoard::new(config, Arc::new(AllAlive))
    }

    #[test]
    fn advances_exactly_on_the_last_countdown_tick() {
        let board = board(3);
        let leader = AgentId::from_u128(1);
        let target = BlockPos::new(10, 64, -4);
        board.schedule_raid(&overworld(), leader, target, 50);
        assert!(board.is_ticking(&overworld(), leader));

        for now in 51..53 {
            board.tick(&overworld(), now);
            assert!(board.is_ticking(&overworld(), leader));
        }
        let summary = board.tick(&overworld(), 53);
        assert_eq!(summary.advanced, 1);
        assert!(board.is_advancing(&overworld(), leader));
        assert_eq!(board.target(&overworld(), leader), Some(target));

        // advancing is terminal until cleared
        assert_eq!(board.tick(&overworld(), 54), RaidTick::default());
        assert!(board.is_advancing(&overworld(), leader));
        assert!(board.clear(&overworld(), leader));
        assert!(!board.clear(&overworld(), leader));
        assert!(board.is_empty());
    }

    #[test]
    fn zero_countdown_still_ticks_once() {
        let board = board(0);
        let leader = AgentId::from_u128(1);
        board.schedule_raid(&overworld(), leader, BlockPos::new(0, 0, 0), 0);
        assert!(board.is_ticking(&overworld(), leader));
        board.tick(&overworld(), 1);
        assert!(board.is_advancing(&overworld(), leader));
    }

    #[test]
    fn rescheduling_restarts_the_countdown() {
        let board = board(2);
        let leader = AgentId::from_u128(1);
        board.schedule_raid(&overworld(), leader, BlockPos::new(0, 64, 0), 0);
        board.tick(&overworld(), 1);
        board.tick(&overworld(), 2);
        assert!(board.is_advancing(&overworld(), leader));

        board.schedule_raid(&overworld(), leader, BlockPos::new(5, 64, 5), 3);
        let record = board.record(&overworld(), leader).unwrap();
        assert_eq!(record.phase, RaidPhase::Ticking);
        assert_eq!(record.countdown, 2);
        assert_eq!(record.created_at, 3);
        assert_eq!(board.len(), 1);
    }

    #[test]
    fn worlds_are_independent() {
        let board = board(1);
        let leader = AgentId::from_u128(1);
        let nether = WorldKey::new("nether");
        board.schedule_raid(&overworld(), leader, BlockPos::new(0, 64, 0), 0);
        board.schedule_raid(&nether, leader, BlockPos::new(0, 32, 0), 0);
        board.tick(&overworld(), 1);
        assert!(board.is_advancing(&overworld(), leader));
        assert!(board.is_ticking(&nether, leader));
        assert!(board.target(&WorldKey::new("end"), leader).is_none());
    }

    struct Roster(Mutex<BTreeSet<AgentId>>);

    impl AgentOracle for Roster {
        fn is_alive(&self, agent: AgentId) -> bool {
            self.0.lock().unwrap().contains(&agent)
        }
    }

    #[test]
    fn dead_leaders_read_absent_and_are_swept() {
        let alive = AgentId::from_u128(1);
        let doomed = AgentId::from_u128(2);
        let roster = Arc::new(Roster(Mutex::new(BTreeSet::from([alive, doomed]))));
        let board = RaidBoard::new(RaidConfig::default(), Arc::clone(&roster) as Arc<dyn AgentOracle>);
        board.schedule_raid(&overworld(), alive, BlockPos::new(0, 64, 0), 0);
        board.schedule_raid(&overworld(), doomed, BlockPos::new(9, 64, 0), 0);

        roster.0.lock().unwrap().remove(&doomed);
        assert!(!board.is_ticking(&overworld(), doomed));
        assert!(board.record(&overworld(), doomed).is_none());
        assert_eq!(board.len(), 2);

        assert_eq!(board.tick(&overworld(), 199).swept, 0);
        assert_eq!(board.tick(&overworld(), 200).swept, 1);
        assert_eq!(board.len(), 1);
        assert!(board.is_ticking(&overworld(), alive));
    }

    #[test]
    fn sweep_cadence_survives_an_empty_world() {
        let leader = AgentId::from_u128(3);
        let roster = Arc::new(Roster(Mutex::new(BTreeSet::from([leader]))));
        let board = RaidBoard::new(RaidConfig::default(), Arc::clone(&roster) as Arc<dyn AgentOracle>);

        // sweeps land on 200 and 400 while the world has no raids
        assert_eq!(board.tick(&overworld(), 200).swept, 0);
        board.schedule_raid(&overworld(), leader, BlockPos::new(0, 64, 0), 300);
        assert!(board.clear(&overworld(), leader));
        assert_eq!(board.tick(&overworld(), 400).swept, 0);

        board.schedule_raid(&overworld(), leader, BlockPos::new(0, 64, 0), 450);
        roster.0.lock().unwrap().remove(&leader);
        assert_eq!(board.tick(&overworld(), 500).swept, 0);
        assert_eq!(board.len(), 1);
        assert_eq!(board.tick(&overworld(), 600).swept, 1);
        assert!(board.is_empty());
    }
}
