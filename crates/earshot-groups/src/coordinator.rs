//! The group coordination service.
//!
//! Holds the result of the latest formation pass per world instance and
//! answers role lookups for individual agents. Group state is rebuilt from
//! scratch on every pass; nothing about "group #3" survives a re-group.
//!
//! Leaders are referenced by identity only. A lookup whose stored leader
//! the [`AgentOracle`] reports dead answers as if the agent were
//! unassigned.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use earshot_types::{AgentId, AgentOracle, BlockPos, WorldKey};
use serde::Serialize;
use tracing::{debug, error};

use crate::config::GroupConfig;
use crate::formation::{Formation, Group, form_groups};
use crate::provider::CandidateProvider;
use crate::relay::{Relay, RelayBoard, RelayDigest, RelayOutcome};

/// Summary of one re-grouping pass, for logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSnapshot {
    /// World instance that was re-grouped.
    pub world: WorldKey,
    /// Tick of the pass.
    pub tick: u64,
    /// Distinct candidates considered.
    pub candidates: usize,
    /// Leaders elected.
    pub leaders: usize,
    /// Followers assigned.
    pub followers: usize,
    /// Candidates left without a group.
    pub deserters: usize,
    /// Scouts picked.
    pub edges: usize,
}

/// An agent's role after the latest pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Leader,
    Follower { leader: AgentId, edge: bool },
    Deserter,
}

#[derive(Debug, Clone)]
struct Assignment {
    world: WorldKey,
    role: Role,
}

#[derive(Debug, Default)]
struct WorldGroups {
    last_regroup: Option<u64>,
    formation: Formation,
}

#[derive(Debug, Default)]
struct GroupTables {
    roles: HashMap<AgentId, Assignment>,
    worlds: BTreeMap<WorldKey, WorldGroups>,
}

/// Leader election, follower assignment, scouts and relays.
pub struct GroupCoordinator {
    config: GroupConfig,
    oracle: Arc<dyn AgentOracle>,
    tables: RwLock<GroupTables>,
    relays: Mutex<RelayBoard>,
}

impl std::fmt::Debug for GroupCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupCoordinator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GroupCoordinator {
    /// Create a coordinator with no groups formed.
    pub fn new(config: GroupConfig, oracle: Arc<dyn AgentOracle>) -> Self {
        Self {
            config,
            oracle,
            tables: RwLock::new(GroupTables::default()),
            relays: Mutex::new(RelayBoard::default()),
        }
    }

    /// The configuration in use.
    pub const fn config(&self) -> &GroupConfig {
        &self.config
    }

    /// Re-group `world` if its interval has elapsed.
    ///
    /// Returns `None` when the pass was skipped. The pass is claimed under
    /// the write lock, so concurrent callers for one world and tick run it
    /// at most once. The provider is queried after the lock is released.
    pub fn regroup(&self, world: &WorldKey, now: u64, provider: &dyn CandidateProvider) -> Option<GroupSnapshot> {
        let interval = self.config.regroup_interval();
        {
            let mut tables = self.write_tables();
            let entry = tables.worlds.entry(world.clone()).or_default();
            if let Some(last) = entry.last_regroup
                && now.saturating_sub(last) < interval
            {
                return None;
            }
            entry.last_regroup = Some(now);
        }

        let candidates = provider.candidates(world);
        let formation = form_groups(candidates, &self.config, now);
        let snapshot = GroupSnapshot {
            world: world.clone(),
            tick: now,
            candidates: formation
                .groups
                .iter()
                .map(|g| g.members.len())
                .sum::<usize>()
                .saturating_add(formation.deserters.len()),
            leaders: formation.groups.len(),
            followers: formation.follower_count(),
            deserters: formation.deserters.len(),
            edges: formation.edge_count(),
        };

        let mut tables = self.write_tables();
        tables.roles.retain(|_, assignment| &assignment.world != world);
        for group in &formation.groups {
            let edges: HashSet<AgentId> = group.edges.iter().copied().collect();
            for member in &group.members {
                let role = if *member == group.leader {
                    Role::Leader
                } else {
                    Role::Follower {
                        leader: group.leader,
                        edge: edges.contains(member),
                    }
                };
                tables.roles.insert(
                    *member,
                    Assignment {
                        world: world.clone(),
                        role,
                    },
                );
            }
        }
        for deserter in &formation.deserters {
            tables.roles.insert(
                *deserter,
                Assignment {
                    world: world.clone(),
                    role: Role::Deserter,
                },
            );
        }
        tables.worlds.entry(world.clone()).or_default().formation = formation;

        let leaders: HashSet<AgentId> = tables
            .roles
            .iter()
            .filter(|(_, a)| a.role == Role::Leader)
            .map(|(id, _)| *id)
            .collect();
        self.lock_relays().prune(
            |leader| leaders.contains(&leader) && self.oracle.is_alive(leader),
            |agent| self.oracle.is_alive(agent),
        );
        drop(tables);

        debug!(
            world = %snapshot.world,
            tick = now,
            leaders = snapshot.leaders,
            followers = snapshot.followers,
            deserters = snapshot.deserters,
            edges = snapshot.edges,
            "Re-grouped agents"
        );
        Some(snapshot)
    }

    /// The agent's leader. Unassigned agents, leaders, deserters, and
    /// followers whose leader is dead lead themselves.
    pub fn get_leader(&self, agent: AgentId) -> AgentId {
        match self.role(agent) {
            Some(Role::Follower { leader, .. }) if self.oracle.is_alive(leader) => leader,
            _ => agent,
        }
    }

    /// Whether the latest pass left the agent without a group.
    pub fn is_deserter(&self, agent: AgentId) -> bool {
        self.role(agent) == Some(Role::Deserter)
    }

    /// Whether the agent was elected leader.
    pub fn is_leader(&self, agent: AgentId) -> bool {
        self.role(agent) == Some(Role::Leader)
    }

    /// Whether the agent is a scout of a live leader.
    pub fn is_edge(&self, agent: AgentId) -> bool {
        matches!(
            self.role(agent),
            Some(Role::Follower { leader, edge: true }) if self.oracle.is_alive(leader)
        )
    }

    /// Scouts of a leader.
    pub fn edge_members(&self, leader: AgentId) -> Vec<AgentId> {
        self.with_group(leader, |group| group.edges.clone())
    }

    /// Members of a leader's group, leader first.
    pub fn members(&self, leader: AgentId) -> Vec<AgentId> {
        self.with_group(leader, |group| group.members.clone())
    }

    /// Leaders of a world instance in election order.
    pub fn leaders(&self, world: &WorldKey) -> Vec<AgentId> {
        self.read_tables()
            .worlds
            .get(world)
            .map(|w| w.formation.groups.iter().map(|g| g.leader).collect())
            .unwrap_or_default()
    }

    /// Report a sound to the agent's leader.
    pub fn relay(&self, agent: AgentId, pos: BlockPos, range: f64, weight: f64, now: u64) -> RelayOutcome {
        let leader = self.get_leader(agent);
        if leader == agent {
            return RelayOutcome::NoLeader;
        }
        let relay = Relay {
            from: agent,
            pos,
            range,
            weight,
            timestamp: now,
            digest: RelayDigest::new(pos, range, weight),
        };
        let outcome = self.lock_relays().post(leader, relay);
        debug!(%agent, %leader, %pos, ?outcome, "Relay");
        outcome
    }

    /// Take every unexpired relay addressed to `leader`.
    pub fn consume_relays(&self, leader: AgentId, now: u64) -> Vec<Relay> {
        self.lock_relays().drain(leader, now)
    }

    /// Relays waiting across all inboxes.
    pub fn pending_relays(&self) -> usize {
        self.lock_relays().pending()
    }

    fn role(&self, agent: AgentId) -> Option<Role> {
        self.read_tables().roles.get(&agent).map(|a| a.role)
    }

    fn with_group<T: Default>(&self, leader: AgentId, f: impl FnOnce(&Group) -> T) -> T {
        let tables = self.read_tables();
        let Some(assignment) = tables.roles.get(&leader) else {
            return T::default();
        };
        if assignment.role != Role::Leader {
            return T::default();
        }
        tables
            .worlds
            .get(&assignment.world)
            .and_then(|w| w.formation.groups.iter().find(|g| g.leader == leader))
            .map(f)
            .unwrap_or_default()
    }

    fn read_tables(&self) -> RwLockReadGuard<'_, GroupTables> {
        self.tables.read().unwrap_or_else(|poisoned| {
            error!("group table lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write_tables(&self) -> RwLockWriteGuard<'_, GroupTables> {
        self.tables.write().unwrap_or_else(|poisoned| {
            error!("group table lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn lock_relays(&self) -> MutexGuard<'_, RelayBoard> {
        self.relays.lock().unwrap_or_else(|poisoned| {
            error!("relay lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}
