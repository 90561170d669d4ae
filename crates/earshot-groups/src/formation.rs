//! One re-grouping pass as a pure function.
//!
//! Given the candidate list, the config and the current tick, produces
//! leaders, their member lists, scouts and deserters. The shuffle is seeded
//! by the tick, and candidates are sorted first, so the same inputs always
//! produce the same groups. When an agent is reported twice at different
//! positions, the lowest position wins.

use std::collections::{BTreeMap, HashSet};
use std::f64::consts::{PI, TAU};

use earshot_types::AgentId;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;

use crate::config::GroupConfig;
use crate::provider::Candidate;

/// A leader with its members and scouts.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    /// The elected leader.
    pub leader: AgentId,
    /// Members in assignment order, leader first.
    pub members: Vec<AgentId>,
    /// Members picked to scout outward.
    pub edges: Vec<AgentId>,
}

/// Result of one formation pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Formation {
    /// Groups in leader-selection order.
    pub groups: Vec<Group>,
    /// Candidates no leader took.
    pub deserters: Vec<AgentId>,
}

impl Formation {
    /// Number of followers across all groups.
    pub fn follower_count(&self) -> usize {
        self.groups
            .iter()
            .map(|g| g.members.len().saturating_sub(1))
            .sum()
    }

    /// Number of scouts across all groups.
    pub fn edge_count(&self) -> usize {
        self.groups.iter().map(|g| g.edges.len()).sum()
    }
}

/// Run leader election, first-fit assignment and scout selection.
pub fn form_groups(mut candidates: Vec<Candidate>, config: &GroupConfig, tick: u64) -> Formation {
    candidates.sort_by(|a, b| {
        a.id.cmp(&b.id)
            .then(a.pos.x.total_cmp(&b.pos.x))
            .then(a.pos.y.total_cmp(&b.pos.y))
            .then(a.pos.z.total_cmp(&b.pos.z))
    });
    candidates.dedup_by_key(|c| c.id);
    let mut rng = SmallRng::seed_from_u64(tick);
    candidates.shuffle(&mut rng);

    let spacing_sq = config.leader_spacing_sq();
    let mut leaders: Vec<Candidate> = Vec::new();
    for candidate in &candidates {
        if leaders.len() >= config.max_leaders {
            break;
        }
        if leaders.iter().all(|l| l.pos.distance_sq(candidate.pos) >= spacing_sq) {
            leaders.push(*candidate);
        }
    }

    let radius_sq = config.group_radius_sq();
    let max_size = config.max_group_size.max(1);
    let mut assigned: HashSet<AgentId> = leaders.iter().map(|l| l.id).collect();
    let mut groups = Vec::with_capacity(leaders.len());
    for leader in &leaders {
        let mut members = vec![*leader];
        for candidate in &candidates {
            if members.len() >= max_size {
                break;
            }
            if assigned.contains(&candidate.id) {
                continue;
            }
            if leader.pos.distance_sq(candidate.pos) <= radius_sq {
                assigned.insert(candidate.id);
                members.push(*candidate);
            }
        }
        let edges = pick_edges(leader, &members, config);
        groups.push(Group {
            leader: leader.id,
            members: members.iter().map(|m| m.id).collect(),
            edges,
        });
    }

    let deserters = candidates
        .iter()
        .filter(|c| !assigned.contains(&c.id))
        .map(|c| c.id)
        .collect();

    Formation { groups, deserters }
}

/// Scouts: per angular sector around the leader, the farthest members.
fn pick_edges(leader: &Candidate, members: &[Candidate], config: &GroupConfig) -> Vec<AgentId> {
    let sectors = config.num_edge_sectors.max(1);
    let mut by_sector: BTreeMap<u32, Vec<(f64, AgentId)>> = BTreeMap::new();
    for member in members.iter().filter(|m| m.id != leader.id) {
        let angle = (member.pos.z - leader.pos.z).atan2(member.pos.x - leader.pos.x);
        let sector = sector_of(angle, sectors);
        by_sector
            .entry(sector)
            .or_default()
            .push((leader.pos.distance_sq(member.pos), member.id));
    }

    let mut edges = Vec::new();
    for bucket in by_sector.values_mut() {
        bucket.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        edges.extend(bucket.iter().take(config.edge_mobs_per_sector).map(|(_, id)| *id));
    }

    if edges.is_empty() && members.len() > 1 {
        let farthest = by_sector
            .values()
            .flatten()
            .max_by(|a, b| a.0.total_cmp(&b.0).then(b.1.cmp(&a.1)));
        if let Some((_, id)) = farthest {
            edges.push(*id);
        }
    }
    edges
}

/// Map an `atan2` angle in `[-PI, PI]` to a sector index in `0..sectors`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn sector_of(angle: f64, sectors: u32) -> u32 {
    let scaled = ((angle + PI) / TAU * f64::from(sectors)).floor();
    // `as` saturates; the upper clamp handles angle == PI.
    (scaled.max(0.0) as u32).min(sectors.saturating_sub(1))
}
