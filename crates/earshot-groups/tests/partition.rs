//! Re-grouping laws checked over random agent layouts.

#![allow(clippy::unwrap_used)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use earshot_groups::{Candidate, GroupConfig, GroupCoordinator, form_groups};
use earshot_types::{AgentId, AllAlive, Vec3, WorldKey};
use proptest::prelude::*;

fn layout() -> impl Strategy<Value = Vec<Candidate>> {
    prop::collection::vec((0_u128..40, -60.0_f64..60.0, -60.0_f64..60.0), 0..40).prop_map(|agents| {
        agents
            .into_iter()
            .map(|(n, x, z)| Candidate::new(AgentId::from_u128(n), Vec3::new(x, 64.0, z)))
            .collect()
    })
}

fn config() -> impl Strategy<Value = GroupConfig> {
    (4.0_f64..24.0, 1.0_f64..3.0, 1_usize..6, 1_usize..8, 1_u32..8, 0_usize..3).prop_map(
        |(group_radius, leader_spacing_multiplier, max_leaders, max_group_size, num_edge_sectors, edge_mobs_per_sector)| {
            GroupConfig {
                scan_cooldown: 40,
                group_radius,
                leader_spacing_multiplier,
                max_leaders,
                max_group_size,
                num_edge_sectors,
                edge_mobs_per_sector,
            }
        },
    )
}

/// Position each id is formed from: a repeated id keeps its lowest
/// listed position.
fn elected_positions(candidates: &[Candidate]) -> BTreeMap<AgentId, Vec3> {
    let mut sorted = candidates.to_vec();
    sorted.sort_by(|a, b| {
        a.id.cmp(&b.id)
            .then(a.pos.x.total_cmp(&b.pos.x))
            .then(a.pos.y.total_cmp(&b.pos.y))
            .then(a.pos.z.total_cmp(&b.pos.z))
    });
    sorted.dedup_by_key(|c| c.id);
    sorted.into_iter().map(|c| (c.id, c.pos)).collect()
}

proptest! {
    #[test]
    fn roles_partition_the_candidates(candidates in layout(), config in config(), tick in 0_u64..10_000) {
        let distinct: BTreeSet<AgentId> = candidates.iter().map(|c| c.id).collect();
        let formation = form_groups(candidates, &config, tick);

        let mut seen = BTreeSet::new();
        for group in &formation.groups {
            prop_assert_eq!(group.members.first(), Some(&group.leader));
            prop_assert!(group.members.len() <= config.max_group_size.max(1));
            for member in &group.members {
                prop_assert!(seen.insert(*member), "agent in two groups");
            }
            for edge in &group.edges {
                prop_assert!(group.members.contains(edge));
                prop_assert_ne!(*edge, group.leader);
            }
        }
        for deserter in &formation.deserters {
            prop_assert!(seen.insert(*deserter), "deserter also grouped");
        }
        prop_assert_eq!(seen, distinct);
        prop_assert!(formation.groups.len() <= config.max_leaders);
    }

    #[test]
    fn leaders_keep_their_spacing(candidates in layout(), config in config(), tick in 0_u64..10_000) {
        let positions = elected_positions(&candidates);
        let formation = form_groups(candidates, &config, tick);
        let leaders: Vec<Vec3> = formation
            .groups
            .iter()
            .filter_map(|g| positions.get(&g.leader).copied())
            .collect();
        for (i, a) in leaders.iter().enumerate() {
            for b in leaders.iter().skip(i + 1) {
                prop_assert!(a.distance_sq(*b) >= config.leader_spacing_sq());
            }
        }
    }

    #[test]
    fn same_tick_same_groups(candidates in layout(), tick in 0_u64..10_000) {
        let config = GroupConfig::default();
        let mut reversed = candidates.clone();
        reversed.reverse();
        prop_assert_eq!(form_groups(candidates, &config, tick), form_groups(reversed, &config, tick));
    }
}

#[test]
fn repeated_id_is_placed_at_its_lowest_position() {
    let config = GroupConfig {
        scan_cooldown: 40,
        group_radius: 4.0,
        leader_spacing_multiplier: 1.0,
        max_leaders: 2,
        max_group_size: 1,
        num_edge_sectors: 1,
        edge_mobs_per_sector: 0,
    };
    let twice = AgentId::from_u128(0x0d);
    let other = AgentId::from_u128(0x01);
    let candidates = vec![
        Candidate::new(twice, Vec3::new(0.0, 64.0, 0.0)),
        Candidate::new(other, Vec3::new(0.0, 64.0, 0.0)),
        Candidate::new(twice, Vec3::new(0.0, 64.0, -58.43)),
    ];
    let formation = form_groups(candidates, &config, 0);

    // the far copy of 0x0d is the one formed, so both agents lead
    let leaders: BTreeSet<AgentId> = formation.groups.iter().map(|g| g.leader).collect();
    assert_eq!(leaders, BTreeSet::from([twice, other]));
    assert!(formation.deserters.is_empty());
}

#[test]
fn coordinator_answers_match_the_formation() {
    let world = WorldKey::new("overworld");
    let candidates: Vec<Candidate> = (0..12_u32)
        .map(|n| {
            let x = f64::from(n % 4) * 3.0 + f64::from(n / 4) * 40.0;
            Candidate::new(AgentId::from_u128(u128::from(n)), Vec3::new(x, 64.0, 0.0))
        })
        .collect();
    let coordinator = GroupCoordinator::new(GroupConfig::default(), Arc::new(AllAlive));
    let snapshot = coordinator.regroup(&world, 500, &candidates).unwrap();
    assert_eq!(snapshot.candidates, 12);
    assert_eq!(
        snapshot.leaders + snapshot.followers + snapshot.deserters,
        snapshot.candidates
    );

    for candidate in &candidates {
        let leader = coordinator.get_leader(candidate.id);
        if coordinator.is_deserter(candidate.id) {
            assert_eq!(leader, candidate.id);
        } else {
            assert!(coordinator.is_leader(leader));
            assert!(coordinator.members(leader).contains(&candidate.id));
        }
    }
}
