//! Sandbox population: wandering agents that make noise, listen, relay
//! what they hear and raid.
//!
//! The population doubles as the candidate provider for re-grouping and
//! the liveness oracle every subsystem consults. Subsystem calls can come
//! back into the oracle, so no method here queries a subsystem while it
//! holds the population lock: agents are snapshotted, plans are computed
//! lock-free, then applied under the write lock.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use earshot_core::Simulation;
use earshot_groups::{Candidate, CandidateProvider, RelayOutcome};
use earshot_types::{AgentId, AgentOracle, BlockPos, HeardSound, SoundId, Vec3, WorldKey};
use rand::rngs::SmallRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::arena::{ARENA_HALF, FLOOR_Y};

/// Game sounds the population can cause.
const GAME_SOUNDS: &[&str] = &[
    "block.glass.break",
    "block.wooden_door.break",
    "block.stone.break",
    "entity.player.hurt",
    "entity.generic.explode",
];

/// Agent kinds, matched against listener profiles.
const KINDS: &[&str] = &["zombie", "skeleton", "husk"];

const NOISE_CHANCE: f64 = 0.02;
const VOICE_CHANCE: f64 = 0.01;
const DEATH_CHANCE: f64 = 0.0005;

/// Leaders raid anything at least this salient.
const RAID_WEIGHT: f64 = 1.5;
const ARRIVAL_SQ: f64 = 4.0;
const WALK_SPEED: f64 = 0.8;
const JITTER: f64 = 0.5;

#[derive(Debug, Clone)]
struct Agent {
    id: AgentId,
    kind: &'static str,
    world: WorldKey,
    pos: Vec3,
}

impl Agent {
    fn random(rng: &mut SmallRng, world: &WorldKey) -> Self {
        let half = f64::from(ARENA_HALF);
        let head = f64::from(FLOOR_Y.saturating_add(1)) + 0.5;
        Self {
            id: AgentId::from_u128(rng.random()),
            kind: KINDS.choose(rng).copied().unwrap_or("zombie"),
            world: world.clone(),
            pos: Vec3::new(rng.random_range(-half..half), head, rng.random_range(-half..half)),
        }
    }
}

#[derive(Debug)]
struct Population {
    agents: BTreeMap<AgentId, Agent>,
    rng: SmallRng,
}

/// Agent activity during one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Activity {
    /// Sounds registered.
    pub sounds: usize,
    /// Agents that heard something.
    pub heard: usize,
    /// Relays delivered to leaders.
    pub relayed: usize,
    /// Raids scheduled.
    pub raids_scheduled: usize,
    /// Raids that reached their target.
    pub arrivals: usize,
    /// Agents that died and were replaced.
    pub deaths: usize,
}

/// Where an agent heads this tick.
enum Plan {
    Raid(Vec3),
    Follow(Vec3),
    Roam,
}

/// A noise one agent makes this tick.
enum Noise {
    Game(SoundId),
    Voice,
}

/// Seeded population of wandering agents.
#[derive(Debug)]
pub struct Sandbox {
    population: RwLock<Population>,
}

impl Sandbox {
    /// Spawn `per_world` agents at random spots in each world.
    pub fn spawn(worlds: &[WorldKey], per_world: u32, seed: u64) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut agents = BTreeMap::new();
        for world in worlds {
            for _ in 0..per_world {
                let agent = Agent::random(&mut rng, world);
                agents.insert(agent.id, agent);
            }
        }
        info!(agents = agents.len(), seed, "Sandbox population spawned");
        Self {
            population: RwLock::new(Population { agents, rng }),
        }
    }

    /// Number of live agents.
    pub fn len(&self) -> usize {
        self.read_population().agents.len()
    }

    /// Whether every agent is gone.
    pub fn is_empty(&self) -> bool {
        self.read_population().agents.is_empty()
    }

    /// Move every agent: raiders toward their target, followers toward
    /// their leader, everyone with a little jitter. Raids whose leader
    /// reached the target are cleared. Returns the number of arrivals.
    pub fn wander(&self, sim: &Simulation) -> usize {
        let agents = self.snapshot();
        let positions: BTreeMap<AgentId, Vec3> = agents.iter().map(|a| (a.id, a.pos)).collect();
        let raids = sim.raids();
        let groups = sim.groups();

        let mut arrivals = 0_usize;
        let mut plans = BTreeMap::new();
        for agent in &agents {
            let raid_target = if raids.is_advancing(&agent.world, agent.id) {
                raids.target(&agent.world, agent.id)
            } else {
                None
            };
            let plan = if let Some(target) = raid_target {
                let goal = target.center();
                if agent.pos.distance_sq(goal) <= ARRIVAL_SQ {
                    raids.clear(&agent.world, agent.id);
                    arrivals = arrivals.saturating_add(1);
                    info!(world = %agent.world, leader = %agent.id, %target, "Raid reached its target");
                    Plan::Roam
                } else {
                    Plan::Raid(goal)
                }
            } else {
                let leader = groups.get_leader(agent.id);
                match positions.get(&leader) {
                    Some(pos) if leader != agent.id => Plan::Follow(*pos),
                    _ => Plan::Roam,
                }
            };
            plans.insert(agent.id, plan);
        }

        let mut population = self.write_population();
        let Population { agents, rng } = &mut *population;
        for agent in agents.values_mut() {
            agent.pos = match plans.get(&agent.id) {
                Some(Plan::Raid(goal)) => step_toward(agent.pos, *goal, WALK_SPEED),
                Some(Plan::Follow(leader)) => jitter(step_toward(agent.pos, *leader, WALK_SPEED * 0.5), rng),
                Some(Plan::Roam) | None => jitter(agent.pos, rng),
            };
        }
        arrivals
    }

    /// Let some agents make noise. Returns the number of sounds the
    /// registry accepted.
    pub fn make_noise(&self, sim: &Simulation) -> usize {
        let noises: Vec<(Noise, AgentId, WorldKey, BlockPos)> = {
            let mut population = self.write_population();
            let Population { agents, rng } = &mut *population;
            let mut noises = Vec::new();
            for agent in agents.values() {
                if rng.random_bool(NOISE_CHANCE)
                    && let Some(raw) = GAME_SOUNDS.choose(rng)
                {
                    match SoundId::parse(raw) {
                        Ok(id) => noises.push((Noise::Game(id), agent.id, agent.world.clone(), agent.pos.block())),
                        Err(err) => warn!(sound = raw, %err, "Skipping unparseable sound identifier"),
                    }
                } else if rng.random_bool(VOICE_CHANCE) {
                    noises.push((Noise::Voice, agent.id, agent.world.clone(), agent.pos.block()));
                }
            }
            noises
        };

        let sounds = sim.sounds();
        let mut accepted = 0_usize;
        for (noise, agent, world, pos) in noises {
            let outcome = match noise {
                Noise::Game(id) => sounds.register_sound_event(id, pos, world, Some(agent), None, None),
                Noise::Voice => sounds.register_virtual(pos, world, Some(agent), Some("ambient".to_owned())),
            };
            if outcome.is_accepted() {
                accepted = accepted.saturating_add(1);
            }
        }
        accepted
    }

    /// Every agent listens. Followers relay what they hear to their
    /// leader; leaders escalate salient sounds, their own or relayed, to
    /// raids.
    pub fn listen(&self, sim: &Simulation) -> Activity {
        let agents = self.snapshot();
        let settings = sim.sounds().settings();
        let groups = sim.groups();
        let raids = sim.raids();
        let now = sim.tick();

        let mut activity = Activity::default();
        let mut direct: BTreeMap<AgentId, HeardSound> = BTreeMap::new();
        for agent in &agents {
            let profile = settings.profiles.resolve(agent.kind, &json!({ "kind": agent.kind }));
            let Some(heard) = sim.sounds().find_nearest(profile.as_deref(), &agent.world, agent.pos.block()) else {
                continue;
            };
            activity.heard = activity.heard.saturating_add(1);
            if groups.is_leader(agent.id) {
                direct.insert(agent.id, heard);
            } else if !groups.is_deserter(agent.id)
                && groups.relay(agent.id, heard.pos, heard.range, heard.weight, now) == RelayOutcome::Delivered
            {
                activity.relayed = activity.relayed.saturating_add(1);
            }
        }

        for agent in agents.iter().filter(|a| groups.is_leader(a.id)) {
            let relayed = groups
                .consume_relays(agent.id, now)
                .into_iter()
                .map(|r| (r.pos, r.weight));
            let own = direct.get(&agent.id).map(|h| (h.pos, h.weight));
            let Some((target, weight)) = own.into_iter().chain(relayed).max_by(|a, b| a.1.total_cmp(&b.1)) else {
                continue;
            };
            if weight < RAID_WEIGHT
                || raids.is_ticking(&agent.world, agent.id)
                || raids.is_advancing(&agent.world, agent.id)
            {
                continue;
            }
            raids.schedule_raid(&agent.world, agent.id, target, now);
            activity.raids_scheduled = activity.raids_scheduled.saturating_add(1);
        }
        activity
    }

    /// Occasionally kill an agent and spawn a replacement in the same
    /// world. Returns the number of deaths.
    pub fn cull(&self) -> usize {
        let mut population = self.write_population();
        let Population { agents, rng } = &mut *population;
        let dead: Vec<(AgentId, WorldKey)> = agents
            .values()
            .filter(|_| rng.random_bool(DEATH_CHANCE))
            .map(|a| (a.id, a.world.clone()))
            .collect();
        for (id, world) in &dead {
            agents.remove(id);
            let replacement = Agent::random(rng, world);
            debug!(%world, died = %id, spawned = %replacement.id, "Agent replaced");
            agents.insert(replacement.id, replacement);
        }
        dead.len()
    }

    fn snapshot(&self) -> Vec<Agent> {
        self.read_population().agents.values().cloned().collect()
    }

    fn read_population(&self) -> RwLockReadGuard<'_, Population> {
        self.population.read().unwrap_or_else(|poisoned| {
            error!("population lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write_population(&self) -> RwLockWriteGuard<'_, Population> {
        self.population.write().unwrap_or_else(|poisoned| {
            error!("population lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl CandidateProvider for Sandbox {
    fn candidates(&self, world: &WorldKey) -> Vec<Candidate> {
        self.read_population()
            .agents
            .values()
            .filter(|a| &a.world == world)
            .map(|a| Candidate::new(a.id, a.pos))
            .collect()
    }
}

impl AgentOracle for Sandbox {
    fn is_alive(&self, agent: AgentId) -> bool {
        self.read_population().agents.contains_key(&agent)
    }
}

fn step_toward(from: Vec3, goal: Vec3, speed: f64) -> Vec3 {
    let distance = from.distance(goal);
    (goal - from)
        .normalized()
        .map_or(from, |dir| from.offset(dir, speed.min(distance)))
}

fn jitter(pos: Vec3, rng: &mut SmallRng) -> Vec3 {
    let half = f64::from(ARENA_HALF);
    Vec3::new(
        (pos.x + rng.random_range(-JITTER..=JITTER)).clamp(-half, half),
        pos.y,
        (pos.z + rng.random_range(-JITTER..=JITTER)).clamp(-half, half),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use earshot_core::SimulationConfig;
    use earshot_sound::OpenAir;

    use super::*;

    fn worlds() -> Vec<WorldKey> {
        vec![WorldKey::new("overworld"), WorldKey::new("nether")]
    }

    fn ids(sandbox: &Sandbox, world: &WorldKey) -> Vec<AgentId> {
        sandbox.candidates(world).into_iter().map(|c| c.id).collect()
    }

    #[test]
    fn spawn_is_seeded() {
        let a = Sandbox::spawn(&worlds(), 6, 7);
        let b = Sandbox::spawn(&worlds(), 6, 7);
        let c = Sandbox::spawn(&worlds(), 6, 8);
        let overworld = WorldKey::new("overworld");
        assert_eq!(ids(&a, &overworld), ids(&b, &overworld));
        assert_ne!(ids(&a, &overworld), ids(&c, &overworld));
    }

    #[test]
    fn candidates_are_per_world() {
        let sandbox = Sandbox::spawn(&worlds(), 5, 1);
        assert_eq!(sandbox.len(), 10);
        assert_eq!(sandbox.candidates(&WorldKey::new("nether")).len(), 5);
        assert!(sandbox.candidates(&WorldKey::new("end")).is_empty());
    }

    #[test]
    fn oracle_tracks_population() {
        let sandbox = Sandbox::spawn(&worlds(), 3, 1);
        let member = ids(&sandbox, &WorldKey::new("overworld"))[0];
        assert!(sandbox.is_alive(member));
        assert!(!sandbox.is_alive(AgentId::from_u128(0)));
    }

    #[test]
    fn cull_keeps_population_size() {
        let sandbox = Sandbox::spawn(&worlds(), 20, 3);
        for _ in 0..500 {
            sandbox.cull();
        }
        assert_eq!(sandbox.len(), 40);
    }

    #[test]
    fn wandering_stays_inside_the_arena() {
        let sandbox = Arc::new(Sandbox::spawn(&worlds(), 8, 11));
        let config = SimulationConfig::parse("world:\n  worlds: [overworld, nether]\n").unwrap();
        let mut sim =
            Simulation::new(&config, Arc::new(OpenAir), Arc::clone(&sandbox) as Arc<dyn AgentOracle>).unwrap();
        let half = f64::from(ARENA_HALF);
        for _ in 0..50 {
            sim.step(sandbox.as_ref()).unwrap();
            sandbox.wander(&sim);
            sandbox.make_noise(&sim);
            sandbox.listen(&sim);
        }
        for world in worlds() {
            for candidate in sandbox.candidates(&world) {
                assert!(candidate.pos.x.abs() <= half && candidate.pos.z.abs() <= half);
            }
        }
    }

    #[test]
    fn leaders_raid_a_loud_relay() {
        let sandbox = Arc::new(Sandbox::spawn(&[WorldKey::new("overworld")], 6, 5));
        let config = SimulationConfig::parse("groups:\n  group_radius: 64.0\n").unwrap();
        let mut sim =
            Simulation::new(&config, Arc::new(OpenAir), Arc::clone(&sandbox) as Arc<dyn AgentOracle>).unwrap();
        sim.step(sandbox.as_ref()).unwrap();

        let world = WorldKey::new("overworld");
        let id = SoundId::parse("entity.generic.explode").unwrap();
        sim.sounds()
            .register_sound_event(id, BlockPos::new(0, FLOOR_Y, 0), world.clone(), None, Some(256.0), Some(3.0));
        let activity = sandbox.listen(&sim);
        assert_eq!(activity.heard, 6);
        assert_eq!(activity.raids_scheduled, 1);
        let leader = sim.groups().leaders(&world)[0];
        assert_eq!(sim.raids().target(&world, leader), Some(BlockPos::new(0, FLOOR_Y, 0)));
    }

    #[test]
    fn step_toward_never_overshoots() {
        let from = Vec3::new(0.0, 64.0, 0.0);
        let goal = Vec3::new(0.3, 64.0, 0.0);
        let moved = step_toward(from, goal, WALK_SPEED);
        assert!((moved.x - 0.3).abs() < 1e-9);
        assert_eq!(step_toward(goal, goal, WALK_SPEED), goal);
    }
}
