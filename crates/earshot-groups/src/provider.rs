//! Candidate agents fed into re-grouping.

use earshot_types::{AgentId, Vec3, WorldKey};
use serde::{Deserialize, Serialize};

/// An attractable agent and where it stands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Agent identity.
    pub id: AgentId,
    /// Current position.
    pub pos: Vec3,
}

impl Candidate {
    /// Build a candidate.
    pub const fn new(id: AgentId, pos: Vec3) -> Self {
        Self { id, pos }
    }
}

/// Supplies the attractable agents within simulation range of any
/// observer in a world instance.
///
/// Results may contain the same agent more than once and may come back in
/// any order; re-grouping normalizes both.
pub trait CandidateProvider {
    /// Attractable agents in `world`.
    fn candidates(&self, world: &WorldKey) -> Vec<Candidate>;
}

impl CandidateProvider for [Candidate] {
    fn candidates(&self, _world: &WorldKey) -> Vec<Candidate> {
        self.to_vec()
    }
}

impl CandidateProvider for Vec<Candidate> {
    fn candidates(&self, _world: &WorldKey) -> Vec<Candidate> {
        self.clone()
    }
}
