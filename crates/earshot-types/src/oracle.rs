//! Liveness of agents referenced by identity.
//!
//! Leaders, raid owners and relay senders are held as plain [`AgentId`]s.
//! Before acting on one, the core asks an [`AgentOracle`] whether the agent
//! still exists; a dead reference reads as absent.

use std::collections::BTreeSet;

use crate::ids::AgentId;

/// Answers "is this agent still live".
pub trait AgentOracle: Send + Sync {
    /// Whether `agent` is still present and alive.
    fn is_alive(&self, agent: AgentId) -> bool;
}

impl<F> AgentOracle for F
where
    F: Fn(AgentId) -> bool + Send + Sync,
{
    fn is_alive(&self, agent: AgentId) -> bool {
        self(agent)
    }
}

/// Oracle that treats every agent as live.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllAlive;

impl AgentOracle for AllAlive {
    fn is_alive(&self, _agent: AgentId) -> bool {
        true
    }
}

impl AgentOracle for BTreeSet<AgentId> {
    fn is_alive(&self, agent: AgentId) -> bool {
        self.contains(&agent)
    }
}
