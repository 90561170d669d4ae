//! Follower-to-leader relays.
//!
//! A follower that hears something reports it up to its leader. Each
//! leader has an inbox; entries are deduplicated by a rounded content
//! digest and expire after [`RELAY_TTL`] ticks. A follower may relay at
//! most once per [`RELAY_INTERVAL`] ticks.

use std::collections::HashMap;

use earshot_types::{AgentId, BlockPos};
use serde::Serialize;

/// Ticks a relay stays consumable.
pub const RELAY_TTL: u64 = 40;

/// Minimum ticks between two relays from the same agent.
pub const RELAY_INTERVAL: u64 = 20;

/// Rounded content used to spot repeated relays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RelayDigest {
    pos: BlockPos,
    range_tenths: i64,
    weight_hundredths: i64,
}

impl RelayDigest {
    /// Digest of a relay's content. Range is rounded to 0.1, weight to 0.01.
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(pos: BlockPos, range: f64, weight: f64) -> Self {
        // `as` saturates on out-of-range and maps NaN to 0.
        Self {
            pos,
            range_tenths: (range * 10.0).round() as i64,
            weight_hundredths: (weight * 100.0).round() as i64,
        }
    }
}

/// A sound reported by a follower to its leader.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Relay {
    /// Agent that reported it.
    pub from: AgentId,
    /// Where the sound is.
    pub pos: BlockPos,
    /// Range as heard by the reporter.
    pub range: f64,
    /// Weight as heard by the reporter.
    pub weight: f64,
    /// Tick the relay was made.
    pub timestamp: u64,
    /// Content digest.
    pub digest: RelayDigest,
}

impl Relay {
    /// Whether the relay is past its lifetime at `now`.
    pub const fn is_expired(&self, now: u64) -> bool {
        now.saturating_sub(self.timestamp) > RELAY_TTL
    }
}

/// What happened to a relay request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayOutcome {
    /// Appended to the leader's inbox.
    Delivered,
    /// The agent leads itself; there is nobody to relay to.
    NoLeader,
    /// The agent relayed too recently.
    RateLimited,
    /// The leader's inbox already holds the same content.
    Duplicate,
}

/// Inboxes and per-agent rate-limit stamps.
#[derive(Debug, Default)]
pub(crate) struct RelayBoard {
    inboxes: HashMap<AgentId, Vec<Relay>>,
    last_relay: HashMap<AgentId, u64>,
}

impl RelayBoard {
    /// Rate-limit, dedup and append.
    ///
    /// The rate-limit stamp is taken as soon as the limit passes, so a
    /// follower that repeats itself still waits out the interval.
    pub(crate) fn post(&mut self, leader: AgentId, relay: Relay) -> RelayOutcome {
        if let Some(last) = self.last_relay.get(&relay.from)
            && relay.timestamp.saturating_sub(*last) < RELAY_INTERVAL
        {
            return RelayOutcome::RateLimited;
        }
        self.last_relay.insert(relay.from, relay.timestamp);

        let now = relay.timestamp;
        let inbox = self.inboxes.entry(leader).or_default();
        inbox.retain(|r| !r.is_expired(now));
        if inbox.iter().any(|r| r.digest == relay.digest) {
            return RelayOutcome::Duplicate;
        }
        inbox.push(relay);
        RelayOutcome::Delivered
    }

    /// Drain a leader's inbox, dropping expired entries.
    pub(crate) fn drain(&mut self, leader: AgentId, now: u64) -> Vec<Relay> {
        let mut relays = self.inboxes.remove(&leader).unwrap_or_default();
        relays.retain(|r| !r.is_expired(now));
        relays
    }

    /// Drop inboxes of agents that are not live leaders and stamps of
    /// agents that are not live.
    pub(crate) fn prune(&mut self, keep_inbox: impl Fn(AgentId) -> bool, keep_stamp: impl Fn(AgentId) -> bool) {
        self.inboxes.retain(|leader, _| keep_inbox(*leader));
        self.last_relay.retain(|agent, _| keep_stamp(*agent));
    }

    /// Number of pending relays across all inboxes.
    pub(crate) fn pending(&self) -> usize {
        self.inboxes.values().map(Vec::len).sum()
    }
}
