//! Group coordination for Earshot agents.
//!
//! Agents near each other organize into leader/follower groups so they do
//! not all chase the same sound. Every re-grouping pass elects leaders,
//! assigns followers first-fit by leader order, picks scouts on each
//! group's rim, and marks the rest as deserters. Followers relay what they
//! hear to their leader through rate-limited inboxes.
//!
//! # Modules
//!
//! - [`coordinator`] -- `GroupCoordinator`: re-grouping, role lookups, relays
//! - [`formation`] -- The pure election/assignment/scout pass
//! - [`relay`] -- Relay records, digests and rate-limit constants
//! - [`provider`] -- `CandidateProvider` and `Candidate`
//! - [`config`] -- `GroupConfig`

pub mod config;
pub mod coordinator;
pub mod formation;
pub mod provider;
pub mod relay;

pub use config::GroupConfig;
pub use coordinator::{GroupCoordinator, GroupSnapshot};
pub use formation::{Formation, Group, form_groups};
pub use provider::{Candidate, CandidateProvider};
pub use relay::{RELAY_INTERVAL, RELAY_TTL, Relay, RelayDigest, RelayOutcome};
