//! Raid escalation for Earshot leaders.
//!
//! When a scout spots something worth a coordinated response, its leader
//! schedules a raid on the target. The raid counts down once per step,
//! then advances until external goal logic clears it.
//!
//! # Modules
//!
//! - [`board`] -- `RaidBoard`: scheduling, countdown, liveness sweep
//! - [`config`] -- `RaidConfig`

pub mod board;
pub mod config;

pub use board::{RaidBoard, RaidPhase, RaidRecord, RaidTick};
pub use config::RaidConfig;
