//! World clock, configuration, and the step driver for Earshot.
//!
//! This crate wires the sound registry, group coordinator and raid board
//! together behind one clock so every subsystem sees the same tick.
//!
//! # Modules
//!
//! - [`clock`] -- Monotonic tick counter with overflow checking.
//! - [`config`] -- Configuration loading from `earshot-config.yaml` into
//!   strongly-typed structs.
//! - [`step`] -- The per-tick driver: decay, re-grouping, raid countdown.

pub mod clock;
pub mod config;
pub mod step;

pub use clock::{ClockError, WorldClock};
pub use config::{ConfigError, LoggingConfig, SimulationConfig, WorldConfig};
pub use step::{Simulation, StepError, StepSummary};
