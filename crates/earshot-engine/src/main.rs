//! Sandbox engine for Earshot.
//!
//! Wires the sound registry, group coordinator and raid board to a small
//! voxel arena and a seeded population of wandering agents, then runs the
//! tick loop until the tick limit or Ctrl-C.
//!
//! # Startup Sequence
//!
//! 1. Load configuration (`argv[1]`, then `EARSHOT_CONFIG`, then
//!    `earshot-config.yaml`, then defaults)
//! 2. Initialize structured logging (tracing)
//! 3. Build the arena geometry for every world instance
//! 4. Spawn the sandbox population
//! 5. Assemble the simulation
//! 6. Run the tick loop
//! 7. Log the result

mod arena;
mod error;
mod sandbox;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use earshot_core::{LoggingConfig, Simulation, SimulationConfig, StepSummary};
use earshot_sound::{Geometry, VoxelGeometry};
use earshot_types::AgentOracle;
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::sandbox::{Activity, Sandbox};

const DEFAULT_CONFIG_PATH: &str = "earshot-config.yaml";

/// Why the tick loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndReason {
    MaxTicksReached,
    Interrupted,
}

/// One tick's simulation summary plus what the agents did.
#[derive(Debug, Clone, Serialize)]
struct TickReport {
    step: StepSummary,
    activity: Activity,
}

/// Result of the run.
#[derive(Debug)]
struct RunResult {
    end_reason: EndReason,
    final_report: Option<TickReport>,
    total_ticks: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load configuration.
    let (config, source) = load_config().context("loading configuration")?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!("earshot-engine starting");
    match &source {
        Some(path) => info!(path = %path.display(), "Configuration loaded"),
        None => info!("Config file not found, using defaults"),
    }
    info!(
        world_name = config.world.name,
        seed = config.world.seed,
        tick_interval_ms = config.world.tick_interval_ms,
        max_ticks = config.world.max_ticks,
        "World settings"
    );

    // 3. Build the arena.
    let geometry = Arc::new(VoxelGeometry::new());
    let worlds = config.world_keys();
    for world in &worlds {
        arena::build(&geometry, world);
    }

    // 4. Spawn agents.
    let sandbox = Arc::new(Sandbox::spawn(&worlds, config.world.agents_per_world, config.world.seed));

    // 5. Assemble the simulation.
    let mut sim = Simulation::new(
        &config,
        geometry as Arc<dyn Geometry>,
        Arc::clone(&sandbox) as Arc<dyn AgentOracle>,
    )
    .map_err(EngineError::from)?;

    // 6. Run.
    let result = run(&mut sim, &sandbox, &config).await?;

    // 7. Log results.
    if let Some(report) = &result.final_report {
        match serde_json::to_string(report) {
            Ok(json) => info!(report = %json, "Final tick report"),
            Err(err) => warn!(%err, "Failed to serialize final tick report"),
        }
    }
    info!(
        end_reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        agents = sandbox.len(),
        "earshot-engine shutdown complete"
    );
    Ok(())
}

/// Tick loop: step the simulation, then let the agents act, until the
/// tick limit or Ctrl-C.
async fn run(sim: &mut Simulation, sandbox: &Sandbox, config: &SimulationConfig) -> Result<RunResult, EngineError> {
    let mut interval = tokio::time::interval(Duration::from_millis(config.world.tick_interval_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let max_ticks = config.world.max_ticks;
    let summary_every = config.logging.summary_interval_ticks;
    let mut final_report = None;
    let mut total_ticks: u64 = 0;

    info!(max_ticks, worlds = sim.worlds().len(), agents = sandbox.len(), "Entering tick loop");
    let end_reason = loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!(tick = sim.tick(), "Interrupted");
                break EndReason::Interrupted;
            }
            _ = interval.tick() => {}
        }

        let report = run_tick(sim, sandbox)?;
        total_ticks = total_ticks.saturating_add(1);
        let tick = report.step.tick;

        if sim.is_every(summary_every) {
            log_report(&report);
        }
        final_report = Some(report);

        if max_ticks > 0 && tick >= max_ticks {
            info!(tick, max_ticks, "Tick limit reached");
            break EndReason::MaxTicksReached;
        }
    };

    Ok(RunResult {
        end_reason,
        final_report,
        total_ticks,
    })
}

/// One tick: advance the subsystems, then move, make noise, listen, and
/// replace the dead.
fn run_tick(sim: &mut Simulation, sandbox: &Sandbox) -> Result<TickReport, EngineError> {
    let step = sim.step(sandbox)?;
    let arrivals = sandbox.wander(sim);
    let sounds = sandbox.make_noise(sim);
    let heard = sandbox.listen(sim);
    let deaths = sandbox.cull();
    Ok(TickReport {
        step,
        activity: Activity {
            sounds,
            arrivals,
            deaths,
            ..heard
        },
    })
}

fn log_report(report: &TickReport) {
    let step = &report.step;
    let activity = &report.activity;
    info!(
        tick = step.tick,
        resident = step.registry.resident,
        overflow = step.registry.overflow,
        cached = step.registry.cached,
        expired = step.expired,
        regrouped = step.regrouped.len(),
        raids_ticking = step.raids.ticking,
        raids_advanced = step.raids.advanced,
        pending_relays = step.pending_relays,
        sounds = activity.sounds,
        heard = activity.heard,
        relayed = activity.relayed,
        raids_scheduled = activity.raids_scheduled,
        arrivals = activity.arrivals,
        deaths = activity.deaths,
        "Tick summary"
    );
}

/// Initialize the tracing subscriber from the logging section.
///
/// An unparseable level falls back to `info`.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Load the configuration and report which file it came from.
///
/// An explicit path (argument or `EARSHOT_CONFIG`) must exist; the default
/// path is optional.
fn load_config() -> Result<(SimulationConfig, Option<PathBuf>), EngineError> {
    let explicit = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("EARSHOT_CONFIG").ok())
        .map(PathBuf::from);
    let path = match explicit {
        Some(path) => path,
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            if !default.exists() {
                return Ok((SimulationConfig::default(), None));
            }
            default
        }
    };
    let config = SimulationConfig::from_file(&path)?;
    config.validate()?;
    Ok((config, Some(path)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bounded_by_max_ticks() {
        let config = SimulationConfig::parse(
            "world:\n  tick_interval_ms: 1\n  max_ticks: 25\n  agents_per_world: 6\nlogging:\n  summary_interval_ticks: 10\n",
        )
        .unwrap();
        let geometry = Arc::new(VoxelGeometry::new());
        let worlds = config.world_keys();
        for world in &worlds {
            arena::build(&geometry, world);
        }
        let sandbox = Arc::new(Sandbox::spawn(&worlds, config.world.agents_per_world, config.world.seed));
        let mut sim = Simulation::new(
            &config,
            geometry as Arc<dyn Geometry>,
            Arc::clone(&sandbox) as Arc<dyn AgentOracle>,
        )
        .unwrap();

        let result = run(&mut sim, &sandbox, &config).await.unwrap();
        assert_eq!(result.end_reason, EndReason::MaxTicksReached);
        assert_eq!(result.total_ticks, 25);
        assert_eq!(result.final_report.unwrap().step.tick, 25);
        assert_eq!(sandbox.len(), 6);
    }
}
