//! Headless scenario runner for crowd benchmarking and CI verification.
//!
//! This crate drives [`horde_core::simulation::CrowdSim`] through scripted
//! scenarios without rendering. It provides:
//!
//! - **Scenarios**: RON files (or built-ins) describing the crowd config,
//!   obstacles, target movement and scripted spawns, fear and kills
//! - **Metrics**: damage, kills, despawns and tick timing per run
//! - **Batches**: one scenario across many seeds in parallel
//! - **Determinism checks**: repeated runs compared by state hash
//!
//! # Example
//!
//! ```bash
//! # Run a built-in scenario
//! cargo run -p horde_headless -- run --scenario courtyard
//!
//! # Run a scenario file
//! cargo run -p horde_headless -- run --scenario crates/horde_headless/scenarios/corridor.ron
//!
//! # Verify determinism
//! cargo run -p horde_headless -- verify --scenario stampede --runs 5
//! ```

pub mod batch;
pub mod metrics;
pub mod runner;
pub mod scenario;

pub use batch::{run_batch, verify_determinism, BatchConfig, BatchResults, DeterminismReport};
pub use metrics::{BatchSummary, MetricsCollector, RunMetrics};
pub use runner::{run_bench, ScenarioRunner};
pub use scenario::{Scenario, ScenarioError, TargetPath};
