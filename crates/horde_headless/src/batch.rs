//! Batch scenario runner.
//!
//! Runs one scenario across many seeds in parallel using rayon and
//! aggregates the per-run metrics.

use crate::metrics::{BatchSummary, RunMetrics};
use crate::runner::ScenarioRunner;
use crate::scenario::{Scenario, ScenarioError};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Configuration for a batch run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Built-in scenario name or RON file path
    pub scenario: String,
    /// Number of seeds to run
    pub run_count: u32,
    /// Maximum parallel runs (0 = use rayon default)
    pub parallel_runs: u32,
    /// Output directory for results
    pub output_dir: PathBuf,
    /// Starting seed; run `i` uses `seed_start + i`
    pub seed_start: u64,
    /// Ticks per run, overriding the scenario's own limit
    pub max_ticks: Option<u64>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            scenario: "open_field".to_string(),
            run_count: 16,
            parallel_runs: 0,
            output_dir: PathBuf::from("results"),
            seed_start: 0,
            max_ticks: None,
        }
    }
}

impl BatchConfig {
    /// Create config for a specific scenario
    pub fn new(scenario: &str, run_count: u32) -> Self {
        Self {
            scenario: scenario.to_string(),
            run_count,
            ..Default::default()
        }
    }

    /// Set output directory
    pub fn with_output(mut self, dir: PathBuf) -> Self {
        self.output_dir = dir;
        self
    }

    /// Set seed start
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Override ticks per run
    pub fn with_max_ticks(mut self, ticks: u64) -> Self {
        self.max_ticks = Some(ticks);
        self
    }
}

/// Results from a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used
    pub config: BatchConfig,
    /// Individual run metrics, in seed order
    pub runs: Vec<RunMetrics>,
    /// Aggregate summary
    pub summary: BatchSummary,
    /// Total runtime
    pub duration_seconds: f64,
    /// Errors encountered
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to JSON file
    pub fn save(&self, path: &std::path::Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from JSON file
    pub fn load(path: &std::path::Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// Error during batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    /// Run index
    pub run_index: u32,
    /// Seed used
    pub seed: u64,
    /// Error message
    pub message: String,
}

/// Progress tracking for batch runs
#[derive(Debug)]
pub struct BatchProgress {
    /// Total runs
    pub total: u32,
    completed: AtomicU32,
    start_time: Instant,
}

impl BatchProgress {
    /// Create new progress tracker
    pub fn new(total: u32) -> Self {
        Self {
            total,
            completed: AtomicU32::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a completed run; returns the new completion count
    pub fn record_completion(&self) -> u32 {
        self.completed.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Get current completion count
    pub fn current(&self) -> u32 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Get completion percentage
    pub fn percentage(&self) -> f64 {
        self.current() as f64 / self.total.max(1) as f64 * 100.0
    }

    /// Get estimated time remaining
    pub fn eta(&self) -> Duration {
        let completed = self.current();
        if completed == 0 {
            return Duration::from_secs(0);
        }

        let elapsed = self.start_time.elapsed();
        let per_run = elapsed.as_secs_f64() / completed as f64;
        let remaining = self.total.saturating_sub(completed);
        Duration::from_secs_f64(per_run * remaining as f64)
    }
}

/// Run one seed of `scenario`.
fn run_single(
    scenario: &Scenario,
    seed: u64,
    max_ticks: Option<u64>,
) -> Result<RunMetrics, ScenarioError> {
    let mut scenario = scenario.clone().with_seed(seed);
    if let Some(ticks) = max_ticks {
        scenario.max_ticks = ticks;
    }
    Ok(ScenarioRunner::new(scenario)?.run())
}

/// Run a batch of seeds
pub fn run_batch(config: BatchConfig) -> Result<BatchResults, ScenarioError> {
    let scenario = Scenario::resolve(&config.scenario)?;
    let start = Instant::now();
    let progress = BatchProgress::new(config.run_count);

    info!(
        "Starting batch run: {} seeds of '{}'",
        config.run_count, scenario.name
    );

    // Configure thread pool if specified
    if config.parallel_runs > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_runs as usize)
            .build_global()
            .ok(); // Ignore if already set
    }

    let results: Vec<Result<RunMetrics, BatchError>> = (0..config.run_count)
        .into_par_iter()
        .map(|i| {
            let seed = config.seed_start.wrapping_add(u64::from(i));
            match run_single(&scenario, seed, config.max_ticks) {
                Ok(metrics) => {
                    let completed = progress.record_completion();
                    if completed % 10 == 0 {
                        debug!(
                            "Progress: {}/{} ({:.0}%, eta {:.1}s)",
                            completed,
                            config.run_count,
                            progress.percentage(),
                            progress.eta().as_secs_f64()
                        );
                    }
                    Ok(metrics)
                }
                Err(e) => {
                    warn!("Run {} failed: {}", i, e);
                    Err(BatchError {
                        run_index: i,
                        seed,
                        message: e.to_string(),
                    })
                }
            }
        })
        .collect();

    let (runs, errors): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
    let runs: Vec<RunMetrics> = runs.into_iter().filter_map(Result::ok).collect();
    let errors: Vec<BatchError> = errors.into_iter().filter_map(Result::err).collect();

    let summary = BatchSummary::from_runs(&runs);
    let duration_seconds = start.elapsed().as_secs_f64();

    info!(
        "Batch complete: {} runs in {:.1}s ({:.1} runs/sec)",
        runs.len(),
        duration_seconds,
        runs.len() as f64 / duration_seconds
    );

    Ok(BatchResults {
        config,
        runs,
        summary,
        duration_seconds,
        errors,
    })
}

/// Outcome of a repeated-seed determinism check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterminismReport {
    /// Whether every run matched the first.
    pub is_deterministic: bool,
    /// Final state hash of each run.
    pub hashes: Vec<u64>,
}

/// Verify determinism by running the same seed multiple times
pub fn verify_determinism(
    scenario: &Scenario,
    runs: u32,
    max_ticks: Option<u64>,
) -> Result<DeterminismReport, ScenarioError> {
    let seed = scenario.crowd.seed;
    let results = (0..runs.max(1))
        .map(|_| run_single(scenario, seed, max_ticks))
        .collect::<Result<Vec<_>, _>>()?;

    // All runs should match the first on every counter and the final hash
    let first = &results[0];
    let is_deterministic = results.iter().all(|r| {
        r.final_state_hash == first.final_state_hash
            && r.total_damage == first.total_damage
            && r.kills == first.kills
            && r.despawns == first.despawns
            && r.final_alive == first.final_alive
    });

    Ok(DeterminismReport {
        is_deterministic,
        hashes: results.iter().map(|r| r.final_state_hash).collect(),
    })
}
