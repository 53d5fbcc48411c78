//! Headless crowd scenario runner.
//!
//! Runs scenarios without rendering for benchmarking, determinism checks
//! and CI.
//!
//! # Usage
//!
//! ```bash
//! # Run one scenario and write its metrics
//! cargo run -p horde_headless -- run --scenario courtyard --output metrics.json
//!
//! # Check that a scenario replays identically
//! cargo run -p horde_headless -- verify --scenario stampede --runs 5
//!
//! # Run many seeds in parallel
//! cargo run -p horde_headless -- batch --scenario open_field --seeds 64 --output results/
//!
//! # Measure tick cost
//! cargo run -p horde_headless --release -- bench --agents 20000 --ticks 600
//! ```
//!
//! Logs go to stderr; `RUST_LOG` overrides the level chosen by `--verbose`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use horde_headless::{
    batch::{run_batch, verify_determinism, BatchConfig},
    metrics::RunMetrics,
    runner::{run_bench, ScenarioRunner},
    scenario::Scenario,
};

#[derive(Parser)]
#[command(name = "horde_headless")]
#[command(about = "Headless crowd scenario runner for benchmarking and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single scenario
    Run {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "open_field")]
        scenario: String,

        /// Override the scenario's tick count
        #[arg(short, long)]
        ticks: Option<u64>,

        /// Override the scenario's seed
        #[arg(long)]
        seed: Option<u64>,

        /// Write metrics JSON here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify determinism by running the same seed multiple times
    Verify {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "open_field")]
        scenario: String,

        /// Number of verification runs
        #[arg(short, long, default_value = "3")]
        runs: u32,

        /// Override the scenario's tick count
        #[arg(short, long)]
        ticks: Option<u64>,
    },

    /// Run one scenario across many seeds
    Batch {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "open_field")]
        scenario: String,

        /// Number of seeds to run
        #[arg(long, default_value = "16")]
        seeds: u32,

        /// Maximum parallel runs (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Starting seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Override the scenario's tick count
        #[arg(short, long)]
        ticks: Option<u64>,
    },

    /// Measure tick cost on an open field
    Bench {
        /// Agents spawned at tick zero
        #[arg(short, long, default_value = "20000")]
        agents: usize,

        /// Number of ticks to run
        #[arg(short, long, default_value = "600")]
        ticks: u64,

        /// Spawn seed
        #[arg(long, default_value = "1")]
        seed: u64,
    },

    /// List built-in scenarios
    List,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for JSON output)
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    match cli.command {
        Commands::Run {
            scenario,
            ticks,
            seed,
            output,
        } => cmd_run(&scenario, ticks, seed, output),
        Commands::Verify {
            scenario,
            runs,
            ticks,
        } => cmd_verify(&scenario, runs, ticks),
        Commands::Batch {
            scenario,
            seeds,
            parallel,
            output,
            seed,
            ticks,
        } => cmd_batch(scenario, seeds, parallel, output, seed, ticks),
        Commands::Bench {
            agents,
            ticks,
            seed,
        } => cmd_bench(agents, ticks, seed),
        Commands::List => cmd_list(),
    }
}

/// Resolve a scenario or exit.
fn load_scenario(name: &str) -> Scenario {
    match Scenario::resolve(name) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to load scenario '{name}': {e}");
            std::process::exit(1);
        }
    }
}

/// Print metrics as pretty JSON to stdout, or to `output` when given.
fn emit_metrics(metrics: &RunMetrics, output: Option<PathBuf>) {
    let json = match serde_json::to_string_pretty(metrics) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("FATAL: Failed to serialize metrics: {e}");
            std::process::exit(1);
        }
    };
    match output {
        Some(path) => {
            if let Err(e) = std::fs::write(&path, json) {
                tracing::error!(error = %e, path = %path.display(), "Failed to write metrics");
                eprintln!("FATAL: Failed to write metrics: {e}");
                std::process::exit(1);
            }
            eprintln!("Metrics written to: {}", path.display());
        }
        None => println!("{json}"),
    }
}

/// Run a single scenario
fn cmd_run(name: &str, ticks: Option<u64>, seed: Option<u64>, output: Option<PathBuf>) {
    let mut scenario = load_scenario(name);
    if let Some(ticks) = ticks {
        scenario.max_ticks = ticks;
    }
    if let Some(seed) = seed {
        scenario = scenario.with_seed(seed);
    }

    tracing::info!(
        scenario = %scenario.name,
        seed = scenario.crowd.seed,
        max_ticks = scenario.max_ticks,
        "Starting run"
    );

    let runner = match ScenarioRunner::new(scenario) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Invalid scenario: {e}");
            std::process::exit(1);
        }
    };
    let metrics = runner.run();

    eprintln!("\n{}", "=".repeat(50));
    eprintln!("RUN COMPLETE: {}", metrics.scenario);
    eprintln!("{}", "=".repeat(50));
    eprintln!("Ticks:         {}", metrics.ticks);
    eprintln!("Touch damage:  {}", metrics.total_damage);
    eprintln!("Kills:         {}", metrics.kills);
    eprintln!("Despawns:      {}", metrics.despawns);
    eprintln!("Peak alive:    {}", metrics.peak_alive);
    eprintln!("Flow rebuilds: {}", metrics.flow_rebuilds);
    eprintln!(
        "Tick time:     {:.1}us mean, {:.1}us p99",
        metrics.mean_tick_us, metrics.p99_tick_us
    );
    eprintln!("State hash:    {:016x}", metrics.final_state_hash);

    emit_metrics(&metrics, output);
}

/// Verify determinism by running same seed multiple times
fn cmd_verify(name: &str, runs: u32, ticks: Option<u64>) {
    let scenario = load_scenario(name);
    tracing::info!(
        "Verifying determinism: {} with seed {} ({} runs)",
        scenario.name,
        scenario.crowd.seed,
        runs
    );

    let report = match verify_determinism(&scenario, runs, ticks) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Invalid scenario: {e}");
            std::process::exit(1);
        }
    };

    if report.is_deterministic {
        eprintln!("PASS: All {runs} runs produced identical results");
        eprintln!("  State hash: {:016x}", report.hashes[0]);
    } else {
        eprintln!("FAIL: Non-determinism detected!");
        for (i, hash) in report.hashes.iter().enumerate() {
            eprintln!("  Run {i}: {hash:016x}");
        }
        std::process::exit(1);
    }
}

/// Run one scenario across many seeds
fn cmd_batch(
    scenario: String,
    seeds: u32,
    parallel: u32,
    output: PathBuf,
    seed: u64,
    ticks: Option<u64>,
) {
    let num_cpus = std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1);

    tracing::info!(
        scenario = %scenario,
        seeds,
        parallel,
        seed,
        output = %output.display(),
        cpus_available = num_cpus,
        max_ticks = ?ticks,
        "Batch configuration"
    );

    // Ensure output directory exists
    if let Err(e) = std::fs::create_dir_all(&output) {
        tracing::error!(error = %e, path = %output.display(), "Failed to create output directory");
        eprintln!(
            "FATAL: Cannot create output directory '{}': {}",
            output.display(),
            e
        );
        std::process::exit(1);
    }

    let config = BatchConfig {
        scenario,
        run_count: seeds,
        parallel_runs: parallel,
        output_dir: output.clone(),
        seed_start: seed,
        max_ticks: ticks,
    };

    let results = match run_batch(config) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("FATAL: {e}");
            std::process::exit(1);
        }
    };

    // Save results
    let results_path = output.join("batch_results.json");
    if let Err(e) = results.save(&results_path) {
        tracing::error!(error = %e, path = %results_path.display(), "Failed to save results");
        eprintln!("FATAL: Failed to save results: {e}");
        std::process::exit(1);
    }

    let summary = &results.summary;
    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATCH COMPLETE");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Runs completed: {}", results.runs.len());
    if !results.errors.is_empty() {
        eprintln!("Runs failed:    {}", results.errors.len());
    }
    eprintln!("Duration:       {:.1}s", results.duration_seconds);
    eprintln!(
        "Touch damage:   {:.1} avg ({}..{})",
        summary.avg_damage, summary.min_damage, summary.max_damage
    );
    eprintln!("Kills:          {:.1} avg", summary.avg_kills);
    eprintln!("Peak alive:     {}", summary.peak_alive);
    eprintln!(
        "Tick time:      {:.1}us avg, {:.1}us worst p99",
        summary.avg_tick_us, summary.worst_p99_tick_us
    );
    eprintln!("Results saved to: {}", results_path.display());

    if !results.errors.is_empty() {
        std::process::exit(1);
    }
}

/// Measure tick cost on an open field
fn cmd_bench(agents: usize, ticks: u64, seed: u64) {
    tracing::info!("Running {} tick benchmark with {} agents", ticks, agents);

    let metrics = match run_bench(agents, ticks, seed) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Benchmark setup failed: {e}");
            std::process::exit(1);
        }
    };

    let total_ms = metrics.mean_tick_us * metrics.ticks as f64 / 1000.0;
    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BENCHMARK RESULTS");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Agents:        {}", metrics.peak_alive);
    eprintln!("Ticks:         {}", metrics.ticks);
    eprintln!("Total time:    {total_ms:.1}ms");
    eprintln!("Mean tick:     {:.1}us", metrics.mean_tick_us);
    eprintln!("p99 tick:      {:.1}us", metrics.p99_tick_us);
    if metrics.mean_tick_us > 0.0 {
        eprintln!("Ticks/sec:     {:.0}", 1e6 / metrics.mean_tick_us);
    }
    eprintln!("State hash:    {:016x}", metrics.final_state_hash);
}

/// List built-in scenarios
fn cmd_list() {
    for name in Scenario::BUILTINS {
        if let Some(scenario) = Scenario::builtin(name) {
            println!("{:<12} {}", scenario.name, scenario.description);
        }
    }
}
