//! Run metrics collection.
//!
//! One [`RunMetrics`] per scenario run; [`BatchSummary`] aggregates a batch
//! of seeds.

use std::time::Duration;

use horde_core::simulation::TickStats;
use serde::{Deserialize, Serialize};

/// Complete metrics for a single run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Scenario name.
    pub scenario: String,
    /// Crowd seed used.
    pub seed: u64,
    /// Ticks simulated.
    pub ticks: u64,
    /// Touch damage dealt to the target.
    pub total_damage: u64,
    /// Agents killed by the kill zone.
    pub kills: u64,
    /// Fleeing agents removed at the despawn distance.
    pub despawns: u64,
    /// Most agents alive at once.
    pub peak_alive: usize,
    /// Agents alive at the end.
    pub final_alive: usize,
    /// Flow field rebuilds, including the first build.
    pub flow_rebuilds: u64,
    /// Agents the unstuck search failed to free, summed over ticks.
    pub embedded_events: u64,
    /// Mean wall time of one `update` call, in microseconds.
    pub mean_tick_us: f64,
    /// 99th percentile `update` wall time, in microseconds.
    pub p99_tick_us: f64,
    /// Final simulation state hash (for determinism validation).
    pub final_state_hash: u64,
}

impl RunMetrics {
    /// Create an empty metrics record.
    #[must_use]
    pub fn new(scenario: impl Into<String>, seed: u64) -> Self {
        Self {
            scenario: scenario.into(),
            seed,
            ..Default::default()
        }
    }
}

/// Accumulates per-tick observations into a [`RunMetrics`].
#[derive(Debug)]
pub struct MetricsCollector {
    metrics: RunMetrics,
    tick_times_us: Vec<f64>,
}

impl MetricsCollector {
    /// Create a new metrics collector.
    #[must_use]
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            metrics: RunMetrics::new(scenario, seed),
            tick_times_us: Vec::new(),
        }
    }

    /// Record one `update` call.
    pub fn on_tick(&mut self, stats: TickStats, alive: usize, elapsed: Duration) {
        self.metrics.ticks += 1;
        self.metrics.total_damage += u64::from(stats.damage);
        self.metrics.despawns += u64::from(stats.despawned);
        self.metrics.embedded_events += u64::from(stats.embedded);
        self.metrics.peak_alive = self.metrics.peak_alive.max(alive);
        self.tick_times_us.push(elapsed.as_secs_f64() * 1e6);
    }

    /// Record kills reported by the simulation.
    pub fn on_kills(&mut self, kills: u32) {
        self.metrics.kills += u64::from(kills);
    }

    /// Record a flow field rebuild.
    pub fn on_flow_rebuild(&mut self) {
        self.metrics.flow_rebuilds += 1;
    }

    /// Record the population after spawning.
    pub fn observe_alive(&mut self, alive: usize) {
        self.metrics.peak_alive = self.metrics.peak_alive.max(alive);
    }

    /// Finalize with the end state.
    #[must_use]
    pub fn finalize(mut self, final_alive: usize, final_state_hash: u64) -> RunMetrics {
        self.metrics.final_alive = final_alive;
        self.metrics.final_state_hash = final_state_hash;
        let (mean, p99) = timing_summary(&mut self.tick_times_us);
        self.metrics.mean_tick_us = mean;
        self.metrics.p99_tick_us = p99;
        self.metrics
    }
}

/// Mean and 99th percentile of `samples`; sorts in place.
fn timing_summary(samples: &mut [f64]) -> (f64, f64) {
    if samples.is_empty() {
        return (0.0, 0.0);
    }
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    samples.sort_by(f64::total_cmp);
    let rank = ((samples.len() as f64) * 0.99).ceil() as usize;
    let p99 = samples[rank.saturating_sub(1).min(samples.len() - 1)];
    (mean, p99)
}

/// Summary statistics across multiple runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Total runs.
    pub total_runs: u32,
    /// Average touch damage per run.
    pub avg_damage: f64,
    /// Lowest touch damage in a run.
    pub min_damage: u64,
    /// Highest touch damage in a run.
    pub max_damage: u64,
    /// Average kills per run.
    pub avg_kills: f64,
    /// Average despawns per run.
    pub avg_despawns: f64,
    /// Highest population seen in any run.
    pub peak_alive: usize,
    /// Average mean tick time.
    pub avg_tick_us: f64,
    /// Worst p99 tick time across runs.
    pub worst_p99_tick_us: f64,
    /// Runs whose unstuck search failed at least once.
    pub runs_with_embedded: u32,
}

impl BatchSummary {
    /// Calculate summary from a list of run metrics.
    #[must_use]
    pub fn from_runs(runs: &[RunMetrics]) -> Self {
        if runs.is_empty() {
            return Self::default();
        }

        let n = runs.len() as f64;
        let mut summary = Self {
            total_runs: runs.len() as u32,
            min_damage: u64::MAX,
            ..Default::default()
        };

        let mut damage_sum = 0u64;
        let mut kills_sum = 0u64;
        let mut despawn_sum = 0u64;
        let mut tick_sum = 0.0;

        for run in runs {
            damage_sum += run.total_damage;
            kills_sum += run.kills;
            despawn_sum += run.despawns;
            tick_sum += run.mean_tick_us;
            summary.min_damage = summary.min_damage.min(run.total_damage);
            summary.max_damage = summary.max_damage.max(run.total_damage);
            summary.peak_alive = summary.peak_alive.max(run.peak_alive);
            summary.worst_p99_tick_us = summary.worst_p99_tick_us.max(run.p99_tick_us);
            if run.embedded_events > 0 {
                summary.runs_with_embedded += 1;
            }
        }

        summary.avg_damage = damage_sum as f64 / n;
        summary.avg_kills = kills_sum as f64 / n;
        summary.avg_despawns = despawn_sum as f64 / n;
        summary.avg_tick_us = tick_sum / n;
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_accumulates_stats() {
        let mut collector = MetricsCollector::new("scenario", 42);
        let stats = TickStats {
            damage: 5,
            despawned: 2,
            embedded: 1,
            ..TickStats::default()
        };
        collector.observe_alive(30);
        collector.on_tick(stats, 25, Duration::from_micros(100));
        collector.on_tick(TickStats::default(), 10, Duration::from_micros(300));
        collector.on_kills(3);
        collector.on_flow_rebuild();

        let metrics = collector.finalize(10, 77);

        assert_eq!(metrics.ticks, 2);
        assert_eq!(metrics.total_damage, 5);
        assert_eq!(metrics.despawns, 2);
        assert_eq!(metrics.embedded_events, 1);
        assert_eq!(metrics.kills, 3);
        assert_eq!(metrics.flow_rebuilds, 1);
        assert_eq!(metrics.peak_alive, 30);
        assert_eq!(metrics.final_alive, 10);
        assert_eq!(metrics.final_state_hash, 77);
        assert!((metrics.mean_tick_us - 200.0).abs() < 1.0);
        assert!((metrics.p99_tick_us - 300.0).abs() < 1.0);
    }

    #[test]
    fn test_timing_summary_percentile() {
        let mut samples: Vec<f64> = (1..=100).map(f64::from).collect();
        let (mean, p99) = timing_summary(&mut samples);
        assert!((mean - 50.5).abs() < 1e-9);
        assert!((p99 - 99.0).abs() < 1e-9);
        assert_eq!(timing_summary(&mut []), (0.0, 0.0));
    }

    #[test]
    fn test_batch_summary() {
        let mut a = RunMetrics::new("s", 1);
        a.total_damage = 100;
        a.kills = 10;
        a.peak_alive = 500;
        a.p99_tick_us = 40.0;
        let mut b = RunMetrics::new("s", 2);
        b.total_damage = 200;
        b.kills = 30;
        b.peak_alive = 300;
        b.p99_tick_us = 90.0;
        b.embedded_events = 4;

        let summary = BatchSummary::from_runs(&[a, b]);

        assert_eq!(summary.total_runs, 2);
        assert_eq!(summary.min_damage, 100);
        assert_eq!(summary.max_damage, 200);
        assert!((summary.avg_damage - 150.0).abs() < 1e-9);
        assert!((summary.avg_kills - 20.0).abs() < 1e-9);
        assert_eq!(summary.peak_alive, 500);
        assert!((summary.worst_p99_tick_us - 90.0).abs() < 1e-9);
        assert_eq!(summary.runs_with_embedded, 1);
    }

    #[test]
    fn test_empty_batch_summary() {
        assert_eq!(BatchSummary::from_runs(&[]), BatchSummary::default());
    }
}
