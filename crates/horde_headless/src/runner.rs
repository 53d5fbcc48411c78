//! Scenario execution.
//!
//! [`ScenarioRunner`] drives a [`CrowdSim`] through a [`Scenario`]: it plays
//! the scripted callers (waves, hives, fear pulses, the kill zone), keeps the
//! flow field current for a moving target, and collects [`RunMetrics`].

use std::time::{Duration, Instant};

use horde_core::config::{AgentTier, CrowdConfig, SpawnConfig};
use horde_core::math::{Vec2, WorldBounds};
use horde_core::navigation::NavigationField;
use horde_core::simulation::CrowdSim;
use tracing::{debug, info, warn};

use crate::metrics::{MetricsCollector, RunMetrics};
use crate::scenario::{KillZone, Scenario, ScenarioError, TargetPath, Wave};

/// Ticks between progress log lines.
const PROGRESS_LOG_INTERVAL: u64 = 600;

/// `update` calls slower than this are logged.
const SLOW_TICK_THRESHOLD: Duration = Duration::from_millis(8);

/// Runs one scenario to completion.
#[derive(Debug)]
pub struct ScenarioRunner {
    scenario: Scenario,
    sim: CrowdSim,
    nav: NavigationField,
    collector: MetricsCollector,
    /// Scratch for elite kill positions within one kill-zone pulse.
    elite_deaths: Vec<Vec2>,
}

impl ScenarioRunner {
    /// Build the simulation and navigation grid for `scenario`.
    pub fn new(scenario: Scenario) -> Result<Self, ScenarioError> {
        scenario.validate()?;
        let sim = CrowdSim::new(scenario.crowd.clone())?;
        let nav = scenario.build_navigation()?;
        let collector = MetricsCollector::new(&scenario.name, scenario.crowd.seed);
        debug!(
            scenario = %scenario.name,
            seed = scenario.crowd.seed,
            blocked_cells = nav.blocked_count(),
            "Scenario initialized"
        );
        Ok(Self {
            scenario,
            sim,
            nav,
            collector,
            elite_deaths: Vec::new(),
        })
    }

    /// The simulation being driven.
    #[must_use]
    pub const fn sim(&self) -> &CrowdSim {
        &self.sim
    }

    /// The navigation grid.
    #[must_use]
    pub const fn nav(&self) -> &NavigationField {
        &self.nav
    }

    /// The scenario being played.
    #[must_use]
    pub const fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// Target position for the current tick.
    #[must_use]
    pub fn current_target(&self) -> Vec2 {
        let elapsed_ms = self.sim.tick() as f64 * f64::from(self.scenario.tick_ms);
        self.scenario.target.position_at(elapsed_ms)
    }

    /// Advance one tick. Returns the touch damage dealt.
    pub fn step(&mut self) -> u32 {
        let tick = self.sim.tick();
        let target = self.current_target();

        self.refresh_flow_field(target);
        self.run_spawners(tick);
        self.run_fear_pulses(tick, target);
        self.collector.observe_alive(self.sim.alive_count());

        let tick_start = Instant::now();
        let damage = self.sim.update(self.scenario.tick_ms, target, &self.nav);
        let elapsed = tick_start.elapsed();

        if elapsed > SLOW_TICK_THRESHOLD {
            warn!(
                tick,
                duration_us = elapsed.as_micros() as u64,
                agents = self.sim.alive_count(),
                "Slow tick"
            );
        }

        let stats = self.sim.last_tick_stats();
        if let Some(zone) = self.scenario.kill_zone {
            if tick % zone.interval_ticks == 0 {
                self.apply_kill_zone(&zone, target);
            }
        }
        let kills = self.sim.consume_kills_this_frame();
        self.collector.on_kills(kills);
        self.collector.on_tick(stats, self.sim.alive_count(), elapsed);

        if tick % PROGRESS_LOG_INTERVAL == 0 {
            debug!(
                tick,
                max_ticks = self.scenario.max_ticks,
                agents = self.sim.alive_count(),
                near = stats.near_count,
                damage,
                kills,
                "Run progress"
            );
        }

        damage
    }

    /// Run to `max_ticks` and return the collected metrics.
    pub fn run(mut self) -> RunMetrics {
        let max_ticks = self.scenario.max_ticks;
        self.run_for(max_ticks);
        self.finish()
    }

    /// Advance `ticks` ticks.
    pub fn run_for(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.step();
        }
    }

    /// Stop and return the collected metrics.
    #[must_use]
    pub fn finish(self) -> RunMetrics {
        let metrics = self
            .collector
            .finalize(self.sim.alive_count(), self.sim.state_hash());
        info!(
            scenario = %metrics.scenario,
            seed = metrics.seed,
            ticks = metrics.ticks,
            damage = metrics.total_damage,
            kills = metrics.kills,
            mean_tick_us = metrics.mean_tick_us,
            "Run complete"
        );
        metrics
    }

    /// Rebuild the flow field when the target has moved into another cell.
    fn refresh_flow_field(&mut self, target: Vec2) {
        let cell = self.nav.resolve_target_cell(target);
        if self.nav.target_cell() == Some(cell) {
            return;
        }
        self.nav.build_flow_field(target);
        self.collector.on_flow_rebuild();
    }

    fn run_spawners(&mut self, tick: u64) {
        for wave in &self.scenario.initial_waves {
            if wave.at_tick == tick {
                spawn_wave(&mut self.sim, wave);
            }
        }
        for hive in &self.scenario.hives {
            if tick % hive.interval_ticks != 0 {
                continue;
            }
            for _ in 0..hive.per_spawn {
                if !self.sim.spawn_at(hive.position, hive.tier) {
                    break;
                }
            }
        }
    }

    fn run_fear_pulses(&mut self, tick: u64, target: Vec2) {
        for pulse in &self.scenario.fear_pulses {
            if pulse.at_tick != tick {
                continue;
            }
            let source = pulse.source.unwrap_or(target);
            let affected = self.sim.trigger_fear(source, pulse.radius, pulse.duration_ms);
            debug!(tick, affected, "Fear pulse");
        }
    }

    /// Damage every agent within the zone; kill the ones that drop to zero.
    fn apply_kill_zone(&mut self, zone: &KillZone, target: Vec2) {
        let radius_sq = zone.radius * zone.radius;
        self.elite_deaths.clear();

        let mut i = 0;
        while i < self.sim.alive_count() {
            let position = self.sim.position(i);
            if position.distance_squared(target) > radius_sq || !self.sim.damage_agent(i, zone.damage)
            {
                i += 1;
                continue;
            }
            if self.sim.tier(i) == AgentTier::Elite {
                self.elite_deaths.push(position);
            }
            // The last agent now sits at `i`; check it before moving on.
            self.sim.kill_by_player(i);
        }

        if zone.elite_fear_radius > 0.0 {
            for &at in &self.elite_deaths {
                self.sim
                    .trigger_fear(at, zone.elite_fear_radius, zone.elite_fear_ms);
            }
        }
    }
}

fn spawn_wave(sim: &mut CrowdSim, wave: &Wave) {
    let placed = sim.spawn(wave.count, wave.origin);
    if placed < wave.count {
        debug!(requested = wave.count, placed, "Wave truncated by capacity");
    }
}

/// Build a benchmark scenario: `agents` spawned at tick zero around a
/// stationary target on an open field.
#[must_use]
pub fn bench_scenario(agents: usize, ticks: u64, seed: u64) -> Scenario {
    let half_extent = 2048.0;
    Scenario {
        name: format!("bench_{agents}"),
        description: "Open-field throughput benchmark".to_string(),
        crowd: CrowdConfig {
            capacity: agents.max(1),
            bounds: WorldBounds::centered(half_extent),
            seed,
            spawn: SpawnConfig {
                min_radius: 100.0,
                max_radius: 1_200.0,
                ..SpawnConfig::default()
            },
            ..CrowdConfig::default()
        },
        nav_cell_size: 32.0,
        obstacles: Vec::new(),
        target: TargetPath::Stationary(Vec2::ZERO),
        initial_waves: vec![Wave {
            at_tick: 0,
            count: agents,
            origin: Vec2::ZERO,
        }],
        hives: Vec::new(),
        fear_pulses: Vec::new(),
        kill_zone: None,
        tick_ms: 16.0,
        max_ticks: ticks,
    }
}

/// Run [`bench_scenario`] and return its metrics.
pub fn run_bench(agents: usize, ticks: u64, seed: u64) -> Result<RunMetrics, ScenarioError> {
    Ok(ScenarioRunner::new(bench_scenario(agents, ticks, seed))?.run())
}
