//! Test fixtures and helpers.
//!
//! Pre-built configs, navigation fields and crowd harnesses for consistent
//! testing.

use horde_core::prelude::*;

/// Default step length used by fixtures, in milliseconds.
pub const TEST_DT_MS: f32 = 16.0;

/// Small, seeded config centred on the origin.
///
/// Bounds are ±1024 and capacity is 256, so fixtures stay cheap.
#[must_use]
pub fn test_config(seed: u64) -> CrowdConfig {
    CrowdConfig {
        capacity: 256,
        bounds: WorldBounds::centered(1024.0),
        seed,
        ..CrowdConfig::default()
    }
}

/// Config whose every agent is in the near band and whose spawn tiers are
/// all drones.
#[must_use]
pub fn near_only_config(seed: u64) -> CrowdConfig {
    let mut config = test_config(seed);
    config.steering.sep_active_radius = 4096.0;
    config.steering.far_cheap_radius = 4096.0;
    config.spawn.tier_thresholds = [1.0, 1.0, 1.0];
    config
}

/// Obstacle-free navigation field over `bounds` with 32-unit cells.
///
/// # Panics
///
/// Panics if `bounds` is empty.
#[must_use]
pub fn open_field(bounds: WorldBounds) -> NavigationField {
    NavigationField::new(bounds, 32.0).expect("fixture bounds must be valid")
}

/// Navigation field with a vertical wall at `x` spanning `[y_min, y_max]`.
///
/// # Panics
///
/// Panics if `bounds` is empty.
#[must_use]
pub fn walled_field(bounds: WorldBounds, x: f32, y_min: f32, y_max: f32) -> NavigationField {
    let mut nav = open_field(bounds);
    nav.add_obstacle_rect(Vec2::new(x, y_min), Vec2::new(32.0, y_max - y_min));
    nav
}

/// Place one drone at each point.
///
/// # Panics
///
/// Panics if the simulation runs out of capacity.
pub fn place_drones(sim: &mut CrowdSim, points: &[Vec2]) {
    for &p in points {
        assert!(sim.spawn_at(p, Some(AgentTier::Drone)), "fixture ran out of capacity");
    }
}

/// `count` points evenly spaced on a circle of `radius` around `center`.
#[must_use]
pub fn ring_points(center: Vec2, radius: f32, count: usize) -> Vec<Vec2> {
    (0..count)
        .map(|k| {
            let angle = std::f32::consts::TAU * k as f32 / count as f32;
            center + Vec2::from_polar(angle, radius)
        })
        .collect()
}

/// A simulation bundled with the navigation field and target it steps
/// against, so it can be advanced with no extra arguments.
#[derive(Debug, Clone)]
pub struct CrowdHarness {
    /// Simulation under test.
    pub sim: CrowdSim,
    /// Navigation field the simulation steers around.
    pub nav: NavigationField,
    /// Target position for every step.
    pub target: Vec2,
    /// Step length in milliseconds.
    pub dt_ms: f32,
    /// Damage accumulated over every step.
    pub total_damage: u64,
}

impl CrowdHarness {
    /// Build a harness with an open field and a flow field toward `target`.
    ///
    /// # Panics
    ///
    /// Panics if `config` is invalid.
    #[must_use]
    pub fn open(config: CrowdConfig, target: Vec2) -> Self {
        let mut nav = open_field(config.bounds);
        nav.build_flow_field(target);
        let sim = CrowdSim::new(config).expect("fixture config must be valid");
        Self {
            sim,
            nav,
            target,
            dt_ms: TEST_DT_MS,
            total_damage: 0,
        }
    }

    /// Advance one tick.
    pub fn step(&mut self) -> u32 {
        let damage = self.sim.update(self.dt_ms, self.target, &self.nav);
        self.total_damage += u64::from(damage);
        damage
    }

    /// Advance `ticks` ticks.
    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.step();
        }
    }

    /// State hash of the wrapped simulation.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        self.sim.state_hash()
    }
}

/// Seeded harness with `agents` agents spawned in the default annulus
/// around the origin.
#[must_use]
pub fn spawned_harness(seed: u64, agents: usize) -> CrowdHarness {
    let mut harness = CrowdHarness::open(test_config(seed), Vec2::ZERO);
    harness.sim.spawn(agents, Vec2::ZERO);
    harness
}
