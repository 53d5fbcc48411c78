//! Scenario loading and configuration.
//!
//! A scenario fixes everything a headless run needs: the crowd config, the
//! obstacle layout, how the target moves, and the scripted callers that
//! spawn, frighten and kill agents on a schedule.

use std::path::Path;

use horde_core::config::{AgentTier, CrowdConfig};
use horde_core::error::HordeError;
use horde_core::math::{Vec2, WorldBounds};
use horde_core::navigation::NavigationField;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// Scenario values rejected by the simulation core.
    #[error("Invalid scenario: {0}")]
    Invalid(#[from] HordeError),
}

/// Static obstacle shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ObstacleSpec {
    /// Axis-aligned rectangle from `min` with extent `size`.
    Rect {
        /// Lower-left corner.
        min: Vec2,
        /// Width and height.
        size: Vec2,
    },
    /// Circle.
    Circle {
        /// Centre.
        center: Vec2,
        /// Radius.
        radius: f32,
    },
}

/// How the target moves over time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TargetPath {
    /// Never moves.
    Stationary(Vec2),
    /// Constant-speed orbit, starting at angle zero.
    Circle {
        /// Orbit centre.
        center: Vec2,
        /// Orbit radius.
        radius: f32,
        /// Time for one full orbit, in milliseconds.
        period_ms: f32,
    },
    /// Ping-pong walk along a polyline at constant speed.
    Waypoints {
        /// Polyline vertices.
        points: Vec<Vec2>,
        /// Speed in world units per second.
        speed: f32,
    },
}

impl TargetPath {
    /// Target position `elapsed_ms` after the start of the run.
    #[must_use]
    pub fn position_at(&self, elapsed_ms: f64) -> Vec2 {
        match self {
            Self::Stationary(p) => *p,
            Self::Circle {
                center,
                radius,
                period_ms,
            } => {
                if *period_ms <= 0.0 {
                    return *center + Vec2::new(*radius, 0.0);
                }
                let turns = (elapsed_ms / f64::from(*period_ms)).fract();
                *center + Vec2::from_polar((turns * std::f64::consts::TAU) as f32, *radius)
            }
            Self::Waypoints { points, speed } => walk_polyline(points, *speed, elapsed_ms),
        }
    }
}

/// Position after walking `points` forward then back, repeating.
fn walk_polyline(points: &[Vec2], speed: f32, elapsed_ms: f64) -> Vec2 {
    let Some(&first) = points.first() else {
        return Vec2::ZERO;
    };
    let lengths: Vec<f64> = points
        .windows(2)
        .map(|w| f64::from(w[0].distance(w[1])))
        .collect();
    let total: f64 = lengths.iter().sum();
    if total <= 0.0 || speed <= 0.0 {
        return first;
    }

    let travelled = (elapsed_ms / 1000.0 * f64::from(speed)) % (2.0 * total);
    let mut along = if travelled > total {
        2.0 * total - travelled
    } else {
        travelled
    };
    for (segment, &len) in lengths.iter().enumerate() {
        if along <= len {
            let t = if len > 0.0 { (along / len) as f32 } else { 0.0 };
            let (a, b) = (points[segment], points[segment + 1]);
            return a + (b - a) * t;
        }
        along -= len;
    }
    points[points.len() - 1]
}

/// Bulk spawn at a fixed tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wave {
    /// Tick the wave spawns on.
    pub at_tick: u64,
    /// Agents requested.
    pub count: usize,
    /// Annulus centre.
    pub origin: Vec2,
}

/// Fixed spawn point that emits agents on an interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HiveSpec {
    /// Spawn position.
    pub position: Vec2,
    /// Ticks between emissions.
    pub interval_ticks: u64,
    /// Agents per emission.
    pub per_spawn: u32,
    /// Forced tier, or rolled when absent.
    #[serde(default)]
    pub tier: Option<AgentTier>,
}

/// Scripted fear trigger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FearPulse {
    /// Tick the pulse fires on.
    pub at_tick: u64,
    /// Source position; the current target position when absent.
    #[serde(default)]
    pub source: Option<Vec2>,
    /// Trigger radius.
    pub radius: f32,
    /// Fear duration in milliseconds.
    pub duration_ms: f32,
}

/// Periodic area damage around the target, standing in for the player's
/// weapon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KillZone {
    /// Damage radius around the target.
    pub radius: f32,
    /// Ticks between pulses.
    pub interval_ticks: u64,
    /// Damage per pulse.
    pub damage: u32,
    /// Fear radius triggered where an elite dies; none when zero.
    #[serde(default)]
    pub elite_fear_radius: f32,
    /// Fear duration for elite kills, in milliseconds.
    #[serde(default)]
    pub elite_fear_ms: f32,
}

fn default_nav_cell_size() -> f32 {
    32.0
}

fn default_tick_ms() -> f32 {
    16.0
}

fn default_max_ticks() -> u64 {
    3600
}

/// A complete scenario configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Simulation core config.
    pub crowd: CrowdConfig,
    /// Navigation grid cell size.
    #[serde(default = "default_nav_cell_size")]
    pub nav_cell_size: f32,
    /// Static obstacles.
    #[serde(default)]
    pub obstacles: Vec<ObstacleSpec>,
    /// Target movement.
    pub target: TargetPath,
    /// Scheduled bulk spawns.
    #[serde(default)]
    pub initial_waves: Vec<Wave>,
    /// Periodic spawners.
    #[serde(default)]
    pub hives: Vec<HiveSpec>,
    /// Scheduled fear triggers.
    #[serde(default)]
    pub fear_pulses: Vec<FearPulse>,
    /// Periodic damage around the target.
    #[serde(default)]
    pub kill_zone: Option<KillZone>,
    /// Step length in milliseconds.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: f32,
    /// Ticks per run.
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::open_field()
    }
}

impl Scenario {
    /// Names accepted by [`Scenario::builtin`].
    pub const BUILTINS: [&'static str; 3] = ["open_field", "courtyard", "stampede"];

    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let scenario: Scenario = ron::from_str(&contents)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Built-in scenario by name.
    #[must_use]
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "open_field" => Some(Self::open_field()),
            "courtyard" => Some(Self::courtyard()),
            "stampede" => Some(Self::stampede()),
            _ => None,
        }
    }

    /// Resolve a built-in name, falling back to a file path.
    pub fn resolve(name_or_path: &str) -> Result<Self, ScenarioError> {
        match Self::builtin(name_or_path) {
            Some(scenario) => Ok(scenario),
            None => Self::load(name_or_path),
        }
    }

    /// Copy of this scenario with a different crowd seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.crowd.seed = seed;
        self
    }

    /// Check the crowd config and the scenario's own values.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        self.crowd.validate()?;
        let invalid = |msg: &str| -> Result<(), ScenarioError> {
            Err(ScenarioError::Invalid(HordeError::InvalidConfig(msg.to_string())))
        };
        if self.nav_cell_size <= 0.0 || !self.nav_cell_size.is_finite() {
            return invalid("nav_cell_size must be positive");
        }
        if self.tick_ms <= 0.0 || !self.tick_ms.is_finite() {
            return invalid("tick_ms must be positive");
        }
        if self.hives.iter().any(|h| h.interval_ticks == 0) {
            return invalid("hive interval_ticks must be > 0");
        }
        if self.kill_zone.is_some_and(|k| k.interval_ticks == 0) {
            return invalid("kill_zone interval_ticks must be > 0");
        }
        Ok(())
    }

    /// Rasterize the obstacles into a fresh navigation field.
    pub fn build_navigation(&self) -> Result<NavigationField, ScenarioError> {
        let mut nav = NavigationField::new(self.crowd.bounds, self.nav_cell_size)?;
        for obstacle in &self.obstacles {
            match *obstacle {
                ObstacleSpec::Rect { min, size } => nav.add_obstacle_rect(min, size),
                ObstacleSpec::Circle { center, radius } => nav.add_obstacle_circle(center, radius),
            }
        }
        Ok(nav)
    }

    /// A single large wave closing on a stationary target.
    #[must_use]
    pub fn open_field() -> Self {
        Self {
            name: "open_field".to_string(),
            description: "Five thousand agents converge on a stationary target".to_string(),
            crowd: CrowdConfig {
                capacity: 8_000,
                seed: 1,
                ..CrowdConfig::default()
            },
            nav_cell_size: default_nav_cell_size(),
            obstacles: Vec::new(),
            target: TargetPath::Stationary(Vec2::ZERO),
            initial_waves: vec![Wave {
                at_tick: 0,
                count: 5_000,
                origin: Vec2::ZERO,
            }],
            hives: Vec::new(),
            fear_pulses: Vec::new(),
            kill_zone: Some(KillZone {
                radius: 60.0,
                interval_ticks: 10,
                damage: 4,
                elite_fear_radius: 0.0,
                elite_fear_ms: 0.0,
            }),
            tick_ms: default_tick_ms(),
            max_ticks: default_max_ticks(),
        }
    }

    /// An orbiting target inside a walled yard fed by four hives.
    #[must_use]
    pub fn courtyard() -> Self {
        let wall = 40.0;
        let half = 700.0;
        let gate = 120.0;
        let side = half - gate / 2.0;
        let obstacles = vec![
            // North and south walls, each split by a gate.
            ObstacleSpec::Rect { min: Vec2::new(-half, half), size: Vec2::new(side, wall) },
            ObstacleSpec::Rect { min: Vec2::new(gate / 2.0, half), size: Vec2::new(side, wall) },
            ObstacleSpec::Rect { min: Vec2::new(-half, -half - wall), size: Vec2::new(side, wall) },
            ObstacleSpec::Rect {
                min: Vec2::new(gate / 2.0, -half - wall),
                size: Vec2::new(side, wall),
            },
            // Solid east and west walls.
            ObstacleSpec::Rect { min: Vec2::new(-half - wall, -half), size: Vec2::new(wall, 2.0 * half) },
            ObstacleSpec::Rect { min: Vec2::new(half, -half), size: Vec2::new(wall, 2.0 * half) },
            ObstacleSpec::Circle { center: Vec2::new(250.0, 250.0), radius: 80.0 },
            ObstacleSpec::Circle { center: Vec2::new(-250.0, -250.0), radius: 80.0 },
        ];
        let hive = |x: f32, y: f32| HiveSpec {
            position: Vec2::new(x, y),
            interval_ticks: 30,
            per_spawn: 12,
            tier: None,
        };
        Self {
            name: "courtyard".to_string(),
            description: "Hives outside a walled yard; the target orbits inside".to_string(),
            crowd: CrowdConfig {
                capacity: 12_000,
                seed: 2,
                ..CrowdConfig::default()
            },
            nav_cell_size: default_nav_cell_size(),
            obstacles,
            target: TargetPath::Circle {
                center: Vec2::ZERO,
                radius: 300.0,
                period_ms: 20_000.0,
            },
            initial_waves: Vec::new(),
            hives: vec![
                hive(0.0, 1_200.0),
                hive(0.0, -1_200.0),
                hive(1_200.0, 0.0),
                hive(-1_200.0, 0.0),
            ],
            fear_pulses: Vec::new(),
            kill_zone: Some(KillZone {
                radius: 80.0,
                interval_ticks: 8,
                damage: 6,
                elite_fear_radius: 150.0,
                elite_fear_ms: 1_500.0,
            }),
            tick_ms: default_tick_ms(),
            max_ticks: default_max_ticks(),
        }
    }

    /// Dense crowd repeatedly scattered by fear pulses at the target.
    #[must_use]
    pub fn stampede() -> Self {
        Self {
            name: "stampede".to_string(),
            description: "Repeated fear pulses scatter a dense crowd around a patrolling target"
                .to_string(),
            crowd: CrowdConfig {
                capacity: 20_000,
                seed: 3,
                ..CrowdConfig::default()
            },
            nav_cell_size: default_nav_cell_size(),
            obstacles: vec![ObstacleSpec::Circle {
                center: Vec2::new(0.0, 400.0),
                radius: 120.0,
            }],
            target: TargetPath::Waypoints {
                points: vec![
                    Vec2::new(-400.0, 0.0),
                    Vec2::new(400.0, 0.0),
                    Vec2::new(400.0, -400.0),
                ],
                speed: 80.0,
            },
            initial_waves: vec![
                Wave { at_tick: 0, count: 10_000, origin: Vec2::ZERO },
                Wave { at_tick: 600, count: 6_000, origin: Vec2::ZERO },
            ],
            hives: Vec::new(),
            fear_pulses: (1..=5)
                .map(|k| FearPulse {
                    at_tick: k * 500,
                    source: None,
                    radius: 350.0,
                    duration_ms: 2_500.0,
                })
                .collect(),
            kill_zone: None,
            tick_ms: default_tick_ms(),
            max_ticks: default_max_ticks(),
        }
    }

    /// World bounds of the crowd.
    #[must_use]
    pub const fn bounds(&self) -> &WorldBounds {
        &self.crowd.bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_are_valid() {
        for name in Scenario::BUILTINS {
            let scenario = Scenario::builtin(name).unwrap();
            scenario.validate().unwrap();
            scenario.build_navigation().unwrap();
        }
    }

    #[test]
    fn test_unknown_builtin_falls_back_to_file() {
        let err = Scenario::resolve("no_such_scenario.ron").unwrap_err();
        assert!(matches!(err, ScenarioError::FileNotFound(_)));
    }

    #[test]
    fn test_ron_round_trip_with_defaults() {
        let ron = r#"Scenario(
            name: "tiny",
            crowd: CrowdConfig(
                capacity: 32,
                bounds: (min: (x: -256.0, y: -256.0), max: (x: 256.0, y: 256.0)),
                spatial_cell_size: 32.0,
            ),
            target: Stationary((x: 0.0, y: 0.0)),
            obstacles: [Circle(center: (x: 50.0, y: 50.0), radius: 10.0)],
        )"#;
        let scenario = Scenario::from_ron_str(ron).unwrap();
        assert_eq!(scenario.name, "tiny");
        assert_eq!(scenario.tick_ms, 16.0);
        assert_eq!(scenario.max_ticks, 3600);
        assert_eq!(scenario.obstacles.len(), 1);
        assert!(scenario.kill_zone.is_none());
    }

    #[test]
    fn test_invalid_crowd_is_rejected() {
        let mut scenario = Scenario::open_field();
        scenario.crowd.capacity = 0;
        assert!(matches!(scenario.validate(), Err(ScenarioError::Invalid(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.ron");
        let text = ron::ser::to_string_pretty(&Scenario::courtyard(), Default::default()).unwrap();
        std::fs::write(&path, text).unwrap();

        let loaded = Scenario::load(&path).unwrap();
        assert_eq!(loaded, Scenario::courtyard());
    }

    #[test]
    fn test_circle_path_orbits() {
        let path = TargetPath::Circle {
            center: Vec2::new(10.0, 0.0),
            radius: 5.0,
            period_ms: 1000.0,
        };
        let start = path.position_at(0.0);
        let quarter = path.position_at(250.0);
        assert!((start.x - 15.0).abs() < 1e-4 && start.y.abs() < 1e-4);
        assert!((quarter.x - 10.0).abs() < 1e-4 && (quarter.y - 5.0).abs() < 1e-4);
        assert!(path.position_at(1000.0).distance(start) < 1e-3);
    }

    #[test]
    fn test_waypoints_ping_pong() {
        let path = TargetPath::Waypoints {
            points: vec![Vec2::ZERO, Vec2::new(100.0, 0.0)],
            speed: 100.0,
        };
        assert_eq!(path.position_at(0.0), Vec2::ZERO);
        assert!((path.position_at(500.0).x - 50.0).abs() < 1e-3);
        assert!((path.position_at(1000.0).x - 100.0).abs() < 1e-3);
        assert!((path.position_at(1500.0).x - 50.0).abs() < 1e-3);
    }
}
