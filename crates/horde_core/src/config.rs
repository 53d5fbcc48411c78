//! Data-driven configuration for the crowd simulation.
//!
//! Every tuning constant (tier stats, LOD radii, stagger masks, spawn band)
//! lives here and is deserialized from RON. Nothing in the tick path
//! hardcodes a threshold.
//!
//! # Example RON
//!
//! ```ron
//! CrowdConfig(
//!     capacity: 20000,
//!     bounds: (min: (x: -2048.0, y: -2048.0), max: (x: 2048.0, y: 2048.0)),
//!     seed: 7,
//!     spatial_cell_size: 32.0,
//!     spawn: SpawnConfig(
//!         min_radius: 400.0,
//!         max_radius: 800.0,
//!         tier_thresholds: (0.70, 0.90, 0.99),
//!     ),
//! )
//! ```
//!
//! Omitted sections (`tiers`, `steering`) fall back to their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{HordeError, Result};
use crate::math::WorldBounds;

// NaN fails both checks.
fn is_positive(value: f32) -> bool {
    value > 0.0
}

fn is_non_negative(value: f32) -> bool {
    value >= 0.0
}

/// Agent tiers, ordered from most common to rarest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum AgentTier {
    /// Baseline swarm unit.
    #[default]
    Drone,
    /// Fast, fragile unit.
    Runner,
    /// Slow, heavy unit.
    Brute,
    /// Rare elite unit.
    Elite,
}

impl AgentTier {
    /// All tiers in roll order.
    pub const ALL: [AgentTier; 4] = [Self::Drone, Self::Runner, Self::Brute, Self::Elite];

    /// Dense index of this tier, usable for table lookups.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Pick a tier from a uniform draw `r` in `[0, 1)` and ascending
    /// cumulative thresholds `[p1, p2, p3]`.
    #[must_use]
    pub fn from_roll(r: f32, thresholds: [f32; 3]) -> Self {
        if r < thresholds[0] {
            Self::Drone
        } else if r < thresholds[1] {
            Self::Runner
        } else if r < thresholds[2] {
            Self::Brute
        } else {
            Self::Elite
        }
    }
}

/// Immutable per-tier statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TypeStats {
    /// Maximum speed in world units per second.
    pub max_speed: f32,
    /// Weight of the seek (or flow-blended seek) direction.
    pub seek_weight: f32,
    /// Weight of the separation push.
    pub separation_weight: f32,
    /// Hit points at spawn.
    pub max_hit_points: u32,
    /// Damage dealt to the target per touch.
    pub touch_damage: u32,
    /// Delay between touches, in milliseconds.
    pub attack_cooldown_ms: f32,
    /// Fear sensitivity radius; a fear source only frightens this tier
    /// within `min(source_radius, fear_trigger_radius)`.
    pub fear_trigger_radius: f32,
}

/// One [`TypeStats`] record per [`AgentTier`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierTable {
    /// Stats for [`AgentTier::Drone`].
    pub drone: TypeStats,
    /// Stats for [`AgentTier::Runner`].
    pub runner: TypeStats,
    /// Stats for [`AgentTier::Brute`].
    pub brute: TypeStats,
    /// Stats for [`AgentTier::Elite`].
    pub elite: TypeStats,
}

impl TierTable {
    /// Stats for `tier`.
    #[must_use]
    pub const fn get(&self, tier: AgentTier) -> &TypeStats {
        match tier {
            AgentTier::Drone => &self.drone,
            AgentTier::Runner => &self.runner,
            AgentTier::Brute => &self.brute,
            AgentTier::Elite => &self.elite,
        }
    }

    fn validate(&self) -> Result<()> {
        for tier in AgentTier::ALL {
            let stats = self.get(tier);
            if !is_non_negative(stats.max_speed) {
                return Err(HordeError::invalid(format!("{tier:?}: max_speed must be >= 0")));
            }
            if stats.max_hit_points == 0 {
                return Err(HordeError::invalid(format!("{tier:?}: max_hit_points must be > 0")));
            }
            if !is_non_negative(stats.attack_cooldown_ms) {
                return Err(HordeError::invalid(format!(
                    "{tier:?}: attack_cooldown_ms must be >= 0"
                )));
            }
        }
        Ok(())
    }
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            drone: TypeStats {
                max_speed: 60.0,
                seek_weight: 1.0,
                separation_weight: 1.4,
                max_hit_points: 10,
                touch_damage: 1,
                attack_cooldown_ms: 800.0,
                fear_trigger_radius: 400.0,
            },
            runner: TypeStats {
                max_speed: 95.0,
                seek_weight: 1.0,
                separation_weight: 1.2,
                max_hit_points: 6,
                touch_damage: 1,
                attack_cooldown_ms: 600.0,
                fear_trigger_radius: 400.0,
            },
            brute: TypeStats {
                max_speed: 40.0,
                seek_weight: 1.0,
                separation_weight: 2.0,
                max_hit_points: 40,
                touch_damage: 3,
                attack_cooldown_ms: 1200.0,
                fear_trigger_radius: 250.0,
            },
            elite: TypeStats {
                max_speed: 55.0,
                seek_weight: 1.0,
                separation_weight: 1.6,
                max_hit_points: 120,
                touch_damage: 6,
                attack_cooldown_ms: 1000.0,
                fear_trigger_radius: 120.0,
            },
        }
    }
}

/// Annulus spawn band and tier roll thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnConfig {
    /// Inner spawn radius.
    pub min_radius: f32,
    /// Outer spawn radius.
    pub max_radius: f32,
    /// Ascending cumulative thresholds `p1 < p2 < p3` in `(0, 1]`.
    pub tier_thresholds: [f32; 3],
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            min_radius: 400.0,
            max_radius: 800.0,
            tier_thresholds: [0.70, 0.90, 0.99],
        }
    }
}

/// Steering, LOD and collision tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringConfig {
    /// Collision radius of an agent.
    pub agent_radius: f32,
    /// Collision radius of the target.
    pub target_radius: f32,
    /// Neighbors closer than this push each other apart.
    pub separation_radius: f32,
    /// Maximum neighbors examined per separation query.
    pub max_neighbors: usize,
    /// Agents within this distance of the target run full behavior.
    pub sep_active_radius: f32,
    /// Base radius of the cheap-drift band.
    pub far_cheap_radius: f32,
    /// `far_cheap_radius * very_far_multiplier` starts the very-far band.
    pub very_far_multiplier: f32,
    /// Beyond this distance drifting agents ignore obstacles.
    pub no_collision_radius: f32,
    /// Far agents recompute when `(tick + index) & mask == 0`.
    pub far_recompute_mask: u64,
    /// Very-far agents recompute when `(tick + index) & mask == 0`.
    pub very_far_recompute_mask: u64,
    /// Flow-assist duration armed by a fully blocked move, in milliseconds.
    pub flow_assist_burst_ms: f32,
    /// Share of the flow direction when blending with seek, in `[0, 1]`.
    pub flow_assist_weight: f32,
    /// Fleeing agents farther than this from the target are despawned.
    pub despawn_distance: f32,
    /// Radius increment between unstuck rings.
    pub unstuck_ring_step: f32,
    /// Largest unstuck ring radius.
    pub unstuck_max_radius: f32,
    /// Angular samples per unstuck ring.
    pub unstuck_samples: u32,
}

impl SteeringConfig {
    /// Squared distance that triggers a touch.
    #[must_use]
    pub fn touch_range_squared(&self) -> f32 {
        let r = self.target_radius + self.agent_radius;
        r * r
    }

    /// Distance at which the very-far band starts.
    #[must_use]
    pub fn very_far_radius(&self) -> f32 {
        self.far_cheap_radius * self.very_far_multiplier
    }

    fn validate(&self) -> Result<()> {
        let positive = [
            ("agent_radius", self.agent_radius),
            ("separation_radius", self.separation_radius),
            ("sep_active_radius", self.sep_active_radius),
            ("far_cheap_radius", self.far_cheap_radius),
            ("despawn_distance", self.despawn_distance),
            ("unstuck_ring_step", self.unstuck_ring_step),
        ];
        for (name, value) in positive {
            if !is_positive(value) {
                return Err(HordeError::invalid(format!("{name} must be positive")));
            }
        }
        for (name, value) in [
            ("target_radius", self.target_radius),
            ("no_collision_radius", self.no_collision_radius),
        ] {
            if value < 0.0 {
                return Err(HordeError::invalid(format!("{name} must be >= 0")));
            }
        }
        if self.max_neighbors == 0 {
            return Err(HordeError::invalid("max_neighbors must be > 0"));
        }
        if self.unstuck_max_radius < self.unstuck_ring_step {
            return Err(HordeError::invalid(
                "unstuck_max_radius must not be smaller than unstuck_ring_step",
            ));
        }
        if self.very_far_multiplier < 1.0 {
            return Err(HordeError::invalid("very_far_multiplier must be >= 1"));
        }
        if self.far_cheap_radius < self.sep_active_radius {
            return Err(HordeError::invalid(
                "far_cheap_radius must not be smaller than sep_active_radius",
            ));
        }
        for (name, mask) in [
            ("far_recompute_mask", self.far_recompute_mask),
            ("very_far_recompute_mask", self.very_far_recompute_mask),
        ] {
            if mask & mask.wrapping_add(1) != 0 {
                return Err(HordeError::invalid(format!("{name} must be 2^k - 1, got {mask}")));
            }
        }
        if !(0.0..=1.0).contains(&self.flow_assist_weight) {
            return Err(HordeError::invalid("flow_assist_weight must be in [0, 1]"));
        }
        if self.unstuck_samples == 0 {
            return Err(HordeError::invalid("unstuck_samples must be > 0"));
        }
        Ok(())
    }
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            agent_radius: 8.0,
            target_radius: 16.0,
            separation_radius: 20.0,
            max_neighbors: 12,
            sep_active_radius: 600.0,
            far_cheap_radius: 1200.0,
            very_far_multiplier: 2.0,
            no_collision_radius: 1800.0,
            far_recompute_mask: 3,
            very_far_recompute_mask: 15,
            flow_assist_burst_ms: 600.0,
            flow_assist_weight: 0.6,
            despawn_distance: 2200.0,
            unstuck_ring_step: 8.0,
            unstuck_max_radius: 64.0,
            unstuck_samples: 8,
        }
    }
}

/// Top-level crowd configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrowdConfig {
    /// Maximum number of live agents.
    pub capacity: usize,
    /// World rectangle covered by the spatial grid.
    pub bounds: WorldBounds,
    /// Seed for spawn placement and tier rolls.
    #[serde(default)]
    pub seed: u64,
    /// Cell size of the separation hash grid.
    pub spatial_cell_size: f32,
    /// Spawn band and tier thresholds.
    #[serde(default)]
    pub spawn: SpawnConfig,
    /// Per-tier stats.
    #[serde(default)]
    pub tiers: TierTable,
    /// Steering and LOD tuning.
    #[serde(default)]
    pub steering: SteeringConfig,
}

impl Default for CrowdConfig {
    fn default() -> Self {
        Self {
            capacity: 20_000,
            bounds: WorldBounds::default(),
            seed: 0,
            spatial_cell_size: 32.0,
            spawn: SpawnConfig::default(),
            tiers: TierTable::default(),
            steering: SteeringConfig::default(),
        }
    }
}

impl CrowdConfig {
    /// Parse a config from a RON string and validate it.
    pub fn from_ron_str(ron_str: &str) -> Result<Self> {
        let config: Self = ron::from_str(ron_str).map_err(|e| HordeError::ConfigParse {
            path: "<inline>".into(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| HordeError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config: Self = ron::from_str(&contents).map_err(|e| HordeError::ConfigParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value the tick path relies on.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(HordeError::invalid("capacity must be > 0"));
        }
        if !self.bounds.is_valid() {
            return Err(HordeError::invalid("bounds must enclose a positive area"));
        }
        if !is_positive(self.spatial_cell_size) {
            return Err(HordeError::invalid("spatial_cell_size must be positive"));
        }
        if self.spatial_cell_size < self.steering.separation_radius {
            return Err(HordeError::invalid(
                "spatial_cell_size must be >= separation_radius so a 3x3 query covers it",
            ));
        }
        let spawn = &self.spawn;
        if spawn.min_radius < 0.0 || spawn.min_radius > spawn.max_radius {
            return Err(HordeError::invalid(
                "spawn radii must satisfy 0 <= min_radius <= max_radius",
            ));
        }
        let [p1, p2, p3] = spawn.tier_thresholds;
        if !(0.0 <= p1 && p1 <= p2 && p2 <= p3 && p3 <= 1.0) {
            return Err(HordeError::invalid(format!(
                "tier_thresholds must ascend within [0, 1], got {:?}",
                spawn.tier_thresholds
            )));
        }
        self.tiers.validate()?;
        self.steering.validate()
    }
}
