//! # Horde Core
//!
//! Crowd simulation core: tens of thousands of agents pursuing one moving
//! target across a static obstacle field.
//!
//! This crate contains **only** simulation logic:
//! - No rendering
//! - No IO outside config loading
//! - No system randomness (spawning uses a seeded RNG)
//! - No threads (one tick is one synchronous call)
//!
//! ## Crate Structure
//!
//! - [`agents`] - Structure-of-arrays agent storage with swap-remove
//! - [`spatial`] - Counting-sort spatial hash for separation queries
//! - [`navigation`] - Obstacle grid and BFS flow field
//! - [`lod`] - Distance bands and recompute staggering
//! - [`steering`] - Seek, flee, separation and collision sliding
//! - [`simulation`] - The per-tick update loop
//! - [`config`] - RON-loadable tuning
//! - [`math`] - Vector and bounds types

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod agents;
pub mod config;
pub mod error;
pub mod lod;
pub mod math;
pub mod navigation;
pub mod simulation;
pub mod spatial;
pub mod steering;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::agents::{AgentId, AgentRow, AgentStore, Behavior};
    pub use crate::config::{
        AgentTier, CrowdConfig, SpawnConfig, SteeringConfig, TierTable, TypeStats,
    };
    pub use crate::error::{HordeError, Result};
    pub use crate::lod::LodBand;
    pub use crate::math::{Vec2, WorldBounds};
    pub use crate::navigation::{NavigationField, UNREACHABLE};
    pub use crate::simulation::{CrowdSim, TickContext, TickStats};
    pub use crate::spatial::SpatialHashGrid;
}
