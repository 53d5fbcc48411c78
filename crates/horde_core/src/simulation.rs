//! The per-tick crowd update.
//!
//! [`CrowdSim`] owns the agent store and the separation grid and advances
//! every agent one step per [`CrowdSim::update`] call.
//!
//! # Tick Order
//!
//! Each tick runs in this fixed order:
//! 1. **Timers** - fear, cooldown and flow-assist decay; touch damage
//! 2. **Near grid** - rebuild the spatial hash from agents near the target
//! 3. **Agents** - per-agent behavior pass in index order
//!
//! During step 3 a fleeing agent past the despawn distance is swap-removed
//! and the loop revisits the same index, which now holds the agent that was
//! last.
//!
//! # Example
//!
//! ```
//! use horde_core::prelude::*;
//!
//! let config = CrowdConfig {
//!     capacity: 64,
//!     seed: 3,
//!     ..CrowdConfig::default()
//! };
//! let mut sim = CrowdSim::new(config).unwrap();
//! let mut nav = NavigationField::new(sim.config().bounds, 32.0).unwrap();
//! nav.build_flow_field(Vec2::ZERO);
//!
//! sim.spawn(16, Vec2::ZERO);
//! let damage = sim.update(16.0, Vec2::ZERO, &nav);
//! assert_eq!(damage, 0);
//! assert_eq!(sim.tick(), 1);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::agents::{AgentColumns, AgentId, AgentRow, AgentStore, Behavior};
use crate::config::{AgentTier, CrowdConfig, SteeringConfig};
use crate::error::Result;
use crate::lod::{stagger, LodBand};
use crate::math::Vec2;
use crate::navigation::NavigationField;
use crate::spatial::SpatialHashGrid;
use crate::steering::{
    blend_flow, flee_direction, resolve_move, seek_direction, separation, steer, unstuck,
    MoveOutcome,
};

/// Per-tick inputs threaded through every helper.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickContext {
    /// Tick number being simulated, used for LOD staggering.
    pub tick: u64,
    /// Step length in milliseconds.
    pub dt_ms: f32,
    /// Step length in seconds.
    pub dt_secs: f32,
    /// Target position for this tick.
    pub target: Vec2,
}

impl TickContext {
    /// Build a context for one step.
    #[must_use]
    pub fn new(tick: u64, dt_ms: f32, target: Vec2) -> Self {
        let dt_ms = dt_ms.max(0.0);
        Self {
            tick,
            dt_ms,
            dt_secs: dt_ms / 1000.0,
            target,
        }
    }
}

/// Counters gathered during one [`CrowdSim::update`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickStats {
    /// Touch damage dealt to the target.
    pub damage: u32,
    /// Fleeing agents removed for leaving the despawn distance.
    pub despawned: u32,
    /// Agents inserted into the separation grid.
    pub near_count: u32,
    /// Far and very-far agents that re-steered this tick.
    pub recomputed: u32,
    /// Moves where both slide axes were blocked.
    pub blocked_moves: u32,
    /// Agents left inside an obstacle after the unstuck search.
    pub embedded: u32,
}

/// Crowd simulation: agent store, separation grid and tick counter.
#[derive(Debug, Clone)]
pub struct CrowdSim {
    config: CrowdConfig,
    store: AgentStore,
    grid: SpatialHashGrid,
    near_indices: Vec<u32>,
    tick: u64,
    last_stats: TickStats,
}

impl CrowdSim {
    /// Validate `config` and allocate every buffer up front.
    pub fn new(config: CrowdConfig) -> Result<Self> {
        config.validate()?;
        let store = AgentStore::new(&config);
        let grid = SpatialHashGrid::new(config.bounds, config.spatial_cell_size);
        Ok(Self {
            near_indices: Vec::with_capacity(config.capacity),
            config,
            store,
            grid,
            tick: 0,
            last_stats: TickStats::default(),
        })
    }

    /// Configuration this simulation was built from.
    #[must_use]
    pub const fn config(&self) -> &CrowdConfig {
        &self.config
    }

    /// Number of completed ticks.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Underlying agent store, read-only.
    #[must_use]
    pub const fn agents(&self) -> &AgentStore {
        &self.store
    }

    /// Counters from the most recent update.
    #[must_use]
    pub const fn last_tick_stats(&self) -> TickStats {
        self.last_stats
    }

    // ------------------------------------------------------------------
    // Spawning and removal
    // ------------------------------------------------------------------

    /// Spawn up to `count` agents in the spawn annulus around `origin`.
    /// Returns how many were placed.
    pub fn spawn(&mut self, count: usize, origin: Vec2) -> usize {
        self.store.spawn(count, origin)
    }

    /// Spawn one agent at `position`. Returns `false` at capacity.
    pub fn spawn_at(&mut self, position: Vec2, tier: Option<AgentTier>) -> bool {
        self.store.spawn_at(position, tier)
    }

    /// Remove agent `index` without counting a kill.
    ///
    /// The last live agent moves into `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= alive_count()`.
    pub fn despawn(&mut self, index: usize) {
        self.store.despawn(index);
    }

    /// Remove agent `index` and count a player kill.
    ///
    /// The last live agent moves into `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= alive_count()`.
    pub fn kill_by_player(&mut self, index: usize) {
        self.store.kill_by_player(index);
    }

    /// Return and reset the player kill counter.
    pub fn consume_kills_this_frame(&mut self) -> u32 {
        self.store.consume_kills_this_frame()
    }

    /// Deal `amount` damage to agent `index`. Returns `true` once its hit
    /// points reach zero; removing it is left to the caller.
    ///
    /// # Panics
    ///
    /// Panics if `index >= alive_count()`.
    pub fn damage_agent(&mut self, index: usize, amount: u32) -> bool {
        self.store.apply_damage(index, amount)
    }

    /// Frighten every agent within `radius` of `source`, capped per tier by
    /// its fear trigger radius. Each affected agent flees for at least
    /// `duration_ms`. Returns the number affected.
    pub fn trigger_fear(&mut self, source: Vec2, radius: f32, duration_ms: f32) -> usize {
        if duration_ms <= 0.0 || radius <= 0.0 {
            return 0;
        }
        let alive = self.store.alive_count();
        let tiers = &self.config.tiers;
        let cols = self.store.columns_mut();
        let mut affected = 0;
        for index in 0..alive {
            let reach = radius.min(tiers.get(cols.tier(index)).fear_trigger_radius);
            if cols.position(index).distance_squared(source) > reach * reach {
                continue;
            }
            cols.set_behavior(index, Behavior::Fleeing);
            let fear = cols.fear_ms_mut(index);
            *fear = fear.max(duration_ms);
            affected += 1;
        }
        tracing::debug!(affected, radius, duration_ms, "Fear triggered");
        affected
    }

    // ------------------------------------------------------------------
    // Read-only accessors
    // ------------------------------------------------------------------

    /// Number of live agents.
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.store.alive_count()
    }

    /// Maximum number of live agents.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    /// Live positions, indexed like every other accessor.
    #[must_use]
    pub fn positions(&self) -> &[Vec2] {
        self.store.positions()
    }

    /// Position of agent `index`.
    #[must_use]
    pub fn position(&self, index: usize) -> Vec2 {
        self.store.position(index)
    }

    /// Velocity of agent `index`.
    #[must_use]
    pub fn velocity(&self, index: usize) -> Vec2 {
        self.store.velocities()[index]
    }

    /// Tier of agent `index`.
    #[must_use]
    pub fn tier(&self, index: usize) -> AgentTier {
        self.store.tier(index)
    }

    /// True if agent `index` is fleeing.
    #[must_use]
    pub fn is_feared(&self, index: usize) -> bool {
        self.store.is_feared(index)
    }

    /// Hit points of agent `index`.
    #[must_use]
    pub fn hit_points(&self, index: usize) -> u32 {
        self.store.hit_point_column()[index]
    }

    /// Serial id of agent `index`.
    #[must_use]
    pub fn id(&self, index: usize) -> AgentId {
        self.store.ids()[index]
    }

    /// Current index of the agent with `id`, if it is still alive.
    #[must_use]
    pub fn index_of(&self, id: AgentId) -> Option<usize> {
        self.store.ids().iter().position(|&other| other == id)
    }

    /// Copy of every field of agent `index`.
    #[must_use]
    pub fn snapshot(&self, index: usize) -> AgentRow {
        self.store.snapshot(index)
    }

    /// Spatial hash of every live agent, for per-cell density queries.
    #[must_use]
    pub fn density_snapshot(&self) -> SpatialHashGrid {
        let mut grid = SpatialHashGrid::new(self.config.bounds, self.config.spatial_cell_size);
        grid.build_all(self.store.positions());
        grid
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Advance every agent by `dt_ms` toward `target`, steering around the
    /// obstacles in `nav`. Returns the touch damage dealt this tick.
    pub fn update(&mut self, dt_ms: f32, target: Vec2, nav: &NavigationField) -> u32 {
        let ctx = TickContext::new(self.tick, dt_ms, target);
        let mut stats = TickStats {
            damage: self.decay_timers(&ctx),
            ..TickStats::default()
        };

        self.rebuild_near_grid(&ctx);
        stats.near_count = self.near_indices.len() as u32;

        let mut index = 0;
        while index < self.store.alive_count() {
            if self.step_agent(&ctx, index, nav, &mut stats) {
                // Slot now holds the former last agent.
                stats.despawned += 1;
            } else {
                index += 1;
            }
        }

        self.tick += 1;
        self.last_stats = stats;

        tracing::trace!(
            tick = self.tick,
            alive = self.store.alive_count(),
            damage = stats.damage,
            despawned = stats.despawned,
            near = stats.near_count,
            embedded = stats.embedded,
            "Crowd tick"
        );

        #[cfg(debug_assertions)]
        tracing::trace!(tick = self.tick, state_hash = self.state_hash(), "Crowd state hash");

        #[cfg(feature = "debug-validation")]
        if let Err(violation) = self.store.check_invariants() {
            tracing::error!(tick = self.tick, %violation, "Agent invariant violated");
            panic!("agent invariant violated after tick {}: {violation}", self.tick);
        }

        stats.damage
    }

    /// Decay every timer, return fleeing agents whose fear ran out to
    /// seeking, and apply touch damage.
    fn decay_timers(&mut self, ctx: &TickContext) -> u32 {
        let alive = self.store.alive_count();
        let touch_sq = self.config.steering.touch_range_squared();
        let tiers = &self.config.tiers;
        let cols = self.store.columns_mut();

        let mut damage = 0u32;
        for index in 0..alive {
            let fear = cols.fear_ms_mut(index);
            *fear = (*fear - ctx.dt_ms).max(0.0);
            if *fear <= 0.0 && cols.behavior(index) == Behavior::Fleeing {
                cols.set_behavior(index, Behavior::Seeking);
            }

            let assist = cols.flow_assist_ms_mut(index);
            *assist = (*assist - ctx.dt_ms).max(0.0);

            let stats = tiers.get(cols.tier(index));
            let in_range = cols.position(index).distance_squared(ctx.target) <= touch_sq;
            let cooldown = cols.cooldown_ms_mut(index);
            *cooldown = (*cooldown - ctx.dt_ms).max(0.0);
            if in_range && *cooldown <= 0.0 {
                damage = damage.saturating_add(stats.touch_damage);
                *cooldown = stats.attack_cooldown_ms;
            }
        }
        damage
    }

    fn rebuild_near_grid(&mut self, ctx: &TickContext) {
        let radius = self.config.steering.sep_active_radius;
        let radius_sq = radius * radius;
        self.near_indices.clear();
        self.near_indices.extend(
            self.store
                .positions()
                .iter()
                .enumerate()
                .filter(|(_, p)| p.distance_squared(ctx.target) <= radius_sq)
                .map(|(i, _)| i as u32),
        );
        self.grid.build_near(self.store.positions(), &self.near_indices);
    }

    /// Run one agent's behavior. Returns `true` if it was despawned.
    fn step_agent(
        &mut self,
        ctx: &TickContext,
        index: usize,
        nav: &NavigationField,
        stats: &mut TickStats,
    ) -> bool {
        let steering = &self.config.steering;
        let alive = self.store.alive_count();
        let cols = self.store.columns_mut();
        let position = cols.position(index);
        let dist_sq = position.distance_squared(ctx.target);
        let type_stats = self.config.tiers.get(cols.tier(index));

        if cols.behavior(index) == Behavior::Fleeing {
            if dist_sq > steering.despawn_distance * steering.despawn_distance {
                self.store.despawn(index);
                return true;
            }
            let velocity = flee_direction(position, ctx.target) * type_stats.max_speed;
            cols.set_velocity(index, velocity);
            cols.set_separation(index, Vec2::ZERO);
            move_with_collision(cols, index, velocity * ctx.dt_secs, nav, steering, stats);
            return false;
        }

        match LodBand::classify(dist_sq, steering) {
            LodBand::Near => {
                let push = if stagger(ctx.tick, index, 1) {
                    let (push, _) = separation(
                        index,
                        cols.positions_prefix(alive),
                        alive,
                        &self.grid,
                        steering,
                    );
                    cols.set_separation(index, push);
                    push
                } else {
                    cols.separation(index)
                };

                let mut seek = seek_direction(position, ctx.target);
                if cols.flow_assist_ms(index) > 0.0 {
                    if let Some(cell) = nav.cell_index_of(position) {
                        seek = blend_flow(
                            seek,
                            nav.flow_vector_at_cell(cell),
                            steering.flow_assist_weight,
                        );
                    }
                }

                let velocity = steer(seek, push, type_stats);
                cols.set_velocity(index, velocity);
                move_with_collision(cols, index, velocity * ctx.dt_secs, nav, steering, stats);
            }
            band => {
                cols.set_separation(index, Vec2::ZERO);
                if band.should_recompute(ctx.tick, index, steering) {
                    let velocity = seek_direction(position, ctx.target) * type_stats.max_speed;
                    cols.set_velocity(index, velocity);
                    stats.recomputed += 1;
                }
                let delta = cols.velocity(index) * ctx.dt_secs;
                let no_collision = steering.no_collision_radius;
                if dist_sq > no_collision * no_collision {
                    cols.set_position(index, position + delta);
                } else {
                    move_with_collision(cols, index, delta, nav, steering, stats);
                }
            }
        }
        false
    }

    // ------------------------------------------------------------------
    // Determinism
    // ------------------------------------------------------------------

    /// Hash of the tick counter and every live agent field.
    ///
    /// Two simulations built from the same config and driven by the same
    /// calls produce the same hash.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);
        self.store.alive_count().hash(&mut hasher);

        for index in 0..self.store.alive_count() {
            let row = self.store.snapshot(index);
            row.id.hash(&mut hasher);
            row.position.x.to_bits().hash(&mut hasher);
            row.position.y.to_bits().hash(&mut hasher);
            row.velocity.x.to_bits().hash(&mut hasher);
            row.velocity.y.to_bits().hash(&mut hasher);
            row.tier.hash(&mut hasher);
            row.behavior.hash(&mut hasher);
            row.fear_ms.to_bits().hash(&mut hasher);
            row.cooldown_ms.to_bits().hash(&mut hasher);
            row.flow_assist_ms.to_bits().hash(&mut hasher);
            row.hit_points.hash(&mut hasher);
        }

        hasher.finish()
    }
}

/// Apply `delta` with axis sliding, arm flow-assist on a full block, and
/// push the agent out of any obstacle it ends up in.
fn move_with_collision(
    cols: &mut AgentColumns,
    index: usize,
    delta: Vec2,
    nav: &NavigationField,
    steering: &SteeringConfig,
    stats: &mut TickStats,
) {
    let (mut to, outcome) = resolve_move(cols.position(index), delta, nav);
    if outcome == MoveOutcome::Blocked {
        *cols.flow_assist_ms_mut(index) = steering.flow_assist_burst_ms;
        stats.blocked_moves += 1;
    }
    if nav.is_blocked_at_world_point(to) {
        match unstuck(to, nav, steering) {
            Some(free) => to = free,
            None => stats.embedded += 1,
        }
    }
    cols.set_position(index, to);
}
