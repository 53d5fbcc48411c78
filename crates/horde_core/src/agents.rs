//! Agent storage in structure-of-arrays layout.
//!
//! The hot loop touches positions and timers for tens of thousands of
//! agents per tick, so every field lives in its own dense column. Rows
//! `0..alive_count` are live; rows past that are reusable capacity with
//! unspecified contents.
//!
//! # Index contract
//!
//! An agent's index is its *position* in the columns, not a stable
//! identity. [`AgentStore::despawn`] and [`AgentStore::kill_by_player`]
//! swap-remove: the last live row is copied into the removed slot. A caller
//! that removes while iterating must revisit the same index, because it now
//! holds the agent formerly at the end. Consumers that need to follow a
//! specific agent across removals use its [`AgentId`], which travels with
//! the row.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::{AgentTier, CrowdConfig, SpawnConfig, TierTable};
use crate::math::Vec2;

/// Serial identity assigned at spawn. Never reused within one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct AgentId(pub u32);

/// Behavior state of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Behavior {
    /// Steering toward the target.
    #[default]
    Seeking,
    /// Running away from the target until the fear timer expires.
    Fleeing,
}

/// Scalar fields of one agent, used for snapshots and row writes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentRow {
    /// Serial identity.
    pub id: AgentId,
    /// World position.
    pub position: Vec2,
    /// Last computed velocity, world units per second.
    pub velocity: Vec2,
    /// Tier.
    pub tier: AgentTier,
    /// Behavior state.
    pub behavior: Behavior,
    /// Remaining fear, milliseconds.
    pub fear_ms: f32,
    /// Remaining attack cooldown, milliseconds.
    pub cooldown_ms: f32,
    /// Remaining flow-assist, milliseconds.
    pub flow_assist_ms: f32,
    /// Current hit points.
    pub hit_points: u32,
    /// Separation push cached between staggered recomputes.
    pub separation: Vec2,
}

/// Parallel columns, one entry per slot of capacity.
#[derive(Debug, Clone, Default)]
pub struct AgentColumns {
    ids: Vec<AgentId>,
    positions: Vec<Vec2>,
    velocities: Vec<Vec2>,
    tiers: Vec<AgentTier>,
    behaviors: Vec<Behavior>,
    fear_ms: Vec<f32>,
    cooldown_ms: Vec<f32>,
    flow_assist_ms: Vec<f32>,
    hit_points: Vec<u32>,
    separation: Vec<Vec2>,
}

impl AgentColumns {
    /// Allocate `capacity` default rows in every column.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ids: vec![AgentId::default(); capacity],
            positions: vec![Vec2::ZERO; capacity],
            velocities: vec![Vec2::ZERO; capacity],
            tiers: vec![AgentTier::default(); capacity],
            behaviors: vec![Behavior::default(); capacity],
            fear_ms: vec![0.0; capacity],
            cooldown_ms: vec![0.0; capacity],
            flow_assist_ms: vec![0.0; capacity],
            hit_points: vec![0; capacity],
            separation: vec![Vec2::ZERO; capacity],
        }
    }

    /// Number of slots (live or not).
    #[must_use]
    pub fn slots(&self) -> usize {
        self.positions.len()
    }

    /// Overwrite every column at `index`.
    pub fn write_row(&mut self, index: usize, row: AgentRow) {
        self.ids[index] = row.id;
        self.positions[index] = row.position;
        self.velocities[index] = row.velocity;
        self.tiers[index] = row.tier;
        self.behaviors[index] = row.behavior;
        self.fear_ms[index] = row.fear_ms;
        self.cooldown_ms[index] = row.cooldown_ms;
        self.flow_assist_ms[index] = row.flow_assist_ms;
        self.hit_points[index] = row.hit_points;
        self.separation[index] = row.separation;
    }

    /// Copy the row at `from` into `to`, column by column.
    pub fn move_row(&mut self, from: usize, to: usize) {
        if from == to {
            return;
        }
        self.ids[to] = self.ids[from];
        self.positions[to] = self.positions[from];
        self.velocities[to] = self.velocities[from];
        self.tiers[to] = self.tiers[from];
        self.behaviors[to] = self.behaviors[from];
        self.fear_ms[to] = self.fear_ms[from];
        self.cooldown_ms[to] = self.cooldown_ms[from];
        self.flow_assist_ms[to] = self.flow_assist_ms[from];
        self.hit_points[to] = self.hit_points[from];
        self.separation[to] = self.separation[from];
    }

    /// Copy of the scalar fields at `index`.
    #[must_use]
    pub fn snapshot(&self, index: usize) -> AgentRow {
        AgentRow {
            id: self.ids[index],
            position: self.positions[index],
            velocity: self.velocities[index],
            tier: self.tiers[index],
            behavior: self.behaviors[index],
            fear_ms: self.fear_ms[index],
            cooldown_ms: self.cooldown_ms[index],
            flow_assist_ms: self.flow_assist_ms[index],
            hit_points: self.hit_points[index],
            separation: self.separation[index],
        }
    }
}

/// Owner of all per-agent state.
#[derive(Debug, Clone)]
pub struct AgentStore {
    columns: AgentColumns,
    alive: usize,
    kills_this_frame: u32,
    next_id: u32,
    spawn: SpawnConfig,
    tiers: TierTable,
    rng: SmallRng,
}

impl AgentStore {
    /// Allocate a store for `config.capacity` agents.
    #[must_use]
    pub fn new(config: &CrowdConfig) -> Self {
        Self {
            columns: AgentColumns::with_capacity(config.capacity),
            alive: 0,
            kills_this_frame: 0,
            next_id: 0,
            spawn: config.spawn,
            tiers: config.tiers.clone(),
            rng: SmallRng::seed_from_u64(config.seed),
        }
    }

    /// Number of live agents.
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.alive
    }

    /// Maximum number of live agents.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.columns.slots()
    }

    /// True if no further agent fits.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.alive >= self.capacity()
    }

    /// Tier stats table.
    #[must_use]
    pub const fn tiers(&self) -> &TierTable {
        &self.tiers
    }

    /// Spawn up to `count` agents in the configured annulus around `origin`.
    ///
    /// Stops silently at capacity and returns how many were placed.
    pub fn spawn(&mut self, count: usize, origin: Vec2) -> usize {
        let room = self.capacity() - self.alive;
        let placed = count.min(room);
        for _ in 0..placed {
            let angle = self.rng.gen_range(0.0..std::f32::consts::TAU);
            let radius = if self.spawn.max_radius > self.spawn.min_radius {
                self.rng.gen_range(self.spawn.min_radius..self.spawn.max_radius)
            } else {
                self.spawn.min_radius
            };
            let position = origin + Vec2::from_polar(angle, radius);
            let tier = self.roll_tier();
            self.push(position, tier);
        }
        if placed < count {
            tracing::debug!(
                requested = count,
                placed,
                capacity = self.capacity(),
                "Spawn truncated at capacity"
            );
        }
        placed
    }

    /// Place one agent at `position`, rolling its tier unless `forced_tier`
    /// is given. Returns `false` without side effects at capacity.
    pub fn spawn_at(&mut self, position: Vec2, forced_tier: Option<AgentTier>) -> bool {
        if self.is_full() {
            return false;
        }
        let tier = match forced_tier {
            Some(tier) => tier,
            None => self.roll_tier(),
        };
        self.push(position, tier);
        true
    }

    /// Draw a tier from the configured cumulative thresholds.
    pub fn roll_tier(&mut self) -> AgentTier {
        let r: f32 = self.rng.gen();
        AgentTier::from_roll(r, self.spawn.tier_thresholds)
    }

    fn push(&mut self, position: Vec2, tier: AgentTier) {
        let id = AgentId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        let row = AgentRow {
            id,
            position,
            tier,
            hit_points: self.tiers.get(tier).max_hit_points,
            ..AgentRow::default()
        };
        self.columns.write_row(self.alive, row);
        self.alive += 1;
    }

    /// Remove the agent at `index` without counting a kill.
    ///
    /// # Panics
    ///
    /// Panics if `index >= alive_count()`.
    pub fn despawn(&mut self, index: usize) {
        self.swap_remove(index);
    }

    /// Remove the agent at `index` and count it as a player kill.
    ///
    /// # Panics
    ///
    /// Panics if `index >= alive_count()`.
    pub fn kill_by_player(&mut self, index: usize) {
        self.swap_remove(index);
        self.kills_this_frame += 1;
    }

    fn swap_remove(&mut self, index: usize) {
        assert!(
            index < self.alive,
            "agent index {index} out of range (alive: {})",
            self.alive
        );
        let last = self.alive - 1;
        if index != last {
            self.columns.move_row(last, index);
        }
        self.alive = last;
    }

    /// Return the kill count accumulated since the previous call, and reset it.
    pub fn consume_kills_this_frame(&mut self) -> u32 {
        std::mem::take(&mut self.kills_this_frame)
    }

    /// Kills accumulated but not yet consumed.
    #[must_use]
    pub const fn pending_kills(&self) -> u32 {
        self.kills_this_frame
    }

    /// Subtract `amount` hit points (saturating). Returns true if the agent
    /// is now at zero.
    ///
    /// # Panics
    ///
    /// Panics if `index >= alive_count()`.
    pub fn apply_damage(&mut self, index: usize, amount: u32) -> bool {
        assert!(index < self.alive, "agent index {index} out of range");
        let hp = &mut self.columns.hit_points[index];
        *hp = hp.saturating_sub(amount);
        *hp == 0
    }

    // ------------------------------------------------------------------
    // Read-only views over live rows
    // ------------------------------------------------------------------

    /// Live positions.
    #[must_use]
    pub fn positions(&self) -> &[Vec2] {
        &self.columns.positions[..self.alive]
    }

    /// Live velocities.
    #[must_use]
    pub fn velocities(&self) -> &[Vec2] {
        &self.columns.velocities[..self.alive]
    }

    /// Live tiers.
    #[must_use]
    pub fn tier_column(&self) -> &[AgentTier] {
        &self.columns.tiers[..self.alive]
    }

    /// Live behavior states.
    #[must_use]
    pub fn behaviors(&self) -> &[Behavior] {
        &self.columns.behaviors[..self.alive]
    }

    /// Live hit points.
    #[must_use]
    pub fn hit_point_column(&self) -> &[u32] {
        &self.columns.hit_points[..self.alive]
    }

    /// Live agent ids.
    #[must_use]
    pub fn ids(&self) -> &[AgentId] {
        &self.columns.ids[..self.alive]
    }

    /// Copy of the row at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= alive_count()`.
    #[must_use]
    pub fn snapshot(&self, index: usize) -> AgentRow {
        assert!(index < self.alive, "agent index {index} out of range");
        self.columns.snapshot(index)
    }

    /// Position of agent `index`.
    #[must_use]
    pub fn position(&self, index: usize) -> Vec2 {
        self.positions()[index]
    }

    /// Tier of agent `index`.
    #[must_use]
    pub fn tier(&self, index: usize) -> AgentTier {
        self.tier_column()[index]
    }

    /// True if agent `index` is fleeing.
    #[must_use]
    pub fn is_feared(&self, index: usize) -> bool {
        self.behaviors()[index] == Behavior::Fleeing
    }

    /// Mutable column access for the steering pass.
    pub(crate) fn columns_mut(&mut self) -> &mut AgentColumns {
        &mut self.columns
    }

    /// Check the per-row invariants of every live agent.
    ///
    /// Returns a description of the first violation found.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.alive > self.capacity() {
            return Err(format!(
                "alive count {} exceeds capacity {}",
                self.alive,
                self.capacity()
            ));
        }
        for index in 0..self.alive {
            let row = self.columns.snapshot(index);
            let max_hp = self.tiers.get(row.tier).max_hit_points;
            if row.hit_points > max_hp {
                return Err(format!(
                    "agent {index} has {} hp, max is {max_hp}",
                    row.hit_points
                ));
            }
            if row.fear_ms < 0.0 || row.cooldown_ms < 0.0 || row.flow_assist_ms < 0.0 {
                return Err(format!("agent {index} has a negative timer"));
            }
            if !row.position.x.is_finite() || !row.position.y.is_finite() {
                return Err(format!("agent {index} has a non-finite position"));
            }
        }
        Ok(())
    }
}

/// Column-level field access used by the steering pass.
///
/// Kept crate-private so external callers only ever see live rows through
/// the read-only views above.
impl AgentColumns {
    pub(crate) fn position(&self, index: usize) -> Vec2 {
        self.positions[index]
    }

    pub(crate) fn set_position(&mut self, index: usize, value: Vec2) {
        self.positions[index] = value;
    }

    pub(crate) fn velocity(&self, index: usize) -> Vec2 {
        self.velocities[index]
    }

    pub(crate) fn set_velocity(&mut self, index: usize, value: Vec2) {
        self.velocities[index] = value;
    }

    pub(crate) fn tier(&self, index: usize) -> AgentTier {
        self.tiers[index]
    }

    pub(crate) fn behavior(&self, index: usize) -> Behavior {
        self.behaviors[index]
    }

    pub(crate) fn set_behavior(&mut self, index: usize, value: Behavior) {
        self.behaviors[index] = value;
    }

    pub(crate) fn fear_ms_mut(&mut self, index: usize) -> &mut f32 {
        &mut self.fear_ms[index]
    }

    pub(crate) fn cooldown_ms_mut(&mut self, index: usize) -> &mut f32 {
        &mut self.cooldown_ms[index]
    }

    pub(crate) fn flow_assist_ms(&self, index: usize) -> f32 {
        self.flow_assist_ms[index]
    }

    pub(crate) fn flow_assist_ms_mut(&mut self, index: usize) -> &mut f32 {
        &mut self.flow_assist_ms[index]
    }

    pub(crate) fn separation(&self, index: usize) -> Vec2 {
        self.separation[index]
    }

    pub(crate) fn set_separation(&mut self, index: usize, value: Vec2) {
        self.separation[index] = value;
    }

    pub(crate) fn positions_prefix(&self, len: usize) -> &[Vec2] {
        &self.positions[..len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(capacity: usize) -> AgentStore {
        AgentStore::new(&CrowdConfig {
            capacity,
            seed: 42,
            ..CrowdConfig::default()
        })
    }

    #[test]
    fn test_spawn_places_agents_in_annulus() {
        let mut store = store(100);
        let origin = Vec2::new(10.0, -20.0);
        assert_eq!(store.spawn(50, origin), 50);
        assert_eq!(store.alive_count(), 50);

        let spawn = SpawnConfig::default();
        for &p in store.positions() {
            let d = p.distance(origin);
            assert!(d >= spawn.min_radius - 0.01 && d <= spawn.max_radius + 0.01, "d = {d}");
        }
    }

    #[test]
    fn test_spawn_initializes_fields() {
        let mut store = store(10);
        store.spawn(10, Vec2::ZERO);
        for i in 0..store.alive_count() {
            let row = store.snapshot(i);
            assert_eq!(row.velocity, Vec2::ZERO);
            assert_eq!(row.behavior, Behavior::Seeking);
            assert_eq!(row.hit_points, store.tiers().get(row.tier).max_hit_points);
            assert_eq!(row.fear_ms, 0.0);
            assert_eq!(row.cooldown_ms, 0.0);
            assert_eq!(row.flow_assist_ms, 0.0);
        }
    }

    #[test]
    fn test_spawn_stops_at_capacity() {
        let mut store = store(8);
        assert_eq!(store.spawn(20, Vec2::ZERO), 8);
        assert_eq!(store.alive_count(), 8);
        assert_eq!(store.spawn(1, Vec2::ZERO), 0);
    }

    #[test]
    fn test_spawn_at_respects_forced_tier() {
        let mut store = store(2);
        assert!(store.spawn_at(Vec2::new(5.0, 5.0), Some(AgentTier::Elite)));
        assert_eq!(store.tier(0), AgentTier::Elite);
        assert_eq!(store.position(0), Vec2::new(5.0, 5.0));
    }

    #[test]
    fn test_spawn_at_fails_when_full() {
        let mut store = store(1);
        assert!(store.spawn_at(Vec2::ZERO, None));
        assert!(!store.spawn_at(Vec2::ZERO, None));
        assert_eq!(store.alive_count(), 1);
    }

    #[test]
    fn test_swap_remove_moves_last_row() {
        let mut store = store(4);
        for x in 0..4 {
            store.spawn_at(Vec2::new(x as f32, 0.0), Some(AgentTier::Drone));
        }
        let last = store.snapshot(3);

        store.despawn(1);

        assert_eq!(store.alive_count(), 3);
        assert_eq!(store.snapshot(1), last);
    }

    #[test]
    fn test_removing_last_only_decrements() {
        let mut store = store(3);
        for x in 0..3 {
            store.spawn_at(Vec2::new(x as f32, 0.0), None);
        }
        let first = store.snapshot(0);
        let second = store.snapshot(1);

        store.despawn(2);

        assert_eq!(store.alive_count(), 2);
        assert_eq!(store.snapshot(0), first);
        assert_eq!(store.snapshot(1), second);
    }

    #[test]
    fn test_kill_counter_only_counts_player_kills() {
        let mut store = store(4);
        store.spawn(4, Vec2::ZERO);
        store.despawn(0);
        store.kill_by_player(0);
        store.kill_by_player(0);

        assert_eq!(store.consume_kills_this_frame(), 2);
        assert_eq!(store.consume_kills_this_frame(), 0);
    }

    #[test]
    fn test_ids_follow_relocated_rows() {
        let mut store = store(3);
        store.spawn(3, Vec2::ZERO);
        let moved_id = store.ids()[2];

        store.kill_by_player(0);

        assert_eq!(store.ids()[0], moved_id);
    }

    #[test]
    fn test_apply_damage_saturates() {
        let mut store = store(1);
        store.spawn_at(Vec2::ZERO, Some(AgentTier::Drone));
        assert!(!store.apply_damage(0, 3));
        assert!(store.apply_damage(0, 1000));
        assert_eq!(store.hit_point_column()[0], 0);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_despawn_out_of_range_panics() {
        let mut store = store(2);
        store.spawn(1, Vec2::ZERO);
        store.despawn(1);
    }

    #[test]
    fn test_same_seed_same_spawns() {
        let mut a = store(32);
        let mut b = store(32);
        a.spawn(32, Vec2::ZERO);
        b.spawn(32, Vec2::ZERO);
        assert_eq!(a.positions(), b.positions());
        assert_eq!(a.tier_column(), b.tier_column());
    }
}
