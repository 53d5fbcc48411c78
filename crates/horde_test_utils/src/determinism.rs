//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the crowd simulation produces
//! identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! The simulation must replay exactly from a config and a call sequence.
//! Sources of non-determinism include:
//!
//! - **Unseeded randomness**: spawning draws from a `SmallRng` seeded by
//!   [`horde_core::config::CrowdConfig::seed`]; nothing else is random.
//!
//! - **Iteration order**: agents are always visited in index order, and
//!   swap-remove relocations follow a fixed rule.
//!
//! - **Float reassociation**: every sum runs in the same order on every
//!   run, so `f32` results are bit-identical on one machine.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual module determinism (flow field, spawning)
//! 2. **Property tests**: Random inputs must still produce deterministic outputs
//! 3. **Integration tests**: Full crowd scenarios are reproducible
//! 4. **Parallel tests**: Running N simulations on threads all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use crate::fixtures::CrowdHarness;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial simulation state
/// * `step` - Function to advance simulation by one tick
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```
/// use horde_test_utils::determinism::verify_determinism;
/// use horde_test_utils::fixtures::spawned_harness;
///
/// let result = verify_determinism(
///     3,
///     20,
///     || spawned_harness(7, 32),
///     |h| { h.step(); },
///     |h| h.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();
        for _ in 0..ticks {
            step(&mut state);
        }
        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run a crowd harness twice with identical setup and compare final hashes.
#[must_use]
pub fn verify_crowd_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> CrowdHarness,
{
    verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |harness| {
            harness.step();
        },
        CrowdHarness::state_hash,
    )
    .is_deterministic
}

/// Run `num_sims` harnesses on scoped threads and collect final hashes.
///
/// # Panics
///
/// Panics if a worker thread panics.
pub fn run_parallel_crowds<F>(setup_fn: F, num_sims: usize, num_ticks: u64) -> DeterminismResult
where
    F: Fn() -> CrowdHarness + Sync,
{
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut harness = setup_fn();
                    harness.run(num_ticks);
                    harness.state_hash()
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        ticks: num_ticks,
    }
}

/// Compare two crowd runs tick-by-tick, finding first divergence.
///
/// # Returns
///
/// `None` if the runs match throughout, `Some(tick)` for the first tick
/// whose hashes differ.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> CrowdHarness,
{
    let mut a = setup_fn();
    let mut b = setup_fn();

    if a.state_hash() != b.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        a.step();
        b.step();

        if a.state_hash() != b.state_hash() {
            tracing::warn!(tick, "Crowd runs diverged");
            return Some(tick);
        }
    }

    None
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for crowd testing.
pub mod strategies {
    use horde_core::prelude::*;
    use proptest::prelude::*;

    /// Coordinate within ±1000, inside the fixture bounds.
    pub fn arb_coord() -> impl Strategy<Value = f32> {
        (-1000i32..1000i32).prop_map(|v| v as f32)
    }

    /// Position within the fixture bounds.
    pub fn arb_position() -> impl Strategy<Value = Vec2> {
        (arb_coord(), arb_coord()).prop_map(|(x, y)| Vec2::new(x, y))
    }

    /// Any tier.
    pub fn arb_tier() -> impl Strategy<Value = AgentTier> {
        prop::sample::select(AgentTier::ALL.to_vec())
    }

    /// One mutation of an agent store.
    #[derive(Debug, Clone)]
    pub enum StoreOp {
        /// Bulk spawn around a point.
        Spawn(usize, Vec2),
        /// Single spawn, optionally with a forced tier.
        SpawnAt(Vec2, Option<AgentTier>),
        /// Despawn the agent at `index % alive`.
        Despawn(usize),
        /// Player-kill the agent at `index % alive`.
        Kill(usize),
        /// Damage the agent at `index % alive`.
        Damage(usize, u32),
        /// Run one simulation tick.
        Tick,
    }

    /// Generate a store operation.
    pub fn arb_store_op() -> impl Strategy<Value = StoreOp> {
        prop_oneof![
            (0usize..40, arb_position()).prop_map(|(n, p)| StoreOp::Spawn(n, p)),
            (arb_position(), proptest::option::of(arb_tier()))
                .prop_map(|(p, t)| StoreOp::SpawnAt(p, t)),
            any::<usize>().prop_map(StoreOp::Despawn),
            any::<usize>().prop_map(StoreOp::Kill),
            (any::<usize>(), 0u32..50).prop_map(|(i, d)| StoreOp::Damage(i, d)),
            Just(StoreOp::Tick),
        ]
    }

    /// Generate a sequence of store operations.
    pub fn arb_store_ops(max_len: usize) -> impl Strategy<Value = Vec<StoreOp>> {
        proptest::collection::vec(arb_store_op(), 0..max_len)
    }

    /// Rectangle obstacle as `(min, size)` inside the fixture bounds.
    pub fn arb_rect() -> impl Strategy<Value = (Vec2, Vec2)> {
        (arb_position(), 8i32..200, 8i32..200)
            .prop_map(|(min, w, h)| (min, Vec2::new(w as f32, h as f32)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{spawned_harness, CrowdHarness};
    use horde_core::prelude::*;

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 100, || 0u64, |n| *n += 1, |n| *n);
        assert!(result.is_deterministic);
        assert_eq!(result.hashes, vec![100, 100, 100]);
    }

    #[test]
    fn test_empty_crowd_determinism() {
        assert!(verify_crowd_determinism(|| spawned_harness(1, 0), 50));
    }

    #[test]
    fn test_spawned_crowd_determinism() {
        assert!(verify_crowd_determinism(|| spawned_harness(9, 128), 120));
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = spawned_harness(1, 64).state_hash();
        let b = spawned_harness(2, 64).state_hash();
        assert_ne!(a, b);
    }

    #[test]
    fn test_fear_and_kills_are_deterministic() {
        let setup = || {
            let mut harness = spawned_harness(5, 96);
            harness.run(10);
            harness.sim.trigger_fear(Vec2::new(500.0, 0.0), 300.0, 2000.0);
            harness.sim.kill_by_player(0);
            harness.sim.kill_by_player(3);
            harness
        };
        assert_eq!(find_first_divergence(setup, 150), None);
    }

    #[test]
    fn test_moving_target_is_deterministic() {
        let result = verify_determinism(
            3,
            100,
            || spawned_harness(11, 64),
            |h: &mut CrowdHarness| {
                h.target = h.target + Vec2::new(2.0, 1.0);
                h.nav.build_flow_field(h.target);
                h.step();
            },
            CrowdHarness::state_hash,
        );
        result.assert_deterministic();
    }

    #[test]
    fn test_parallel_crowds_match() {
        run_parallel_crowds(|| spawned_harness(3, 128), 4, 60).assert_deterministic();
    }

    #[test]
    fn test_compute_hash_stable() {
        assert_eq!(compute_hash(&(1u32, 2u64)), compute_hash(&(1u32, 2u64)));
    }
}
