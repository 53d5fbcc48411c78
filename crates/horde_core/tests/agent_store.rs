//! Agent store properties: swap-remove, tier distribution, invariants
//! under arbitrary spawn/despawn sequences.

use horde_core::prelude::*;
use horde_test_utils::determinism::strategies::{arb_store_ops, StoreOp};
use horde_test_utils::fixtures::{open_field, test_config, TEST_DT_MS};
use proptest::prelude::*;

#[test]
fn test_swap_remove_middle_moves_last() {
    let mut store = AgentStore::new(&test_config(1));
    store.spawn(6, Vec2::ZERO);
    let last = store.snapshot(5);

    store.despawn(2);

    assert_eq!(store.alive_count(), 5);
    assert_eq!(store.snapshot(2), last);
}

#[test]
fn test_swap_remove_last_only_shrinks() {
    let mut store = AgentStore::new(&test_config(1));
    store.spawn(6, Vec2::ZERO);
    let before: Vec<AgentRow> = (0..5).map(|i| store.snapshot(i)).collect();

    store.despawn(5);

    assert_eq!(store.alive_count(), 5);
    for (i, row) in before.iter().enumerate() {
        assert_eq!(&store.snapshot(i), row);
    }
}

#[test]
fn test_removal_loop_revisits_relocated_slot() {
    let mut store = AgentStore::new(&test_config(2));
    for x in 0..10 {
        let tier = if x % 2 == 0 { AgentTier::Brute } else { AgentTier::Drone };
        store.spawn_at(Vec2::new(x as f32, 0.0), Some(tier));
    }

    // Remove every brute; the relocated agent must be checked before moving on.
    let mut i = 0;
    while i < store.alive_count() {
        if store.tier(i) == AgentTier::Brute {
            store.despawn(i);
        } else {
            i += 1;
        }
    }

    assert_eq!(store.alive_count(), 5);
    assert!(store.tier_column().iter().all(|&t| t == AgentTier::Drone));
}

#[test]
fn test_weighted_roll_frequencies() {
    const SAMPLES: usize = 100_000;
    let config = CrowdConfig {
        capacity: SAMPLES,
        seed: 0xC0FFEE,
        ..CrowdConfig::default()
    };
    let mut store = AgentStore::new(&config);
    assert_eq!(store.spawn(SAMPLES, Vec2::ZERO), SAMPLES);

    let mut counts = [0usize; 4];
    for &tier in store.tier_column() {
        counts[tier.index()] += 1;
    }
    let expected = [0.70, 0.20, 0.09, 0.01];
    for (tier, (&count, &p)) in counts.iter().zip(&expected).enumerate() {
        let observed = count as f64 / SAMPLES as f64;
        assert!(
            (observed - p).abs() < 0.01,
            "tier {tier}: observed {observed:.4}, expected {p}"
        );
    }
    let elite = counts[3] as f64 / SAMPLES as f64;
    assert!((elite - 0.01).abs() < 0.003, "elite share {elite:.4}");
}

#[test]
fn test_spawn_at_keeps_exact_position() {
    let config = CrowdConfig {
        capacity: 4,
        bounds: WorldBounds::centered(100.0),
        ..CrowdConfig::default()
    };
    let mut store = AgentStore::new(&config);

    assert!(store.spawn_at(Vec2::new(150.0, 0.0), None));
    assert!(store.spawn_at(Vec2::new(-37.5, 12.25), None));

    assert_eq!(store.position(0), Vec2::new(150.0, 0.0));
    assert_eq!(store.position(1), Vec2::new(-37.5, 12.25));
}

#[test]
fn test_corner_spawn_stays_in_annulus() {
    let config = test_config(5);
    let corner = config.bounds.max;
    let (min_radius, max_radius) = (config.spawn.min_radius, config.spawn.max_radius);
    let mut store = AgentStore::new(&config);

    assert_eq!(store.spawn(200, corner), 200);

    for &p in store.positions() {
        let d = (p - corner).length();
        assert!(
            d >= min_radius - 1e-2 && d <= max_radius + 1e-2,
            "{p:?} is {d} from the origin, outside [{min_radius}, {max_radius}]"
        );
    }
}

#[test]
fn test_corner_spawn_deals_no_immediate_damage() {
    let config = test_config(5);
    let corner = config.bounds.max;
    let mut sim = CrowdSim::new(config).unwrap();
    let nav = open_field(sim.config().bounds);
    sim.spawn(200, corner);

    let damage = sim.update(TEST_DT_MS, corner, &nav);

    assert_eq!(damage, 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_store_invariants_hold(ops in arb_store_ops(60)) {
        let config = CrowdConfig { capacity: 48, ..test_config(17) };
        let mut sim = CrowdSim::new(config).unwrap();
        let nav = open_field(sim.config().bounds);
        let mut expected_kills = 0u32;

        for op in ops {
            let alive = sim.alive_count();
            match op {
                StoreOp::Spawn(n, origin) => {
                    let placed = sim.spawn(n, origin);
                    prop_assert_eq!(placed, n.min(sim.capacity() - alive));
                }
                StoreOp::SpawnAt(p, tier) => {
                    let ok = sim.spawn_at(p, tier);
                    prop_assert_eq!(ok, alive < sim.capacity());
                    if let (true, Some(tier)) = (ok, tier) {
                        prop_assert_eq!(sim.tier(alive), tier);
                    }
                }
                StoreOp::Despawn(i) if alive > 0 => sim.despawn(i % alive),
                StoreOp::Kill(i) if alive > 0 => {
                    sim.kill_by_player(i % alive);
                    expected_kills += 1;
                }
                StoreOp::Damage(i, amount) if alive > 0 => {
                    let index = i % alive;
                    let before = sim.hit_points(index);
                    let dead = sim.damage_agent(index, amount);
                    prop_assert_eq!(sim.hit_points(index), before.saturating_sub(amount));
                    prop_assert_eq!(dead, sim.hit_points(index) == 0);
                }
                StoreOp::Tick => {
                    sim.update(TEST_DT_MS, Vec2::ZERO, &nav);
                }
                _ => {}
            }

            prop_assert!(sim.alive_count() <= sim.capacity());
            prop_assert!(sim.agents().check_invariants().is_ok());
            for index in 0..sim.alive_count() {
                let max = sim.config().tiers.get(sim.tier(index)).max_hit_points;
                prop_assert!(sim.hit_points(index) <= max);
                prop_assert!(AgentTier::ALL.contains(&sim.tier(index)));
            }
        }

        prop_assert_eq!(sim.consume_kills_this_frame(), expected_kills);
    }

    #[test]
    fn prop_ids_are_unique(ops in arb_store_ops(60)) {
        let config = CrowdConfig { capacity: 48, ..test_config(23) };
        let mut sim = CrowdSim::new(config).unwrap();

        for op in ops {
            let alive = sim.alive_count();
            match op {
                StoreOp::Spawn(n, origin) => { sim.spawn(n, origin); }
                StoreOp::SpawnAt(p, tier) => { sim.spawn_at(p, tier); }
                StoreOp::Despawn(i) | StoreOp::Kill(i) if alive > 0 => sim.despawn(i % alive),
                _ => {}
            }
        }

        let mut ids: Vec<AgentId> = (0..sim.alive_count()).map(|i| sim.id(i)).collect();
        let len = ids.len();
        ids.sort_unstable();
        ids.dedup();
        prop_assert_eq!(ids.len(), len);
    }
}
