//! Shipped scenario files load and replay deterministically.

use std::path::PathBuf;

use horde_headless::runner::ScenarioRunner;
use horde_headless::scenario::{Scenario, TargetPath};
use horde_test_utils::determinism::verify_determinism;

fn scenario_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("scenarios")
        .join(name)
}

#[test]
fn test_corridor_loads() {
    let scenario = Scenario::load(scenario_path("corridor.ron")).unwrap();

    assert_eq!(scenario.name, "corridor");
    assert_eq!(scenario.obstacles.len(), 2);
    assert_eq!(scenario.hives.len(), 2);
    assert!(matches!(scenario.target, TargetPath::Waypoints { .. }));
    assert!(scenario.kill_zone.is_some());

    let nav = scenario.build_navigation().unwrap();
    assert!(nav.blocked_count() > 0);
}

#[test]
fn test_resolve_accepts_file_paths() {
    let path = scenario_path("corridor.ron");
    let scenario = Scenario::resolve(path.to_str().unwrap()).unwrap();
    assert_eq!(scenario.crowd.seed, 11);
}

#[test]
fn test_corridor_replays_identically() {
    let path = scenario_path("corridor.ron");
    let result = verify_determinism(
        3,
        90,
        || ScenarioRunner::new(Scenario::load(&path).unwrap()).unwrap(),
        |runner| {
            runner.step();
        },
        |runner| runner.sim().state_hash(),
    );
    result.assert_deterministic();
}

#[test]
fn test_builtins_replay_identically() {
    for name in Scenario::BUILTINS {
        let result = verify_determinism(
            2,
            30,
            || ScenarioRunner::new(Scenario::builtin(name).unwrap()).unwrap(),
            |runner| {
                runner.step();
            },
            |runner| runner.sim().state_hash(),
        );
        result.assert_deterministic();
    }
}
