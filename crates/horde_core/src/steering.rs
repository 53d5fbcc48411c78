//! Steering math and obstacle-aware movement.
//!
//! These are stateless building blocks. [`crate::simulation::CrowdSim`]
//! decides which of them run for each agent on each tick.

use crate::config::{SteeringConfig, TypeStats};
use crate::math::Vec2;
use crate::navigation::NavigationField;
use crate::spatial::SpatialHashGrid;

/// Unit vector from `from` toward `target`, or zero when they coincide.
#[must_use]
pub fn seek_direction(from: Vec2, target: Vec2) -> Vec2 {
    (target - from).normalize_or_zero()
}

/// Unit vector from `target` toward `from`.
///
/// An agent standing exactly on the target flees along +x.
#[must_use]
pub fn flee_direction(from: Vec2, target: Vec2) -> Vec2 {
    let away = (from - target).normalize_or_zero();
    if away.is_zero() {
        Vec2::new(1.0, 0.0)
    } else {
        away
    }
}

/// Push on agent `i` at `pi` from agent `j` at `pj`.
///
/// Direction is from `pj` to `pi`; magnitude is `(radius - d) / radius`, so
/// the two agents of a pair receive equal and opposite pushes. Coincident
/// agents are split along the x axis by index order.
#[must_use]
pub fn separation_push(pi: Vec2, i: u32, pj: Vec2, j: u32, radius: f32) -> Vec2 {
    let offset = pi - pj;
    let d_sq = offset.length_squared();
    if d_sq >= radius * radius {
        return Vec2::ZERO;
    }
    let d = d_sq.sqrt();
    if d <= f32::EPSILON {
        let sign = if i < j { -1.0 } else { 1.0 };
        return Vec2::new(sign, 0.0);
    }
    offset * ((radius - d) / (radius * d))
}

/// Summed separation push on agent `index` from its grid neighbors.
///
/// Neighbor indices at or past `alive` are stale grid entries and are
/// skipped. Returns the push and the number of neighbors examined.
#[must_use]
pub fn separation(
    index: usize,
    positions: &[Vec2],
    alive: usize,
    grid: &SpatialHashGrid,
    config: &SteeringConfig,
) -> (Vec2, usize) {
    let me = positions[index];
    let mut push = Vec2::ZERO;
    let examined = grid.for_each_neighbor(
        grid.cell_of(me),
        index as u32,
        config.max_neighbors,
        |other| {
            let j = other as usize;
            if j < alive {
                push += separation_push(me, index as u32, positions[j], other, config.separation_radius);
            }
        },
    );
    (push, examined)
}

/// Blend a flow vector into a seek direction. Zero flow leaves seek
/// untouched.
#[must_use]
pub fn blend_flow(seek: Vec2, flow: Vec2, weight: f32) -> Vec2 {
    if flow.is_zero() {
        return seek;
    }
    let blended = (seek * (1.0 - weight) + flow * weight).normalize_or_zero();
    if blended.is_zero() {
        seek
    } else {
        blended
    }
}

/// Combine seek and separation with the tier's weights into a velocity at
/// the tier's max speed.
#[must_use]
pub fn steer(seek: Vec2, separation: Vec2, stats: &TypeStats) -> Vec2 {
    (seek * stats.seek_weight + separation * stats.separation_weight).normalize_or_zero()
        * stats.max_speed
}

/// How a displacement was resolved against obstacles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The full displacement was applied.
    Full,
    /// Only the X component was applied.
    SlideX,
    /// Only the Y component was applied.
    SlideY,
    /// Nothing could be applied.
    Blocked,
    /// No displacement was requested.
    Idle,
}

/// Move `from` by `delta`, sliding along an axis when the full step lands
/// in a blocked cell.
#[must_use]
pub fn resolve_move(from: Vec2, delta: Vec2, nav: &NavigationField) -> (Vec2, MoveOutcome) {
    if delta.is_zero() {
        return (from, MoveOutcome::Idle);
    }
    let full = from + delta;
    if !nav.is_blocked_at_world_point(full) {
        return (full, MoveOutcome::Full);
    }
    let x_only = Vec2::new(from.x + delta.x, from.y);
    if delta.x != 0.0 && !nav.is_blocked_at_world_point(x_only) {
        return (x_only, MoveOutcome::SlideX);
    }
    let y_only = Vec2::new(from.x, from.y + delta.y);
    if delta.y != 0.0 && !nav.is_blocked_at_world_point(y_only) {
        return (y_only, MoveOutcome::SlideY);
    }
    (from, MoveOutcome::Blocked)
}

/// Search rings around `at` for the first unblocked point.
///
/// Rings grow by `unstuck_ring_step` up to `unstuck_max_radius`, each probed
/// at `unstuck_samples` evenly spaced angles starting at +x. Returns `None`
/// if every sample is blocked.
#[must_use]
pub fn unstuck(at: Vec2, nav: &NavigationField, config: &SteeringConfig) -> Option<Vec2> {
    let samples = config.unstuck_samples.max(1);
    let step_angle = std::f32::consts::TAU / samples as f32;
    let mut radius = config.unstuck_ring_step;
    while radius <= config.unstuck_max_radius {
        for k in 0..samples {
            let candidate = at + Vec2::from_polar(k as f32 * step_angle, radius);
            if !nav.is_blocked_at_world_point(candidate) {
                return Some(candidate);
            }
        }
        radius += config.unstuck_ring_step;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::WorldBounds;

    fn open_nav() -> NavigationField {
        NavigationField::new(WorldBounds::new(Vec2::ZERO, Vec2::new(100.0, 100.0)), 10.0).unwrap()
    }

    #[test]
    fn test_seek_and_flee_are_opposite() {
        let from = Vec2::new(3.0, 4.0);
        let seek = seek_direction(from, Vec2::ZERO);
        let flee = flee_direction(from, Vec2::ZERO);
        assert!((seek.x + flee.x).abs() < 1e-6);
        assert!((seek.y + flee.y).abs() < 1e-6);
        assert!((seek.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_flee_on_target_goes_positive_x() {
        assert_eq!(flee_direction(Vec2::ZERO, Vec2::ZERO), Vec2::new(1.0, 0.0));
    }

    #[test]
    fn test_separation_pushes_oppose() {
        let radius = 20.0;
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(5.0, 0.0);
        let on_a = separation_push(a, 0, b, 1, radius);
        let on_b = separation_push(b, 1, a, 0, radius);

        assert_eq!(on_a, -on_b);
        assert!(on_a.x < 0.0);
        // (20 - 5) / 20
        assert!((on_a.length() - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_separation_push_scales_with_overlap() {
        let radius = 20.0;
        let near = separation_push(Vec2::ZERO, 0, Vec2::new(2.0, 0.0), 1, radius).length();
        let far = separation_push(Vec2::ZERO, 0, Vec2::new(18.0, 0.0), 1, radius).length();
        assert!(near > far);
        assert!((far - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_no_push_outside_radius() {
        assert_eq!(
            separation_push(Vec2::ZERO, 0, Vec2::new(20.0, 0.0), 1, 20.0),
            Vec2::ZERO
        );
    }

    #[test]
    fn test_coincident_agents_split() {
        let p = Vec2::new(7.0, 7.0);
        let on_low = separation_push(p, 2, p, 5, 20.0);
        let on_high = separation_push(p, 5, p, 2, 20.0);
        assert_eq!(on_low, Vec2::new(-1.0, 0.0));
        assert_eq!(on_high, Vec2::new(1.0, 0.0));
    }

    #[test]
    fn test_separation_skips_stale_indices() {
        let config = SteeringConfig::default();
        let positions = [Vec2::new(50.0, 50.0), Vec2::new(55.0, 50.0)];
        let mut grid =
            SpatialHashGrid::new(WorldBounds::new(Vec2::ZERO, Vec2::new(100.0, 100.0)), 32.0);
        grid.build_all(&positions);

        let (push, examined) = separation(0, &positions, 1, &grid, &config);
        assert_eq!(examined, 1);
        assert_eq!(push, Vec2::ZERO);

        let (push, _) = separation(0, &positions, 2, &grid, &config);
        assert!(push.x < 0.0);
    }

    #[test]
    fn test_blend_flow_ignores_zero_flow() {
        let seek = Vec2::new(0.0, 1.0);
        assert_eq!(blend_flow(seek, Vec2::ZERO, 0.6), seek);
        let blended = blend_flow(seek, Vec2::new(1.0, 0.0), 0.5);
        assert!((blended.x - blended.y).abs() < 1e-6);
    }

    #[test]
    fn test_steer_scales_to_max_speed() {
        let stats = TypeStats {
            max_speed: 50.0,
            seek_weight: 1.0,
            separation_weight: 2.0,
            max_hit_points: 1,
            touch_damage: 1,
            attack_cooldown_ms: 100.0,
            fear_trigger_radius: 100.0,
        };
        let v = steer(Vec2::new(1.0, 0.0), Vec2::new(0.0, 0.5), &stats);
        assert!((v.length() - 50.0).abs() < 1e-3);
        assert!((v.x - v.y).abs() < 1e-3);
    }

    #[test]
    fn test_resolve_move_full_when_open() {
        let nav = open_nav();
        let (p, outcome) = resolve_move(Vec2::new(5.0, 5.0), Vec2::new(3.0, 4.0), &nav);
        assert_eq!(outcome, MoveOutcome::Full);
        assert_eq!(p, Vec2::new(8.0, 9.0));
    }

    #[test]
    fn test_resolve_move_slides_along_wall() {
        let mut nav = open_nav();
        // Wall filling the row y in 20..30.
        nav.add_obstacle_rect(Vec2::new(0.0, 20.0), Vec2::new(100.0, 9.0));
        let (p, outcome) = resolve_move(Vec2::new(15.0, 15.0), Vec2::new(2.0, 8.0), &nav);
        assert_eq!(outcome, MoveOutcome::SlideX);
        assert_eq!(p, Vec2::new(17.0, 15.0));
    }

    #[test]
    fn test_resolve_move_slides_y_when_x_blocked() {
        let mut nav = open_nav();
        // Wall filling the column x in 20..30.
        nav.add_obstacle_rect(Vec2::new(20.0, 0.0), Vec2::new(9.0, 100.0));
        let (p, outcome) = resolve_move(Vec2::new(15.0, 15.0), Vec2::new(8.0, 2.0), &nav);
        assert_eq!(outcome, MoveOutcome::SlideY);
        assert_eq!(p, Vec2::new(15.0, 17.0));
    }

    #[test]
    fn test_resolve_move_blocked_in_corner() {
        let mut nav = open_nav();
        nav.add_obstacle_rect(Vec2::new(20.0, 0.0), Vec2::new(9.0, 100.0));
        nav.add_obstacle_rect(Vec2::new(0.0, 20.0), Vec2::new(100.0, 9.0));
        let (p, outcome) = resolve_move(Vec2::new(15.0, 15.0), Vec2::new(8.0, 8.0), &nav);
        assert_eq!(outcome, MoveOutcome::Blocked);
        assert_eq!(p, Vec2::new(15.0, 15.0));
    }

    #[test]
    fn test_unstuck_finds_nearest_open_ring() {
        let mut nav = open_nav();
        nav.add_obstacle_circle(Vec2::new(55.0, 55.0), 4.0);
        let config = SteeringConfig {
            unstuck_ring_step: 10.0,
            unstuck_max_radius: 30.0,
            ..SteeringConfig::default()
        };
        let freed = unstuck(Vec2::new(55.0, 55.0), &nav, &config).unwrap();
        assert!(!nav.is_blocked_at_world_point(freed));
        assert!((freed.distance(Vec2::new(55.0, 55.0)) - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_unstuck_gives_up_when_buried() {
        let mut nav = open_nav();
        nav.add_obstacle_rect(Vec2::ZERO, Vec2::new(100.0, 100.0));
        let config = SteeringConfig {
            unstuck_ring_step: 5.0,
            unstuck_max_radius: 20.0,
            ..SteeringConfig::default()
        };
        assert_eq!(unstuck(Vec2::new(50.0, 50.0), &nav, &config), None);
    }
}
