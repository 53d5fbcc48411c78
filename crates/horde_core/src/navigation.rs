//! Obstacle occupancy grid and breadth-first flow field.
//!
//! Obstacles are rasterized once into a boolean grid. [`NavigationField::build_flow_field`]
//! then floods outward from the target's cell with a 4-connected BFS and
//! derives, per cell, a unit direction toward a strictly closer neighbor.
//!
//! The field does not decide when to rebuild. Callers track the target's
//! cell and rebuild only when it changes.
//!
//! Space outside the grid is open: it is never blocked and carries no flow.

use std::collections::VecDeque;

use crate::error::{HordeError, Result};
use crate::math::{Vec2, WorldBounds};

/// Distance value for blocked or unreachable cells.
pub const UNREACHABLE: u32 = u32::MAX;

/// Neighbor order used for both the BFS and flow selection: +x, −x, +y, −y.
const NEIGHBORS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Sample offsets, as fractions of a cell, used when rasterizing shapes.
const SAMPLES: [(f32, f32); 5] = [
    (0.5, 0.5),
    (0.25, 0.25),
    (0.75, 0.25),
    (0.25, 0.75),
    (0.75, 0.75),
];

/// Occupancy grid plus BFS distance and flow field toward one target cell.
#[derive(Debug, Clone)]
pub struct NavigationField {
    bounds: WorldBounds,
    cell_size: f32,
    inv_cell_size: f32,
    cols: usize,
    rows: usize,
    blocked: Vec<bool>,
    distance: Vec<u32>,
    flow: Vec<Vec2>,
    target_cell: Option<usize>,
    queue: VecDeque<usize>,
}

impl NavigationField {
    /// Create an obstacle-free field covering `bounds`.
    pub fn new(bounds: WorldBounds, cell_size: f32) -> Result<Self> {
        if cell_size <= 0.0 || !cell_size.is_finite() {
            return Err(HordeError::InvalidConfig(format!(
                "navigation cell_size must be positive, got {cell_size}"
            )));
        }
        if !bounds.is_valid() {
            return Err(HordeError::InvalidConfig(
                "navigation bounds must enclose a positive area".into(),
            ));
        }
        let (cols, rows) = bounds.cell_dims(cell_size);
        let cell_count = cols * rows;
        Ok(Self {
            bounds,
            cell_size,
            inv_cell_size: cell_size.recip(),
            cols,
            rows,
            blocked: vec![false; cell_count],
            distance: vec![UNREACHABLE; cell_count],
            flow: vec![Vec2::ZERO; cell_count],
            target_cell: None,
            queue: VecDeque::with_capacity(cell_count),
        })
    }

    /// Grid width in cells.
    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// Grid height in cells.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Cell size in world units.
    #[must_use]
    pub const fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// World bounds covered by the grid.
    #[must_use]
    pub const fn bounds(&self) -> &WorldBounds {
        &self.bounds
    }

    /// Total cell count.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.blocked.len()
    }

    /// Cell the flow field was last built toward, if any.
    #[must_use]
    pub const fn target_cell(&self) -> Option<usize> {
        self.target_cell
    }

    /// Flat cell index containing `p`, or `None` outside the grid.
    #[must_use]
    pub fn cell_index_of(&self, p: Vec2) -> Option<usize> {
        let fx = (p.x - self.bounds.min.x) * self.inv_cell_size;
        let fy = (p.y - self.bounds.min.y) * self.inv_cell_size;
        if fx < 0.0 || fy < 0.0 || fx.is_nan() || fy.is_nan() {
            return None;
        }
        let (cx, cy) = (fx as usize, fy as usize);
        if cx < self.cols && cy < self.rows {
            Some(cy * self.cols + cx)
        } else {
            None
        }
    }

    /// Cell coordinates of a flat index.
    #[must_use]
    pub const fn cell_coords(&self, cell: usize) -> (usize, usize) {
        (cell % self.cols, cell / self.cols)
    }

    /// World-space centre of a cell.
    #[must_use]
    pub fn cell_center(&self, cell: usize) -> Vec2 {
        let (cx, cy) = self.cell_coords(cell);
        Vec2::new(
            self.bounds.min.x + (cx as f32 + 0.5) * self.cell_size,
            self.bounds.min.y + (cy as f32 + 0.5) * self.cell_size,
        )
    }

    /// True if `cell` is blocked. Out-of-range cells are open.
    #[must_use]
    pub fn is_blocked_at_cell(&self, cell: usize) -> bool {
        self.blocked.get(cell).copied().unwrap_or(false)
    }

    /// True if the cell containing `p` is blocked.
    #[must_use]
    pub fn is_blocked_at_world_point(&self, p: Vec2) -> bool {
        self.cell_index_of(p).is_some_and(|cell| self.blocked[cell])
    }

    /// Flow direction at `cell`; zero if blocked, unreachable, at the target,
    /// or out of range.
    #[must_use]
    pub fn flow_vector_at_cell(&self, cell: usize) -> Vec2 {
        self.flow.get(cell).copied().unwrap_or(Vec2::ZERO)
    }

    /// BFS distance at `cell`, or [`UNREACHABLE`].
    #[must_use]
    pub fn distance_at_cell(&self, cell: usize) -> u32 {
        self.distance.get(cell).copied().unwrap_or(UNREACHABLE)
    }

    /// Full distance array, row-major.
    #[must_use]
    pub fn distances(&self) -> &[u32] {
        &self.distance
    }

    /// Full flow array, row-major.
    #[must_use]
    pub fn flow(&self) -> &[Vec2] {
        &self.flow
    }

    /// Number of blocked cells.
    #[must_use]
    pub fn blocked_count(&self) -> usize {
        self.blocked.iter().filter(|&&b| b).count()
    }

    /// Block every cell with a sample point inside the axis-aligned
    /// rectangle at `min` with the given `size`.
    pub fn add_obstacle_rect(&mut self, min: Vec2, size: Vec2) {
        let max = min + size;
        self.rasterize(min, max, |p| {
            p.x >= min.x && p.x <= max.x && p.y >= min.y && p.y <= max.y
        });
    }

    /// Block every cell with a sample point inside the circle.
    pub fn add_obstacle_circle(&mut self, center: Vec2, radius: f32) {
        let r = Vec2::new(radius, radius);
        let radius_sq = radius * radius;
        self.rasterize(center - r, center + r, |p| {
            p.distance_squared(center) <= radius_sq
        });
    }

    /// Unblock every cell.
    pub fn clear_obstacles(&mut self) {
        self.blocked.fill(false);
    }

    /// Mark cells overlapping the `[min, max]` box whose samples satisfy
    /// `inside`.
    fn rasterize<F>(&mut self, min: Vec2, max: Vec2, inside: F)
    where
        F: Fn(Vec2) -> bool,
    {
        let to_col = |x: f32| ((x - self.bounds.min.x) * self.inv_cell_size).floor();
        let to_row = |y: f32| ((y - self.bounds.min.y) * self.inv_cell_size).floor();
        let max_col = (self.cols - 1) as f32;
        let max_row = (self.rows - 1) as f32;

        let c0 = to_col(min.x).clamp(0.0, max_col) as usize;
        let c1 = to_col(max.x).clamp(0.0, max_col) as usize;
        let r0 = to_row(min.y).clamp(0.0, max_row) as usize;
        let r1 = to_row(max.y).clamp(0.0, max_row) as usize;

        for cy in r0..=r1 {
            for cx in c0..=c1 {
                let origin = Vec2::new(
                    self.bounds.min.x + cx as f32 * self.cell_size,
                    self.bounds.min.y + cy as f32 * self.cell_size,
                );
                let covered = SAMPLES.iter().any(|&(sx, sy)| {
                    inside(origin + Vec2::new(sx * self.cell_size, sy * self.cell_size))
                });
                if covered {
                    self.blocked[cy * self.cols + cx] = true;
                }
            }
        }
    }

    #[inline]
    fn neighbor(&self, cell: usize, (dx, dy): (i32, i32)) -> Option<usize> {
        let (cx, cy) = self.cell_coords(cell);
        let nx = cx as i64 + dx as i64;
        let ny = cy as i64 + dy as i64;
        if nx < 0 || ny < 0 || nx >= self.cols as i64 || ny >= self.rows as i64 {
            return None;
        }
        Some(ny as usize * self.cols + nx as usize)
    }

    /// Cell a flow field toward `target` is built from. Out-of-bounds
    /// targets are clamped to the nearest edge cell.
    #[must_use]
    pub fn resolve_target_cell(&self, target: Vec2) -> usize {
        let target = self.bounds.clamp(target);
        self.cell_index_of(target).unwrap_or_else(|| {
            // Clamping onto the max edge lands exactly on the exclusive bound.
            let cx = ((target.x - self.bounds.min.x) * self.inv_cell_size) as usize;
            let cy = ((target.y - self.bounds.min.y) * self.inv_cell_size) as usize;
            cy.min(self.rows - 1) * self.cols + cx.min(self.cols - 1)
        })
    }

    /// Rebuild the distance and flow arrays toward the cell containing
    /// `target`.
    ///
    /// A target outside the grid is clamped to the nearest edge cell. A
    /// target standing in a blocked cell leaves every cell unreachable and
    /// every flow vector zero; agents then fall back to plain seeking.
    pub fn build_flow_field(&mut self, target: Vec2) {
        let target_cell = self.resolve_target_cell(target);

        self.distance.fill(UNREACHABLE);
        self.flow.fill(Vec2::ZERO);
        self.target_cell = Some(target_cell);

        if self.blocked[target_cell] {
            tracing::debug!(target_cell, "Flow field target is blocked; field left empty");
            return;
        }

        self.queue.clear();
        self.distance[target_cell] = 0;
        self.queue.push_back(target_cell);
        let mut reached = 1usize;

        while let Some(cell) = self.queue.pop_front() {
            let next = self.distance[cell] + 1;
            for offset in NEIGHBORS {
                let Some(n) = self.neighbor(cell, offset) else {
                    continue;
                };
                if self.blocked[n] || self.distance[n] != UNREACHABLE {
                    continue;
                }
                self.distance[n] = next;
                self.queue.push_back(n);
                reached += 1;
            }
        }

        for cell in 0..self.distance.len() {
            let here = self.distance[cell];
            if here == UNREACHABLE || here == 0 {
                continue;
            }
            for offset in NEIGHBORS {
                let Some(n) = self.neighbor(cell, offset) else {
                    continue;
                };
                if self.distance[n] < here {
                    self.flow[cell] = Vec2::new(offset.0 as f32, offset.1 as f32);
                    break;
                }
            }
        }

        tracing::debug!(
            target_cell,
            reached,
            cells = self.distance.len(),
            "Flow field rebuilt"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(cols: usize, rows: usize) -> NavigationField {
        NavigationField::new(
            WorldBounds::new(Vec2::ZERO, Vec2::new(cols as f32, rows as f32)),
            1.0,
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_bad_cell_size() {
        let bounds = WorldBounds::centered(10.0);
        assert!(NavigationField::new(bounds, 0.0).is_err());
        assert!(NavigationField::new(bounds, -1.0).is_err());
        assert!(NavigationField::new(bounds, f32::NAN).is_err());
    }

    #[test]
    fn test_cell_index_of() {
        let field = field(10, 5);
        assert_eq!(field.cell_index_of(Vec2::new(0.5, 0.5)), Some(0));
        assert_eq!(field.cell_index_of(Vec2::new(3.2, 2.9)), Some(23));
        assert_eq!(field.cell_index_of(Vec2::new(-0.1, 1.0)), None);
        assert_eq!(field.cell_index_of(Vec2::new(10.0, 1.0)), None);
    }

    #[test]
    fn test_rect_rasterization() {
        let mut field = field(10, 10);
        field.add_obstacle_rect(Vec2::new(2.0, 2.0), Vec2::new(2.0, 1.0));
        // Covers cells x in 2..=3 (x=4 only touched on its left edge, no sample inside).
        assert!(field.is_blocked_at_world_point(Vec2::new(2.5, 2.5)));
        assert!(field.is_blocked_at_world_point(Vec2::new(3.5, 2.5)));
        assert!(!field.is_blocked_at_world_point(Vec2::new(4.5, 2.5)));
        assert!(!field.is_blocked_at_world_point(Vec2::new(2.5, 3.5)));
        assert_eq!(field.blocked_count(), 2);
    }

    #[test]
    fn test_circle_rasterization() {
        let mut field = field(10, 10);
        field.add_obstacle_circle(Vec2::new(5.0, 5.0), 1.0);
        assert!(field.is_blocked_at_world_point(Vec2::new(4.5, 4.5)));
        assert!(field.is_blocked_at_world_point(Vec2::new(5.5, 5.5)));
        assert!(!field.is_blocked_at_world_point(Vec2::new(7.5, 5.5)));
    }

    #[test]
    fn test_outside_grid_is_open() {
        let field = field(4, 4);
        assert!(!field.is_blocked_at_world_point(Vec2::new(-5.0, -5.0)));
        assert_eq!(field.flow_vector_at_cell(1000), Vec2::ZERO);
    }

    #[test]
    fn test_open_field_distances_are_manhattan() {
        let mut field = field(5, 5);
        field.build_flow_field(Vec2::new(2.5, 2.5));
        let target = field.cell_index_of(Vec2::new(2.5, 2.5)).unwrap();
        assert_eq!(field.distance_at_cell(target), 0);
        assert_eq!(field.flow_vector_at_cell(target), Vec2::ZERO);
        assert_eq!(field.distance_at_cell(0), 4);
        assert_eq!(field.distance_at_cell(24), 4);
    }

    #[test]
    fn test_flow_tie_break_prefers_positive_x() {
        let mut field = field(5, 5);
        field.build_flow_field(Vec2::new(2.5, 2.5));
        // Cell (0, 0) can improve via +x or +y; +x comes first.
        assert_eq!(field.flow_vector_at_cell(0), Vec2::new(1.0, 0.0));
        // Cell (2, 0) can only improve via +y.
        assert_eq!(field.flow_vector_at_cell(2), Vec2::new(0.0, 1.0));
        // Cell (4, 4) improves via -x first.
        assert_eq!(field.flow_vector_at_cell(24), Vec2::new(-1.0, 0.0));
    }

    #[test]
    fn test_wall_forces_detour() {
        let mut field = field(5, 5);
        // Vertical wall at x = 2, open only at y = 4.
        field.add_obstacle_rect(Vec2::new(2.0, 0.0), Vec2::new(0.9, 3.9));
        field.build_flow_field(Vec2::new(4.5, 0.5));

        let left = field.cell_index_of(Vec2::new(0.5, 0.5)).unwrap();
        assert_eq!(field.distance_at_cell(left), 12);
        let wall = field.cell_index_of(Vec2::new(2.5, 0.5)).unwrap();
        assert_eq!(field.distance_at_cell(wall), UNREACHABLE);
        assert_eq!(field.flow_vector_at_cell(wall), Vec2::ZERO);
    }

    #[test]
    fn test_disconnected_region_has_no_flow() {
        let mut field = field(5, 5);
        field.add_obstacle_rect(Vec2::new(2.0, 0.0), Vec2::new(0.9, 4.9));
        field.build_flow_field(Vec2::new(4.5, 2.5));

        let island = field.cell_index_of(Vec2::new(0.5, 2.5)).unwrap();
        assert_eq!(field.distance_at_cell(island), UNREACHABLE);
        assert_eq!(field.flow_vector_at_cell(island), Vec2::ZERO);
    }

    #[test]
    fn test_clear_obstacles_reconnects_region() {
        let mut field = field(5, 5);
        field.add_obstacle_rect(Vec2::new(2.0, 0.0), Vec2::new(0.9, 4.9));
        field.clear_obstacles();
        field.build_flow_field(Vec2::new(4.5, 2.5));

        let island = field.cell_index_of(Vec2::new(0.5, 2.5)).unwrap();
        assert_eq!(field.distance_at_cell(island), 4);
        assert!(!field.is_blocked_at_cell(field.cell_index_of(Vec2::new(2.5, 0.5)).unwrap()));
    }

    #[test]
    fn test_cell_center_maps_back_to_cell() {
        let field = NavigationField::new(WorldBounds::centered(64.0), 32.0).unwrap();
        let cell = field.cell_index_of(Vec2::new(-10.0, 40.0)).unwrap();
        assert_eq!(field.cell_center(cell), Vec2::new(-16.0, 48.0));
        assert_eq!(field.cell_index_of(field.cell_center(cell)), Some(cell));
    }

    #[test]
    fn test_blocked_target_leaves_field_empty() {
        let mut field = field(5, 5);
        field.add_obstacle_circle(Vec2::new(2.5, 2.5), 0.3);
        field.build_flow_field(Vec2::new(2.5, 2.5));
        assert!(field.distances().iter().all(|&d| d == UNREACHABLE));
        assert!(field.flow().iter().all(|v| v.is_zero()));
    }

    #[test]
    fn test_target_outside_grid_is_clamped() {
        let mut field = field(5, 5);
        field.build_flow_field(Vec2::new(50.0, 50.0));
        assert_eq!(field.target_cell(), Some(24));
        assert_eq!(field.distance_at_cell(24), 0);
    }
}
