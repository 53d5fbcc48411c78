//! Uniform spatial hash for separation queries.
//!
//! The grid is rebuilt from scratch every tick with a counting sort:
//! per-cell counts, a prefix-sum start table, and one flat list of agent
//! indices ordered by cell. There is no incremental update; any position
//! change makes the grid stale until the next rebuild.

use crate::math::{Vec2, WorldBounds};

/// Counting-sort spatial hash over the world bounds.
#[derive(Debug, Clone)]
pub struct SpatialHashGrid {
    bounds: WorldBounds,
    cell_size: f32,
    inv_cell_size: f32,
    cols: usize,
    rows: usize,
    /// `starts[c]..starts[c + 1]` is cell `c`'s slice of `entries`.
    starts: Vec<u32>,
    entries: Vec<u32>,
    /// Scratch per-cell write cursor, reused between builds.
    cursor: Vec<u32>,
    /// Cell of each entry in input order, reused between builds.
    entry_cells: Vec<u32>,
}

impl SpatialHashGrid {
    /// Create an empty grid covering `bounds`.
    ///
    /// # Panics
    ///
    /// Panics if `cell_size` is not positive.
    #[must_use]
    pub fn new(bounds: WorldBounds, cell_size: f32) -> Self {
        assert!(cell_size > 0.0, "SpatialHashGrid cell_size must be positive");
        let (cols, rows) = bounds.cell_dims(cell_size);
        let cell_count = cols * rows;
        Self {
            bounds,
            cell_size,
            inv_cell_size: cell_size.recip(),
            cols,
            rows,
            starts: vec![0; cell_count + 1],
            entries: Vec::new(),
            cursor: vec![0; cell_count],
            entry_cells: Vec::new(),
        }
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

    /// Number of indices inserted by the last build.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the last build inserted nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cell coordinates of a world point. Points outside the bounds land in
    /// the nearest edge cell.
    #[must_use]
    pub fn cell_of(&self, p: Vec2) -> (usize, usize) {
        let cx = ((p.x - self.bounds.min.x) * self.inv_cell_size).floor();
        let cy = ((p.y - self.bounds.min.y) * self.inv_cell_size).floor();
        (
            cx.clamp(0.0, (self.cols - 1) as f32) as usize,
            cy.clamp(0.0, (self.rows - 1) as f32) as usize,
        )
    }

    #[inline]
    fn flat(&self, cx: usize, cy: usize) -> usize {
        cy * self.cols + cx
    }

    /// Rebuild from the agents listed in `indices`, reading their positions
    /// from `positions`.
    pub fn build_near(&mut self, positions: &[Vec2], indices: &[u32]) {
        self.cursor.fill(0);
        self.entry_cells.clear();
        for &index in indices {
            let (cx, cy) = self.cell_of(positions[index as usize]);
            let cell = self.flat(cx, cy);
            self.cursor[cell] += 1;
            self.entry_cells.push(cell as u32);
        }

        // Exclusive prefix sum of the counts.
        let mut running = 0u32;
        for (cell, count) in self.cursor.iter_mut().enumerate() {
            self.starts[cell] = running;
            running += *count;
            *count = self.starts[cell];
        }
        let last = self.starts.len() - 1;
        self.starts[last] = running;

        self.entries.clear();
        self.entries.resize(indices.len(), 0);
        for (&index, &cell) in indices.iter().zip(&self.entry_cells) {
            let slot = &mut self.cursor[cell as usize];
            self.entries[*slot as usize] = index;
            *slot += 1;
        }
    }

    /// Rebuild from every position in `positions`.
    pub fn build_all(&mut self, positions: &[Vec2]) {
        let indices: Vec<u32> = (0..positions.len() as u32).collect();
        self.build_near(positions, &indices);
    }

    /// Indices stored in cell `(cx, cy)`.
    #[must_use]
    pub fn cell_entries(&self, cx: usize, cy: usize) -> &[u32] {
        let cell = self.flat(cx, cy);
        let start = self.starts[cell] as usize;
        let end = self.starts[cell + 1] as usize;
        &self.entries[start..end]
    }

    /// Number of indices stored in cell `(cx, cy)`.
    #[must_use]
    pub fn cell_population(&self, cx: usize, cy: usize) -> usize {
        self.cell_entries(cx, cy).len()
    }

    /// Visit indices in the 3×3 block of cells around `cell`, skipping
    /// `exclude`.
    ///
    /// At most `cap` entries are examined; the rest are dropped for this
    /// query. Returns the number examined.
    pub fn for_each_neighbor<F>(
        &self,
        cell: (usize, usize),
        exclude: u32,
        cap: usize,
        mut visitor: F,
    ) -> usize
    where
        F: FnMut(u32),
    {
        let (cx, cy) = cell;
        let x0 = cx.saturating_sub(1);
        let y0 = cy.saturating_sub(1);
        let x1 = (cx + 1).min(self.cols - 1);
        let y1 = (cy + 1).min(self.rows - 1);

        let mut examined = 0;
        for y in y0..=y1 {
            for x in x0..=x1 {
                for &other in self.cell_entries(x, y) {
                    if other == exclude {
                        continue;
                    }
                    if examined == cap {
                        return examined;
                    }
                    examined += 1;
                    visitor(other);
                }
            }
        }
        examined
    }
}
