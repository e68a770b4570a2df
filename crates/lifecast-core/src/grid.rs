//! Fixed-size cell grid and the Life neighbor rule.
//!
//! A [`Grid`] is a row-major matrix of single-byte cell states where `0`
//! means dead and any other value means alive. Dimensions are fixed at
//! construction. Coordinates are `(x, y)` with `x` the column and `y` the
//! row, both zero-based.
//!
//! # Design Principles
//!
//! - All cell access goes through bounds-checked lookups; an out-of-range
//!   coordinate yields `None`, never a panic.
//! - Neighbor counting clips at the grid edges. There is no wraparound, so
//!   corner cells examine three neighbors and edge cells five.

/// A cell whose state differs between two grids of the same shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellChange {
    /// Column of the changed cell.
    pub x: usize,
    /// Row of the changed cell.
    pub y: usize,
    /// The cell's new value.
    pub value: u8,
}

/// A rows x cols matrix of cell states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    rows: usize,
    cols: usize,
    cells: Vec<u8>,
}

/// Decide whether a cell is alive in the next generation.
///
/// A dead cell is born with exactly three live neighbors. A live cell
/// survives with two or three live neighbors and dies otherwise.
pub const fn next_state(alive: bool, live_neighbors: u8) -> bool {
    matches!((alive, live_neighbors), (true, 2 | 3) | (false, 3))
}

impl Grid {
    /// Create an all-dead grid with the given dimensions.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![0; rows.saturating_mul(cols)],
        }
    }

    /// Create a grid and mark the given `(x, y)` coordinates alive.
    ///
    /// Coordinates outside the grid are ignored.
    pub fn with_live_cells(rows: usize, cols: usize, live: &[(usize, usize)]) -> Self {
        let mut grid = Self::new(rows, cols);
        for &(x, y) in live {
            let _ = grid.set(x, y, 1);
        }
        grid
    }

    /// Number of rows.
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// Whether `(x, y)` lies inside the grid.
    pub const fn contains(&self, x: usize, y: usize) -> bool {
        x < self.cols && y < self.rows
    }

    fn index(&self, x: usize, y: usize) -> Option<usize> {
        if !self.contains(x, y) {
            return None;
        }
        y.checked_mul(self.cols)?.checked_add(x)
    }

    /// Read the cell at `(x, y)`, or `None` when out of bounds.
    pub fn get(&self, x: usize, y: usize) -> Option<u8> {
        self.index(x, y).and_then(|i| self.cells.get(i).copied())
    }

    /// Whether the cell at `(x, y)` is alive. Out-of-bounds cells are dead.
    pub fn is_alive(&self, x: usize, y: usize) -> bool {
        self.get(x, y).is_some_and(|v| v != 0)
    }

    /// Overwrite the cell at `(x, y)`.
    ///
    /// Returns the previous value, or `None` (leaving the grid unchanged)
    /// when the coordinate is out of bounds.
    pub fn set(&mut self, x: usize, y: usize, value: u8) -> Option<u8> {
        let idx = self.index(x, y)?;
        let cell = self.cells.get_mut(idx)?;
        Some(std::mem::replace(cell, value))
    }

    /// Count live cells among the up-to-eight neighbors of `(x, y)`.
    pub fn live_neighbors(&self, x: usize, y: usize) -> u8 {
        let mut count: u8 = 0;
        for ny in y.saturating_sub(1)..=y.saturating_add(1) {
            for nx in x.saturating_sub(1)..=x.saturating_add(1) {
                if (nx, ny) == (x, y) {
                    continue;
                }
                if self.is_alive(nx, ny) {
                    count = count.saturating_add(1);
                }
            }
        }
        count
    }

    /// Compute the next generation of `previous` into `self`.
    ///
    /// Every neighbor count is read from `previous`; only cells whose state
    /// flips are written. Surviving cells keep their existing value.
    /// `previous` must have the same shape as `self`.
    pub fn advance_from(&mut self, previous: &Self) {
        for y in 0..previous.rows {
            for x in 0..previous.cols {
                let alive = previous.is_alive(x, y);
                let next = next_state(alive, previous.live_neighbors(x, y));
                if next != alive {
                    let _ = self.set(x, y, u8::from(next));
                }
            }
        }
    }

    /// Copy all cell states from `other`, reusing this grid's allocation.
    pub fn copy_from(&mut self, other: &Self) {
        self.rows = other.rows;
        self.cols = other.cols;
        self.cells.clone_from(&other.cells);
    }

    /// Set every cell to dead.
    pub fn clear(&mut self) {
        self.cells.fill(0);
    }

    /// Number of live cells.
    pub fn live_count(&self) -> usize {
        self.cells.iter().filter(|&&v| v != 0).count()
    }

    /// Iterate over the rows as slices, top to bottom.
    pub fn row_slices(&self) -> impl Iterator<Item = &[u8]> {
        self.cells.chunks(self.cols.max(1))
    }

    /// Iterate over cells whose value in `self` differs from `previous`,
    /// in row-major order.
    pub fn changes_from<'a>(&'a self, previous: &'a Self) -> impl Iterator<Item = CellChange> + 'a {
        let cols = self.cols;
        self.cells
            .iter()
            .zip(&previous.cells)
            .enumerate()
            .filter(|(_, (now, before))| now != before)
            .map(move |(i, (&value, _))| CellChange {
                x: i.checked_rem(cols).unwrap_or(0),
                y: i.checked_div(cols).unwrap_or(0),
                value,
            })
    }
}
