//! Occupancy grids.
//!
//! Two layers share the same read interface ([`CellQuery`]):
//! - [`GridMask`]: the live solid mask, one counter per cell, mutated as
//!   bodies spawn, move and despawn
//! - [`BlockMask`]: static terrain blocking, set once at load time

mod block;

pub use block::{BlockMask, BlockMaskBuilder};

use tracing::warn;

use crate::geometry::Strip;

/// Error type for grid access and counter bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("Grid dimensions must be positive, got {width}x{height}")]
    EmptyGrid { width: u32, height: u32 },
    #[error(
        "Region ({x}, {y}) size {width}x{height} is out of bounds for a {grid_width}x{grid_height} grid"
    )]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        grid_width: u32,
        grid_height: u32,
    },
    #[error("Counter at ({x}, {y}) would leave its valid range")]
    InvalidState { x: u32, y: u32 },
}

/// Aggregate applied over a row or column range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// At least one cell is blocked
    AnyBlocked,
    /// Every cell is blocked
    AllBlocked,
    /// At least one cell is free
    AnyFree,
    /// Every cell is free
    AllFree,
}

impl QueryMode {
    fn fold(self, mut cells: impl Iterator<Item = bool>) -> bool {
        match self {
            QueryMode::AnyBlocked => cells.any(|b| b),
            QueryMode::AllBlocked => cells.all(|b| b),
            QueryMode::AnyFree => cells.any(|b| !b),
            QueryMode::AllFree => cells.all(|b| !b),
        }
    }
}

/// Read access shared by the solid mask and the block layer
pub trait CellQuery {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Blocked state of an in-range cell. Callers validate coordinates first.
    fn blocked_unchecked(&self, x: u32, y: u32) -> bool;

    fn get_bit(&self, x: u32, y: u32) -> Result<bool, GridError> {
        check_region(self.width(), self.height(), x, y, 1, 1)?;
        Ok(self.blocked_unchecked(x, y))
    }

    /// Aggregate over the inclusive row range `xi..=xf` at `y`.
    ///
    /// # Panics
    /// If the range is inverted or leaves the grid. Bounds are the caller's
    /// responsibility, normally established through edge detection.
    #[track_caller]
    fn get_row(&self, xi: u32, xf: u32, y: u32, mode: QueryMode) -> bool {
        assert!(xi <= xf, "row range inverted: {xi} > {xf}");
        assert!(xf < self.width(), "row end {xf} out of bounds");
        assert!(y < self.height(), "row {y} out of bounds");
        mode.fold((xi..=xf).map(|x| self.blocked_unchecked(x, y)))
    }

    /// Aggregate over the inclusive column range `yi..=yf` at `x`.
    ///
    /// # Panics
    /// If the range is inverted or leaves the grid.
    #[track_caller]
    fn get_column(&self, x: u32, yi: u32, yf: u32, mode: QueryMode) -> bool {
        assert!(yi <= yf, "column range inverted: {yi} > {yf}");
        assert!(yf < self.height(), "column end {yf} out of bounds");
        assert!(x < self.width(), "column {x} out of bounds");
        mode.fold((yi..=yf).map(|y| self.blocked_unchecked(x, y)))
    }

    /// Aggregate over a non-empty strip produced by edge detection
    #[track_caller]
    fn query_strip(&self, strip: Strip, mode: QueryMode) -> bool {
        match strip {
            Strip::Row { x, y, len } if len > 0 => self.get_row(x, x + len - 1, y, mode),
            Strip::Column { x, y, len } if len > 0 => self.get_column(x, y, y + len - 1, mode),
            _ => mode.fold(std::iter::empty()),
        }
    }
}

/// Validate that `[x, x+w) × [y, y+h)` lies inside a `grid_width × grid_height` grid
pub(crate) fn check_region(
    grid_width: u32,
    grid_height: u32,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
) -> Result<(), GridError> {
    let fits_x = (x as u64 + width as u64) <= grid_width as u64 && x < grid_width;
    let fits_y = (y as u64 + height as u64) <= grid_height as u64 && y < grid_height;
    if fits_x && fits_y {
        Ok(())
    } else {
        Err(GridError::OutOfBounds {
            x,
            y,
            width,
            height,
            grid_width,
            grid_height,
        })
    }
}

/// Live solid mask: per-cell counters of the bodies covering each tile.
///
/// A cell is blocked while its counter is above zero. Every mutation checks
/// the whole region before touching a counter, so a failed call leaves the
/// mask unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridMask {
    width: u32,
    height: u32,
    counters: Vec<u32>,
}

impl GridMask {
    pub fn new(width: u32, height: u32) -> Result<Self, GridError> {
        if width == 0 || height == 0 {
            return Err(GridError::EmptyGrid { width, height });
        }
        Ok(Self {
            width,
            height,
            counters: vec![0; width as usize * height as usize],
        })
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Raw counter at a cell
    pub fn counter(&self, x: u32, y: u32) -> Result<u32, GridError> {
        check_region(self.width, self.height, x, y, 1, 1)?;
        Ok(self.counters[self.index(x, y)])
    }

    /// True when no cell is covered by any body
    pub fn is_clear(&self) -> bool {
        self.counters.iter().all(|&c| c == 0)
    }

    /// Number of blocked cells
    pub fn occupied_count(&self) -> usize {
        self.counters.iter().filter(|&&c| c > 0).count()
    }

    /// Coordinates of every blocked cell, row by row from y = 0
    pub fn occupied_cells(&self) -> Vec<(u32, u32)> {
        let width = self.width as usize;
        self.counters
            .iter()
            .enumerate()
            .filter(|(_, c)| **c > 0)
            .map(|(i, _)| ((i % width) as u32, (i / width) as u32))
            .collect()
    }

    pub fn check_dimensions(&self, x: u32, y: u32, width: u32, height: u32) -> Result<(), GridError> {
        check_region(self.width, self.height, x, y, width, height)
    }

    pub fn inc_square(&mut self, x: u32, y: u32, width: u32, height: u32) -> Result<(), GridError> {
        self.apply(x, y, width, height, 1)
    }

    pub fn dec_square(&mut self, x: u32, y: u32, width: u32, height: u32) -> Result<(), GridError> {
        self.apply(x, y, width, height, -1)
    }

    pub fn inc_row(&mut self, x: u32, y: u32, len: u32) -> Result<(), GridError> {
        self.apply(x, y, len, 1, 1)
    }

    pub fn dec_row(&mut self, x: u32, y: u32, len: u32) -> Result<(), GridError> {
        self.apply(x, y, len, 1, -1)
    }

    pub fn inc_column(&mut self, x: u32, y: u32, len: u32) -> Result<(), GridError> {
        self.apply(x, y, 1, len, 1)
    }

    pub fn dec_column(&mut self, x: u32, y: u32, len: u32) -> Result<(), GridError> {
        self.apply(x, y, 1, len, -1)
    }

    /// Apply +1/-1 to a strip
    pub fn add_strip(&mut self, strip: Strip, delta: i8) -> Result<(), GridError> {
        match strip {
            Strip::Row { x, y, len } => self.apply(x, y, len, 1, delta),
            Strip::Column { x, y, len } => self.apply(x, y, 1, len, delta),
        }
    }

    /// True iff the row strip lies in bounds and no cell in it is occupied
    pub fn empty_row(&self, x: u32, y: u32, len: u32) -> Result<bool, GridError> {
        check_region(self.width, self.height, x, y, len, 1)?;
        Ok(len == 0 || !self.get_row(x, x + len - 1, y, QueryMode::AnyBlocked))
    }

    /// True iff the column strip lies in bounds and no cell in it is occupied
    pub fn empty_column(&self, x: u32, y: u32, len: u32) -> Result<bool, GridError> {
        check_region(self.width, self.height, x, y, 1, len)?;
        Ok(len == 0 || !self.get_column(x, y, y + len - 1, QueryMode::AnyBlocked))
    }

    pub fn empty_strip(&self, strip: Strip) -> Result<bool, GridError> {
        match strip {
            Strip::Row { x, y, len } => self.empty_row(x, y, len),
            Strip::Column { x, y, len } => self.empty_column(x, y, len),
        }
    }

    fn apply(&mut self, x: u32, y: u32, width: u32, height: u32, delta: i8) -> Result<(), GridError> {
        check_region(self.width, self.height, x, y, width, height)?;

        // Validate every counter before mutating any of them
        for cy in y..y + height {
            for cx in x..x + width {
                let current = self.counters[self.index(cx, cy)];
                let ok = if delta < 0 {
                    current > 0
                } else {
                    current < u32::MAX
                };
                if !ok {
                    warn!(x = cx, y = cy, delta, "grid counter would leave its valid range");
                    return Err(GridError::InvalidState { x: cx, y: cy });
                }
            }
        }

        for cy in y..y + height {
            for cx in x..x + width {
                let idx = self.index(cx, cy);
                if delta < 0 {
                    self.counters[idx] -= 1;
                } else {
                    self.counters[idx] += 1;
                }
            }
        }
        Ok(())
    }

    /// Render the mask top row first: `#` blocked, `.` free
    pub fn render_ascii(&self) -> String {
        let mut out = String::with_capacity((self.width as usize + 1) * self.height as usize);
        for y in (0..self.height).rev() {
            for x in 0..self.width {
                out.push(if self.blocked_unchecked(x, y) { '#' } else { '.' });
            }
            out.push('\n');
        }
        out
    }
}

impl CellQuery for GridMask {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn blocked_unchecked(&self, x: u32, y: u32) -> bool {
        self.counters[self.index(x, y)] > 0
    }
}
