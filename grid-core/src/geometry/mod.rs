//! Tile-space geometry: directions, footprints and the one-cell strips that
//! border them.
//!
//! The y axis grows upward, so `Down` from row 0 and `Left` from column 0
//! leave the map.

use serde::{Deserialize, Serialize};

/// One-cell step direction on the tile grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn all() -> [Direction; 4] {
        [
            Direction::Up,
            Direction::Down,
            Direction::Left,
            Direction::Right,
        ]
    }

    pub fn opposite(&self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    /// Unit step as (dx, dy)
    pub fn delta(&self) -> (i32, i32) {
        match self {
            Self::Up => (0, 1),
            Self::Down => (0, -1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

/// Single row or column of cells, described by its first cell and length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strip {
    Row { x: u32, y: u32, len: u32 },
    Column { x: u32, y: u32, len: u32 },
}

impl Strip {
    pub fn len(&self) -> u32 {
        match *self {
            Strip::Row { len, .. } | Strip::Column { len, .. } => len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every cell covered by the strip, in increasing coordinate order
    pub fn cells(&self) -> impl Iterator<Item = (u32, u32)> {
        let strip = *self;
        (0..strip.len()).map(move |i| match strip {
            Strip::Row { x, y, .. } => (x + i, y),
            Strip::Column { x, y, .. } => (x, y + i),
        })
    }
}

/// Axis-aligned rectangle `[x, x+width) × [y, y+height)` an entity covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Footprint {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Footprint {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right bound (`x + width`), widened to avoid overflow
    pub fn right(&self) -> u64 {
        self.x as u64 + self.width as u64
    }

    /// Exclusive top bound (`y + height`), widened to avoid overflow
    pub fn top(&self) -> u64 {
        self.y as u64 + self.height as u64
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && (x as u64) < self.right() && y >= self.y && (y as u64) < self.top()
    }

    pub fn fits_within(&self, grid_width: u32, grid_height: u32) -> bool {
        self.right() <= grid_width as u64 && self.top() <= grid_height as u64
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn with_position(&self, x: u32, y: u32) -> Self {
        Self { x, y, ..*self }
    }

    /// True when the footprint is flush against the grid border on `direction`'s side
    pub fn is_hitting_edge(&self, direction: Direction, grid_width: u32, grid_height: u32) -> bool {
        match direction {
            Direction::Left => self.x == 0,
            Direction::Down => self.y == 0,
            Direction::Right => self.right() >= grid_width as u64,
            Direction::Up => self.top() >= grid_height as u64,
        }
    }

    /// Strip of cells immediately bordering the footprint in `direction`.
    ///
    /// `None` when the footprint is hitting the edge, so callers never read
    /// outside the grid.
    pub fn adjacent_strip(
        &self,
        direction: Direction,
        grid_width: u32,
        grid_height: u32,
    ) -> Option<Strip> {
        if self.is_hitting_edge(direction, grid_width, grid_height) {
            return None;
        }
        let strip = match direction {
            Direction::Left => Strip::Column {
                x: self.x - 1,
                y: self.y,
                len: self.height,
            },
            Direction::Right => Strip::Column {
                x: self.x + self.width,
                y: self.y,
                len: self.height,
            },
            Direction::Down => Strip::Row {
                x: self.x,
                y: self.y - 1,
                len: self.width,
            },
            Direction::Up => Strip::Row {
                x: self.x,
                y: self.y + self.height,
                len: self.width,
            },
        };
        Some(strip)
    }

    /// Footprint shifted one cell in `direction` (None on coordinate underflow/overflow)
    pub fn stepped(&self, direction: Direction) -> Option<Self> {
        let (dx, dy) = direction.delta();
        let x = self.x.checked_add_signed(dx)?;
        let y = self.y.checked_add_signed(dy)?;
        Some(self.with_position(x, y))
    }
}
