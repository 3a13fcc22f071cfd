//! Static block layer derived from terrain data.

use super::{check_region, CellQuery, GridError};

const WORD_BITS: usize = 64;

/// Read-only bit grid of terrain-blocked tiles.
///
/// Built once through [`BlockMaskBuilder`] (or one of the shortcut
/// constructors) and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMask {
    width: u32,
    height: u32,
    words: Box<[u64]>,
}

impl BlockMask {
    /// A block layer with every tile free
    pub fn new(width: u32, height: u32) -> Result<Self, GridError> {
        Ok(BlockMaskBuilder::new(width, height)?.build())
    }

    pub fn from_cells(
        width: u32,
        height: u32,
        cells: impl IntoIterator<Item = (u32, u32)>,
    ) -> Result<Self, GridError> {
        let mut builder = BlockMaskBuilder::new(width, height)?;
        for (x, y) in cells {
            builder.set_bit(x, y, true)?;
        }
        Ok(builder.build())
    }

    /// Parse tile rows, top row first. `#` and `X` are blocked, anything else is free.
    ///
    /// Every row must be exactly as wide as the first one.
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> Result<Self, GridError> {
        let height = rows.len() as u32;
        let width = rows.first().map_or(0, |r| r.as_ref().chars().count()) as u32;
        let mut builder = BlockMaskBuilder::new(width, height)?;
        for (row_index, row) in rows.iter().enumerate() {
            let y = height - 1 - row_index as u32;
            let row = row.as_ref();
            let row_width = row.chars().count() as u32;
            if row_width != width {
                return Err(GridError::OutOfBounds {
                    x: 0,
                    y,
                    width: row_width,
                    height: 1,
                    grid_width: width,
                    grid_height: height,
                });
            }
            for (x, c) in row.chars().enumerate() {
                if matches!(c, '#' | 'X') {
                    builder.set_bit(x as u32, y, true)?;
                }
            }
        }
        Ok(builder.build())
    }

    pub fn blocked_count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    #[inline]
    fn bit_index(width: u32, x: u32, y: u32) -> (usize, u32) {
        let bit = y as usize * width as usize + x as usize;
        (bit / WORD_BITS, (bit % WORD_BITS) as u32)
    }
}

impl CellQuery for BlockMask {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn blocked_unchecked(&self, x: u32, y: u32) -> bool {
        let (word, bit) = Self::bit_index(self.width, x, y);
        self.words[word] & (1u64 << bit) != 0
    }
}

/// Mutable staging area for a [`BlockMask`]
#[derive(Debug, Clone)]
pub struct BlockMaskBuilder {
    width: u32,
    height: u32,
    words: Vec<u64>,
}

impl BlockMaskBuilder {
    pub fn new(width: u32, height: u32) -> Result<Self, GridError> {
        if width == 0 || height == 0 {
            return Err(GridError::EmptyGrid { width, height });
        }
        let bits = width as usize * height as usize;
        Ok(Self {
            width,
            height,
            words: vec![0; bits.div_ceil(WORD_BITS)],
        })
    }

    pub fn set_bit(&mut self, x: u32, y: u32, blocked: bool) -> Result<&mut Self, GridError> {
        check_region(self.width, self.height, x, y, 1, 1)?;
        let (word, bit) = BlockMask::bit_index(self.width, x, y);
        if blocked {
            self.words[word] |= 1u64 << bit;
        } else {
            self.words[word] &= !(1u64 << bit);
        }
        Ok(self)
    }

    pub fn build(self) -> BlockMask {
        BlockMask {
            width: self.width,
            height: self.height,
            words: self.words.into_boxed_slice(),
        }
    }
}
