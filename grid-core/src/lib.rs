//! WindRose Grid Core
//!
//! Occupancy bookkeeping for bodies on a 2D tile grid:
//! - Solid mask (per-cell counters of the bodies covering each tile)
//! - Block layer (static terrain blocking, set once per map load)
//! - Solidness classification (ghost, solid, solid-for-others, mask)
//! - Occupancy arbiter (one-cell movement allocation, confirmation,
//!   cancellation, teleports and solidness changes)
//! - Map definitions loaded from JSON or RON

pub mod arbiter;
pub mod constants;
pub mod geometry;
pub mod grid;
pub mod logging;
pub mod map;
pub mod solidness;

pub use arbiter::{ArbiterError, EntityId, EntityRecord, OccupancyArbiter, OccupancySnapshot};
pub use geometry::{Direction, Footprint, Strip};
pub use grid::{BlockMask, BlockMaskBuilder, CellQuery, GridError, GridMask, QueryMode};
pub use map::{EntitySpawn, MapDefinition, MapError};
pub use solidness::{GridContribution, Solidness};
