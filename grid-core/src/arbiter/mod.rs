//! Occupancy arbiter
//!
//! Tracks every registered body's footprint and solidness on top of a shared
//! solid mask, and decides whether a body may take a one-cell step.
//!
//! Movement per body is a two-state machine:
//!   Idle --allocate_movement--> MovementAllocated
//!   MovementAllocated --confirm_movement / cancel_movement--> Idle
//!
//! Allocation reserves the destination strip, confirmation releases the
//! origin strip, cancellation releases the reservation. The solid mask is
//! only ever written from here, so its counters always equal the sum of the
//! registered bodies' contributions.

mod diagnostics;
mod movement;

pub use diagnostics::{EntitySnapshot, OccupancySnapshot};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

use crate::geometry::{Direction, Footprint};
use crate::grid::{BlockMask, CellQuery, GridError, GridMask};
use crate::solidness::{GridContribution, Solidness};

/// Stable handle a caller uses to refer to a registered body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Per-body state owned by the arbiter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub footprint: Footprint,
    pub solidness: Solidness,
    pub current_movement: Option<Direction>,
}

impl EntityRecord {
    pub fn is_moving(&self) -> bool {
        self.current_movement.is_some()
    }
}

/// Error type for arbiter operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArbiterError {
    #[error("Entity {0} is already added")]
    AlreadyAdded(EntityId),
    #[error("Entity {0} is not added")]
    NotFound(EntityId),
    #[error("Footprint must be at least 1x1, got {width}x{height}")]
    InvalidFootprint { width: u32, height: u32 },
    #[error("Block layer is {block_width}x{block_height} but the grid is {grid_width}x{grid_height}")]
    DimensionMismatch {
        block_width: u32,
        block_height: u32,
        grid_width: u32,
        grid_height: u32,
    },
    #[error("Counter at ({x}, {y}) is {actual}, registered bodies account for {expected}")]
    Inconsistent {
        x: u32,
        y: u32,
        expected: i64,
        actual: u32,
    },
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Owner of the solid mask, the block layer and every body record
#[derive(Debug, Clone)]
pub struct OccupancyArbiter {
    solid_mask: GridMask,
    block_mask: BlockMask,
    records: HashMap<EntityId, EntityRecord>,
}

impl OccupancyArbiter {
    /// Empty arbiter with no terrain blocking
    pub fn new(width: u32, height: u32) -> Result<Self, ArbiterError> {
        Self::with_block_mask(BlockMask::new(width, height)?)
    }

    /// Empty arbiter whose dimensions come from the block layer
    pub fn with_block_mask(block_mask: BlockMask) -> Result<Self, ArbiterError> {
        let solid_mask = GridMask::new(block_mask.width(), block_mask.height())?;
        Ok(Self {
            solid_mask,
            block_mask,
            records: HashMap::new(),
        })
    }

    /// Empty arbiter over explicit dimensions and a block layer that must match them
    pub fn with_dimensions(
        width: u32,
        height: u32,
        block_mask: BlockMask,
    ) -> Result<Self, ArbiterError> {
        if block_mask.width() != width || block_mask.height() != height {
            return Err(ArbiterError::DimensionMismatch {
                block_width: block_mask.width(),
                block_height: block_mask.height(),
                grid_width: width,
                grid_height: height,
            });
        }
        Self::with_block_mask(block_mask)
    }

    pub fn width(&self) -> u32 {
        self.solid_mask.width()
    }

    pub fn height(&self) -> u32 {
        self.solid_mask.height()
    }

    pub fn solid_mask(&self) -> &GridMask {
        &self.solid_mask
    }

    pub fn block_mask(&self) -> &BlockMask {
        &self.block_mask
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_added(&self, entity: EntityId) -> bool {
        self.records.contains_key(&entity)
    }

    /// Registered handles in ascending order
    pub fn entities(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.records.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn record(&self, entity: EntityId) -> Result<&EntityRecord, ArbiterError> {
        self.records
            .get(&entity)
            .ok_or(ArbiterError::NotFound(entity))
    }

    /// Record lookup for mutating operations, logging misses
    fn existing(&self, entity: EntityId) -> Result<EntityRecord, ArbiterError> {
        self.records.get(&entity).copied().ok_or_else(|| {
            warn!(%entity, "operation on an entity that is not added");
            ArbiterError::NotFound(entity)
        })
    }

    fn record_mut(&mut self, entity: EntityId) -> Result<&mut EntityRecord, ArbiterError> {
        self.records
            .get_mut(&entity)
            .ok_or(ArbiterError::NotFound(entity))
    }

    pub fn footprint(&self, entity: EntityId) -> Result<Footprint, ArbiterError> {
        Ok(self.record(entity)?.footprint)
    }

    pub fn position(&self, entity: EntityId) -> Result<(u32, u32), ArbiterError> {
        let fp = self.footprint(entity)?;
        Ok((fp.x, fp.y))
    }

    pub fn solidness(&self, entity: EntityId) -> Result<Solidness, ArbiterError> {
        Ok(self.record(entity)?.solidness)
    }

    pub fn current_movement(&self, entity: EntityId) -> Result<Option<Direction>, ArbiterError> {
        Ok(self.record(entity)?.current_movement)
    }

    /// Register a body. Ghosts are only bounds-checked; occupying bodies
    /// reserve their square and carving bodies open it.
    pub fn add(
        &mut self,
        entity: EntityId,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        solidness: Solidness,
    ) -> Result<(), ArbiterError> {
        if self.records.contains_key(&entity) {
            warn!(%entity, "entity added twice");
            return Err(ArbiterError::AlreadyAdded(entity));
        }
        if width == 0 || height == 0 {
            return Err(ArbiterError::InvalidFootprint { width, height });
        }
        let footprint = Footprint::new(x, y, width, height);
        self.check_footprint(footprint)?;
        self.apply_footprint(footprint, solidness.contribution().claim_delta())?;

        self.records.insert(
            entity,
            EntityRecord {
                footprint,
                solidness,
                current_movement: None,
            },
        );
        debug!(%entity, x, y, width, height, solidness = solidness.as_str(), "entity added");
        Ok(())
    }

    /// Unregister a body, dropping any in-flight reservation and its footprint contribution
    pub fn remove(&mut self, entity: EntityId) -> Result<EntityRecord, ArbiterError> {
        let pending = self.existing(entity)?.current_movement;
        self.cancel_movement(entity)?;
        let record = self.existing(entity)?;
        let release = record.solidness.contribution().release_delta();
        if let Err(e) = self.apply_footprint(record.footprint, release) {
            self.restore_movement(entity, pending)?;
            return Err(e);
        }
        self.records.remove(&entity);
        debug!(%entity, "entity removed");
        Ok(record)
    }

    /// Teleport a body to `(x, y)`, cancelling any in-flight movement first.
    /// On failure the movement is reserved again.
    pub fn set_xy(&mut self, entity: EntityId, x: u32, y: u32) -> Result<(), ArbiterError> {
        let record = self.existing(entity)?;
        let old = record.footprint;
        let new = old.with_position(x, y);
        self.check_footprint(new)?;
        self.cancel_movement(entity)?;
        if let Err(e) = self.swap_footprint(record.solidness.contribution(), old, new) {
            self.restore_movement(entity, record.current_movement)?;
            return Err(e);
        }

        self.record_mut(entity)?.footprint = new;
        debug!(%entity, from_x = old.x, from_y = old.y, x, y, "entity teleported");
        Ok(())
    }

    /// Alias of [`set_xy`](Self::set_xy)
    pub fn teleport(&mut self, entity: EntityId, x: u32, y: u32) -> Result<(), ArbiterError> {
        self.set_xy(entity, x, y)
    }

    /// Swap a body's solidness, moving its grid contribution from the old kind to the new one
    pub fn set_solidness(
        &mut self,
        entity: EntityId,
        solidness: Solidness,
    ) -> Result<(), ArbiterError> {
        let record = self.existing(entity)?;
        self.cancel_movement(entity)?;
        let old = record.solidness.contribution();
        let new = solidness.contribution();

        if let Err(e) = self.swap_contribution(record.footprint, old, new) {
            self.restore_movement(entity, record.current_movement)?;
            return Err(e);
        }

        self.record_mut(entity)?.solidness = solidness;
        debug!(
            %entity,
            from = record.solidness.as_str(),
            to = solidness.as_str(),
            "solidness changed"
        );
        Ok(())
    }

    /// Replace the contribution of `fp`, all or nothing
    fn swap_contribution(
        &mut self,
        fp: Footprint,
        old: GridContribution,
        new: GridContribution,
    ) -> Result<(), ArbiterError> {
        self.apply_footprint(fp, old.release_delta())?;
        if let Err(e) = self.apply_footprint(fp, new.claim_delta()) {
            self.apply_footprint(fp, old.claim_delta())?;
            return Err(e);
        }
        Ok(())
    }

    /// Move a contribution from `old` to `new`, all or nothing
    fn swap_footprint(
        &mut self,
        contribution: GridContribution,
        old: Footprint,
        new: Footprint,
    ) -> Result<(), ArbiterError> {
        match contribution {
            GridContribution::Occupy => {
                // Reserve first, so a body teleporting onto itself nets zero
                self.apply_footprint(new, Some(1))?;
                if let Err(e) = self.apply_footprint(old, Some(-1)) {
                    self.apply_footprint(new, Some(-1))?;
                    return Err(e);
                }
            }
            GridContribution::Carve => {
                self.apply_footprint(old, Some(1))?;
                if let Err(e) = self.apply_footprint(new, Some(-1)) {
                    self.apply_footprint(old, Some(-1))?;
                    return Err(e);
                }
            }
            GridContribution::None => {}
        }
        Ok(())
    }

    fn check_footprint(&self, fp: Footprint) -> Result<(), ArbiterError> {
        self.solid_mask
            .check_dimensions(fp.x, fp.y, fp.width, fp.height)
            .map_err(|e| {
                warn!(x = fp.x, y = fp.y, width = fp.width, height = fp.height, "footprint out of bounds");
                e.into()
            })
    }

    fn apply_footprint(&mut self, fp: Footprint, delta: Option<i8>) -> Result<(), ArbiterError> {
        match delta {
            Some(d) if d > 0 => self.solid_mask.inc_square(fp.x, fp.y, fp.width, fp.height)?,
            Some(_) => self.solid_mask.dec_square(fp.x, fp.y, fp.width, fp.height)?,
            None => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: EntityId = EntityId(1);
    const B: EntityId = EntityId(2);

    fn arbiter(w: u32, h: u32) -> OccupancyArbiter {
        OccupancyArbiter::new(w, h).unwrap()
    }

    #[test]
    fn test_add_and_remove_roundtrip() {
        let mut arb = arbiter(4, 4);
        arb.add(A, 1, 1, 2, 2, Solidness::Solid).unwrap();
        assert!(arb.is_added(A));
        assert_eq!(arb.solid_mask().counter(2, 2), Ok(1));
        assert_eq!(arb.solid_mask().occupied_count(), 4);

        let record = arb.remove(A).unwrap();
        assert_eq!(record.footprint, Footprint::new(1, 1, 2, 2));
        assert!(arb.solid_mask().is_clear());
        assert!(arb.is_empty());
    }

    #[test]
    fn test_double_add_fails() {
        let mut arb = arbiter(4, 4);
        arb.add(A, 0, 0, 1, 1, Solidness::Solid).unwrap();
        assert_eq!(
            arb.add(A, 2, 2, 1, 1, Solidness::Solid),
            Err(ArbiterError::AlreadyAdded(A))
        );
        assert_eq!(arb.solid_mask().occupied_count(), 1);
    }

    #[test]
    fn test_missing_entity() {
        let mut arb = arbiter(4, 4);
        assert_eq!(arb.remove(A), Err(ArbiterError::NotFound(A)));
        assert_eq!(arb.set_xy(A, 0, 0), Err(ArbiterError::NotFound(A)));
        assert_eq!(
            arb.set_solidness(A, Solidness::Ghost),
            Err(ArbiterError::NotFound(A))
        );
    }

    #[test]
    fn test_add_out_of_bounds() {
        let mut arb = arbiter(4, 4);
        let err = arb.add(A, 3, 0, 2, 1, Solidness::Solid).unwrap_err();
        assert!(matches!(err, ArbiterError::Grid(GridError::OutOfBounds { .. })));
        assert!(!arb.is_added(A));

        // Ghosts are bounds-checked too
        let err = arb.add(B, 0, 4, 1, 1, Solidness::Ghost).unwrap_err();
        assert!(matches!(err, ArbiterError::Grid(GridError::OutOfBounds { .. })));
    }

    #[test]
    fn test_zero_footprint_rejected() {
        let mut arb = arbiter(4, 4);
        assert_eq!(
            arb.add(A, 0, 0, 0, 1, Solidness::Solid),
            Err(ArbiterError::InvalidFootprint {
                width: 0,
                height: 1
            })
        );
    }

    #[test]
    fn test_ghost_never_touches_counters() {
        let mut arb = arbiter(3, 3);
        arb.add(A, 0, 0, 3, 3, Solidness::Ghost).unwrap();
        assert!(arb.solid_mask().is_clear());
        arb.set_xy(A, 0, 0).unwrap();
        assert!(arb.set_xy(A, 1, 0).is_err());
        assert_eq!(arb.position(A), Ok((0, 0)));
        arb.remove(A).unwrap();
        assert!(arb.solid_mask().is_clear());
    }

    #[test]
    fn test_teleport_moves_counters() {
        let mut arb = arbiter(5, 5);
        arb.add(A, 0, 0, 2, 1, Solidness::Solid).unwrap();
        arb.teleport(A, 3, 4).unwrap();
        assert_eq!(arb.solid_mask().occupied_cells(), vec![(3, 4), (4, 4)]);
        assert_eq!(arb.position(A), Ok((3, 4)));
    }

    #[test]
    fn test_teleport_onto_self_nets_zero() {
        let mut arb = arbiter(5, 5);
        arb.add(A, 1, 1, 2, 2, Solidness::Solid).unwrap();
        let before = arb.solid_mask().clone();
        arb.set_xy(A, 1, 1).unwrap();
        assert_eq!(arb.solid_mask(), &before);

        // Overlapping shift keeps the shared cells covered once
        arb.set_xy(A, 2, 1).unwrap();
        assert_eq!(arb.solid_mask().counter(2, 1), Ok(1));
        assert_eq!(arb.solid_mask().counter(1, 1), Ok(0));
    }

    #[test]
    fn test_teleport_out_of_bounds_keeps_state() {
        let mut arb = arbiter(3, 3);
        arb.add(A, 0, 0, 2, 2, Solidness::Solid).unwrap();
        let before = arb.solid_mask().clone();
        assert!(arb.set_xy(A, 2, 0).is_err());
        assert_eq!(arb.solid_mask(), &before);
        assert_eq!(arb.position(A), Ok((0, 0)));
    }

    #[test]
    fn test_set_solidness_transfers_contribution() {
        let mut arb = arbiter(3, 3);
        arb.add(A, 0, 0, 1, 1, Solidness::Solid).unwrap();
        arb.set_solidness(A, Solidness::Ghost).unwrap();
        assert!(arb.solid_mask().is_clear());
        arb.set_solidness(A, Solidness::SolidForOthers).unwrap();
        assert_eq!(arb.solid_mask().counter(0, 0), Ok(1));
        assert_eq!(arb.solidness(A), Ok(Solidness::SolidForOthers));
    }

    #[test]
    fn test_mask_carves_occupied_cells() {
        let mut arb = arbiter(3, 3);
        arb.add(A, 0, 0, 3, 1, Solidness::Solid).unwrap();
        arb.add(B, 1, 0, 1, 1, Solidness::Mask).unwrap();
        assert_eq!(arb.solid_mask().get_bit(1, 0), Ok(false));
        assert_eq!(arb.solid_mask().get_bit(0, 0), Ok(true));

        arb.remove(B).unwrap();
        assert_eq!(arb.solid_mask().counter(1, 0), Ok(1));
    }

    #[test]
    fn test_mask_over_free_cells_is_invalid_state() {
        let mut arb = arbiter(3, 3);
        let err = arb.add(A, 0, 0, 1, 1, Solidness::Mask).unwrap_err();
        assert_eq!(err, ArbiterError::Grid(GridError::InvalidState { x: 0, y: 0 }));
        assert!(!arb.is_added(A));
    }

    #[test]
    fn test_failed_solidness_change_rolls_back() {
        let mut arb = arbiter(3, 3);
        arb.add(A, 0, 0, 1, 1, Solidness::Solid).unwrap();
        // Releasing Solid leaves (0, 0) at zero, so carving it must fail
        let err = arb.set_solidness(A, Solidness::Mask).unwrap_err();
        assert!(matches!(err, ArbiterError::Grid(GridError::InvalidState { .. })));
        assert_eq!(arb.solidness(A), Ok(Solidness::Solid));
        assert_eq!(arb.solid_mask().counter(0, 0), Ok(1));
    }

    #[test]
    fn test_mask_teleports_along_floor() {
        let mut arb = arbiter(4, 2);
        arb.add(A, 0, 0, 4, 1, Solidness::Solid).unwrap();
        arb.add(B, 0, 0, 1, 1, Solidness::Mask).unwrap();

        arb.set_xy(B, 2, 0).unwrap();
        assert_eq!(arb.solid_mask().counter(0, 0), Ok(1));
        assert_eq!(arb.solid_mask().counter(2, 0), Ok(0));
        assert_eq!(arb.position(B), Ok((2, 0)));

        // Nothing covers (1, 1): the carve fails and (2, 0) stays open
        let before = arb.solid_mask().clone();
        let err = arb.set_xy(B, 1, 1).unwrap_err();
        assert_eq!(err, ArbiterError::Grid(GridError::InvalidState { x: 1, y: 1 }));
        assert_eq!(arb.solid_mask(), &before);
        assert_eq!(arb.position(B), Ok((2, 0)));
        assert_eq!(arb.verify_consistency(), Ok(()));
    }

    #[test]
    fn test_failed_remove_keeps_reservation() {
        let mut arb = arbiter(3, 2);
        let floor = EntityId(10);
        arb.add(floor, 0, 0, 3, 1, Solidness::Solid).unwrap();
        arb.add(B, 1, 0, 1, 1, Solidness::Mask).unwrap();
        arb.add(A, 1, 1, 1, 1, Solidness::Solid).unwrap();
        assert!(arb.step(A, Direction::Down).unwrap());
        arb.remove(floor).unwrap();

        // A's cell only nets zero because the mask carves it
        assert!(arb.allocate_movement(A, Direction::Up).unwrap());
        let before = arb.solid_mask().clone();
        let err = arb.remove(A).unwrap_err();
        assert_eq!(err, ArbiterError::Grid(GridError::InvalidState { x: 1, y: 0 }));
        assert!(arb.is_added(A));
        assert_eq!(arb.current_movement(A), Ok(Some(Direction::Up)));
        assert_eq!(arb.solid_mask(), &before);
        assert_eq!(arb.verify_consistency(), Ok(()));
    }

    #[test]
    fn test_failed_teleport_keeps_reservation() {
        let mut arb = arbiter(3, 2);
        arb.add(A, 0, 0, 3, 1, Solidness::Solid).unwrap();
        arb.add(B, 0, 0, 1, 1, Solidness::Mask).unwrap();
        assert!(arb.allocate_movement(B, Direction::Right).unwrap());
        let before = arb.solid_mask().clone();

        assert!(arb.set_xy(B, 0, 1).is_err());
        assert_eq!(arb.current_movement(B), Ok(Some(Direction::Right)));
        assert_eq!(arb.solid_mask(), &before);
    }

    #[test]
    fn test_queries_on_missing_entity() {
        let arb = arbiter(2, 2);
        assert_eq!(arb.record(A), Err(ArbiterError::NotFound(A)));
        assert_eq!(arb.can_move(A, Direction::Up), Err(ArbiterError::NotFound(A)));
    }

    #[test]
    fn test_dimension_mismatch() {
        let block = BlockMask::new(3, 3).unwrap();
        assert!(matches!(
            OccupancyArbiter::with_dimensions(4, 3, block),
            Err(ArbiterError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_entities_sorted() {
        let mut arb = arbiter(4, 4);
        arb.add(EntityId(9), 0, 0, 1, 1, Solidness::Ghost).unwrap();
        arb.add(EntityId(3), 0, 0, 1, 1, Solidness::Ghost).unwrap();
        assert_eq!(arb.entities(), vec![EntityId(3), EntityId(9)]);
        assert_eq!(arb.len(), 2);
    }
}
