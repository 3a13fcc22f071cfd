use tracing::trace;

use super::{ArbiterError, EntityId, OccupancyArbiter};
use crate::geometry::{Direction, Footprint};
use crate::grid::{CellQuery, GridError, QueryMode};

impl OccupancyArbiter {
    /// Whether `entity` may take one step in `direction` right now.
    ///
    /// Checks run in a fixed order: pending movement, map edge, block layer,
    /// then the solid mask. Carving bodies need every destination cell
    /// covered; other traversing bodies skip the solid mask.
    pub fn can_move(&self, entity: EntityId, direction: Direction) -> Result<bool, ArbiterError> {
        let record = self.record(entity)?;
        if record.current_movement.is_some() {
            return Ok(false);
        }
        let Some(strip) =
            record
                .footprint
                .adjacent_strip(direction, self.width(), self.height())
        else {
            return Ok(false);
        };
        if self.block_mask().query_strip(strip, QueryMode::AnyBlocked) {
            return Ok(false);
        }
        if record.solidness.carves() {
            // A carving body can only open cells that something still covers
            return Ok(self.solid_mask().query_strip(strip, QueryMode::AllBlocked));
        }
        if record.solidness.traverses() {
            return Ok(true);
        }
        Ok(self.solid_mask().empty_strip(strip)?)
    }

    /// Start a one-cell move, reserving the destination strip.
    ///
    /// Returns `Ok(false)` without touching anything when the move is not
    /// allowed (see [`can_move`](Self::can_move)).
    pub fn allocate_movement(
        &mut self,
        entity: EntityId,
        direction: Direction,
    ) -> Result<bool, ArbiterError> {
        let record = self.existing(entity)?;
        if !self.can_move(entity, direction)? {
            return Ok(false);
        }
        let delta = record.solidness.contribution().claim_delta();
        self.apply_adjacent(record.footprint, direction, delta)?;

        self.record_mut(entity)?.current_movement = Some(direction);
        trace!(%entity, direction = direction.as_str(), "movement allocated");
        Ok(true)
    }

    /// Abort the in-flight move, releasing its reservation. No-op when idle.
    pub fn cancel_movement(&mut self, entity: EntityId) -> Result<(), ArbiterError> {
        let record = self.existing(entity)?;
        let Some(direction) = record.current_movement else {
            return Ok(());
        };
        let delta = record.solidness.contribution().release_delta();
        self.apply_adjacent(record.footprint, direction, delta)?;

        self.record_mut(entity)?.current_movement = None;
        trace!(%entity, direction = direction.as_str(), "movement cancelled");
        Ok(())
    }

    /// Finish the in-flight move: advance the body one cell and release the
    /// strip it left behind. Returns the new footprint, or `None` when idle.
    pub fn confirm_movement(&mut self, entity: EntityId) -> Result<Option<Footprint>, ArbiterError> {
        let record = self.existing(entity)?;
        let Some(direction) = record.current_movement else {
            return Ok(None);
        };
        let old = record.footprint;
        let moved = old
            .stepped(direction)
            .filter(|fp| fp.fits_within(self.width(), self.height()))
            .ok_or(GridError::OutOfBounds {
                x: old.x,
                y: old.y,
                width: old.width,
                height: old.height,
                grid_width: self.width(),
                grid_height: self.height(),
            })?;

        // Origin strip borders the new footprint on the side we came from
        let delta = record.solidness.contribution().release_delta();
        self.apply_adjacent(moved, direction.opposite(), delta)?;

        let record = self.record_mut(entity)?;
        record.footprint = moved;
        record.current_movement = None;
        trace!(%entity, direction = direction.as_str(), x = moved.x, y = moved.y, "movement confirmed");
        Ok(Some(moved))
    }

    /// Convenience for callers that resolve a step in one go
    pub fn step(&mut self, entity: EntityId, direction: Direction) -> Result<bool, ArbiterError> {
        if !self.allocate_movement(entity, direction)? {
            return Ok(false);
        }
        self.confirm_movement(entity)?;
        Ok(true)
    }

    /// Re-reserve a movement dropped by [`cancel_movement`](Self::cancel_movement)
    /// after the operation that cancelled it failed
    pub(super) fn restore_movement(
        &mut self,
        entity: EntityId,
        pending: Option<Direction>,
    ) -> Result<(), ArbiterError> {
        let Some(direction) = pending else {
            return Ok(());
        };
        let record = self.existing(entity)?;
        let delta = record.solidness.contribution().claim_delta();
        self.apply_adjacent(record.footprint, direction, delta)?;
        self.record_mut(entity)?.current_movement = Some(direction);
        Ok(())
    }

    fn apply_adjacent(
        &mut self,
        footprint: Footprint,
        direction: Direction,
        delta: Option<i8>,
    ) -> Result<(), ArbiterError> {
        let Some(delta) = delta else {
            return Ok(());
        };
        // Flush against the edge: no strip exists, nothing to reserve
        if let Some(strip) = footprint.adjacent_strip(direction, self.width(), self.height()) {
            self.solid_mask.add_strip(strip, delta)?;
        }
        Ok(())
    }
}
