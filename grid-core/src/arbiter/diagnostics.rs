//! Snapshots and self-checks for debugging occupancy bookkeeping.

use serde::{Deserialize, Serialize};
use tracing::error;

use super::{ArbiterError, EntityId, EntityRecord, OccupancyArbiter};
use crate::geometry::{Direction, Footprint};
use crate::solidness::Solidness;

/// One body as seen in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub footprint: Footprint,
    pub solidness: Solidness,
    pub current_movement: Option<Direction>,
}

/// Serializable view of the whole arbiter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccupancySnapshot {
    pub width: u32,
    pub height: u32,
    pub occupied_cells: Vec<(u32, u32)>,
    pub blocked_tiles: usize,
    pub entities: Vec<EntitySnapshot>,
}

impl OccupancySnapshot {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(json: &str) -> Option<Self> {
        serde_json::from_str(json).ok()
    }
}

impl OccupancyArbiter {
    pub fn snapshot(&self) -> OccupancySnapshot {
        let entities = self
            .entities()
            .into_iter()
            .filter_map(|id| self.records.get(&id).map(|r| snapshot_of(id, r)))
            .collect();
        OccupancySnapshot {
            width: self.width(),
            height: self.height(),
            occupied_cells: self.solid_mask.occupied_cells(),
            blocked_tiles: self.block_mask.blocked_count(),
            entities,
        }
    }

    /// Recompute every counter from the registered bodies (pending
    /// reservations included) and compare with the solid mask.
    pub fn verify_consistency(&self) -> Result<(), ArbiterError> {
        let width = self.width() as usize;
        let mut expected = vec![0i64; width * self.height() as usize];

        for record in self.records.values() {
            let Some(delta) = record.solidness.contribution().claim_delta() else {
                continue;
            };
            let fp = record.footprint;
            for y in fp.y..fp.y + fp.height {
                for x in fp.x..fp.x + fp.width {
                    expected[y as usize * width + x as usize] += delta as i64;
                }
            }
            if let Some(strip) = record
                .current_movement
                .and_then(|dir| fp.adjacent_strip(dir, self.width(), self.height()))
            {
                for (x, y) in strip.cells() {
                    expected[y as usize * width + x as usize] += delta as i64;
                }
            }
        }

        for (i, &want) in expected.iter().enumerate() {
            let (x, y) = ((i % width) as u32, (i / width) as u32);
            let actual = self.solid_mask.counter(x, y)?;
            if want != actual as i64 {
                error!(x, y, expected = want, actual, "solid mask diverged from registered bodies");
                return Err(ArbiterError::Inconsistent {
                    x,
                    y,
                    expected: want,
                    actual,
                });
            }
        }
        Ok(())
    }
}

fn snapshot_of(id: EntityId, record: &EntityRecord) -> EntitySnapshot {
    EntitySnapshot {
        id,
        footprint: record.footprint,
        solidness: record.solidness,
        current_movement: record.current_movement,
    }
}
