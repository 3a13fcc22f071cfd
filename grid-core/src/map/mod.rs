//! Map definitions
//!
//! A map is loaded from a JSON or RON document describing its size, the
//! static block layer (one string per tile row, top row first) and the
//! bodies present at load time. The arbiter is rebuilt from it on every load;
//! nothing is written back.
//!
//! ```ron
//! (
//!     width: 4,
//!     height: 2,
//!     block_rows: ["#...", "...#"],
//!     entities: [(id: 1, x: 1, y: 0, width: 1, height: 1, solidness: Solid)],
//! )
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::arbiter::{ArbiterError, EntityId, OccupancyArbiter};
use crate::constants::{DEFAULT_MAP_HEIGHT, DEFAULT_MAP_WIDTH};
use crate::grid::{BlockMask, GridError};
use crate::solidness::Solidness;

/// Error type for map loading
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("Map expects {expected} block rows of width {width}, row {row} does not fit")]
    InvalidRow { row: usize, expected: u32, width: u32 },
    #[error("Unknown map format: {0}")]
    UnknownFormat(String),
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Arbiter(#[from] ArbiterError),
}

/// Body present when the map loads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySpawn {
    pub id: u64,
    pub x: u32,
    pub y: u32,
    #[serde(default = "one")]
    pub width: u32,
    #[serde(default = "one")]
    pub height: u32,
    #[serde(default)]
    pub solidness: Solidness,
}

fn one() -> u32 {
    1
}

/// Static description of a map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapDefinition {
    pub width: u32,
    pub height: u32,
    /// Tile rows, top row first; `#`/`X` blocked. Empty means no terrain blocking.
    #[serde(default)]
    pub block_rows: Vec<String>,
    #[serde(default)]
    pub entities: Vec<EntitySpawn>,
}

impl Default for MapDefinition {
    fn default() -> Self {
        Self {
            width: DEFAULT_MAP_WIDTH,
            height: DEFAULT_MAP_HEIGHT,
            block_rows: Vec::new(),
            entities: Vec::new(),
        }
    }
}

impl MapDefinition {
    pub fn from_json(json: &str) -> Result<Self, MapError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_ron(text: &str) -> Result<Self, MapError> {
        Ok(ron::from_str(text)?)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Load a map file, choosing the parser from its extension (`.json` or `.ron`)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, MapError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let def = match ext.as_str() {
            "json" => Self::from_json(&text)?,
            "ron" => Self::from_ron(&text)?,
            other => return Err(MapError::UnknownFormat(other.to_string())),
        };
        info!(path = %path.display(), width = def.width, height = def.height, "map definition loaded");
        Ok(def)
    }

    /// Build the static block layer described by `block_rows`
    pub fn block_mask(&self) -> Result<BlockMask, MapError> {
        if self.block_rows.is_empty() {
            return Ok(BlockMask::new(self.width, self.height)?);
        }
        if self.block_rows.len() != self.height as usize {
            return Err(MapError::InvalidRow {
                row: self.block_rows.len().min(self.height as usize),
                expected: self.height,
                width: self.width,
            });
        }
        if let Some(row) = self
            .block_rows
            .iter()
            .position(|r| r.chars().count() != self.width as usize)
        {
            return Err(MapError::InvalidRow {
                row,
                expected: self.height,
                width: self.width,
            });
        }
        Ok(BlockMask::from_rows(&self.block_rows)?)
    }
}

impl OccupancyArbiter {
    /// Build an arbiter for a map, registering its spawns in order
    pub fn from_map(def: &MapDefinition) -> Result<Self, MapError> {
        let mut arbiter = Self::with_dimensions(def.width, def.height, def.block_mask()?)?;
        for spawn in &def.entities {
            arbiter.add(
                EntityId(spawn.id),
                spawn.x,
                spawn.y,
                spawn.width,
                spawn.height,
                spawn.solidness,
            )?;
        }
        debug!(entities = arbiter.len(), "arbiter built from map");
        Ok(arbiter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Direction;
    use crate::grid::CellQuery;

    #[test]
    fn test_default_map() {
        let def = MapDefinition::default();
        let arb = OccupancyArbiter::from_map(&def).unwrap();
        assert_eq!(arb.width(), DEFAULT_MAP_WIDTH);
        assert!(arb.is_empty());
    }

    #[test]
    fn test_from_ron() {
        let def = MapDefinition::from_ron(
            r##"(
                width: 4,
                height: 2,
                block_rows: ["#...", "...#"],
                entities: [(id: 1, x: 1, y: 0, solidness: Solid)],
            )"##,
        )
        .unwrap();
        let arb = OccupancyArbiter::from_map(&def).unwrap();
        assert_eq!(arb.block_mask().get_bit(0, 1), Ok(true));
        assert_eq!(arb.block_mask().get_bit(3, 0), Ok(true));
        assert_eq!(arb.footprint(EntityId(1)).unwrap().width, 1);
        assert_eq!(arb.can_move(EntityId(1), Direction::Right), Ok(true));
    }

    #[test]
    fn test_from_json_defaults() {
        let def = MapDefinition::from_json(
            r#"{"width": 3, "height": 3, "entities": [{"id": 7, "x": 0, "y": 0}]}"#,
        )
        .unwrap();
        assert!(def.block_rows.is_empty());
        assert_eq!(def.entities[0].solidness, Solidness::Solid);
        assert_eq!(def.entities[0].height, 1);
    }

    #[test]
    fn test_row_count_mismatch() {
        let def = MapDefinition {
            width: 3,
            height: 2,
            block_rows: vec!["...".into()],
            entities: vec![],
        };
        assert!(matches!(def.block_mask(), Err(MapError::InvalidRow { .. })));
    }

    #[test]
    fn test_spawn_conflict_surfaces() {
        let def = MapDefinition {
            width: 3,
            height: 3,
            block_rows: vec![],
            entities: vec![
                EntitySpawn {
                    id: 1,
                    x: 0,
                    y: 0,
                    width: 1,
                    height: 1,
                    solidness: Solidness::Solid,
                },
                EntitySpawn {
                    id: 1,
                    x: 1,
                    y: 1,
                    width: 1,
                    height: 1,
                    solidness: Solidness::Solid,
                },
            ],
        };
        assert!(matches!(
            OccupancyArbiter::from_map(&def),
            Err(MapError::Arbiter(ArbiterError::AlreadyAdded(EntityId(1))))
        ));
    }
}
