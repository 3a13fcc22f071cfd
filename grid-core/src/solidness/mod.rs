//! Solidness classification of a body and how it feeds the solid mask.

use serde::{Deserialize, Serialize};

/// How a body's footprint interacts with other bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Solidness {
    /// Never blocks, never blocked by other bodies
    Ghost,
    /// Reserves its cells and is blocked by other reserved cells
    #[default]
    Solid,
    /// Reserves its cells but walks through other bodies
    SolidForOthers,
    /// Opens the cells it stands on instead of reserving them
    Mask,
}

/// Signed effect a body has on the counters it covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridContribution {
    Occupy,
    Carve,
    None,
}

impl GridContribution {
    /// Counter delta applied when the contribution is claimed
    pub fn claim_delta(&self) -> Option<i8> {
        match self {
            Self::Occupy => Some(1),
            Self::Carve => Some(-1),
            Self::None => None,
        }
    }

    /// Counter delta applied when the contribution is released
    pub fn release_delta(&self) -> Option<i8> {
        self.claim_delta().map(|d| -d)
    }
}

impl Solidness {
    pub fn occupies(&self) -> bool {
        matches!(self, Self::Solid | Self::SolidForOthers)
    }

    pub fn carves(&self) -> bool {
        matches!(self, Self::Mask)
    }

    pub fn traverses(&self) -> bool {
        matches!(self, Self::Ghost | Self::SolidForOthers | Self::Mask)
    }

    pub fn contribution(&self) -> GridContribution {
        if self.occupies() {
            GridContribution::Occupy
        } else if self.carves() {
            GridContribution::Carve
        } else {
            GridContribution::None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ghost => "ghost",
            Self::Solid => "solid",
            Self::SolidForOthers => "solid_for_others",
            Self::Mask => "mask",
        }
    }

    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(Self::Ghost),
            1 => Some(Self::Solid),
            2 => Some(Self::SolidForOthers),
            3 => Some(Self::Mask),
            _ => None,
        }
    }
}
