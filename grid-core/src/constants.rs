//! Shared defaults for the grid core.

// =====================================================
// Maps
// =====================================================

/// Width of a map definition that does not specify one
pub const DEFAULT_MAP_WIDTH: u32 = 16;

/// Height of a map definition that does not specify one
pub const DEFAULT_MAP_HEIGHT: u32 = 16;

// =====================================================
// Logging
// =====================================================

/// Tracing target prefix for every module of this crate
pub const LOG_TARGET_ROOT: &str = "windrose_core";
