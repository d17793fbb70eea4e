//! Default projection parameters (`KNP/PP`).
//!
//! Survey rows often leave the projection parameter empty. For the
//! projections used on raster charts a sensible default follows from the
//! chart's own bounds; anything else is reported as unavailable and the
//! calibration is flagged incomplete instead of guessed.

use crate::types::GeoBounds;

/// Source of default projection parameters.
///
/// Implementations return `None` when they have no default for the
/// named projection.
pub trait ProjectionDefaults {
    /// Derive the projection parameter for `projection` over `bounds`.
    fn default_parameter(&self, projection: &str, bounds: &GeoBounds) -> Option<f64>;
}

/// Defaults for the projections found on scanned nautical charts.
///
/// - Mercator: the mid latitude of the chart (latitude of true scale).
/// - Transverse Mercator and Polyconic: the mid longitude (central meridian).
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardProjectionDefaults;

impl ProjectionDefaults for StandardProjectionDefaults {
    fn default_parameter(&self, projection: &str, bounds: &GeoBounds) -> Option<f64> {
        match projection.trim().to_ascii_uppercase().as_str() {
            "MERCATOR" => Some(bounds.south.midpoint(bounds.north)),
            "TRANSVERSE MERCATOR" | "POLYCONIC" => Some(bounds.west.midpoint(bounds.east)),
            _ => None,
        }
    }
}
