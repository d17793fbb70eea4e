//! chartkap-pipeline: Chart calibration and crop geometry (sans-IO).
//!
//! Turns a chart's surveyed georeferencing fields into a
//! [`CalibrationRecord`] and decides every geometric transform applied
//! to the raster before it becomes a KAP product:
//! survey fields -> calibration -> skew rotation -> resize -> crop boxes.
//!
//! This crate has **no I/O dependencies**. It never touches the
//! database, the filesystem or external tools; `chartkap-io` drives
//! those and feeds this crate plain values.

pub mod calibration;
pub mod crop;
pub mod polygon;
pub mod projection;
pub mod rotation;
pub mod state;
pub mod types;

pub use calibration::{CalibrationBuilder, SurveyFields};
pub use crop::CornerBoxes;
pub use polygon::{BoundaryPolygon, PolygonOrigin};
pub use projection::{ProjectionDefaults, StandardProjectionDefaults};
pub use state::{ChartState, ChartStatus, InsetState};
pub use types::{
    CalibrationError, CalibrationRecord, CalibrationWarning, ChartInfo, ChartNumber,
    ChartNumberError, Corner, CropError, DatumShift, Extent, GeoBounds, PixelRect, PolygonError,
    PolygonPoint, PreRotation, ReferencePoint, TrackPoint,
};

/// Build a chart's calibration with the standard projection defaults.
///
/// Warnings recorded on the result and boundary points falling outside
/// the reference rectangle are logged; neither fails the build.
///
/// # Errors
///
/// Returns [`CalibrationError`] when the survey fields cannot yield a
/// calibration (see [`CalibrationBuilder::build`]).
pub fn calibrate(
    chart: &ChartNumber,
    fields: &SurveyFields,
    boundary: &[PolygonPoint],
) -> Result<CalibrationRecord, CalibrationError> {
    let builder: CalibrationBuilder = CalibrationBuilder::default();
    let record = builder.build(chart, fields, boundary)?;

    for warning in &record.warnings {
        log::warn!("chart {chart}: {warning}");
    }
    let outside = record.polygon.points_outside(&record.geo_bounds());
    if outside > 0 {
        log::warn!(
            "chart {chart}: {outside} of {} boundary points lie outside the reference rectangle",
            record.polygon.len()
        );
    }
    log::debug!(
        "chart {chart}: extent {}, pre-rotation {}, polygon {:?} with {} points",
        record.extent,
        record.pre_rotation.degrees(),
        record.polygon.origin(),
        record.polygon.len()
    );
    Ok(record)
}
