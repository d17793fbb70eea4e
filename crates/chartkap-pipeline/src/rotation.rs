//! Skew detection and free-angle rotation of a working calibration.
//!
//! Angles are in degrees, positive clockwise as seen on screen (the
//! direction ImageMagick's `-rotate` uses). Both [`apply`] and
//! [`resize_to_percent`] return a new record and leave their input
//! untouched, so the record built from the repository is never altered
//! by a production run.

use crate::types::{CalibrationRecord, Corner, Extent, ReferencePoint};

/// Clockwise rotation that brings the chart's top edge onto true east-west.
///
/// Compares the pixel direction of the NW→NE edge with its geodetic
/// bearing. Bearings are computed on a local equirectangular
/// approximation, which is exact enough over a single chart sheet.
/// Coincident NW/NE points yield `0.0`.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn suggest(record: &CalibrationRecord) -> f64 {
    let nw = record.reference(Corner::Nw);
    let ne = record.reference(Corner::Ne);

    let dx = f64::from(ne.pixel_x) - f64::from(nw.pixel_x);
    let dy = f64::from(ne.pixel_y) - f64::from(nw.pixel_y);
    let mean_latitude = nw.latitude.midpoint(ne.latitude).to_radians();
    let east = (ne.longitude - nw.longitude) * mean_latitude.cos();
    let north = ne.latitude - nw.latitude;
    if (dx == 0.0 && dy == 0.0) || (east == 0.0 && north == 0.0) {
        return 0.0;
    }

    let pixel_angle = dy.atan2(dx).to_degrees();
    let bearing = east.atan2(north).to_degrees();
    normalize((bearing - 90.0) - pixel_angle)
}

/// Whether a suggested rotation is large enough to act on.
#[must_use]
pub fn should_auto_rotate(angle: f64, threshold_degrees: f64) -> bool {
    angle.abs() > threshold_degrees
}

/// A copy of `record` as it will look after rotating the raster by
/// `angle` degrees clockwise.
///
/// The extent grows to the bounding box of the rotated raster and each
/// reference pixel is rotated about the raster centre into that box.
/// Geodetic coordinates and the boundary polygon are unaffected.
#[must_use]
pub fn apply(record: &CalibrationRecord, angle: f64) -> CalibrationRecord {
    let (sin, cos) = angle.to_radians().sin_cos();
    let width = f64::from(record.extent.width);
    let height = f64::from(record.extent.height);
    let rotated_width = width.mul_add(cos.abs(), height * sin.abs());
    let rotated_height = width.mul_add(sin.abs(), height * cos.abs());
    let extent = Extent::new(to_pixel(rotated_width), to_pixel(rotated_height));

    let (cx, cy) = (width / 2.0, height / 2.0);
    let (ncx, ncy) = (f64::from(extent.width) / 2.0, f64::from(extent.height) / 2.0);
    let references = record.references.map(|r| {
        let x = f64::from(r.pixel_x) - cx;
        let y = f64::from(r.pixel_y) - cy;
        ReferencePoint {
            pixel_x: to_pixel(x.mul_add(cos, -(y * sin)) + ncx).min(extent.width),
            pixel_y: to_pixel(x.mul_add(sin, y * cos) + ncy).min(extent.height),
            ..r
        }
    });

    CalibrationRecord {
        extent,
        references,
        ..record.clone()
    }
}

/// A copy of `record` scaled to `percent` of its raster size.
///
/// Matches a raster resize by the same percentage. The extent never
/// shrinks below one pixel.
#[must_use]
pub fn resize_to_percent(record: &CalibrationRecord, percent: f64) -> CalibrationRecord {
    let factor = percent / 100.0;
    let scale = |v: u32| to_pixel(f64::from(v) * factor);
    let extent = Extent::new(
        scale(record.extent.width).max(1),
        scale(record.extent.height).max(1),
    );
    let references = record.references.map(|r| ReferencePoint {
        pixel_x: scale(r.pixel_x).min(extent.width),
        pixel_y: scale(r.pixel_y).min(extent.height),
        ..r
    });
    CalibrationRecord {
        extent,
        references,
        ..record.clone()
    }
}

/// Map an angle into (-180, 180].
fn normalize(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_pixel(value: f64) -> u32 {
    value.round().clamp(0.0, f64::from(u32::MAX)) as u32
}
