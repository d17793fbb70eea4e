//! Boundary polygon (KAP `PLY`) construction, import and export.
//!
//! Stored and imported polygons follow different rules:
//!
//! - A **stored** polygon with fewer than [`MIN_STORED_POINTS`] points is
//!   treated as erroneous annotation and replaced by the rectangle spanned
//!   by the four reference points (SW, NW, NE, SE).
//! - An **imported** track is an explicit user action and is taken as-is,
//!   even when it has only one or two points. Only an empty track is
//!   rejected.

use geo::{Area, Intersects};
use serde::{Deserialize, Serialize};

use crate::types::{GeoBounds, PolygonError, PolygonPoint, ReferencePoint, TrackPoint};

/// Smallest stored polygon that is used verbatim.
pub const MIN_STORED_POINTS: usize = 3;

/// Where the points of a [`BoundaryPolygon`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolygonOrigin {
    /// Stored points, used verbatim in sequence order.
    Stored,
    /// Too few stored points; the reference-point rectangle was used.
    CornerFallback,
    /// Taken from an imported track.
    Imported,
}

/// Ordered boundary polygon of a chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryPolygon {
    points: Vec<PolygonPoint>,
    origin: PolygonOrigin,
}

impl BoundaryPolygon {
    /// The polygon vertices in sequence order.
    #[must_use]
    pub fn points(&self) -> &[PolygonPoint] {
        &self.points
    }

    /// Where the vertices came from.
    #[must_use]
    pub const fn origin(&self) -> PolygonOrigin {
        self.origin
    }

    /// Number of vertices.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if the polygon has no vertices.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The polygon as a `geo` polygon (x = longitude, y = latitude).
    #[must_use]
    pub fn to_geo(&self) -> geo::Polygon<f64> {
        let ring: Vec<(f64, f64)> = self
            .points
            .iter()
            .map(|p| (p.longitude, p.latitude))
            .collect();
        geo::Polygon::new(geo::LineString::from(ring), vec![])
    }

    /// Enclosed area in square degrees.
    #[must_use]
    pub fn area_sq_degrees(&self) -> f64 {
        self.to_geo().unsigned_area()
    }

    /// Number of vertices lying outside `bounds` (boundary counts as inside).
    #[must_use]
    pub fn points_outside(&self, bounds: &GeoBounds) -> usize {
        let rect = bounds.to_rect();
        self.points
            .iter()
            .filter(|p| !rect.intersects(&geo::Point::new(p.longitude, p.latitude)))
            .count()
    }
}

/// Build the polygon of a chart from its stored points.
///
/// With at least [`MIN_STORED_POINTS`] points the points are used
/// unchanged, ordered by `sequence`. Otherwise the polygon is exactly the
/// four reference points in SW, NW, NE, SE order.
#[must_use]
pub fn build(points: &[PolygonPoint], references: &[ReferencePoint; 4]) -> BoundaryPolygon {
    if points.len() >= MIN_STORED_POINTS {
        let mut ordered = points.to_vec();
        ordered.sort_by_key(|p| p.sequence);
        BoundaryPolygon {
            points: ordered,
            origin: PolygonOrigin::Stored,
        }
    } else {
        let points = references
            .iter()
            .zip(1..)
            .map(|(r, sequence)| PolygonPoint {
                sequence,
                latitude: r.latitude,
                longitude: r.longitude,
            })
            .collect();
        BoundaryPolygon {
            points,
            origin: PolygonOrigin::CornerFallback,
        }
    }
}

/// Turn an externally read track into a polygon, numbering points from 1.
///
/// # Errors
///
/// Returns [`PolygonError::EmptyTrack`] if `track` is empty.
pub fn import_from_track(track: &[TrackPoint]) -> Result<BoundaryPolygon, PolygonError> {
    if track.is_empty() {
        return Err(PolygonError::EmptyTrack);
    }
    let points = track
        .iter()
        .zip(1..)
        .map(|(t, sequence)| PolygonPoint {
            sequence,
            latitude: t.latitude,
            longitude: t.longitude,
        })
        .collect();
    Ok(BoundaryPolygon {
        points,
        origin: PolygonOrigin::Imported,
    })
}

/// Map a polygon 1:1 onto track points, preserving order.
#[must_use]
pub fn export_to_track(polygon: &BoundaryPolygon) -> Vec<TrackPoint> {
    polygon
        .points
        .iter()
        .map(|p| TrackPoint::new(p.latitude, p.longitude))
        .collect()
}
