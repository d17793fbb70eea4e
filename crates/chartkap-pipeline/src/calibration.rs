//! Calibration assembly from raw survey fields.
//!
//! The repository hands over one chart's survey row as raw strings keyed
//! by field name ([`SurveyFields`]) together with the stored boundary
//! points. [`CalibrationBuilder`] turns them into a [`CalibrationRecord`]:
//!
//! 1. Read the geographic limits and the four corner pixels (required).
//! 2. Resolve the raster extent, swapping width and height for 90/270
//!    degree pre-rotation.
//! 3. Pair each corner pixel with its geographic corner (no reprojection).
//! 4. Convert the datum shift to KAP seconds.
//! 5. Fill in the projection parameter from [`ProjectionDefaults`] when
//!    the row has none.
//! 6. Build the boundary polygon with the rectangle fallback.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::polygon;
use crate::projection::{ProjectionDefaults, StandardProjectionDefaults};
use crate::types::{
    CalibrationError, CalibrationRecord, CalibrationWarning, ChartInfo, ChartNumber, Corner,
    DatumShift, Extent, GeoBounds, PolygonPoint, PreRotation, ReferencePoint,
};

/// Survey field names.
pub mod field {
    /// Northern limit, decimal degrees.
    pub const NORTH: &str = "north";
    /// Southern limit, decimal degrees.
    pub const SOUTH: &str = "south";
    /// Eastern limit, decimal degrees.
    pub const EAST: &str = "east";
    /// Western limit, decimal degrees.
    pub const WEST: &str = "west";
    /// South-west corner pixel.
    pub const X_SW: &str = "xsw";
    /// South-west corner pixel.
    pub const Y_SW: &str = "ysw";
    /// North-west corner pixel.
    pub const X_NW: &str = "xnw";
    /// North-west corner pixel.
    pub const Y_NW: &str = "ynw";
    /// North-east corner pixel.
    pub const X_NE: &str = "xne";
    /// North-east corner pixel.
    pub const Y_NE: &str = "yne";
    /// South-east corner pixel.
    pub const X_SE: &str = "xse";
    /// South-east corner pixel.
    pub const Y_SE: &str = "yse";
    /// Stored raster width before pre-rotation.
    pub const WIDTH: &str = "width";
    /// Stored raster height before pre-rotation.
    pub const HEIGHT: &str = "height";
    /// Pre-rotation in degrees.
    pub const PRE_ROTATE: &str = "prerotate";
    /// Corner cut-out size in pixels.
    pub const CORNER_SIZE: &str = "cornersize";
    /// Chart title.
    pub const TITLE: &str = "title";
    /// Natural scale denominator.
    pub const SCALE: &str = "scale";
    /// Horizontal datum name.
    pub const DATUM: &str = "datum";
    /// Projection name.
    pub const PROJECTION: &str = "projection";
    /// Projection parameter, the latitude of true scale for Mercator.
    pub const PROJECTION_PARAMETER: &str = "projection_parameter";
    /// Depth units.
    pub const UNITS: &str = "units";
    /// Sounding datum name.
    pub const SOUNDING_DATUM: &str = "sounding_datum";
    /// Latitude datum shift, decimal degrees as stored.
    pub const DATUM_SHIFT_LAT: &str = "dtm_lat";
    /// Longitude datum shift, decimal degrees as stored.
    pub const DATUM_SHIFT_LON: &str = "dtm_lon";
    /// Datum the shift is relative to.
    pub const DATUM_SHIFT_DATUM: &str = "dtm_datum";
    /// Edition date as stored.
    pub const EDITION_DATE: &str = "edition_date";
    /// Edition label.
    pub const EDITION: &str = "edition";
    /// Latest notice-to-mariners correction.
    pub const CORRECTION: &str = "correction";
    /// `BASE` or `INSET`.
    pub const KAP_TYPE: &str = "kap_type";
    /// Chart format label.
    pub const CHART_FORMAT: &str = "chart_format";

    /// Fields without which no calibration can be built, in check order.
    pub const REQUIRED: [&str; 12] = [
        NORTH, SOUTH, EAST, WEST, X_SW, Y_SW, X_NW, Y_NW, X_NE, Y_NE, X_SE, Y_SE,
    ];
}

/// Projection assumed when the survey row names none.
pub const DEFAULT_PROJECTION: &str = "MERCATOR";

/// Datum assumed when neither the datum nor the datum-shift datum is stored.
pub const DEFAULT_DATUM: &str = "WGS84";

/// One chart's raw survey fields, keyed by field name.
///
/// Values are kept as the repository delivered them; interpretation
/// happens in the typed accessors. Empty or whitespace-only values count
/// as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurveyFields(BTreeMap<String, String>);

impl SurveyFields {
    /// An empty field set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.insert(key, value.to_string());
        self
    }

    /// Insert or replace a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// The trimmed value of `key`, if present and non-empty.
    #[must_use]
    pub fn text(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// The numeric value of `key`, if present.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::InvalidField`] if the value is not a
    /// finite number.
    pub fn number(&self, key: &'static str) -> Result<Option<f64>, CalibrationError> {
        self.text(key)
            .map(|raw| match raw.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(v),
                _ => Err(CalibrationError::InvalidField {
                    field: key,
                    value: raw.to_owned(),
                }),
            })
            .transpose()
    }

    /// The numeric value of a field the calibration cannot do without.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::MissingRequiredField`] if absent, or
    /// [`CalibrationError::InvalidField`] if not a finite number.
    pub fn required(&self, key: &'static str) -> Result<f64, CalibrationError> {
        self.number(key)?
            .ok_or(CalibrationError::MissingRequiredField(key))
    }

    /// Stored pre-rotation; absent means none.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::InvalidField`] for a non-integer value
    /// and [`CalibrationError::InvalidPreRotation`] for an unsupported angle.
    #[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
    pub fn pre_rotation(&self) -> Result<PreRotation, CalibrationError> {
        match self.number(field::PRE_ROTATE)? {
            None => Ok(PreRotation::None),
            Some(degrees) if degrees.fract() == 0.0 => PreRotation::from_degrees(degrees as i64),
            Some(_) => Err(self.invalid(field::PRE_ROTATE)),
        }
    }

    /// Corner cut-out size; absent or zero means
    /// [`CalibrationRecord::DEFAULT_CORNER_SIZE`].
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::InvalidField`] for negative or
    /// non-integer sizes.
    pub fn corner_size(&self) -> Result<u32, CalibrationError> {
        match self.number(field::CORNER_SIZE)? {
            None => Ok(CalibrationRecord::DEFAULT_CORNER_SIZE),
            Some(size) => match to_pixel(size) {
                Some(0) => Ok(CalibrationRecord::DEFAULT_CORNER_SIZE),
                Some(size) => Ok(size),
                None => Err(self.invalid(field::CORNER_SIZE)),
            },
        }
    }

    fn invalid(&self, key: &'static str) -> CalibrationError {
        CalibrationError::InvalidField {
            field: key,
            value: self.text(key).unwrap_or_default().to_owned(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SurveyFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Assembles [`CalibrationRecord`]s from survey fields.
#[derive(Debug, Clone, Default)]
pub struct CalibrationBuilder<P = StandardProjectionDefaults> {
    projection_defaults: P,
}

impl<P: ProjectionDefaults> CalibrationBuilder<P> {
    /// A builder using `projection_defaults` for missing projection parameters.
    #[must_use]
    pub const fn new(projection_defaults: P) -> Self {
        Self {
            projection_defaults,
        }
    }

    /// Build the calibration of `chart`.
    ///
    /// A missing projection parameter that cannot be defaulted does not
    /// fail the build; it is recorded as
    /// [`CalibrationWarning::ProjectionDefaultUnavailable`].
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::MissingRequiredField`] when a limit or
    /// corner pixel is absent, [`CalibrationError::InvalidField`] or
    /// [`CalibrationError::InvalidPreRotation`] for unusable values, and
    /// [`CalibrationError::ReferenceOutsideExtent`] when a corner pixel
    /// does not lie on the raster.
    pub fn build(
        &self,
        chart: &ChartNumber,
        fields: &SurveyFields,
        boundary: &[PolygonPoint],
    ) -> Result<CalibrationRecord, CalibrationError> {
        for key in field::REQUIRED {
            fields.required(key)?;
        }
        let bounds = GeoBounds {
            south: fields.required(field::SOUTH)?,
            north: fields.required(field::NORTH)?,
            west: fields.required(field::WEST)?,
            east: fields.required(field::EAST)?,
        };
        let pixels = [
            corner_pixel(fields, field::X_SW, field::Y_SW)?,
            corner_pixel(fields, field::X_NW, field::Y_NW)?,
            corner_pixel(fields, field::X_NE, field::Y_NE)?,
            corner_pixel(fields, field::X_SE, field::Y_SE)?,
        ];

        let pre_rotation = fields.pre_rotation()?;
        let extent = resolve_extent(fields, pre_rotation, &pixels)?;
        let references = reference_points(&bounds, &pixels, extent)?;

        let datum_shift = DatumShift::from_survey(
            fields.number(field::DATUM_SHIFT_LAT)?.unwrap_or(0.0),
            fields.number(field::DATUM_SHIFT_LON)?.unwrap_or(0.0),
        );
        let datum_shift_datum = fields.text(field::DATUM_SHIFT_DATUM).map(str::to_owned);
        let datum = fields
            .text(field::DATUM)
            .or(datum_shift_datum.as_deref())
            .unwrap_or(DEFAULT_DATUM)
            .to_owned();

        let projection = fields
            .text(field::PROJECTION)
            .unwrap_or(DEFAULT_PROJECTION)
            .to_owned();
        let mut warnings = Vec::new();
        let projection_parameter = match fields.number(field::PROJECTION_PARAMETER)? {
            Some(pp) => Some(pp),
            None => {
                let derived = self
                    .projection_defaults
                    .default_parameter(&projection, &bounds);
                if derived.is_none() {
                    warnings.push(CalibrationWarning::ProjectionDefaultUnavailable {
                        projection: projection.clone(),
                    });
                }
                derived
            }
        };

        let scale = match fields.number(field::SCALE)? {
            Some(scale) => Some(to_pixel(scale).ok_or_else(|| fields.invalid(field::SCALE))?),
            None => None,
        };

        let owned = |key: &str| fields.text(key).map(str::to_owned);
        let info = ChartInfo {
            title: owned(field::TITLE).unwrap_or_else(|| chart.to_string()),
            edition_date: owned(field::EDITION_DATE),
            edition: owned(field::EDITION),
            correction: owned(field::CORRECTION),
            kap_type: owned(field::KAP_TYPE).unwrap_or_else(|| "BASE".to_owned()),
            chart_format: owned(field::CHART_FORMAT),
        };

        Ok(CalibrationRecord {
            chart: chart.clone(),
            variant: 1,
            info,
            extent,
            pre_rotation,
            references,
            scale,
            datum,
            projection,
            projection_parameter,
            skew: 0.0,
            units: owned(field::UNITS),
            sounding_datum: owned(field::SOUNDING_DATUM),
            datum_shift,
            datum_shift_datum,
            corner_size: fields.corner_size()?,
            polygon: polygon::build(boundary, &references),
            warnings,
        })
    }
}

fn corner_pixel(
    fields: &SurveyFields,
    x_key: &'static str,
    y_key: &'static str,
) -> Result<(f64, f64), CalibrationError> {
    Ok((fields.required(x_key)?, fields.required(y_key)?))
}

/// Raster extent after pre-rotation.
///
/// Stored width/height describe the scan before rotation, so they are
/// swapped for quarter turns. Without stored dimensions the extent is
/// spanned by the corner pixels, which are already in output space.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn resolve_extent(
    fields: &SurveyFields,
    pre_rotation: PreRotation,
    pixels: &[(f64, f64); 4],
) -> Result<Extent, CalibrationError> {
    let width = fields.number(field::WIDTH)?;
    let height = fields.number(field::HEIGHT)?;
    if let (Some(width), Some(height)) = (width, height) {
        let width = to_pixel(width).ok_or_else(|| fields.invalid(field::WIDTH))?;
        let height = to_pixel(height).ok_or_else(|| fields.invalid(field::HEIGHT))?;
        let stored = Extent::new(width, height);
        return Ok(if pre_rotation.swaps_axes() {
            stored.swapped()
        } else {
            stored
        });
    }
    let max_x = pixels.iter().map(|p| p.0).fold(0.0, f64::max);
    let max_y = pixels.iter().map(|p| p.1).fold(0.0, f64::max);
    Ok(Extent::new(
        max_x.ceil().min(f64::from(u32::MAX)) as u32,
        max_y.ceil().min(f64::from(u32::MAX)) as u32,
    ))
}

/// Pair each corner pixel with its geodetic corner.
///
/// Pixels must lie within `extent`. Scans with a margin put the corner
/// pixels inside the raster rather than on its corners; those are kept
/// as stored and only logged.
fn reference_points(
    bounds: &GeoBounds,
    pixels: &[(f64, f64); 4],
    extent: Extent,
) -> Result<[ReferencePoint; 4], CalibrationError> {
    let geodetic = |corner: Corner| match corner {
        Corner::Sw => (bounds.south, bounds.west),
        Corner::Nw => (bounds.north, bounds.west),
        Corner::Ne => (bounds.north, bounds.east),
        Corner::Se => (bounds.south, bounds.east),
    };
    let mut references = [ReferencePoint {
        index: 0,
        pixel_x: 0,
        pixel_y: 0,
        latitude: 0.0,
        longitude: 0.0,
    }; 4];
    for ((slot, corner), &(x, y)) in references.iter_mut().zip(Corner::ALL).zip(pixels) {
        let outside = || CalibrationError::ReferenceOutsideExtent {
            corner,
            x,
            y,
            extent,
        };
        let pixel_x = to_pixel(x)
            .filter(|&px| px <= extent.width)
            .ok_or_else(outside)?;
        let pixel_y = to_pixel(y)
            .filter(|&py| py <= extent.height)
            .ok_or_else(outside)?;
        if !on_corner(corner, pixel_x, pixel_y, extent) {
            log::warn!(
                "{corner} reference pixel ({pixel_x}, {pixel_y}) is not a corner of the {extent} raster"
            );
        }
        let (latitude, longitude) = geodetic(corner);
        *slot = ReferencePoint {
            index: corner.index(),
            pixel_x,
            pixel_y,
            latitude,
            longitude,
        };
    }
    Ok(references)
}

fn on_corner(corner: Corner, x: u32, y: u32, extent: Extent) -> bool {
    let expected = match corner {
        Corner::Sw => (0, extent.height),
        Corner::Nw => (0, 0),
        Corner::Ne => (extent.width, 0),
        Corner::Se => (extent.width, extent.height),
    };
    (x, y) == expected
}

/// Round a stored coordinate to a non-negative pixel position.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_pixel(value: f64) -> Option<u32> {
    let rounded = value.round();
    (rounded >= 0.0 && rounded <= f64::from(u32::MAX)).then_some(rounded as u32)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::polygon::PolygonOrigin;

    fn chart() -> ChartNumber {
        ChartNumber::parse("25641").unwrap()
    }

    /// Survey row of a 1200x1000 north-up chart covering 10..11N, 70..69W.
    fn fields() -> SurveyFields {
        SurveyFields::new()
            .with(field::SOUTH, 10)
            .with(field::NORTH, 11)
            .with(field::WEST, -70)
            .with(field::EAST, -69)
            .with(field::X_SW, 0)
            .with(field::Y_SW, 1000)
            .with(field::X_NW, 0)
            .with(field::Y_NW, 0)
            .with(field::X_NE, 1200)
            .with(field::Y_NE, 0)
            .with(field::X_SE, 1200)
            .with(field::Y_SE, 1000)
            .with(field::WIDTH, 1200)
            .with(field::HEIGHT, 1000)
            .with(field::PRE_ROTATE, 0)
    }

    fn builder() -> CalibrationBuilder {
        CalibrationBuilder::default()
    }

    fn build(fields: &SurveyFields) -> Result<CalibrationRecord, CalibrationError> {
        builder().build(&chart(), fields, &[])
    }

    #[test]
    fn every_required_field_is_checked() {
        for key in field::REQUIRED {
            let mut partial = fields();
            partial.insert(key, "  ");
            assert_eq!(
                build(&partial),
                Err(CalibrationError::MissingRequiredField(key)),
                "removing {key}",
            );
        }
    }

    #[test]
    fn unparseable_number_is_invalid() {
        let broken = fields().with(field::NORTH, "eleven");
        assert!(matches!(
            build(&broken),
            Err(CalibrationError::InvalidField { field: "north", .. })
        ));
    }

    #[test]
    fn references_are_the_raster_corners() {
        let record = build(&fields()).unwrap();
        let extent = record.extent;
        for reference in &record.references {
            assert!(reference.pixel_x == 0 || reference.pixel_x == extent.width);
            assert!(reference.pixel_y == 0 || reference.pixel_y == extent.height);
        }
        let sw = record.reference(Corner::Sw);
        assert_eq!((sw.index, sw.pixel_x, sw.pixel_y), (1, 0, 1000));
        let ne = record.reference(Corner::Ne);
        assert_eq!((ne.index, ne.pixel_x, ne.pixel_y), (3, 1200, 0));
    }

    #[test]
    fn quarter_turn_swaps_extent() {
        // Stored scan is 1000 wide and 1200 tall; rotated it becomes 1200x1000.
        for degrees in [90, 270] {
            let rotated = fields()
                .with(field::WIDTH, 1000)
                .with(field::HEIGHT, 1200)
                .with(field::PRE_ROTATE, degrees);
            let record = build(&rotated).unwrap();
            assert_eq!(record.extent, Extent::new(1200, 1000));
        }
        for degrees in [0, 180] {
            let record = build(&fields().with(field::PRE_ROTATE, degrees)).unwrap();
            assert_eq!(record.extent, Extent::new(1200, 1000));
        }
    }

    #[test]
    fn unsupported_pre_rotation_is_rejected() {
        let tilted = fields().with(field::PRE_ROTATE, 45);
        assert_eq!(build(&tilted), Err(CalibrationError::InvalidPreRotation(45)));
    }

    #[test]
    fn extent_falls_back_to_corner_pixels() {
        let mut no_size = fields();
        no_size.insert(field::WIDTH, "");
        no_size.insert(field::HEIGHT, "");
        let record = build(&no_size.with(field::PRE_ROTATE, 90)).unwrap();
        assert_eq!(record.extent, Extent::new(1200, 1000));
    }

    #[test]
    fn inset_corner_pixels_are_kept_as_stored() {
        let margin = fields().with(field::X_NW, 40).with(field::Y_NW, 30);
        let record = build(&margin).unwrap();
        let nw = record.reference(Corner::Nw);
        assert_eq!((nw.pixel_x, nw.pixel_y), (40, 30));
        assert!(!on_corner(Corner::Nw, 40, 30, record.extent));
        assert!(on_corner(Corner::Se, 1200, 1000, record.extent));
        assert!(!on_corner(Corner::Se, 1000, 1200, record.extent));
    }

    #[test]
    fn corner_outside_raster_is_rejected() {
        let outside = fields().with(field::X_NE, 1300);
        assert!(matches!(
            build(&outside),
            Err(CalibrationError::ReferenceOutsideExtent {
                corner: Corner::Ne,
                ..
            })
        ));
    }

    #[test]
    fn datum_shift_is_converted() {
        let record = build(
            &fields()
                .with(field::DATUM_SHIFT_LAT, 0.01)
                .with(field::DATUM_SHIFT_LON, "-0.02"),
        )
        .unwrap();
        approx::assert_relative_eq!(record.datum_shift.latitude, -0.6, epsilon = 1e-12);
        approx::assert_relative_eq!(record.datum_shift.longitude, 1.2, epsilon = 1e-12);
    }

    #[test]
    fn zero_datum_shift_is_positive_zero() {
        let record = build(
            &fields()
                .with(field::DATUM_SHIFT_LAT, "0.0")
                .with(field::DATUM_SHIFT_LON, "-0.0"),
        )
        .unwrap();
        assert!(record.datum_shift.latitude.is_sign_positive());
        assert!(record.datum_shift.longitude.is_sign_positive());
    }

    #[test]
    fn projection_parameter_defaults_for_mercator() {
        let record = build(&fields()).unwrap();
        assert_eq!(record.projection, DEFAULT_PROJECTION);
        approx::assert_relative_eq!(record.projection_parameter.unwrap(), 10.5);
        assert!(record.is_complete());
    }

    #[test]
    fn stored_projection_parameter_wins() {
        let record = build(&fields().with(field::PROJECTION_PARAMETER, 10.25)).unwrap();
        approx::assert_relative_eq!(record.projection_parameter.unwrap(), 10.25);
    }

    #[test]
    fn unknown_projection_is_flagged_but_usable() {
        let record = build(&fields().with(field::PROJECTION, "GNOMONIC")).unwrap();
        assert_eq!(record.projection_parameter, None);
        assert_eq!(
            record.warnings,
            vec![CalibrationWarning::ProjectionDefaultUnavailable {
                projection: "GNOMONIC".to_owned()
            }]
        );
        assert!(!record.is_complete());
    }

    #[test]
    fn datum_falls_back_to_shift_datum_then_wgs84() {
        assert_eq!(build(&fields()).unwrap().datum, DEFAULT_DATUM);
        let record = build(&fields().with(field::DATUM_SHIFT_DATUM, "NAD27")).unwrap();
        assert_eq!(record.datum, "NAD27");
        let record = build(
            &fields()
                .with(field::DATUM_SHIFT_DATUM, "NAD27")
                .with(field::DATUM, "NAD83"),
        )
        .unwrap();
        assert_eq!(record.datum, "NAD83");
    }

    #[test]
    fn corner_size_defaults() {
        assert_eq!(build(&fields()).unwrap().corner_size, 1500);
        assert_eq!(
            build(&fields().with(field::CORNER_SIZE, 0)).unwrap().corner_size,
            1500
        );
        assert_eq!(
            build(&fields().with(field::CORNER_SIZE, 800)).unwrap().corner_size,
            800
        );
    }

    #[test]
    fn boundary_points_feed_the_polygon() {
        let stored: Vec<PolygonPoint> = (1..=5)
            .map(|i| PolygonPoint {
                sequence: i,
                latitude: 10.0 + f64::from(i) / 10.0,
                longitude: -69.5,
            })
            .collect();
        let record = builder()
            .build(&chart(), &fields(), &stored)
            .unwrap();
        assert_eq!(record.polygon.origin(), PolygonOrigin::Stored);
        assert_eq!(record.polygon.len(), 5);

        let record = build(&fields()).unwrap();
        assert_eq!(record.polygon.origin(), PolygonOrigin::CornerFallback);
    }

    #[test]
    fn title_defaults_to_chart_number() {
        let record = build(&fields()).unwrap();
        assert_eq!(record.info.title, "25641");
        assert_eq!(record.info.kap_type, "BASE");
    }

    #[test]
    fn survey_fields_serde_is_a_plain_map() {
        let fields = SurveyFields::new().with(field::NORTH, 11);
        let json = serde_json::to_string(&fields).unwrap();
        assert_eq!(json, r#"{"north":"11"}"#);
    }
}
