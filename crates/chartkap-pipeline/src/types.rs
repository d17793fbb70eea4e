//! Shared types for the chartkap calibration pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::polygon::BoundaryPolygon;

/// Chart number as printed on the paper chart.
///
/// Always a non-empty run of ASCII digits. Chart numbers address every
/// artifact on disk and every row in the repository, so they are
/// validated once at the edge and passed around as this type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChartNumber(String);

impl ChartNumber {
    /// Validate and wrap a chart number.
    ///
    /// # Errors
    ///
    /// Returns [`ChartNumberError`] if `value` is empty or contains
    /// anything other than ASCII digits.
    pub fn parse(value: &str) -> Result<Self, ChartNumberError> {
        if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(value.to_owned()))
        } else {
            Err(ChartNumberError(value.to_owned()))
        }
    }

    /// The chart number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChartNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ChartNumber {
    type Err = ChartNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ChartNumber {
    type Error = ChartNumberError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ChartNumber> for String {
    fn from(value: ChartNumber) -> Self {
        value.0
    }
}

/// A chart number argument that was not all digits.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("chart number must be a non-empty string of digits, got {0:?}")]
pub struct ChartNumberError(pub String);

/// Raster extent in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extent {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Extent {
    /// Create a new extent.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// The same extent with width and height exchanged.
    #[must_use]
    pub const fn swapped(self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One of the four chart corners.
///
/// The declaration order is the calibration order used by KAP `REF`
/// lines and by the rectangle fallback polygon: SW, NW, NE, SE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Corner {
    /// South-west (bottom-left).
    Sw,
    /// North-west (top-left).
    Nw,
    /// North-east (top-right).
    Ne,
    /// South-east (bottom-right).
    Se,
}

impl Corner {
    /// All corners in calibration order.
    pub const ALL: [Self; 4] = [Self::Sw, Self::Nw, Self::Ne, Self::Se];

    /// 1-based reference index of this corner (SW = 1 ... SE = 4).
    #[must_use]
    pub const fn index(self) -> u8 {
        match self {
            Self::Sw => 1,
            Self::Nw => 2,
            Self::Ne => 3,
            Self::Se => 4,
        }
    }

    /// Lower-case short name, as substituted into `{CORNER}` path templates.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sw => "sw",
            Self::Nw => "nw",
            Self::Ne => "ne",
            Self::Se => "se",
        }
    }

    const fn slot(self) -> usize {
        self.index() as usize - 1
    }
}

impl fmt::Display for Corner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discrete rotation applied to the scanned image so the chart is north-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PreRotation {
    /// Already north-up.
    #[default]
    None,
    /// 90 degrees clockwise.
    Quarter,
    /// 180 degrees.
    Half,
    /// 270 degrees clockwise.
    ThreeQuarter,
}

impl PreRotation {
    /// Interpret a stored rotation angle.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::InvalidPreRotation`] for anything other
    /// than 0, 90, 180 or 270.
    pub const fn from_degrees(degrees: i64) -> Result<Self, CalibrationError> {
        match degrees {
            0 => Ok(Self::None),
            90 => Ok(Self::Quarter),
            180 => Ok(Self::Half),
            270 => Ok(Self::ThreeQuarter),
            other => Err(CalibrationError::InvalidPreRotation(other)),
        }
    }

    /// Rotation angle in degrees.
    #[must_use]
    pub const fn degrees(self) -> u16 {
        match self {
            Self::None => 0,
            Self::Quarter => 90,
            Self::Half => 180,
            Self::ThreeQuarter => 270,
        }
    }

    /// Whether the rotated raster has width and height exchanged.
    #[must_use]
    pub const fn swaps_axes(self) -> bool {
        matches!(self, Self::Quarter | Self::ThreeQuarter)
    }

    /// Whether any raster rotation is needed at all.
    #[must_use]
    pub const fn is_rotated(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// A pixel/geodetic pair anchoring the calibration (KAP `REF`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferencePoint {
    /// 1-based index, SW = 1 ... SE = 4.
    pub index: u8,
    /// Pixels from the left edge.
    pub pixel_x: u32,
    /// Pixels from the top edge.
    pub pixel_y: u32,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

/// One vertex of a boundary polygon (KAP `PLY`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolygonPoint {
    /// Position in the polygon, ascending.
    pub sequence: u32,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

/// A track point read from or written to a GPX file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

impl TrackPoint {
    /// Create a new track point.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Geographic bounding box of a chart in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    /// Southern limit.
    pub south: f64,
    /// Northern limit.
    pub north: f64,
    /// Western limit.
    pub west: f64,
    /// Eastern limit.
    pub east: f64,
}

impl GeoBounds {
    /// The bounds as a `geo` rectangle (x = longitude, y = latitude).
    #[must_use]
    pub fn to_rect(&self) -> geo::Rect<f64> {
        geo::Rect::new(
            geo::coord! { x: self.west, y: self.south },
            geo::coord! { x: self.east, y: self.north },
        )
    }
}

/// Datum shift offsets (KAP `DTM`), in the seconds convention KAP expects.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DatumShift {
    /// Latitude shift.
    pub latitude: f64,
    /// Longitude shift.
    pub longitude: f64,
}

impl DatumShift {
    /// Convert stored decimal shifts: scale by 60 and invert the sign.
    ///
    /// A result of `-0.0` is stored as `0.0`.
    #[must_use]
    pub fn from_survey(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: positive_zero(-(latitude * 60.0)),
            longitude: positive_zero(-(longitude * 60.0)),
        }
    }
}

#[allow(clippy::float_cmp)]
const fn positive_zero(value: f64) -> f64 {
    if value == 0.0 { 0.0 } else { value }
}

/// Descriptive chart metadata carried into the KAP and BSB headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartInfo {
    /// Chart title.
    pub title: String,
    /// Edition date (`CED/SE`).
    pub edition_date: Option<String>,
    /// Edition number (`NTM/NE`).
    pub edition: Option<String>,
    /// Last correction (`NTM/ND`).
    pub correction: Option<String>,
    /// KAP type, `BASE` for the main chart panel.
    pub kap_type: String,
    /// Chart format (`CHF`).
    pub chart_format: Option<String>,
}

/// A pixel rectangle in top-left-origin raster coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl PixelRect {
    /// Exclusive right edge.
    #[must_use]
    pub const fn right(&self) -> u64 {
        self.x as u64 + self.width as u64
    }

    /// Exclusive bottom edge.
    #[must_use]
    pub const fn bottom(&self) -> u64 {
        self.y as u64 + self.height as u64
    }

    /// Size of the rectangle as an extent of its own.
    #[must_use]
    pub const fn extent(&self) -> Extent {
        Extent::new(self.width, self.height)
    }

    /// Whether the rectangle lies entirely inside `extent`.
    #[must_use]
    pub const fn fits_within(&self, extent: Extent) -> bool {
        self.right() <= extent.width as u64 && self.bottom() <= extent.height as u64
    }
}

impl fmt::Display for PixelRect {
    /// ImageMagick geometry syntax: `WxH+X+Y`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Non-fatal findings recorded while building a calibration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum CalibrationWarning {
    /// No projection parameter was stored and none could be derived.
    #[error("no default projection parameter is known for projection {projection:?}")]
    ProjectionDefaultUnavailable {
        /// The projection name that had no default.
        projection: String,
    },
}

/// The pixel-to-geodetic calibration of one chart panel.
///
/// Built fresh from repository rows by
/// [`CalibrationBuilder`](crate::calibration::CalibrationBuilder) on every
/// production attempt. Rotation and resizing produce new records; the
/// built record itself is never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    /// Chart number.
    pub chart: ChartNumber,
    /// 1-based KAP variant within the chart.
    pub variant: u32,
    /// Descriptive header metadata.
    pub info: ChartInfo,
    /// Raster extent after pre-rotation.
    pub extent: Extent,
    /// Discrete rotation applied before cropping.
    pub pre_rotation: PreRotation,
    /// Reference points in SW, NW, NE, SE order.
    pub references: [ReferencePoint; 4],
    /// Chart scale denominator.
    pub scale: Option<u32>,
    /// Geodetic datum identifier (`KNP/GD`).
    pub datum: String,
    /// Projection identifier (`KNP/PR`).
    pub projection: String,
    /// Projection parameter (`KNP/PP`), `None` when it could not be determined.
    pub projection_parameter: Option<f64>,
    /// Skew angle in degrees (`KNP/SK`).
    pub skew: f64,
    /// Depth units (`KNP/UN`).
    pub units: Option<String>,
    /// Sounding datum code (`KNP/SD`).
    pub sounding_datum: Option<String>,
    /// Datum shift offsets (`DTM`).
    pub datum_shift: DatumShift,
    /// Datum the shift refers to.
    pub datum_shift_datum: Option<String>,
    /// Side of the square corner cut-outs, shared by the chart and its insets.
    pub corner_size: u32,
    /// Boundary polygon (`PLY`).
    pub polygon: BoundaryPolygon,
    /// Non-fatal problems found while building.
    pub warnings: Vec<CalibrationWarning>,
}

impl CalibrationRecord {
    /// Default corner cut-out size in pixels.
    pub const DEFAULT_CORNER_SIZE: u32 = 1500;

    /// The reference point anchoring `corner`.
    #[must_use]
    pub const fn reference(&self, corner: Corner) -> &ReferencePoint {
        &self.references[corner.slot()]
    }

    /// Whether the record was built without warnings.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Geographic bounding box spanned by the reference points.
    #[must_use]
    pub fn geo_bounds(&self) -> GeoBounds {
        let latitudes = self.references.iter().map(|r| r.latitude);
        let longitudes = self.references.iter().map(|r| r.longitude);
        GeoBounds {
            south: latitudes.clone().fold(f64::INFINITY, f64::min),
            north: latitudes.fold(f64::NEG_INFINITY, f64::max),
            west: longitudes.clone().fold(f64::INFINITY, f64::min),
            east: longitudes.fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// Errors that make a chart's survey data unusable for calibration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalibrationError {
    /// A field without which no calibration can be built is absent.
    #[error("required survey field `{0}` is missing")]
    MissingRequiredField(&'static str),

    /// A field is present but cannot be interpreted.
    #[error("survey field `{field}` has an unusable value {value:?}")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// The raw stored value.
        value: String,
    },

    /// The stored pre-rotation is not a multiple of 90 degrees.
    #[error("pre-rotation must be 0, 90, 180 or 270 degrees, got {0}")]
    InvalidPreRotation(i64),

    /// A corner pixel does not lie on the raster.
    #[error("{corner} reference pixel ({x}, {y}) lies outside the {extent} raster")]
    ReferenceOutsideExtent {
        /// The offending corner.
        corner: Corner,
        /// Stored x coordinate.
        x: f64,
        /// Stored y coordinate.
        y: f64,
        /// The rotation-adjusted raster extent.
        extent: Extent,
    },
}

/// Errors from pixel crop geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CropError {
    /// The crop annotations do not describe a non-empty rectangle on the raster.
    #[error("invalid crop box x {min_x}..{max_x}, y {min_y}..{max_y}")]
    InvalidCropBox {
        /// Smallest x.
        min_x: i64,
        /// Largest x.
        max_x: i64,
        /// Smallest y.
        min_y: i64,
        /// Largest y.
        max_y: i64,
    },
}

/// Errors from boundary polygon import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PolygonError {
    /// The imported track has no points.
    #[error("track contains no points")]
    EmptyTrack,
}
