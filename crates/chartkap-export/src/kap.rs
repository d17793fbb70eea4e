//! KAP header text serializer.
//!
//! Produces the plain-text header that `imgkap` combines with a palette
//! PNG into a `.kap` raster chart. The header is line oriented:
//!
//! ```text
//! !comment lines
//! VER/2.0
//! CRR/copyright
//! BSB/NA=title,NU=number,RA=width,height,DU=72
//! CED/SE=edition date,RE=1,ED=1
//! KNP/SC=scale,GD=datum,PR=projection,PP=parameter
//!     PI=UNKNOWN,SP=UNKNOWN,SK=0.0,TA=90.0
//!     UN=units,SD=sounding datum
//! DTM/lat shift,lon shift
//! CPH/0.0
//! REF/1,x,y,lat,lon            (four lines, SW NW NE SE)
//! PLY/1,lat,lon                (one line per polygon vertex)
//! IFM/5
//! OST/1
//! ```
//!
//! Coordinates are written with nine decimals, about a millimetre on
//! the ground. This is a pure function with no I/O; it returns a `String`.

use std::fmt::Write;

use chartkap_pipeline::{CalibrationRecord, Corner};

/// Value written for header fields nobody surveyed.
pub const UNKNOWN: &str = "UNKNOWN";

/// Header revision written to `VER` lines.
pub const FORMAT_VERSION: &str = "2.0";

/// Publisher text shared by the KAP header and the BSB catalog.
#[derive(Debug, Clone, Default)]
pub struct HeaderMetadata<'a> {
    /// Free text emitted as `!` comment lines before the header.
    pub comment: Option<&'a str>,

    /// Copyright or release notice (`CRR`).
    pub copyright: Option<&'a str>,

    /// Producing organisation (`ORG`, BSB only).
    pub organization: Option<&'a str>,

    /// Manufacturer (`MFR`, BSB only).
    pub manufacturer: Option<&'a str>,
}

/// Write `comment` as `!`-prefixed lines, keeping an existing `!`.
pub(crate) fn write_comment(out: &mut String, comment: Option<&str>) {
    let Some(comment) = comment else {
        return;
    };
    for line in comment.lines() {
        let line = line.strip_prefix('!').unwrap_or(line);
        let _ = writeln!(out, "!{line}");
    }
}

/// Serialize a calibration into KAP header text.
///
/// The extent, references and polygon are written exactly as they are
/// on `record`, so callers pass the working copy that matches the raster
/// being encoded (after rotation and resizing).
#[must_use]
pub fn to_kap_header(record: &CalibrationRecord, metadata: &HeaderMetadata<'_>) -> String {
    let mut out = String::new();
    let info = &record.info;

    write_comment(&mut out, metadata.comment);
    let _ = writeln!(out, "VER/{FORMAT_VERSION}");
    if let Some(copyright) = metadata.copyright {
        let _ = writeln!(out, "CRR/{copyright}");
    }
    let _ = writeln!(
        out,
        "BSB/NA={},NU={},RA={},{},DU=72",
        info.title, record.chart, record.extent.width, record.extent.height
    );
    let _ = writeln!(
        out,
        "CED/SE={},RE=1,ED=1",
        info.edition_date.as_deref().unwrap_or(UNKNOWN)
    );

    let scale = record
        .scale
        .map_or_else(|| UNKNOWN.to_owned(), |s| s.to_string());
    let parameter = record
        .projection_parameter
        .map_or_else(|| UNKNOWN.to_owned(), |pp| format!("{pp:.9}"));
    let _ = writeln!(
        out,
        "KNP/SC={scale},GD={},PR={},PP={parameter}",
        record.datum, record.projection
    );
    let _ = writeln!(
        out,
        "    PI={UNKNOWN},SP={UNKNOWN},SK={:.1},TA=90.0",
        record.skew
    );
    let _ = writeln!(
        out,
        "    UN={},SD={}",
        record.units.as_deref().unwrap_or(UNKNOWN),
        record.sounding_datum.as_deref().unwrap_or(UNKNOWN)
    );

    let _ = writeln!(
        out,
        "DTM/{},{}",
        record.datum_shift.latitude, record.datum_shift.longitude
    );
    let _ = writeln!(out, "CPH/{:.1}", phase_shift(record));

    for r in &record.references {
        let _ = writeln!(
            out,
            "REF/{},{},{},{:.9},{:.9}",
            r.index, r.pixel_x, r.pixel_y, r.latitude, r.longitude
        );
    }
    for p in record.polygon.points() {
        let _ = writeln!(out, "PLY/{},{:.9},{:.9}", p.sequence, p.latitude, p.longitude);
    }

    let _ = writeln!(out, "IFM/5");
    let _ = writeln!(out, "OST/1");
    out
}

/// Longitude phase shift: 180 for charts crossing the antimeridian.
fn phase_shift(record: &CalibrationRecord) -> f64 {
    let west = record.reference(Corner::Nw).longitude;
    let east = record.reference(Corner::Ne).longitude;
    if east < west { 180.0 } else { 0.0 }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chartkap_pipeline::calibration::field;
    use chartkap_pipeline::{ChartNumber, SurveyFields, calibrate};

    use super::*;

    fn record(fields: SurveyFields) -> CalibrationRecord {
        let fields = fields
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
            .with(field::HEIGHT, 1000);
        calibrate(&ChartNumber::parse("25641").unwrap(), &fields, &[]).unwrap()
    }

    fn lines(text: &str) -> Vec<&str> {
        text.lines().collect()
    }

    #[test]
    fn minimal_header() {
        let header = to_kap_header(&record(SurveyFields::new()), &HeaderMetadata::default());
        let lines = lines(&header);
        assert_eq!(lines[0], "VER/2.0");
        assert_eq!(lines[1], "BSB/NA=25641,NU=25641,RA=1200,1000,DU=72");
        assert_eq!(lines[2], "CED/SE=UNKNOWN,RE=1,ED=1");
        assert_eq!(
            lines[3],
            "KNP/SC=UNKNOWN,GD=WGS84,PR=MERCATOR,PP=10.500000000"
        );
        assert_eq!(lines[4], "    PI=UNKNOWN,SP=UNKNOWN,SK=0.0,TA=90.0");
        assert_eq!(lines[6], "DTM/0,0");
        assert_eq!(lines[7], "CPH/0.0");
        assert_eq!(lines.last(), Some(&"OST/1"));
    }

    #[test]
    fn references_in_calibration_order() {
        let header = to_kap_header(&record(SurveyFields::new()), &HeaderMetadata::default());
        let refs: Vec<&str> = header.lines().filter(|l| l.starts_with("REF/")).collect();
        assert_eq!(
            refs,
            vec![
                "REF/1,0,1000,10.000000000,-70.000000000",
                "REF/2,0,0,11.000000000,-70.000000000",
                "REF/3,1200,0,11.000000000,-69.000000000",
                "REF/4,1200,1000,10.000000000,-69.000000000",
            ]
        );
        assert_eq!(header.lines().filter(|l| l.starts_with("PLY/")).count(), 4);
    }

    #[test]
    fn survey_values_are_written() {
        let fields = SurveyFields::new()
            .with(field::TITLE, "Approaches to Port")
            .with(field::SCALE, 25000)
            .with(field::DATUM, "NAD83")
            .with(field::UNITS, "FEET")
            .with(field::SOUNDING_DATUM, "MLLW")
            .with(field::DATUM_SHIFT_LAT, 0.5)
            .with(field::DATUM_SHIFT_LON, -0.25)
            .with(field::EDITION_DATE, "2009-05-01");
        let header = to_kap_header(&record(fields), &HeaderMetadata::default());
        assert!(header.contains("BSB/NA=Approaches to Port,NU=25641,"));
        assert!(header.contains("CED/SE=2009-05-01,RE=1,ED=1\n"));
        assert!(header.contains("KNP/SC=25000,GD=NAD83,"));
        assert!(header.contains("    UN=FEET,SD=MLLW\n"));
        assert!(header.contains("DTM/-30,15\n"));
    }

    #[test]
    fn comment_and_copyright_come_first() {
        let metadata = HeaderMetadata {
            comment: Some("DO NOT USE FOR NAVIGATION\n!Screen captures only"),
            copyright: Some("Released by the chart project."),
            ..HeaderMetadata::default()
        };
        let header = to_kap_header(&record(SurveyFields::new()), &metadata);
        let lines = lines(&header);
        assert_eq!(lines[0], "!DO NOT USE FOR NAVIGATION");
        assert_eq!(lines[1], "!Screen captures only");
        assert_eq!(lines[2], "VER/2.0");
        assert_eq!(lines[3], "CRR/Released by the chart project.");
    }

    #[test]
    fn unknown_projection_parameter() {
        let header = to_kap_header(
            &record(SurveyFields::new().with(field::PROJECTION, "GNOMONIC")),
            &HeaderMetadata::default(),
        );
        assert!(header.contains("PR=GNOMONIC,PP=UNKNOWN\n"));
    }
}
