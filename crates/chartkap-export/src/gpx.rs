//! GPX track serializer and reader.
//!
//! Boundary polygons travel to and from chart editors as a single GPX
//! track. Writing emits one `<trk>` with one `<trkseg>`; reading accepts
//! the track points of any track in the file, or route points when the
//! file has no track points (some editors save polygons as routes).
//!
//! Coordinates are written with Rust's shortest round-trip float
//! formatting, so reading back a written file reproduces every value
//! bit for bit.
//!
//! The reader is a small attribute scanner, not a general XML parser: it
//! looks only at `<trkpt>`/`<rtept>` start tags and their `lat`/`lon`
//! attributes, which is all a polygon needs.

use std::fmt::Write;

use chartkap_pipeline::TrackPoint;

/// Errors from reading GPX text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GpxError {
    /// The text has no `<gpx` root element.
    #[error("not a GPX document")]
    NotGpx,

    /// A point tag lacks a coordinate attribute.
    #[error("{element} #{index} has no `{attribute}` attribute")]
    MissingAttribute {
        /// `trkpt` or `rtept`.
        element: &'static str,
        /// 1-based position of the point in the file.
        index: usize,
        /// The missing attribute name.
        attribute: &'static str,
    },

    /// A coordinate is not a number or out of range.
    #[error("{element} #{index} has invalid {attribute} {value:?}")]
    InvalidCoordinate {
        /// `trkpt` or `rtept`.
        element: &'static str,
        /// 1-based position of the point in the file.
        index: usize,
        /// `lat` or `lon`.
        attribute: &'static str,
        /// The raw attribute value.
        value: String,
    },

    /// A start tag is never closed.
    #[error("unterminated <{element}> tag")]
    UnterminatedTag {
        /// `trkpt` or `rtept`.
        element: &'static str,
    },
}

/// Serialize `points` as a single GPX 1.1 track named `name`.
#[must_use]
pub fn to_gpx(points: &[TrackPoint], name: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    let _ = writeln!(
        out,
        r#"<gpx version="1.1" creator="chartkap" xmlns="http://www.topografix.com/GPX/1/1">"#
    );
    let _ = writeln!(out, "  <trk>");
    let _ = writeln!(out, "    <name>{}</name>", xml_escape(name));
    let _ = writeln!(out, "    <trkseg>");
    for p in points {
        let _ = writeln!(
            out,
            r#"      <trkpt lat="{}" lon="{}"/>"#,
            p.latitude, p.longitude
        );
    }
    let _ = writeln!(out, "    </trkseg>");
    let _ = writeln!(out, "  </trk>");
    let _ = writeln!(out, "</gpx>");
    out
}

/// Read the ordered track points of a GPX document.
///
/// An empty list is returned for a valid document without points; the
/// caller decides whether that is an error.
///
/// # Errors
///
/// Returns [`GpxError`] if the text is not GPX or a point is malformed.
pub fn parse_gpx(text: &str) -> Result<Vec<TrackPoint>, GpxError> {
    if !text.contains("<gpx") {
        return Err(GpxError::NotGpx);
    }
    let track = read_points(text, "trkpt")?;
    if track.is_empty() {
        read_points(text, "rtept")
    } else {
        Ok(track)
    }
}

fn read_points(text: &str, element: &'static str) -> Result<Vec<TrackPoint>, GpxError> {
    let open = format!("<{element}");
    let mut points = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(&open) {
        let after = &rest[start + open.len()..];
        // `<trkpt` must not match a longer element name such as `<trkptx`.
        if !after.starts_with(|c: char| c.is_ascii_whitespace() || c == '>' || c == '/') {
            rest = after;
            continue;
        }
        let end = after
            .find('>')
            .ok_or(GpxError::UnterminatedTag { element })?;
        let attributes = parse_attributes(&after[..end]);
        let index = points.len() + 1;
        let coordinate = |attribute: &'static str, limit: f64| -> Result<f64, GpxError> {
            let raw = attributes
                .iter()
                .find(|(name, _)| *name == attribute)
                .map(|(_, value)| *value)
                .ok_or(GpxError::MissingAttribute {
                    element,
                    index,
                    attribute,
                })?;
            match raw.trim().parse::<f64>() {
                Ok(v) if v.is_finite() && v.abs() <= limit => Ok(v),
                _ => Err(GpxError::InvalidCoordinate {
                    element,
                    index,
                    attribute,
                    value: raw.to_owned(),
                }),
            }
        };
        points.push(TrackPoint::new(
            coordinate("lat", 90.0)?,
            coordinate("lon", 180.0)?,
        ));
        rest = &after[end..];
    }
    Ok(points)
}

/// `name="value"` pairs of a start tag body, in order.
///
/// Both quote styles are accepted. Anything unparseable ends the scan.
fn parse_attributes(tag: &str) -> Vec<(&str, &str)> {
    let mut attributes = Vec::new();
    let mut rest = tag.trim_start();
    while let Some(eq) = rest.find('=') {
        let name = rest[..eq].trim();
        let value_part = rest[eq + 1..].trim_start();
        let Some(quote) = value_part.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            break;
        };
        let Some(close) = value_part[1..].find(quote) else {
            break;
        };
        attributes.push((name, &value_part[1..=close]));
        rest = value_part[close + 2..].trim_start();
    }
    attributes
}

/// Escape the five XML special characters for element text.
fn xml_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn written_track_reads_back_exactly() {
        let points = vec![
            TrackPoint::new(10.123_456_789_012_3, -69.000_000_000_1),
            TrackPoint::new(-0.1, 179.999_999_999_999),
            TrackPoint::new(0.0, 0.0),
        ];
        let parsed = parse_gpx(&to_gpx(&points, "25641")).unwrap();
        assert_eq!(parsed.len(), points.len());
        for (a, b) in parsed.iter().zip(&points) {
            assert_eq!(a.latitude.to_bits(), b.latitude.to_bits());
            assert_eq!(a.longitude.to_bits(), b.longitude.to_bits());
        }
    }

    #[test]
    fn writes_one_track_segment() {
        let gpx = to_gpx(&[TrackPoint::new(10.5, -69.5)], "A & B");
        assert!(gpx.contains("<name>A &amp; B</name>"));
        assert!(gpx.contains(r#"<trkpt lat="10.5" lon="-69.5"/>"#));
        assert_eq!(gpx.matches("<trkseg>").count(), 1);
    }

    #[test]
    fn reads_editor_output() {
        let text = r#"<?xml version="1.0"?>
<gpx version="1.1" creator="OpenCPN">
  <trk><name>boundary</name><trkseg>
    <trkpt lon='-69.5' lat='10.5'><time>2011-03-01T00:00:00Z</time></trkpt>
    <trkpt
        lat="10.6"
        lon="-69.4"></trkpt>
  </trkseg></trk>
</gpx>"#;
        let points = parse_gpx(text).unwrap();
        assert_eq!(
            points,
            vec![TrackPoint::new(10.5, -69.5), TrackPoint::new(10.6, -69.4)]
        );
    }

    #[test]
    fn falls_back_to_route_points() {
        let text = r#"<gpx><rte><rtept lat="1" lon="2"/><rtept lat="3" lon="4"/></rte></gpx>"#;
        assert_eq!(
            parse_gpx(text).unwrap(),
            vec![TrackPoint::new(1.0, 2.0), TrackPoint::new(3.0, 4.0)]
        );
    }

    #[test]
    fn empty_document_has_no_points() {
        assert_eq!(parse_gpx("<gpx></gpx>").unwrap(), vec![]);
    }

    #[test]
    fn rejects_non_gpx() {
        assert_eq!(parse_gpx("<kml></kml>"), Err(GpxError::NotGpx));
    }

    #[test]
    fn reports_malformed_points() {
        let missing = r#"<gpx><trkpt lat="1"/></gpx>"#;
        assert_eq!(
            parse_gpx(missing),
            Err(GpxError::MissingAttribute {
                element: "trkpt",
                index: 1,
                attribute: "lon"
            })
        );
        let out_of_range = r#"<gpx><trkpt lat="1" lon="2"/><trkpt lat="91" lon="2"/></gpx>"#;
        assert!(matches!(
            parse_gpx(out_of_range),
            Err(GpxError::InvalidCoordinate { index: 2, attribute: "lat", .. })
        ));
        assert_eq!(
            parse_gpx("<gpx><trkpt lat=\"1\" lon=\"2\""),
            Err(GpxError::UnterminatedTag { element: "trkpt" })
        );
    }
}
