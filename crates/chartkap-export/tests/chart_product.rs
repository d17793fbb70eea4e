//! Integration test: calibrate a chart, prepare the working copy the way a
//! production run does, and serialize every text artifact.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chartkap_export::{HeaderMetadata, parse_gpx, to_bsb, to_gpx, to_kap_header};
use chartkap_pipeline::calibration::field;
use chartkap_pipeline::{ChartNumber, PolygonPoint, SurveyFields, calibrate, polygon, rotation};

fn survey() -> SurveyFields {
    SurveyFields::new()
        .with(field::TITLE, "Bahia de Samana")
        .with(field::SOUTH, 19.05)
        .with(field::NORTH, 19.3)
        .with(field::WEST, -69.7)
        .with(field::EAST, -69.2)
        .with(field::X_SW, 0)
        .with(field::Y_SW, 6000)
        .with(field::X_NW, 0)
        .with(field::Y_NW, 0)
        .with(field::X_NE, 8000)
        .with(field::Y_NE, 0)
        .with(field::X_SE, 8000)
        .with(field::Y_SE, 6000)
        .with(field::WIDTH, 6000)
        .with(field::HEIGHT, 8000)
        .with(field::PRE_ROTATE, 270)
        .with(field::SCALE, 100_000)
}

fn boundary() -> Vec<PolygonPoint> {
    [
        (19.06, -69.69),
        (19.29, -69.69),
        (19.29, -69.21),
        (19.10, -69.21),
        (19.06, -69.40),
    ]
    .iter()
    .zip(1..)
    .map(|(&(latitude, longitude), sequence)| PolygonPoint {
        sequence,
        latitude,
        longitude,
    })
    .collect()
}

#[test]
fn pre_rotated_chart_to_text_artifacts() {
    let chart = ChartNumber::parse("25723").unwrap();
    let record = calibrate(&chart, &survey(), &boundary()).expect("calibration should succeed");
    assert_eq!(record.extent.width, 8000);
    assert_eq!(record.extent.height, 6000);

    // Production works on a resized copy; the built record is kept.
    let working = rotation::resize_to_percent(&record, 50.0);
    assert_eq!(record.extent.width, 8000);

    let metadata = HeaderMetadata {
        comment: Some("DO NOT USE FOR NAVIGATION"),
        copyright: Some("Chart project release."),
        organization: Some("NGA"),
        manufacturer: Some("Chart project"),
    };
    let header = to_kap_header(&working, &metadata);
    assert!(header.contains("BSB/NA=Bahia de Samana,NU=25723,RA=4000,3000,DU=72\n"));
    assert!(header.contains("REF/3,4000,0,19.300000000,-69.200000000\n"));
    assert_eq!(header.lines().filter(|l| l.starts_with("PLY/")).count(), 5);

    let bsb = to_bsb(&working, &metadata);
    assert!(bsb.contains("K01/NA=Bahia de Samana,NU=25723,TY=BASE,FN=25723.kap\n"));

    let gpx = to_gpx(&polygon::export_to_track(&working.polygon), chart.as_str());
    let reread = polygon::import_from_track(&parse_gpx(&gpx).unwrap()).unwrap();
    assert_eq!(reread.len(), working.polygon.len());
    for (a, b) in reread.points().iter().zip(working.polygon.points()) {
        assert_eq!(a.sequence, b.sequence);
        approx::assert_abs_diff_eq!(a.latitude, b.latitude, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(a.longitude, b.longitude, epsilon = 1e-9);
    }
}
