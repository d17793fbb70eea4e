//! BSB catalog text serializer.
//!
//! A `.bsb` file describes a chart and lists its KAP panels. chartkap
//! produces one base panel per chart, so the catalog always lists exactly
//! one `K01` entry pointing at `{number}.kap`.

use std::fmt::Write;

use chartkap_pipeline::CalibrationRecord;

use crate::kap::{FORMAT_VERSION, HeaderMetadata, UNKNOWN, write_comment};

/// Serialize the BSB catalog of a chart with a single base panel.
#[must_use]
pub fn to_bsb(record: &CalibrationRecord, metadata: &HeaderMetadata<'_>) -> String {
    let mut out = String::new();
    let info = &record.info;
    let number = &record.chart;

    write_comment(&mut out, metadata.comment);
    let _ = writeln!(out, "VER/{FORMAT_VERSION}");
    if let Some(copyright) = metadata.copyright {
        let _ = writeln!(out, "CRR/{copyright}");
    }
    let _ = writeln!(out, "CHT/NA={},NU={number}", info.title);
    if let Some(format) = &info.chart_format {
        let _ = writeln!(out, "CHF/{format}");
    }
    if let Some(organization) = metadata.organization {
        let _ = writeln!(out, "ORG/{organization}");
    }
    if let Some(manufacturer) = metadata.manufacturer {
        let _ = writeln!(out, "MFR/{manufacturer}");
    }
    let _ = writeln!(out, "CGD/0");
    let _ = writeln!(
        out,
        "CED/SE={},RE=1,ED=1",
        info.edition_date.as_deref().unwrap_or(UNKNOWN)
    );
    let _ = writeln!(
        out,
        "NTM/NE={},ND={},BF={UNKNOWN},BD={UNKNOWN}",
        info.edition.as_deref().unwrap_or(UNKNOWN),
        info.correction.as_deref().unwrap_or(UNKNOWN)
    );
    let _ = writeln!(out, "CHK/1,{number}");
    let _ = writeln!(
        out,
        "K01/NA={},NU={number},TY={},FN={number}.kap",
        info.title, info.kap_type
    );
    out
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
            .with(field::Y_SE, 1000);
        calibrate(&ChartNumber::parse("4102").unwrap(), &fields, &[]).unwrap()
    }

    #[test]
    fn catalog_lists_the_base_panel() {
        let fields = SurveyFields::new()
            .with(field::TITLE, "Harbor Entrance")
            .with(field::CHART_FORMAT, "Harbor")
            .with(field::EDITION, "7")
            .with(field::CORRECTION, "2010-01-15");
        let bsb = to_bsb(&record(fields), &HeaderMetadata::default());
        let lines: Vec<&str> = bsb.lines().collect();
        assert_eq!(
            lines,
            vec![
                "VER/2.0",
                "CHT/NA=Harbor Entrance,NU=4102",
                "CHF/Harbor",
                "CGD/0",
                "CED/SE=UNKNOWN,RE=1,ED=1",
                "NTM/NE=7,ND=2010-01-15,BF=UNKNOWN,BD=UNKNOWN",
                "CHK/1,4102",
                "K01/NA=Harbor Entrance,NU=4102,TY=BASE,FN=4102.kap",
            ]
        );
    }

    #[test]
    fn publisher_lines() {
        let metadata = HeaderMetadata {
            comment: Some("DO NOT USE FOR NAVIGATION"),
            copyright: Some("Chart project release."),
            organization: Some("NGA"),
            manufacturer: Some("Chart project"),
        };
        let bsb = to_bsb(&record(SurveyFields::new()), &metadata);
        assert!(bsb.starts_with("!DO NOT USE FOR NAVIGATION\nVER/2.0\nCRR/Chart project release.\n"));
        assert!(bsb.contains("\nORG/NGA\nMFR/Chart project\n"));
    }
}
