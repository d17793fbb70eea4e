//! Run configuration.
//!
//! Loaded once from a JSON file and handed to the orchestrator. Every
//! field has a default, so an empty object (or no file at all) is a
//! valid configuration.
//!
//! Path templates may contain these placeholders:
//!
//! | Placeholder       | Replaced with                       |
//! |-------------------|-------------------------------------|
//! | `{CHART_NUMBER}`  | the chart number                    |
//! | `{INSET}`         | the inset id, empty for the chart   |
//! | `{CORNER}`        | `sw`, `nw`, `ne` or `se`            |
//! | `{ZOOM_LEVEL}`    | thumbnail zoom level                |

use std::path::{Path, PathBuf};

use chartkap_export::HeaderMetadata;
use chartkap_pipeline::{ChartNumber, Corner, PreRotation};
use serde::{Deserialize, Serialize};

/// Errors from loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config {}: {source}", path.display())]
    Read {
        /// The config file path.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid configuration JSON.
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        /// The config file path.
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Complete configuration of a chartkap run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartkapConfig {
    /// Where images and products live.
    pub paths: PathTemplates,
    /// Raster production settings.
    pub production: ProductionSettings,
    /// Publisher text for KAP and BSB headers.
    pub header: HeaderSettings,
    /// External programs.
    pub tools: ToolSettings,
    /// SQLite database file.
    pub database: PathBuf,
    /// Lock file guarding batch runs.
    pub lock_path: PathBuf,
}

impl Default for ChartkapConfig {
    fn default() -> Self {
        Self {
            paths: PathTemplates::default(),
            production: ProductionSettings::default(),
            header: HeaderSettings::default(),
            tools: ToolSettings::default(),
            database: PathBuf::from("chartkap.sqlite"),
            lock_path: PathBuf::from("chartkap.lock"),
        }
    }
}

impl ChartkapConfig {
    /// Load configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read and
    /// [`ConfigError::Parse`] if it is not valid configuration JSON.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// File path templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathTemplates {
    /// Scanned chart image as delivered.
    pub source_image: String,
    /// The scan after its 90/180/270 degree pre-rotation.
    pub preprocessed_image: String,
    /// Preview thumbnails.
    pub thumbnail: String,
    /// Corner cut-outs of charts and insets.
    pub corner: String,
    /// Cropped inset images.
    pub inset: String,
    /// Directory receiving the KAP, BSB, PNG and GPX products.
    pub output_dir: String,
}

impl Default for PathTemplates {
    fn default() -> Self {
        Self {
            source_image: "charts/{CHART_NUMBER}.jpg".to_owned(),
            preprocessed_image: "charts/{CHART_NUMBER}_rotated.jpg".to_owned(),
            thumbnail: "thumbnails/{CHART_NUMBER}_zl{ZOOM_LEVEL}.jpg".to_owned(),
            corner: "corners/{CHART_NUMBER}{INSET}_{CORNER}.png".to_owned(),
            inset: "insets/{CHART_NUMBER}_{INSET}.jpg".to_owned(),
            output_dir: "output/{CHART_NUMBER}".to_owned(),
        }
    }
}

/// Replace each `(placeholder, value)` pair in `template`.
fn fill(template: &str, values: &[(&str, &str)]) -> PathBuf {
    let filled = values
        .iter()
        .fold(template.to_owned(), |acc, (placeholder, value)| {
            acc.replace(placeholder, value)
        });
    PathBuf::from(filled)
}

impl PathTemplates {
    /// The scan as delivered.
    #[must_use]
    pub fn source_image(&self, chart: &ChartNumber) -> PathBuf {
        fill(&self.source_image, &[("{CHART_NUMBER}", chart.as_str())])
    }

    /// The pre-rotated scan.
    #[must_use]
    pub fn preprocessed_image(&self, chart: &ChartNumber) -> PathBuf {
        fill(&self.preprocessed_image, &[("{CHART_NUMBER}", chart.as_str())])
    }

    /// The north-up image every later step reads: the pre-rotated scan
    /// when the chart needs pre-rotation, the original scan otherwise.
    #[must_use]
    pub fn chart_image(&self, chart: &ChartNumber, pre_rotation: PreRotation) -> PathBuf {
        if pre_rotation.is_rotated() {
            self.preprocessed_image(chart)
        } else {
            self.source_image(chart)
        }
    }

    /// Thumbnail at `zoom_level`.
    #[must_use]
    pub fn thumbnail(&self, chart: &ChartNumber, zoom_level: u8) -> PathBuf {
        fill(
            &self.thumbnail,
            &[
                ("{CHART_NUMBER}", chart.as_str()),
                ("{ZOOM_LEVEL}", &zoom_level.to_string()),
            ],
        )
    }

    /// Corner cut-out of the chart (`inset == None`) or of an inset.
    #[must_use]
    pub fn corner(&self, chart: &ChartNumber, inset: Option<&str>, corner: Corner) -> PathBuf {
        fill(
            &self.corner,
            &[
                ("{CHART_NUMBER}", chart.as_str()),
                ("{INSET}", inset.unwrap_or_default()),
                ("{CORNER}", corner.as_str()),
            ],
        )
    }

    /// Cropped image of `inset`.
    #[must_use]
    pub fn inset(&self, chart: &ChartNumber, inset: &str) -> PathBuf {
        fill(
            &self.inset,
            &[("{CHART_NUMBER}", chart.as_str()), ("{INSET}", inset)],
        )
    }

    /// Product directory of the chart.
    #[must_use]
    pub fn output_dir(&self, chart: &ChartNumber) -> PathBuf {
        fill(&self.output_dir, &[("{CHART_NUMBER}", chart.as_str())])
    }
}

/// A preview thumbnail size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thumbnail {
    /// Zoom level substituted into `{ZOOM_LEVEL}`.
    pub zoom_level: u8,
    /// Reduction as a percentage of the full image.
    pub percent: f64,
}

/// Raster production settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductionSettings {
    /// Scale of the produced chart relative to the scan, in percent.
    pub size_percent: f64,
    /// Correct skew by rotating the raster before cropping.
    pub autorotate: bool,
    /// Smallest skew, in degrees, that triggers auto-rotation.
    pub skew_threshold_degrees: f64,
    /// Palette size of produced PNGs and corner cut-outs.
    pub palette_colors: u32,
    /// Thumbnails made while preprocessing.
    pub thumbnails: Vec<Thumbnail>,
}

impl Default for ProductionSettings {
    fn default() -> Self {
        Self {
            size_percent: 100.0,
            autorotate: false,
            skew_threshold_degrees: 0.2,
            palette_colors: 32,
            thumbnails: vec![
                Thumbnail {
                    zoom_level: 0,
                    percent: 0.8,
                },
                Thumbnail {
                    zoom_level: 2,
                    percent: 3.0,
                },
            ],
        }
    }
}

/// Publisher text written into KAP and BSB headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderSettings {
    /// Comment block written ahead of the header, one `!` line per line.
    pub comment: Option<String>,
    /// Copyright notice (`CRR`).
    pub copyright: Option<String>,
    /// Producing organisation (`ORG`).
    pub organization: Option<String>,
    /// Manufacturer (`MFR`).
    pub manufacturer: Option<String>,
}

impl Default for HeaderSettings {
    fn default() -> Self {
        Self {
            comment: Some(
                "DO NOT USE FOR NAVIGATION\n\
                 Use official, full scale nautical charts for real-world navigation."
                    .to_owned(),
            ),
            copyright: None,
            organization: None,
            manufacturer: None,
        }
    }
}

impl HeaderSettings {
    /// Borrowed view for the serializers.
    #[must_use]
    pub fn metadata(&self) -> HeaderMetadata<'_> {
        HeaderMetadata {
            comment: self.comment.as_deref(),
            copyright: self.copyright.as_deref(),
            organization: self.organization.as_deref(),
            manufacturer: self.manufacturer.as_deref(),
        }
    }
}

/// External program names or paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    /// ImageMagick `convert` (or `magick`).
    pub convert: String,
    /// `imgkap`.
    pub imgkap: String,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            convert: "convert".to_owned(),
            imgkap: "imgkap".to_owned(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn chart() -> ChartNumber {
        ChartNumber::parse("25641").unwrap()
    }

    #[test]
    fn empty_object_is_default() {
        let config: ChartkapConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ChartkapConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: ChartkapConfig = serde_json::from_str(
            r#"{"production": {"autorotate": true}, "paths": {"output_dir": "/srv/kap/{CHART_NUMBER}"}}"#,
        )
        .unwrap();
        assert!(config.production.autorotate);
        assert_eq!(config.production.palette_colors, 32);
        assert_eq!(config.production.thumbnails.len(), 2);
        assert_eq!(
            config.paths.output_dir(&chart()),
            PathBuf::from("/srv/kap/25641")
        );
        assert_eq!(config.paths.inset, PathTemplates::default().inset);
    }

    #[test]
    fn templates_are_filled() {
        let paths = PathTemplates::default();
        assert_eq!(
            paths.corner(&chart(), None, Corner::Sw),
            PathBuf::from("corners/25641_sw.png")
        );
        assert_eq!(
            paths.corner(&chart(), Some("B"), Corner::Ne),
            PathBuf::from("corners/25641B_ne.png")
        );
        assert_eq!(
            paths.thumbnail(&chart(), 2),
            PathBuf::from("thumbnails/25641_zl2.jpg")
        );
        assert_eq!(
            paths.inset(&chart(), "B"),
            PathBuf::from("insets/25641_B.jpg")
        );
    }

    #[test]
    fn chart_image_follows_pre_rotation() {
        let paths = PathTemplates::default();
        assert_eq!(
            paths.chart_image(&chart(), PreRotation::None),
            paths.source_image(&chart())
        );
        assert_eq!(
            paths.chart_image(&chart(), PreRotation::Half),
            paths.preprocessed_image(&chart())
        );
    }

    #[test]
    fn load_reports_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            ChartkapConfig::load(&missing),
            Err(ConfigError::Read { .. })
        ));
        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();
        assert!(matches!(
            ChartkapConfig::load(&broken),
            Err(ConfigError::Parse { .. })
        ));
        let good = dir.path().join("good.json");
        std::fs::write(&good, r#"{"database": "/var/lib/charts.sqlite"}"#).unwrap();
        assert_eq!(
            ChartkapConfig::load(&good).unwrap().database,
            PathBuf::from("/var/lib/charts.sqlite")
        );
    }

    #[test]
    fn header_metadata_borrows_settings() {
        let header = HeaderSettings {
            organization: Some("NGA".to_owned()),
            ..HeaderSettings::default()
        };
        let metadata = header.metadata();
        assert_eq!(metadata.organization, Some("NGA"));
        assert!(metadata.comment.unwrap().starts_with("DO NOT USE"));
    }
}
