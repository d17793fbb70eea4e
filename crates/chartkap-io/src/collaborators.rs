//! Interfaces to the outside world used by the orchestrator.
//!
//! Each trait is one seam: raster work, KAP encoding, GPX track files,
//! plain text artifacts and the wall clock. Production implementations
//! live in [`magick`](crate::magick), [`track`](crate::track) and
//! [`artifacts`](crate::artifacts); tests substitute recording fakes.
//!
//! All calls are synchronous and take file paths. A call returning
//! `Ok` means the output file is complete.

use std::path::{Path, PathBuf};

use chartkap_export::GpxError;
use chartkap_pipeline::{Extent, PixelRect, TrackPoint};
use chrono::{DateTime, Utc};

/// Failures of an external tool, the filesystem or an image probe.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    /// The tool could not be started at all.
    #[error("failed to run `{tool}`: {source}")]
    Spawn {
        /// Program name.
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool ran but reported failure.
    #[error("`{tool}` exited with {status}: {stderr}")]
    ToolFailed {
        /// Program name.
        tool: String,
        /// Exit status as reported by the OS.
        status: String,
        /// Captured standard error, trimmed.
        stderr: String,
    },

    /// An image could not be probed.
    #[error("cannot read image {}: {source}", path.display())]
    Image {
        /// The image path.
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Reading or writing a file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// The file or directory path.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A track file is not usable GPX.
    #[error("invalid GPX in {}: {source}", path.display())]
    Gpx {
        /// The track file path.
        path: PathBuf,
        #[source]
        source: GpxError,
    },
}

impl CollaboratorError {
    /// Wrap an I/O error with the path it concerns.
    #[must_use]
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Raster transformations delegated to an external tool.
///
/// `source` and `target` may be the same path.
pub trait RasterTransformer {
    /// Rotate clockwise by `degrees`, growing the canvas to fit.
    fn rotate(&self, source: &Path, target: &Path, degrees: f64) -> Result<(), CollaboratorError>;

    /// Cut out `rect`.
    fn crop(&self, source: &Path, target: &Path, rect: PixelRect) -> Result<(), CollaboratorError>;

    /// Scale both axes to `percent` of their size.
    fn resize_percent(
        &self,
        source: &Path,
        target: &Path,
        percent: f64,
    ) -> Result<(), CollaboratorError>;

    /// Reduce to a `colors`-entry palette and write an 8-bit palette PNG.
    fn quantize_and_export(
        &self,
        source: &Path,
        target: &Path,
        colors: u32,
    ) -> Result<(), CollaboratorError>;

    /// Pixel size of an image on disk.
    fn dimensions(&self, path: &Path) -> Result<Extent, CollaboratorError>;
}

/// Builds a KAP file from header text and a palette image.
pub trait ChartEncoder {
    /// Encode `image` with `header` into `output`.
    fn encode(&self, header: &str, image: &Path, output: &Path) -> Result<(), CollaboratorError>;
}

/// Reads and writes boundary tracks.
pub trait TrackFile {
    /// Ordered points of the track in `path`.
    fn read_track(&self, path: &Path) -> Result<Vec<TrackPoint>, CollaboratorError>;

    /// Write `points` as a track named `name`.
    fn write_track(
        &self,
        path: &Path,
        points: &[TrackPoint],
        name: &str,
    ) -> Result<(), CollaboratorError>;
}

/// Plain file output for text artifacts and scratch files.
pub trait ArtifactStore {
    /// Create `dir` and its parents if missing.
    fn ensure_dir(&self, dir: &Path) -> Result<(), CollaboratorError>;

    /// Write `contents` to `path`, replacing any previous file.
    fn write_text(&self, path: &Path, contents: &str) -> Result<(), CollaboratorError>;

    /// Delete `path` if it exists.
    fn remove(&self, path: &Path) -> Result<(), CollaboratorError>;
}

/// Source of completion timestamps.
pub trait Clock {
    /// The current time.
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
