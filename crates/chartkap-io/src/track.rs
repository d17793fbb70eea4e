//! GPX track files on disk.

use std::path::Path;

use chartkap_pipeline::TrackPoint;

use crate::collaborators::{CollaboratorError, TrackFile};

/// [`TrackFile`] reading and writing GPX documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct GpxTrackFile;

impl TrackFile for GpxTrackFile {
    fn read_track(&self, path: &Path) -> Result<Vec<TrackPoint>, CollaboratorError> {
        let text =
            std::fs::read_to_string(path).map_err(|source| CollaboratorError::io(path, source))?;
        chartkap_export::parse_gpx(&text).map_err(|source| CollaboratorError::Gpx {
            path: path.to_path_buf(),
            source,
        })
    }

    fn write_track(
        &self,
        path: &Path,
        points: &[TrackPoint],
        name: &str,
    ) -> Result<(), CollaboratorError> {
        std::fs::write(path, chartkap_export::to_gpx(points, name))
            .map_err(|source| CollaboratorError::io(path, source))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn track_survives_the_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("25641.gpx");
        let points = vec![
            TrackPoint::new(10.000_000_001, -69.5),
            TrackPoint::new(10.9, -69.1),
        ];
        GpxTrackFile.write_track(&path, &points, "25641").unwrap();
        assert_eq!(GpxTrackFile.read_track(&path).unwrap(), points);
    }

    #[test]
    fn garbage_is_a_gpx_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.gpx");
        std::fs::write(&path, "just some text").unwrap();
        assert!(matches!(
            GpxTrackFile.read_track(&path),
            Err(CollaboratorError::Gpx { .. })
        ));
        assert!(matches!(
            GpxTrackFile.read_track(&dir.path().join("missing.gpx")),
            Err(CollaboratorError::Io { .. })
        ));
    }
}
