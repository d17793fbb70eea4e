//! Text artifacts and scratch files on the local filesystem.

use std::io::ErrorKind;
use std::path::Path;

use crate::collaborators::{ArtifactStore, CollaboratorError};

/// [`ArtifactStore`] writing straight to the filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsArtifactStore;

impl ArtifactStore for FsArtifactStore {
    fn ensure_dir(&self, dir: &Path) -> Result<(), CollaboratorError> {
        std::fs::create_dir_all(dir).map_err(|source| CollaboratorError::io(dir, source))
    }

    fn write_text(&self, path: &Path, contents: &str) -> Result<(), CollaboratorError> {
        std::fs::write(path, contents).map_err(|source| CollaboratorError::io(path, source))
    }

    fn remove(&self, path: &Path) -> Result<(), CollaboratorError> {
        match std::fs::remove_file(path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(CollaboratorError::io(path, e)),
            _ => Ok(()),
        }
    }
}
