//! chartkap-io: Persistence, external tools and the production orchestrator.
//!
//! Everything that touches the outside world lives here: the SQLite
//! chart repository, ImageMagick and `imgkap` invocations, GPX track
//! files, product files, the batch run lock and the configuration file.
//! [`PipelineOrchestrator`] ties them to the sans-IO
//! `chartkap-pipeline` crate through the traits in [`collaborators`].

pub mod artifacts;
pub mod collaborators;
pub mod config;
pub mod lock;
pub mod magick;
pub mod orchestrator;
pub mod repository;
pub mod track;

pub use artifacts::FsArtifactStore;
pub use collaborators::{
    ArtifactStore, ChartEncoder, Clock, CollaboratorError, RasterTransformer, SystemClock,
    TrackFile,
};
pub use config::{ChartkapConfig, ConfigError};
pub use lock::{LockError, RunLock};
pub use magick::{ImageMagick, Imgkap};
pub use orchestrator::{
    BaseProduct, BatchSummary, BoundaryImport, Collaborators, InsetOutcome, OrchestratorError,
    PipelineOrchestrator,
};
pub use repository::{ChartRepository, RepositoryError, SqliteRepository};
pub use track::GpxTrackFile;
