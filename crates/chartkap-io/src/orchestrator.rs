//! Production workflows over the collaborators.
//!
//! [`PipelineOrchestrator`] combines the sans-IO pipeline with a
//! [`Collaborators`] set and drives the chart lifecycles:
//!
//! 1. [`produce_base`](PipelineOrchestrator::produce_base): calibrate,
//!    correct skew, resize, crop, quantize, encode, mark produced.
//! 2. [`crop_insets`](PipelineOrchestrator::crop_insets): cut pending
//!    insets and their corners out of the chart image.
//! 3. [`preprocess`](PipelineOrchestrator::preprocess): pre-rotate the
//!    scan, make thumbnails and corner cut-outs.
//! 4. [`import_boundary`](PipelineOrchestrator::import_boundary): replace
//!    the boundary polygon from a track file.
//!
//! Completion markers are written only after every artifact of a step
//! exists, so an interrupted run leaves the chart pending and the next
//! [`run_batch`](PipelineOrchestrator::run_batch) picks it up again.

use std::fmt;
use std::path::{Path, PathBuf};

use chartkap_export::{to_bsb, to_kap_header};
use chartkap_pipeline::{
    CalibrationError, CalibrationRecord, ChartNumber, ChartState, ChartStatus, CropError, Extent,
    InsetState, PolygonError, crop, polygon, rotation,
};

use crate::collaborators::{
    ArtifactStore, ChartEncoder, Clock, CollaboratorError, RasterTransformer, TrackFile,
};
use crate::config::ChartkapConfig;
use crate::repository::{ChartRepository, RepositoryError};

/// Errors from an orchestrated operation.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    #[error(transparent)]
    Crop(#[from] CropError),

    #[error(transparent)]
    Polygon(#[from] PolygonError),

    /// The chart is not in the repository.
    #[error("chart {0} not found")]
    ChartNotFound(ChartNumber),

    #[error(transparent)]
    Repository(RepositoryError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

impl From<RepositoryError> for OrchestratorError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound(chart) => Self::ChartNotFound(chart),
            other => Self::Repository(other),
        }
    }
}

impl OrchestratorError {
    /// Whether the error concerns one chart or inset only.
    ///
    /// Batch runs log per-item errors and continue; any other error
    /// aborts the batch.
    #[must_use]
    pub const fn is_per_item(&self) -> bool {
        matches!(
            self,
            Self::Calibration(_) | Self::Crop(_) | Self::Polygon(_) | Self::ChartNotFound(_)
        )
    }
}

/// External services used by the orchestrator.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    /// Survey data, annotations and markers.
    pub repository: &'a dyn ChartRepository,
    /// Image operations.
    pub raster: &'a dyn RasterTransformer,
    /// KAP encoding.
    pub encoder: &'a dyn ChartEncoder,
    /// GPX reading and writing.
    pub tracks: &'a dyn TrackFile,
    /// Text products, directories and scratch files.
    pub artifacts: &'a dyn ArtifactStore,
    /// Timestamps for completion markers.
    pub clock: &'a dyn Clock,
}

/// Files written for a produced chart.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseProduct {
    /// The encoded chart.
    pub kap: PathBuf,
    /// The catalog text next to it.
    pub bsb: PathBuf,
    /// The exported boundary track.
    pub gpx: PathBuf,
    /// Extent of the produced raster.
    pub extent: Extent,
    /// Skew correction applied, if any.
    pub rotated_by: Option<f64>,
}

/// Outcome of cropping one chart's insets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsetOutcome {
    /// Insets cropped in this call.
    pub cropped: Vec<String>,
    /// Insets left uncropped because their annotations are unusable.
    pub skipped: Vec<(String, CropError)>,
}

/// Outcome of a boundary import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryImport {
    /// Number of points stored.
    pub points: usize,
    /// Chart status after the import.
    pub status: ChartStatus,
}

/// Per-item results of [`PipelineOrchestrator::run_batch`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Charts produced.
    pub produced: Vec<ChartNumber>,
    /// Charts or insets that failed, with the reason.
    pub failed: Vec<(ChartNumber, String)>,
    /// Insets cropped.
    pub insets_cropped: usize,
    /// Insets skipped because of invalid crop boxes.
    pub insets_skipped: usize,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} charts produced, {} failed, {} insets cropped, {} insets skipped",
            self.produced.len(),
            self.failed.len(),
            self.insets_cropped,
            self.insets_skipped
        )
    }
}

/// Drives chart production with an explicit configuration and collaborator set.
pub struct PipelineOrchestrator<'a> {
    config: &'a ChartkapConfig,
    collaborators: Collaborators<'a>,
}

impl<'a> PipelineOrchestrator<'a> {
    #[must_use]
    pub const fn new(config: &'a ChartkapConfig, collaborators: Collaborators<'a>) -> Self {
        Self {
            config,
            collaborators,
        }
    }

    /// Build the chart's calibration from stored survey data and boundary points.
    ///
    /// The outer result carries repository failures, the inner one
    /// whether the survey data is complete.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be read or the chart
    /// does not exist.
    pub fn calibration(
        &self,
        chart: &ChartNumber,
    ) -> Result<Result<CalibrationRecord, CalibrationError>, OrchestratorError> {
        let repository = self.collaborators.repository;
        let fields = repository.fetch_survey_fields(chart)?;
        let boundary = repository.fetch_boundary_points(chart)?;
        Ok(chartkap_pipeline::calibrate(chart, &fields, &boundary))
    }

    /// The chart's production state.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be read or the chart
    /// does not exist.
    pub fn chart_state(&self, chart: &ChartNumber) -> Result<ChartState, OrchestratorError> {
        let calibration = self.calibration(chart)?;
        let generated_at = self.collaborators.repository.fetch_generated_at(chart)?;
        Ok(ChartState::from_markers(&calibration, generated_at))
    }

    /// Produce the chart's KAP, BSB, palette PNG and boundary track, then
    /// mark it produced.
    ///
    /// The stored calibration is never changed; skew correction and
    /// resizing act on a working copy.
    ///
    /// # Errors
    ///
    /// Returns an error if calibration fails, the repository fails or
    /// any collaborator fails. The chart is left unmarked in every case.
    pub fn produce_base(&self, chart: &ChartNumber) -> Result<BaseProduct, OrchestratorError> {
        let record = self.calibration(chart)??;
        self.produce_record(&record)
    }

    fn produce_record(&self, record: &CalibrationRecord) -> Result<BaseProduct, OrchestratorError> {
        let Collaborators {
            repository,
            encoder,
            tracks,
            artifacts,
            clock,
            ..
        } = self.collaborators;
        let production = &self.config.production;
        let chart = &record.chart;

        // 1. Decide on skew correction.
        let skew = rotation::suggest(record);
        let rotated_by = (production.autorotate
            && rotation::should_auto_rotate(skew, production.skew_threshold_degrees))
        .then_some(skew);
        match rotated_by {
            Some(angle) => log::info!("chart {chart}: correcting skew of {angle:.3} degrees"),
            None => log::info!("chart {chart}: skew {skew:.3} degrees, not rotating"),
        }

        // 2. Working copy in output raster space.
        let rotated = rotated_by.map_or_else(|| record.clone(), |angle| rotation::apply(record, angle));
        let working = rotation::resize_to_percent(&rotated, production.size_percent);

        // 3. Raster: resize, rotate, crop to the working extent, quantize.
        let out_dir = self.config.paths.output_dir(chart);
        artifacts.ensure_dir(&out_dir)?;
        let source = self.config.paths.chart_image(chart, record.pre_rotation);
        let work = out_dir.join(format!("{chart}.work.png"));
        let png = out_dir.join(format!("{chart}.png"));
        let rendered = self.render(&source, &work, &png, rotated_by, working.extent);
        let cleaned = artifacts.remove(&work);
        rendered?;
        cleaned?;

        // 4. Text products and encoding.
        let metadata = self.config.header.metadata();
        let bsb = out_dir.join(format!("{chart}.bsb"));
        artifacts.write_text(&bsb, &to_bsb(&working, &metadata))?;
        let kap = out_dir.join(format!("{chart}.kap"));
        encoder.encode(&to_kap_header(&working, &metadata), &png, &kap)?;

        // 5. Boundary track.
        let gpx = out_dir.join(format!("{chart}.gpx"));
        tracks.write_track(
            &gpx,
            &polygon::export_to_track(&working.polygon),
            chart.as_str(),
        )?;

        repository.mark_produced(chart, clock.now())?;
        log::info!("chart {chart}: produced {} at {}", kap.display(), working.extent);

        Ok(BaseProduct {
            kap,
            bsb,
            gpx,
            extent: working.extent,
            rotated_by,
        })
    }

    /// Raster chain into `png`, through the scratch file `work`.
    fn render(
        &self,
        source: &Path,
        work: &Path,
        png: &Path,
        rotated_by: Option<f64>,
        extent: Extent,
    ) -> Result<(), CollaboratorError> {
        let raster = self.collaborators.raster;
        let production = &self.config.production;
        raster.resize_percent(source, work, production.size_percent)?;
        if let Some(angle) = rotated_by {
            raster.rotate(work, work, angle)?;
        }
        raster.crop(work, work, crop::full_extent_box(extent))?;
        raster.quantize_and_export(work, png, production.palette_colors)
    }

    /// Crop every pending inset of the chart along with its corner cut-outs.
    ///
    /// Insets without usable `CROP` annotations are ignored. Insets whose
    /// annotations do not form a valid box are skipped and stay pending.
    ///
    /// # Errors
    ///
    /// Returns an error if the chart cannot be calibrated, or if the
    /// repository or a collaborator fails.
    pub fn crop_insets(&self, chart: &ChartNumber) -> Result<InsetOutcome, OrchestratorError> {
        let Collaborators {
            repository,
            raster,
            clock,
            ..
        } = self.collaborators;
        let record = self.calibration(chart)??;
        let image = self.config.paths.chart_image(chart, record.pre_rotation);
        let mut outcome = InsetOutcome::default();
        let mut actual: Option<Extent> = None;

        for inset in repository.fetch_insets(chart)? {
            let id = inset.inset_id;
            if !InsetState::from_marker(inset.cropped_at).is_pending() {
                log::debug!("chart {chart}: inset {id} already cropped");
                continue;
            }
            let Some(points) = repository.fetch_inset_crop_points(chart, &id)? else {
                log::debug!("chart {chart}: inset {id} has no usable crop annotations");
                continue;
            };
            let rect = match crop::inset_box(points.min_x, points.max_x, points.min_y, points.max_y)
            {
                Ok(rect) => rect,
                Err(e) => {
                    log::warn!("chart {chart}: skipping inset {id}: {e}");
                    outcome.skipped.push((id, e));
                    continue;
                }
            };

            let extent = match actual {
                Some(extent) => extent,
                None => *actual.insert(raster.dimensions(&image)?),
            };
            if !rect.fits_within(extent) {
                log::warn!(
                    "chart {chart}: inset {id} box {rect} overruns the {extent} image {}",
                    image.display()
                );
            }

            let target = self.config.paths.inset(chart, &id);
            self.ensure_parent(&target)?;
            raster.crop(&image, &target, rect)?;
            self.cut_corners(chart, Some(&id), &target, rect.extent(), record.corner_size)?;
            repository.mark_cropped(chart, &id, clock.now())?;
            log::info!("chart {chart}: cropped inset {id} ({rect})");
            outcome.cropped.push(id);
        }
        Ok(outcome)
    }

    /// Pre-rotate the scan if needed, then make thumbnails and corner cut-outs.
    ///
    /// Only the pre-rotation and corner size are read from the survey
    /// data, so this works before the chart can be calibrated.
    ///
    /// # Errors
    ///
    /// Returns an error if those two fields are unusable, or if the
    /// repository or a collaborator fails.
    pub fn preprocess(&self, chart: &ChartNumber) -> Result<Vec<PathBuf>, OrchestratorError> {
        let raster = self.collaborators.raster;
        let fields = self.collaborators.repository.fetch_survey_fields(chart)?;
        let pre_rotation = fields.pre_rotation()?;
        let paths = &self.config.paths;
        let mut written = Vec::new();

        if pre_rotation.is_rotated() {
            let rotated = paths.preprocessed_image(chart);
            self.ensure_parent(&rotated)?;
            raster.rotate(
                &paths.source_image(chart),
                &rotated,
                f64::from(pre_rotation.degrees()),
            )?;
            log::info!("chart {chart}: pre-rotated by {} degrees", pre_rotation.degrees());
            written.push(rotated);
        }

        let image = paths.chart_image(chart, pre_rotation);
        for thumbnail in &self.config.production.thumbnails {
            let target = paths.thumbnail(chart, thumbnail.zoom_level);
            self.ensure_parent(&target)?;
            raster.resize_percent(&image, &target, thumbnail.percent)?;
            written.push(target);
        }

        written.extend(self.generate_corners(chart)?);
        Ok(written)
    }

    /// Cut the four corners out of the north-up chart image.
    ///
    /// Boxes are computed on the image's real dimensions.
    ///
    /// # Errors
    ///
    /// Returns an error if the pre-rotation or corner size fields are
    /// unusable, or if the repository or a collaborator fails.
    pub fn generate_corners(&self, chart: &ChartNumber) -> Result<Vec<PathBuf>, OrchestratorError> {
        let fields = self.collaborators.repository.fetch_survey_fields(chart)?;
        let pre_rotation = fields.pre_rotation()?;
        let corner_size = fields.corner_size()?;
        let image = self.config.paths.chart_image(chart, pre_rotation);
        let extent = self.collaborators.raster.dimensions(&image)?;
        log::debug!("chart {chart}: {} is {extent}", image.display());
        self.cut_corners(chart, None, &image, extent, corner_size)
    }

    /// Replace the chart's boundary polygon with the track in `track_path`.
    ///
    /// The chart is marked for re-production and its status promoted
    /// where applicable.
    ///
    /// # Errors
    ///
    /// Returns [`PolygonError::EmptyTrack`] for an empty track, and an
    /// error if the chart does not exist or a collaborator fails.
    pub fn import_boundary(
        &self,
        chart: &ChartNumber,
        track_path: &Path,
    ) -> Result<BoundaryImport, OrchestratorError> {
        let repository = self.collaborators.repository;
        let track = self.collaborators.tracks.read_track(track_path)?;
        let imported = polygon::import_from_track(&track)?;
        let status = repository.chart_status(chart)?;

        let promoted = status.after_boundary_import();
        repository.import_boundary_points(chart, imported.points(), promoted)?;
        log::info!(
            "chart {chart}: imported {} boundary points from {}, status {promoted}",
            imported.len(),
            track_path.display()
        );

        match self.calibration(chart)? {
            Ok(record) => log::debug!(
                "chart {chart}: boundary now {:?} with {} points",
                record.polygon.origin(),
                record.polygon.len()
            ),
            Err(e) => log::info!("chart {chart}: not yet calibratable: {e}"),
        }

        Ok(BoundaryImport {
            points: imported.len(),
            status: promoted,
        })
    }

    /// Produce every pending chart, then crop every pending inset.
    ///
    /// Items already bearing their completion marker are skipped.
    /// Per-item errors are logged and collected in the summary.
    ///
    /// # Errors
    ///
    /// Returns the first infrastructure error (repository or external
    /// tool failure); remaining items are not attempted.
    pub fn run_batch(&self) -> Result<BatchSummary, OrchestratorError> {
        let repository = self.collaborators.repository;
        let mut summary = BatchSummary::default();

        let pending = repository.fetch_pending_base()?;
        log::info!("{} charts pending production", pending.len());
        for chart in pending {
            let result = self.produce_pending(&chart);
            if matches!(result, Ok(None)) {
                continue;
            }
            if record_outcome(&chart, result, &mut summary.failed)? {
                summary.produced.push(chart);
            }
        }

        let mut charts: Vec<ChartNumber> = repository
            .fetch_pending_insets()?
            .into_iter()
            .map(|(chart, _)| chart)
            .collect();
        charts.dedup();
        log::info!("{} charts with pending insets", charts.len());
        for chart in charts {
            let result = self.crop_insets(&chart);
            if let Ok(outcome) = &result {
                summary.insets_cropped += outcome.cropped.len();
                summary.insets_skipped += outcome.skipped.len();
            }
            record_outcome(&chart, result, &mut summary.failed)?;
        }

        log::info!("batch finished: {summary}");
        Ok(summary)
    }

    /// Produce `chart` unless it already carries its marker.
    fn produce_pending(
        &self,
        chart: &ChartNumber,
    ) -> Result<Option<BaseProduct>, OrchestratorError> {
        let calibration = self.calibration(chart)?;
        let generated_at = self.collaborators.repository.fetch_generated_at(chart)?;
        match ChartState::from_markers(&calibration, generated_at) {
            ChartState::Produced(at) => {
                log::info!("chart {chart}: already produced at {at}");
                Ok(None)
            }
            ChartState::AwaitingCalibration | ChartState::Calibrated => {
                self.produce_record(&calibration?).map(Some)
            }
        }
    }

    fn cut_corners(
        &self,
        chart: &ChartNumber,
        inset: Option<&str>,
        image: &Path,
        extent: Extent,
        corner_size: u32,
    ) -> Result<Vec<PathBuf>, OrchestratorError> {
        let raster = self.collaborators.raster;
        let colors = self.config.production.palette_colors;
        let mut written = Vec::with_capacity(4);
        for (corner, rect) in crop::corner_boxes(extent, corner_size).iter() {
            let target = self.config.paths.corner(chart, inset, corner);
            self.ensure_parent(&target)?;
            raster.crop(image, &target, rect)?;
            raster.quantize_and_export(&target, &target, colors)?;
            written.push(target);
        }
        Ok(written)
    }

    fn ensure_parent(&self, path: &Path) -> Result<(), CollaboratorError> {
        match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => self.collaborators.artifacts.ensure_dir(dir),
            _ => Ok(()),
        }
    }
}

/// Fold one item's result into the batch.
///
/// Returns whether the item succeeded; per-item failures are logged and
/// collected, anything else is returned.
fn record_outcome<T>(
    chart: &ChartNumber,
    result: Result<T, OrchestratorError>,
    failed: &mut Vec<(ChartNumber, String)>,
) -> Result<bool, OrchestratorError> {
    match result {
        Ok(_) => Ok(true),
        Err(e) if e.is_per_item() => {
            log::warn!("chart {chart}: {e}");
            failed.push((chart.clone(), e.to_string()));
            Ok(false)
        }
        Err(e) => {
            log::error!("chart {chart}: {e}; aborting batch");
            Err(e)
        }
    }
}
