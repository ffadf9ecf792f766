use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::archive::{self, ArchiveOptions, ArchiveOutcome};
use crate::center::compute_center;
use crate::compose::{self, MapBlock};
use crate::config::Config;
use crate::error::{ConvertError, PipelineError};
use crate::exif::{MetadataReader, NomExifReader};
use crate::geocode::{self, AmapService, CancellationToken, CoordinateService, is_cancelled};
use crate::model::{
    ArchiveFailure, GeneratedArtifacts, PhotoRecord, RunReport, RunStatus, TripAccumulator,
};
use crate::request::TravelRequest;
use crate::scanner;

/// Where a run currently is.
///
/// `Failed` is reachable from every stage; `Cancelled` only from `Converting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Scanning,
    Converting,
    Composing,
    Archiving,
    Done,
    Cancelled,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::Converting => "converting",
            Self::Composing => "composing",
            Self::Archiving => "archiving",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Knobs the pipeline takes from configuration.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub photo_extension: String,
    /// Trip folder's parent, relative to the note library root.
    pub library_path: String,
    pub concurrency: usize,
    pub archive: ArchiveOptions,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            photo_extension: config.notes.photo_extension.clone(),
            library_path: config.notes.library_path.clone(),
            concurrency: config.geocoder.concurrency,
            archive: config.archive.clone(),
        }
    }
}

/// Build the AMap converter from configuration.
///
/// # Example
///
/// ```rust,no_run
/// use tripnote::config::Config;
/// use tripnote::pipeline::{Pipeline, PipelineSettings, build_service};
///
/// let config = Config::load(Some("config.json".as_ref())).unwrap();
/// let service = build_service(&config).unwrap();
/// let pipeline = Pipeline::new(service, PipelineSettings::from_config(&config));
/// ```
pub fn build_service(config: &Config) -> Result<Arc<dyn CoordinateService>, ConvertError> {
    if config.geocoder.api_key.is_empty() {
        log::warn!("No AMap key configured; every conversion will be rejected");
    }
    let service = AmapService::with_endpoint(
        config.geocoder.api_key.clone(),
        config.geocoder.endpoint.clone(),
        config.geocoder.timeout(),
    )?;
    Ok(Arc::new(service))
}

/// Turns a folder of photos into a trip note, marker notes and an optional
/// photo archive.
///
/// A `Pipeline` holds no per-run data: every [`run`](Pipeline::run) builds its
/// own accumulator, so one instance can serve several trips.
pub struct Pipeline {
    reader: Box<dyn MetadataReader>,
    service: Arc<dyn CoordinateService>,
    settings: PipelineSettings,
    cancel: CancellationToken,
    stage: Stage,
    history: Vec<Stage>,
}

impl Pipeline {
    pub fn new(service: Arc<dyn CoordinateService>, settings: PipelineSettings) -> Self {
        Self {
            reader: Box::new(NomExifReader),
            service,
            settings,
            cancel: Arc::new(AtomicBool::new(false)),
            stage: Stage::Idle,
            history: Vec::new(),
        }
    }

    /// Replace the EXIF reader.
    pub fn with_reader(mut self, reader: impl MetadataReader + 'static) -> Self {
        self.reader = Box::new(reader);
        self
    }

    /// Token that, once raised, stops new conversion requests. The current run
    /// (or the next one, if none is in progress) then returns a
    /// [`RunStatus::Cancelled`] report without writing anything. The token is
    /// lowered again when that run ends.
    pub fn cancellation_token(&self) -> CancellationToken {
        Arc::clone(&self.cancel)
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Stages entered by the latest run, in order.
    pub fn history(&self) -> &[Stage] {
        &self.history
    }

    fn enter(&mut self, stage: Stage) {
        log::debug!("Pipeline stage: {} -> {stage}", self.stage);
        self.stage = stage;
        self.history.push(stage);
    }

    /// Run the whole flow for one trip.
    ///
    /// Per-photo problems end up in the report; only an invalid request, an
    /// unreadable input tree, a trip without any located photo, or a failed
    /// note or marker write return an error. The trip note is written after
    /// the markers, so a failed run never leaves one behind.
    pub async fn run(&mut self, request: &TravelRequest) -> Result<RunReport, PipelineError> {
        self.stage = Stage::Idle;
        self.history.clear();
        let result = self.execute(request).await;
        // A cancellation applies to one run only.
        self.cancel.store(false, Ordering::SeqCst);
        match result {
            Ok(report) => {
                let end = match report.status {
                    RunStatus::Completed => Stage::Done,
                    RunStatus::Cancelled => Stage::Cancelled,
                };
                self.enter(end);
                Ok(report)
            }
            Err(e) => {
                log::error!("Run failed while {}: {e}", self.stage);
                self.enter(Stage::Failed);
                Err(e)
            }
        }
    }

    async fn execute(&mut self, request: &TravelRequest) -> Result<RunReport, PipelineError> {
        request.validate()?;
        let trip_dir = request.trip_dir();

        self.enter(Stage::Scanning);
        let records = scanner::scan(
            &request.input_dir,
            &self.settings.photo_extension,
            self.reader.as_ref(),
        )?;
        let mut acc = TripAccumulator::new(records);

        self.enter(Stage::Converting);
        let summary = geocode::convert_all(
            &mut acc,
            Arc::clone(&self.service),
            self.settings.concurrency,
            &self.cancel,
        )
        .await;
        log::info!(
            "Converted {} coordinate(s), {} failed",
            summary.converted,
            summary.failed
        );
        if summary.cancelled || is_cancelled(&self.cancel) {
            log::warn!("Run cancelled; no files written");
            return Ok(base_report(&acc, RunStatus::Cancelled));
        }

        self.enter(Stage::Composing);
        let center = compute_center(acc.converted())?;

        // Markers and the archive depend only on the valid set, not on each other.
        let valid: Vec<PhotoRecord> = acc.valid().cloned().collect();
        let archive_task = self.settings.archive.enabled.then(|| {
            let photos = valid.clone();
            let options = self.settings.archive.clone();
            let trip_dir = trip_dir.clone();
            tokio::task::spawn_blocking(move || archive::archive_photos(&photos, &options, &trip_dir))
        });

        let markers = compose::write_markers(&trip_dir, &valid);

        let archived = match archive_task {
            Some(task) => {
                self.enter(Stage::Archiving);
                Some(task.await.unwrap_or_else(|e| {
                    log::error!("Archive task failed: {e}");
                    ArchiveOutcome {
                        failures: failed_all(&valid, &e.to_string()),
                        ..Default::default()
                    }
                }))
            }
            None => None,
        };

        // The note goes last so a failed run never leaves one behind.
        let markers = markers?;
        let map = MapBlock::new(request, center, &self.settings.library_path);
        let note = compose::write_note(request, &map)?;

        let mut report = base_report(&acc, RunStatus::Completed);
        report.center = Some(center);
        report.marker_collisions = markers.collisions;
        report.artifacts.note = Some(note);
        report.artifacts.markers = markers.written;

        if let Some(outcome) = archived {
            report.archive_failures = outcome.failures;
            if self.settings.archive.delete_originals {
                let (deleted, failures) = archive::delete_originals(&outcome.archived);
                log::info!("Deleted {} original photo(s)", deleted.len());
                report.artifacts.deleted = deleted;
                report.archive_failures.extend(failures);
            }
            report.artifacts.archived = outcome.archived.into_iter().map(|a| a.archived).collect();
            report.artifacts.archive_target = outcome.target;
        }

        Ok(report)
    }
}

fn failed_all(photos: &[PhotoRecord], reason: &str) -> Vec<ArchiveFailure> {
    photos
        .iter()
        .map(|p| ArchiveFailure {
            file_name: p.file_name.clone(),
            reason: reason.to_string(),
        })
        .collect()
}

fn base_report(acc: &TripAccumulator, status: RunStatus) -> RunReport {
    RunReport {
        status,
        valid_count: acc.valid_count(),
        center: None,
        invalid_photos: acc.invalid_photos(),
        archive_failures: Vec::new(),
        marker_collisions: Vec::new(),
        artifacts: GeneratedArtifacts::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Coordinate;

    struct Echo;

    #[async_trait::async_trait]
    impl CoordinateService for Echo {
        fn name(&self) -> &str {
            "Echo"
        }

        async fn convert(&self, raw: Coordinate) -> Result<Coordinate, ConvertError> {
            Ok(raw)
        }
    }

    #[test]
    fn stage_names() {
        assert_eq!(Stage::Converting.to_string(), "converting");
        assert_eq!(Stage::Failed.to_string(), "failed");
    }

    #[test]
    fn settings_follow_config() {
        let mut config = Config::default();
        config.notes.photo_extension = "jpeg".into();
        config.geocoder.concurrency = 8;
        config.archive.enabled = true;

        let settings = PipelineSettings::from_config(&config);
        assert_eq!(settings.photo_extension, "jpeg");
        assert_eq!(settings.concurrency, 8);
        assert!(settings.archive.enabled);
    }

    #[test]
    fn build_service_uses_amap() {
        let service = build_service(&Config::default()).unwrap();
        assert_eq!(service.name(), "AMap");
    }

    #[test]
    fn new_pipeline_is_idle_with_fresh_token() {
        let pipeline = Pipeline::new(Arc::new(Echo), PipelineSettings::default());
        assert_eq!(pipeline.stage(), Stage::Idle);
        assert!(!is_cancelled(&pipeline.cancellation_token()));
    }
}
