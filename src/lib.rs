//! Upcoming Trailers - Trailers and Kometa documents for upcoming shows
//!
//! This library asks Sonarr which shows premiere within the next days,
//! places a trailer for each of them as a Season 00 special, and renders the
//! Kometa collection and overlay documents that label them in Plex.

mod channel_filter;
mod config;
mod date_format;
mod kometa;
mod process;
mod resolver;
mod temp;
mod tracker;
mod trailer;
mod trailer_source;
mod transcode;

use chrono::{DateTime, Utc};
use kometa::write_artifact;
use resolver::{ResolveOptions, Resolution, acquire_all, resolve};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};
use tracker::{SonarrTracker, Tracker};
use trailer::TrailerAcquirer;
use trailer_source::{TrailerSource, YtDlpSource};
use transcode::{FfmpegTranscoder, Transcoder};

// Re-export error types
pub use config::ConfigError;
pub use date_format::DateFormatError;
pub use kometa::ArtifactError;
pub use tracker::TrackerError;
pub use trailer::AcquireError;
pub use trailer_source::TrailerSourceError;
pub use transcode::TranscodeError;

// Re-export types needed to configure a run and read its summary
pub use channel_filter::ChannelFilter;
pub use config::{Config, DEFAULT_CONFIG_PATH, PathMappings, Settings, default_config_path};
pub use kometa::{ArtifactStatus, COLLECTION_FILE, DocumentSettings, OVERLAY_FILE};
pub use resolver::{ShowOutcome, ShowReport};
pub use trailer::{SourceRef, TrailerAsset, TrailerSettings};
pub use trailer_source::Candidate;

/// Progress event emitted during a run
///
/// These events allow library users to track progress and provide feedback
/// while the pipeline runs.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Probing the Sonarr API
    Connecting { url: String },

    /// Sonarr answered on this API root
    Connected { base_url: String },

    /// Fetching series and episodes
    ResolvingShows,

    /// The eligible show set is known
    ShowsResolved {
        eligible: usize,
        skipped_unmonitored: usize,
    },

    /// Starting trailer acquisition for a show
    AcquisitionStarted {
        index: usize,
        total: usize,
        title: String,
    },

    /// Trailer acquisition for a show is done, successfully or not
    AcquisitionFinished {
        index: usize,
        total: usize,
        title: String,
        outcome: ShowOutcome,
    },

    /// Rendering and writing the Kometa documents
    WritingArtifacts { output_dir: PathBuf },

    /// One Kometa document was handled
    ArtifactFinished(ArtifactReport),

    /// The run is complete
    Complete,
}

/// What happened to one Kometa document
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactReport {
    pub path: PathBuf,
    /// The error message if rendering or writing failed
    pub result: Result<ArtifactStatus, String>,
}

/// Everything a run did, show by show and document by document
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// The instant the look-ahead window started at
    pub started_at: DateTime<Utc>,

    /// Per show outcomes in premiere order, skipped unmonitored shows last
    pub shows: Vec<ShowReport>,

    pub artifacts: Vec<ArtifactReport>,
}

impl RunSummary {
    /// Number of shows whose acquisition failed
    pub fn failed_count(&self) -> usize {
        self.shows
            .iter()
            .filter(|report| matches!(report.outcome, ShowOutcome::Failed(_)))
            .count()
    }

    /// Total size of the trailers downloaded during this run
    pub fn downloaded_bytes(&self) -> u64 {
        self.shows
            .iter()
            .filter_map(|report| match &report.outcome {
                ShowOutcome::Acquired(asset) => Some(asset.size_bytes),
                _ => None,
            })
            .sum()
    }
}

/// Top-level error type for fatal run failures
///
/// Per show and per document failures are not errors; they end up in the
/// [`RunSummary`].
#[derive(Debug, Error)]
pub enum UpcomingTrailersError {
    /// The configuration is missing or invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Sonarr could not be queried
    #[error("Sonarr unavailable: {0}")]
    TrackerUnavailable(#[from] TrackerError),

    /// A required external program is not installed
    #[error("Required tool not found: {0}")]
    MissingTool(String),
}

/// Checks that the external programs needed by this run are installed
///
/// yt-dlp is always needed for searching; ffmpeg only when trailers are
/// actually downloaded.
///
/// # Errors
///
/// Returns `MissingTool` naming the first program that is missing.
pub fn check_tools(settings: &Settings) -> Result<(), UpcomingTrailersError> {
    if !YtDlpSource::is_installed() {
        return Err(UpcomingTrailersError::MissingTool(
            "yt-dlp (install it and make sure it is on PATH)".to_string(),
        ));
    }

    if settings.download_trailers && !FfmpegTranscoder::is_installed() {
        return Err(UpcomingTrailersError::MissingTool(
            "ffmpeg (install it or set download_trailers: false)".to_string(),
        ));
    }

    Ok(())
}

/// Runs the whole pipeline once
///
/// Connects to Sonarr, resolves the shows premiering within the configured
/// window, acquires a trailer for each of them and writes both Kometa
/// documents into the output directory.
///
/// Progress events are emitted through the provided callback, allowing library
/// users to track progress, display status, or remain silent.
///
/// # Arguments
///
/// * `settings` - Validated configuration
/// * `progress_callback` - Closure called with progress events (can be empty for silent operation)
///
/// # Errors
///
/// Fails only if Sonarr cannot be reached or queried. In that case no
/// document is touched, so the previous run's documents stay in place.
///
/// # Examples
///
/// ```no_run
/// use upcoming_trailers::{Config, ProgressEvent, run_pipeline};
/// use std::path::Path;
///
/// let settings = Config::load(Path::new("config/config.yml"))
///     .unwrap()
///     .validate()
///     .unwrap();
///
/// let summary = run_pipeline(&settings, |event| {
///     if let ProgressEvent::AcquisitionStarted { index, total, title } = event {
///         println!("[{}/{}] {}", index + 1, total, title);
///     }
/// })
/// .unwrap();
///
/// println!("{} show(s) processed", summary.shows.len());
/// ```
pub fn run_pipeline<F>(
    settings: &Settings,
    mut progress_callback: F,
) -> Result<RunSummary, UpcomingTrailersError>
where
    F: FnMut(ProgressEvent),
{
    progress_callback(ProgressEvent::Connecting {
        url: settings.sonarr_url.clone(),
    });
    let tracker = SonarrTracker::connect(
        &settings.sonarr_url,
        &settings.sonarr_api_key,
        settings.request_timeout,
    )?;
    progress_callback(ProgressEvent::Connected {
        base_url: tracker.base_url().to_string(),
    });

    let source = YtDlpSource::new(
        settings.search_timeout,
        settings.download_timeout,
        settings.request_timeout,
        settings.max_height,
    );
    let transcoder = FfmpegTranscoder::new();

    run_with(
        &tracker,
        &source,
        &transcoder,
        settings,
        Utc::now(),
        progress_callback,
    )
}

/// Runs the pipeline against the given collaborators
pub(crate) fn run_with<T, S, X, F>(
    tracker: &T,
    source: &S,
    transcoder: &X,
    settings: &Settings,
    now: DateTime<Utc>,
    mut progress_callback: F,
) -> Result<RunSummary, UpcomingTrailersError>
where
    T: Tracker,
    S: TrailerSource,
    X: Transcoder,
    F: FnMut(ProgressEvent),
{
    let options = ResolveOptions {
        future_days: settings.future_days,
        utc_offset: settings.utc_offset,
        skip_unmonitored: settings.skip_unmonitored,
        inclusive_end: settings.inclusive_window_end,
        premieres_only: settings.premieres_only,
    };

    progress_callback(ProgressEvent::ResolvingShows);
    let resolution = resolve(tracker, now, &options)?;
    progress_callback(ProgressEvent::ShowsResolved {
        eligible: resolution.eligible.len(),
        skipped_unmonitored: resolution.skipped_unmonitored.len(),
    });

    let acquirer = TrailerAcquirer::new(
        source,
        transcoder,
        &settings.channel_filter,
        &settings.trailer,
        &settings.path_mappings,
        settings.download_trailers,
    );
    let shows = acquire_all(&acquirer, &resolution, &mut progress_callback);

    progress_callback(ProgressEvent::WritingArtifacts {
        output_dir: settings.output_dir.clone(),
    });
    let artifacts = write_documents(&resolution, settings);
    for artifact in &artifacts {
        progress_callback(ProgressEvent::ArtifactFinished(artifact.clone()));
    }

    progress_callback(ProgressEvent::Complete);

    Ok(RunSummary {
        started_at: now,
        shows,
        artifacts,
    })
}

/// Renders both documents and writes them, reporting each one separately
fn write_documents(resolution: &Resolution, settings: &Settings) -> Vec<ArtifactReport> {
    let collection_path = settings.output_dir.join(COLLECTION_FILE);
    let overlay_path = settings.output_dir.join(OVERLAY_FILE);

    let documents = match kometa::emit(&resolution.eligible, &settings.documents) {
        Ok(documents) => documents,
        Err(e) => {
            warn!(error = %e, "Failed to render Kometa documents");
            return [collection_path, overlay_path]
                .into_iter()
                .map(|path| ArtifactReport {
                    path,
                    result: Err(e.to_string()),
                })
                .collect();
        }
    };

    [
        (collection_path, documents.collection),
        (overlay_path, documents.overlay),
    ]
    .into_iter()
    .map(|(path, contents)| {
        let result = match write_artifact(&path, &contents) {
            Ok(status) => {
                info!(path = %path.display(), ?status, "Kometa document handled");
                Ok(status)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to write Kometa document");
                Err(e.to_string())
            }
        };
        ArtifactReport { path, result }
    })
    .collect()
}
