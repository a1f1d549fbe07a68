//! Trailer acquisition module
//!
//! Finds one trailer per show, downloads and transcodes it, and places it as
//! a Season 00 special (`S00E00`) under the show's library root. Placement is
//! keyed purely by path: if the file exists, the show is done.

use crate::channel_filter::ChannelFilter;
use crate::config::PathMappings;
use crate::temp;
use crate::tracker::Show;
use crate::trailer_source::{Candidate, TrailerSource, TrailerSourceError};
use crate::transcode::Transcoder;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Name of the specials folder recognised by media scanners
pub const SPECIALS_DIR: &str = "Season 00";

const STAGING_PREFIX: &str = "trailer-staging";

/// Errors that can occur while acquiring a trailer for a single show
#[derive(Debug, Error)]
pub enum AcquireError {
    /// The tracker reported no library path for the show
    #[error("Show has no library path")]
    MissingPath,

    /// Every search query failed
    #[error("Trailer search failed: {0}")]
    SearchFailed(#[source] TrailerSourceError),

    /// Searches succeeded but no candidate survived filtering
    #[error("No suitable trailer found ({considered} candidates considered)")]
    NoTrailerFound { considered: usize },

    /// Downloading the selected candidate failed
    #[error("Download of {video_id} failed: {source}")]
    DownloadFailed {
        video_id: String,
        #[source]
        source: TrailerSourceError,
    },

    /// Transcoding failed or produced something that is not a video
    #[error("Transcode failed: {0}")]
    TranscodeFailed(String),

    /// Creating directories or placing the final file failed
    #[error("Failed to write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Where a trailer was obtained from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    pub channel: String,
    pub video_id: String,
}

/// A trailer placed in a show's library folder
#[derive(Debug, Clone, PartialEq)]
pub struct TrailerAsset {
    pub show_id: u32,
    pub path: PathBuf,
    /// Unknown for files placed by an earlier run
    pub source: Option<SourceRef>,
    pub downloaded_at: Option<DateTime<Utc>>,
    pub size_bytes: u64,
}

/// Result of a successful acquisition
#[derive(Debug, Clone, PartialEq)]
pub enum Acquisition {
    /// A trailer was already placed; nothing was searched or downloaded
    AlreadyPresent(TrailerAsset),
    /// A new trailer was downloaded and placed
    Downloaded(TrailerAsset),
    /// Downloads are disabled; this candidate would have been downloaded
    Selected(Candidate),
}

/// Search and filter tuning
#[derive(Debug, Clone, PartialEq)]
pub struct TrailerSettings {
    pub min_duration: Duration,
    pub max_duration: Duration,
    /// Results requested per search query
    pub search_results: usize,
    /// Lowercased words that mark reaction videos, reviews and similar decoys
    pub avoid_keywords: Vec<String>,
}

/// Why a candidate was not selected
#[derive(Debug, Clone, PartialEq, Eq)]
enum Rejection {
    BlockedChannel(String),
    Live,
    UnknownDuration,
    TooShort(Duration),
    TooLong(Duration),
    DecoyKeyword(String),
    TitleMismatch,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::BlockedChannel(entry) => write!(f, "channel blocked by '{}'", entry),
            Rejection::Live => write!(f, "live or scheduled stream"),
            Rejection::UnknownDuration => write!(f, "unknown duration"),
            Rejection::TooShort(d) => write!(f, "too short ({}s)", d.as_secs()),
            Rejection::TooLong(d) => write!(f, "too long ({}s)", d.as_secs()),
            Rejection::DecoyKeyword(keyword) => write!(f, "title contains '{}'", keyword),
            Rejection::TitleMismatch => write!(f, "title does not name the show"),
        }
    }
}

/// Finds, downloads and places trailers
pub(crate) struct TrailerAcquirer<'a, S: TrailerSource, T: Transcoder> {
    source: &'a S,
    transcoder: &'a T,
    filter: &'a ChannelFilter,
    settings: &'a TrailerSettings,
    mappings: &'a PathMappings,
    download: bool,
}

impl<'a, S: TrailerSource, T: Transcoder> TrailerAcquirer<'a, S, T> {
    /// Creates a new acquirer
    ///
    /// # Arguments
    ///
    /// * `source` - Service searched for trailers
    /// * `transcoder` - Converter producing the final MP4
    /// * `filter` - Blacklisted channels
    /// * `settings` - Search and filter tuning
    /// * `mappings` - Tracker path to local path substitutions
    /// * `download` - If false, stop after selecting a candidate (dry run)
    pub fn new(
        source: &'a S,
        transcoder: &'a T,
        filter: &'a ChannelFilter,
        settings: &'a TrailerSettings,
        mappings: &'a PathMappings,
        download: bool,
    ) -> Self {
        Self {
            source,
            transcoder,
            filter,
            settings,
            mappings,
            download,
        }
    }

    /// Acquires the trailer for a show premiering on `premiere_date`
    ///
    /// Returns immediately, without any network access, if the trailer is
    /// already in place.
    ///
    /// # Errors
    ///
    /// Every error is local to this show; callers are expected to log it and
    /// carry on with the next show.
    pub fn acquire(
        &self,
        show: &Show,
        premiere_date: NaiveDate,
    ) -> Result<Acquisition, AcquireError> {
        if show.path.as_os_str().is_empty() {
            return Err(AcquireError::MissingPath);
        }

        let root = self.mappings.apply(&show.path);
        let destination = trailer_path(&root, &show.title);

        if destination.is_file() {
            debug!(show = %show.title, path = %destination.display(), "Trailer already present");
            return Ok(Acquisition::AlreadyPresent(existing_asset(show.id, destination)?));
        }

        let candidate = self.select(show, premiere_date)?;
        info!(
            show = %show.title,
            video_id = %candidate.video_id,
            channel = %candidate.channel,
            "Selected trailer"
        );

        if !self.download {
            return Ok(Acquisition::Selected(candidate));
        }

        let asset = self.place(show.id, &candidate, &destination)?;
        Ok(Acquisition::Downloaded(asset))
    }

    /// Runs the search queries in order and returns the first surviving candidate
    fn select(&self, show: &Show, premiere_date: NaiveDate) -> Result<Candidate, AcquireError> {
        let base = base_title(&show.title);
        let queries = search_queries(&base, premiere_date.year());

        let mut seen = HashSet::new();
        let mut considered = 0;
        let mut failures = 0;
        let mut last_error = None;

        for query in &queries {
            let candidates = match self.source.search(query, self.settings.search_results) {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!(show = %show.title, query = %query, error = %e, "Trailer search failed");
                    failures += 1;
                    last_error = Some(e);
                    continue;
                }
            };

            for candidate in candidates {
                if !seen.insert(candidate.video_id.clone()) {
                    continue;
                }
                considered += 1;

                match self.rejection(&candidate, &base) {
                    Some(reason) => {
                        debug!(
                            video_id = %candidate.video_id,
                            title = %candidate.title,
                            channel = %candidate.channel,
                            reason = %reason,
                            "Rejected candidate"
                        );
                    }
                    None => return Ok(candidate),
                }
            }
        }

        match last_error {
            Some(e) if failures == queries.len() => Err(AcquireError::SearchFailed(e)),
            _ => Err(AcquireError::NoTrailerFound { considered }),
        }
    }

    /// Applies the filters in order, returning the first that rejects
    fn rejection(&self, candidate: &Candidate, base_title: &str) -> Option<Rejection> {
        let identifiers = std::iter::once(candidate.channel.as_str())
            .chain(candidate.channel_id.as_deref());
        for identifier in identifiers {
            if let Some(entry) = self.filter.matching_entry(identifier) {
                return Some(Rejection::BlockedChannel(entry.to_string()));
            }
        }

        if candidate.is_live {
            return Some(Rejection::Live);
        }

        let Some(duration) = candidate.duration else {
            return Some(Rejection::UnknownDuration);
        };
        if duration < self.settings.min_duration {
            return Some(Rejection::TooShort(duration));
        }
        if duration > self.settings.max_duration {
            return Some(Rejection::TooLong(duration));
        }

        let video_title = candidate.title.to_lowercase();
        let show_title = base_title.to_lowercase();
        if let Some(keyword) = self
            .settings
            .avoid_keywords
            .iter()
            // A show may legitimately be named after a keyword
            .filter(|keyword| !show_title.contains(keyword.as_str()))
            .find(|keyword| video_title.contains(keyword.as_str()))
        {
            return Some(Rejection::DecoyKeyword(keyword.clone()));
        }

        if !title_matches(&candidate.title, base_title) {
            return Some(Rejection::TitleMismatch);
        }

        None
    }

    /// Downloads, transcodes and atomically places the candidate
    fn place(
        &self,
        show_id: u32,
        candidate: &Candidate,
        destination: &Path,
    ) -> Result<TrailerAsset, AcquireError> {
        let specials = destination
            .parent()
            .ok_or_else(|| AcquireError::WriteFailed {
                path: destination.to_path_buf(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "no parent directory"),
            })?;

        fs::create_dir_all(specials).map_err(|e| AcquireError::WriteFailed {
            path: specials.to_path_buf(),
            source: e,
        })?;

        match temp::remove_stale(specials, STAGING_PREFIX) {
            Ok(0) => {}
            Ok(removed) => debug!(removed, "Removed stale staging directories"),
            Err(e) => warn!(path = %specials.display(), error = %e, "Could not clean stale staging"),
        }

        let staging = temp::create_temp_dir_in(specials, STAGING_PREFIX).map_err(|e| {
            AcquireError::WriteFailed {
                path: specials.to_path_buf(),
                source: e,
            }
        })?;

        let downloaded = self
            .source
            .fetch(candidate, &staging, "source")
            .map_err(|e| AcquireError::DownloadFailed {
                video_id: candidate.video_id.clone(),
                source: e,
            })?;

        let transcoded = staging.join("trailer.mp4");
        self.transcoder
            .transcode(&downloaded, &transcoded)
            .map_err(|e| AcquireError::TranscodeFailed(e.to_string()))?;

        if !is_video_file(&transcoded) {
            return Err(AcquireError::TranscodeFailed(format!(
                "{} is not a recognised video file",
                transcoded.display()
            )));
        }

        // Same directory tree, so this is a plain rename and never a copy
        fs::rename(&transcoded, destination).map_err(|e| AcquireError::WriteFailed {
            path: destination.to_path_buf(),
            source: e,
        })?;

        let size_bytes = fs::metadata(destination).map(|m| m.len()).unwrap_or(0);

        Ok(TrailerAsset {
            show_id,
            path: destination.to_path_buf(),
            source: Some(SourceRef {
                channel: candidate.channel.clone(),
                video_id: candidate.video_id.clone(),
            }),
            downloaded_at: Some(Utc::now()),
            size_bytes,
        })
    }
}

fn existing_asset(show_id: u32, path: PathBuf) -> Result<TrailerAsset, AcquireError> {
    let metadata = fs::metadata(&path).map_err(|e| AcquireError::WriteFailed {
        path: path.clone(),
        source: e,
    })?;

    Ok(TrailerAsset {
        show_id,
        downloaded_at: metadata.modified().ok().map(DateTime::<Utc>::from),
        size_bytes: metadata.len(),
        source: None,
        path,
    })
}

/// Returns the deterministic trailer location below a show's root
///
/// `<root>/Season 00/<title> S00E00 Trailer.mp4`
pub fn trailer_path(show_root: &Path, title: &str) -> PathBuf {
    show_root
        .join(SPECIALS_DIR)
        .join(format!("{} S00E00 Trailer.mp4", sanitize_filename(title)))
}

/// Sanitizes a string for use in filenames by replacing problematic characters
///
/// Replaces characters that are invalid or problematic in filenames across platforms:
/// - Path separators: / \
/// - Reserved characters: : * ? " < > |
/// - Control characters
/// - Trim leading/trailing whitespace and dots
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect();

    sanitized
        .trim_matches(|c: char| c.is_whitespace() || c == '.')
        .to_string()
}

/// Search queries in the order they are tried
fn search_queries(base_title: &str, year: i32) -> Vec<String> {
    vec![
        format!("{} {} official trailer", base_title, year),
        format!("{} official trailer", base_title),
        format!("{} trailer", base_title),
        format!("{} teaser", base_title),
    ]
}

/// Strips a trailing `(YYYY)` or `[YYYY]` disambiguation suffix
fn base_title(title: &str) -> String {
    let trimmed = title.trim();
    for (open, close) in [('(', ')'), ('[', ']')] {
        if let Some(inner) = trimmed
            .strip_suffix(close)
            .and_then(|rest| rest.rsplit_once(open))
        {
            let (head, year) = inner;
            if year.len() == 4 && year.chars().all(|c| c.is_ascii_digit()) {
                return head.trim_end().to_string();
            }
        }
    }
    trimmed.to_string()
}

/// Lowercases and reduces a title to alphanumeric words separated by spaces
fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Checks that the video title names the show as a run of whole words
fn title_matches(video_title: &str, base_title: &str) -> bool {
    let show = normalize(base_title);
    if show.is_empty() {
        return false;
    }
    format!(" {} ", normalize(video_title)).contains(&format!(" {} ", show))
}

/// Analyzes a file to determine if it's a video file
///
/// Only reads the first 8KB of the file.
fn is_video_file(file_path: &Path) -> bool {
    const BUFFER_SIZE: usize = 8192;

    let mut file = match File::open(file_path) {
        Ok(f) => f,
        Err(_) => return false,
    };

    let mut buffer = vec![0u8; BUFFER_SIZE];
    let bytes_read = match file.read(&mut buffer) {
        Ok(n) => n,
        Err(_) => return false,
    };
    buffer.truncate(bytes_read);

    infer::is_video(&buffer)
}
