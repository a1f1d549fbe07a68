//! Trailer source module
//!
//! This module provides the interface to the external video service that is
//! searched for promotional clips, along with the `yt-dlp` based adapter.

mod yt_dlp;
mod yt_dlp_types;

pub(crate) use yt_dlp::YtDlpSource;

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while searching or fetching from the trailer source
#[derive(Debug, Error)]
pub enum TrailerSourceError {
    /// The helper program could not be started
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The helper program exceeded its time limit and was killed
    #[error("{program} did not finish within {seconds}s")]
    TimedOut { program: String, seconds: u64 },

    /// The helper program exited unsuccessfully
    #[error("{program} failed with exit code {code:?}: {stderr}")]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The helper program reported success but produced no file
    #[error("Download finished but no file was found at {0}")]
    MissingOutput(PathBuf),
}

/// A search result offered by the trailer source
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub video_id: String,
    pub title: String,
    /// Display name of the uploading channel
    pub channel: String,
    pub channel_id: Option<String>,
    /// None if the source did not report a duration
    pub duration: Option<Duration>,
    /// Live, upcoming or just-ended streams
    pub is_live: bool,
    pub url: String,
}

/// Trait for services that can be searched for trailers
pub(crate) trait TrailerSource {
    /// Searches the source, returning candidates in the source's ranking order
    ///
    /// # Arguments
    ///
    /// * `query` - Free text search query
    /// * `limit` - Maximum number of candidates to return
    fn search(&self, query: &str, limit: usize) -> Result<Vec<Candidate>, TrailerSourceError>;

    /// Downloads a candidate's media into `directory`
    ///
    /// The file is named `<stem>.<ext>` where the extension is chosen by the
    /// source. Returns the path of the downloaded file.
    fn fetch(
        &self,
        candidate: &Candidate,
        directory: &Path,
        stem: &str,
    ) -> Result<PathBuf, TrailerSourceError>;
}
