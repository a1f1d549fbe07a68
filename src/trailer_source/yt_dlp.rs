//! yt-dlp based trailer source
//!
//! Searches YouTube through `yt-dlp`'s `ytsearch` extractor and downloads the
//! selected video with the best video stream up to a height limit.

use super::yt_dlp_types::YtDlpEntry;
use super::{Candidate, TrailerSource, TrailerSourceError};
use crate::process::output_with_timeout;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::Duration;
use tracing::debug;

const PROGRAM: &str = "yt-dlp";

/// Trailer source using the yt-dlp CLI
pub(crate) struct YtDlpSource {
    program: String,
    search_timeout: Duration,
    download_timeout: Duration,
    socket_timeout: Duration,
    max_height: u32,
}

impl YtDlpSource {
    /// Creates a new source with the given limits
    ///
    /// # Arguments
    ///
    /// * `search_timeout` - Upper bound for a single search invocation
    /// * `download_timeout` - Upper bound for a single download invocation
    /// * `socket_timeout` - Network inactivity limit passed to yt-dlp
    /// * `max_height` - Highest video resolution to download
    pub fn new(
        search_timeout: Duration,
        download_timeout: Duration,
        socket_timeout: Duration,
        max_height: u32,
    ) -> Self {
        Self {
            program: PROGRAM.to_string(),
            search_timeout,
            download_timeout,
            socket_timeout,
            max_height,
        }
    }

    /// Checks if yt-dlp is installed and available
    pub fn is_installed() -> bool {
        Command::new(PROGRAM)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn run(&self, command: Command, timeout: Duration) -> Result<Output, TrailerSourceError> {
        let output = output_with_timeout(command, timeout).map_err(|e| {
            if e.kind() == io::ErrorKind::TimedOut {
                TrailerSourceError::TimedOut {
                    program: self.program.clone(),
                    seconds: timeout.as_secs(),
                }
            } else {
                TrailerSourceError::Spawn {
                    program: self.program.clone(),
                    source: e,
                }
            }
        })?;

        if !output.status.success() {
            return Err(TrailerSourceError::Failed {
                program: self.program.clone(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output)
    }

    /// Format selector preferring separate streams up to the height limit
    fn format_selector(&self) -> String {
        format!(
            "bv*[height<={h}]+ba/b[height<={h}]/b",
            h = self.max_height
        )
    }
}

impl TrailerSource for YtDlpSource {
    fn search(&self, query: &str, limit: usize) -> Result<Vec<Candidate>, TrailerSourceError> {
        let mut command = Command::new(&self.program);
        command
            .arg("--dump-json")
            .arg("--no-warnings")
            .arg("--flat-playlist")
            .arg("--socket-timeout")
            .arg(self.socket_timeout.as_secs().max(1).to_string())
            .arg(format!("ytsearch{}:{}", limit, query));

        debug!(query, limit, "Searching trailer source");
        let output = self.run(command, self.search_timeout)?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_search_output(&stdout))
    }

    fn fetch(
        &self,
        candidate: &Candidate,
        directory: &Path,
        stem: &str,
    ) -> Result<PathBuf, TrailerSourceError> {
        let template = directory.join(format!("{}.%(ext)s", stem));

        let mut command = Command::new(&self.program);
        command
            .arg("-f")
            .arg(self.format_selector())
            .arg("--merge-output-format")
            .arg("mkv")
            .arg("--no-playlist")
            .arg("--no-progress")
            .arg("--no-warnings")
            .arg("--socket-timeout")
            .arg(self.socket_timeout.as_secs().max(1).to_string())
            .arg("-o")
            .arg(&template)
            .arg("--no-simulate")
            .arg("--print")
            .arg("after_move:filepath")
            .arg(&candidate.url);

        debug!(video_id = %candidate.video_id, directory = %directory.display(), "Downloading trailer");
        let output = self.run(command, self.download_timeout)?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if let Some(path) = stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(PathBuf::from)
            .filter(|path| path.is_file())
        {
            return Ok(path);
        }

        // Older yt-dlp releases do not support after_move; look for the stem instead
        find_by_stem(directory, stem).ok_or_else(|| TrailerSourceError::MissingOutput(template))
    }
}

/// Parses `--dump-json` output, one JSON object per line
///
/// Lines that are not valid JSON or lack an id or title are skipped.
fn parse_search_output(stdout: &str) -> Vec<Candidate> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<YtDlpEntry>(line) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(error = %e, "Skipping unparsable search result line");
                None
            }
        })
        .filter_map(convert_entry)
        .collect()
}

fn convert_entry(entry: YtDlpEntry) -> Option<Candidate> {
    let video_id = entry.id.filter(|id| !id.is_empty())?;
    let title = entry.title.filter(|title| !title.is_empty())?;

    let is_live = matches!(
        entry.live_status.as_deref(),
        Some("is_live") | Some("is_upcoming") | Some("post_live")
    );

    let url = entry
        .webpage_url
        .or_else(|| entry.url.filter(|url| url.starts_with("http")))
        .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={}", video_id));

    Some(Candidate {
        title,
        channel: entry
            .channel
            .or(entry.uploader)
            .unwrap_or_else(|| "Unknown".to_string()),
        channel_id: entry.channel_id.or(entry.uploader_id),
        duration: entry
            .duration
            .filter(|seconds| *seconds > 0.0)
            .and_then(|seconds| Duration::try_from_secs_f64(seconds).ok()),
        is_live,
        url,
        video_id,
    })
}

fn find_by_stem(directory: &Path, stem: &str) -> Option<PathBuf> {
    let prefix = format!("{}.", stem);
    fs::read_dir(directory)
        .ok()?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(&prefix) && !name.ends_with(".part"))
        })
        .max_by_key(|path| fs::metadata(path).map(|m| m.len()).unwrap_or(0))
}
