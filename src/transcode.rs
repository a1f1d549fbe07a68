//! Transcoding module
//!
//! Downloaded trailers arrive in whatever container and codecs the source
//! offered (often VP9/AV1 with Opus). Media servers play H.264/AAC in MP4
//! everywhere, so every download is re-encoded before it is placed.

use ffmpeg_sidecar::command::{FfmpegCommand, ffmpeg_is_installed};
use ffmpeg_sidecar::event::{FfmpegEvent, LogLevel};
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while transcoding
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// ffmpeg could not be started
    #[error("Failed to start ffmpeg: {0}")]
    Spawn(#[source] io::Error),

    /// ffmpeg reported an error or exited unsuccessfully
    #[error("ffmpeg failed: {0}")]
    Failed(String),
}

/// Trait for converting a downloaded video into the library's container
pub(crate) trait Transcoder {
    /// Transcodes `input` into an MP4 file at `output`
    ///
    /// `output` is overwritten if it exists.
    fn transcode(&self, input: &Path, output: &Path) -> Result<(), TranscodeError>;
}

/// Encoder arguments for a broadly compatible MP4
const ENCODE_ARGS: &[&str] = &[
    "-map",
    "0:v:0",
    "-map",
    "0:a:0?",
    "-c:v",
    "libx264",
    "-preset",
    "veryfast",
    "-crf",
    "20",
    "-pix_fmt",
    "yuv420p",
    "-c:a",
    "aac",
    "-b:a",
    "192k",
    "-movflags",
    "+faststart",
];

/// Transcoder driving a system ffmpeg through ffmpeg-sidecar
#[derive(Debug, Default)]
pub(crate) struct FfmpegTranscoder;

impl FfmpegTranscoder {
    pub fn new() -> Self {
        Self
    }

    /// Checks if ffmpeg is installed and available
    pub fn is_installed() -> bool {
        ffmpeg_is_installed()
    }
}

impl Transcoder for FfmpegTranscoder {
    fn transcode(&self, input: &Path, output: &Path) -> Result<(), TranscodeError> {
        let mut child = FfmpegCommand::new()
            .hide_banner()
            .overwrite()
            .input(input)
            .args(ENCODE_ARGS)
            .output(output)
            .spawn()
            .map_err(TranscodeError::Spawn)?;

        let mut errors = Vec::new();
        let events = child
            .iter()
            .map_err(|e| TranscodeError::Failed(e.to_string()))?;

        for event in events {
            match event {
                FfmpegEvent::Error(message)
                | FfmpegEvent::Log(LogLevel::Error | LogLevel::Fatal, message) => {
                    errors.push(message);
                }
                FfmpegEvent::Progress(progress) => {
                    debug!(time = %progress.time, speed = progress.speed, "Transcoding");
                }
                _ => {}
            }
        }

        let status = child.wait().map_err(TranscodeError::Spawn)?;
        if !status.success() {
            let message = if errors.is_empty() {
                format!("exit status {}", status)
            } else {
                errors.join("; ")
            };
            return Err(TranscodeError::Failed(message));
        }

        if !output.is_file() {
            return Err(TranscodeError::Failed(format!(
                "no output written to {}",
                output.display()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_args_target_mp4_streaming() {
        let args = ENCODE_ARGS.join(" ");
        assert!(args.contains("-c:v libx264"));
        assert!(args.contains("-c:a aac"));
        assert!(args.contains("-movflags +faststart"));
        // Audio is optional so silent teasers still transcode
        assert!(args.contains("0:a:0?"));
    }

    #[test]
    fn test_missing_input_fails() {
        if !FfmpegTranscoder::is_installed() {
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        let result = FfmpegTranscoder::new().transcode(
            &dir.path().join("does-not-exist.mkv"),
            &dir.path().join("out.mp4"),
        );

        assert!(matches!(result, Err(TranscodeError::Failed(_))));
        assert!(!dir.path().join("out.mp4").exists());
    }
}
