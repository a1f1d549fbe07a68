/// yt-dlp `--dump-json` output types.
use serde::Deserialize;

/// One line of `yt-dlp --dump-json --flat-playlist` output
#[derive(Debug, Deserialize)]
pub(super) struct YtDlpEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub uploader_id: Option<String>,
    /// Seconds, sometimes fractional
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub live_status: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub webpage_url: Option<String>,
}
