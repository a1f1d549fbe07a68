/// Sonarr v3 API response types.
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use super::SeriesStatus;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SonarrSeries {
    pub id: u32,
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub tvdb_id: u32,
    #[serde(default)]
    pub imdb_id: Option<String>,
    #[serde(default = "default_true")]
    pub monitored: bool,
    #[serde(default)]
    pub status: SeriesStatus,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SonarrEpisode {
    pub series_id: u32,
    pub season_number: u32,
    pub episode_number: u32,
    #[serde(default)]
    pub air_date: Option<NaiveDate>,
    #[serde(default)]
    pub air_date_utc: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub monitored: bool,
}

fn default_true() -> bool {
    true
}
