/// Sonarr tracker implementation.
use super::sonarr_types::{SonarrEpisode, SonarrSeries};
use super::{AirTime, Show, Tracker, TrackerError, UpcomingEpisode};
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

const API_SUFFIX: &str = "/api/v3";

/// Tracker backed by the Sonarr v3 REST API.
///
/// The configured URL is probed against a few likely API roots on
/// construction, so users can paste either the web UI address or the API
/// address of their instance.
pub(crate) struct SonarrTracker {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SonarrTracker {
    /// Connects to Sonarr and settles on the first API root that answers.
    ///
    /// # Arguments
    ///
    /// * `url` - Configured Sonarr address, with or without `/api/v3`
    /// * `api_key` - Sonarr API key
    /// * `timeout` - Upper bound for every single request
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` if Sonarr rejects the key and `Unreachable` if
    /// no candidate root answered.
    pub fn connect(url: &str, api_key: &str, timeout: Duration) -> Result<Self, TrackerError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TrackerError::RequestError {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let candidates = candidate_base_urls(url);

        for candidate in &candidates {
            let status_url = format!("{}/system/status", candidate);
            let response = client
                .get(&status_url)
                .header("X-Api-Key", api_key)
                .send();

            match response {
                Ok(response) if response.status().is_success() => {
                    info!(base_url = %candidate, "Connected to Sonarr");
                    return Ok(Self {
                        client,
                        base_url: candidate.clone(),
                        api_key: api_key.to_string(),
                    });
                }
                Ok(response)
                    if response.status() == StatusCode::UNAUTHORIZED
                        || response.status() == StatusCode::FORBIDDEN =>
                {
                    return Err(TrackerError::Unauthorized(response.status().as_u16()));
                }
                Ok(response) => {
                    debug!(url = %status_url, status = %response.status(), "Sonarr probe rejected");
                }
                Err(e) => {
                    debug!(url = %status_url, error = %e, "Sonarr probe failed");
                }
            }
        }

        Err(TrackerError::Unreachable { tried: candidates })
    }

    /// The API root this tracker settled on
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, TrackerError> {
        let response = self
            .client
            .get(url)
            .header("X-Api-Key", &self.api_key)
            .send()
            .map_err(|e| TrackerError::RequestError {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let response = Self::check_status(url, response)?;

        response.json().map_err(|e| TrackerError::ParseError {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    fn check_status(url: &str, response: Response) -> Result<Response, TrackerError> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(TrackerError::Unauthorized(status.as_u16()));
        }
        if !status.is_success() {
            return Err(TrackerError::RequestError {
                url: url.to_string(),
                message: format!(
                    "HTTP {} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown")
                ),
            });
        }
        Ok(response)
    }

    fn convert_series(series: SonarrSeries) -> Show {
        Show {
            id: series.id,
            tvdb_id: series.tvdb_id,
            imdb_id: series.imdb_id.filter(|id| !id.is_empty()),
            title: series.title,
            year: series.year.filter(|year| *year > 0),
            monitored: series.monitored,
            status: series.status,
            path: PathBuf::from(series.path.unwrap_or_default()),
        }
    }

    /// Prefers the absolute UTC air time and falls back to the bare air date
    fn convert_episode(episode: SonarrEpisode) -> UpcomingEpisode {
        let air_time = match (episode.air_date_utc, episode.air_date) {
            (Some(utc), _) => Some(AirTime::Utc(utc)),
            (None, Some(date)) => Some(AirTime::Local(date.and_time(chrono::NaiveTime::MIN))),
            (None, None) => None,
        };

        UpcomingEpisode {
            series_id: episode.series_id,
            season_number: episode.season_number,
            episode_number: episode.episode_number,
            air_time,
            monitored: episode.monitored,
        }
    }
}

impl Tracker for SonarrTracker {
    fn series(&self) -> Result<Vec<Show>, TrackerError> {
        let url = format!("{}/series", self.base_url);
        let series: Vec<SonarrSeries> = self.get_json(&url)?;

        Ok(series.into_iter().map(Self::convert_series).collect())
    }

    fn episodes(&self, series_id: u32) -> Result<Vec<UpcomingEpisode>, TrackerError> {
        let url = format!("{}/episode?seriesId={}", self.base_url, series_id);
        let episodes: Vec<SonarrEpisode> = self.get_json(&url)?;

        Ok(episodes.into_iter().map(Self::convert_episode).collect())
    }
}

/// Lists the API roots to probe, in order and without duplicates.
///
/// The configured URL comes first (as an API root if it already is one),
/// followed by its origin and the common `/sonarr` reverse-proxy prefix.
fn candidate_base_urls(url: &str) -> Vec<String> {
    let trimmed = url.trim().trim_end_matches('/');

    let mut candidates = Vec::new();
    if trimmed.ends_with(API_SUFFIX) {
        candidates.push(trimmed.to_string());
    } else {
        candidates.push(format!("{}{}", trimmed, API_SUFFIX));
    }

    if let Ok(parsed) = reqwest::Url::parse(trimmed) {
        let origin = parsed.origin().ascii_serialization();
        for candidate in [
            format!("{}{}", origin, API_SUFFIX),
            format!("{}/sonarr{}", origin, API_SUFFIX),
        ] {
            if !candidates.contains(&candidate) {
                candidates.push(candidate);
            }
        }
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::SeriesStatus;
    use chrono::{NaiveDate, TimeZone, Utc};

    #[test]
    fn test_candidates_for_plain_host() {
        assert_eq!(
            candidate_base_urls("http://localhost:8989/"),
            vec![
                "http://localhost:8989/api/v3".to_string(),
                "http://localhost:8989/sonarr/api/v3".to_string(),
            ]
        );
    }

    #[test]
    fn test_candidates_for_url_with_path() {
        assert_eq!(
            candidate_base_urls("https://media.example.com/tv/sonarr"),
            vec![
                "https://media.example.com/tv/sonarr/api/v3".to_string(),
                "https://media.example.com/api/v3".to_string(),
                "https://media.example.com/sonarr/api/v3".to_string(),
            ]
        );
    }

    #[test]
    fn test_candidates_for_api_root() {
        let candidates = candidate_base_urls("http://10.0.0.5:8989/sonarr/api/v3");
        assert_eq!(candidates[0], "http://10.0.0.5:8989/sonarr/api/v3");
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn test_convert_series() {
        let json = r#"{
            "id": 12,
            "title": "The Example",
            "year": 2025,
            "tvdbId": 401234,
            "imdbId": "",
            "monitored": false,
            "status": "upcoming",
            "path": "/tv/The Example",
            "seasons": []
        }"#;
        let series: SonarrSeries = serde_json::from_str(json).unwrap();
        let show = SonarrTracker::convert_series(series);

        assert_eq!(show.id, 12);
        assert_eq!(show.tvdb_id, 401234);
        assert_eq!(show.imdb_id, None);
        assert!(!show.monitored);
        assert_eq!(show.status, SeriesStatus::Upcoming);
        assert_eq!(show.path, PathBuf::from("/tv/The Example"));
    }

    #[test]
    fn test_unknown_status_is_tolerated() {
        let json = r#"{"id": 1, "title": "X", "status": "somethingNew"}"#;
        let series: SonarrSeries = serde_json::from_str(json).unwrap();
        assert_eq!(series.status, SeriesStatus::Unknown);
        assert!(series.monitored);
    }

    #[test]
    fn test_convert_episode_prefers_utc() {
        let json = r#"{
            "seriesId": 12,
            "seasonNumber": 1,
            "episodeNumber": 1,
            "airDate": "2025-03-06",
            "airDateUtc": "2025-03-07T02:00:00Z",
            "monitored": true
        }"#;
        let episode: SonarrEpisode = serde_json::from_str(json).unwrap();
        let episode = SonarrTracker::convert_episode(episode);

        assert_eq!(
            episode.air_time,
            Some(AirTime::Utc(Utc.with_ymd_and_hms(2025, 3, 7, 2, 0, 0).unwrap()))
        );
    }

    #[test]
    fn test_convert_episode_falls_back_to_air_date() {
        let json = r#"{"seriesId": 3, "seasonNumber": 2, "episodeNumber": 5, "airDate": "2025-04-01"}"#;
        let episode: SonarrEpisode = serde_json::from_str(json).unwrap();
        let episode = SonarrTracker::convert_episode(episode);

        let midnight = NaiveDate::from_ymd_opt(2025, 4, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(episode.air_time, Some(AirTime::Local(midnight)));
        assert_eq!(episode.season_number, 2);
    }

    #[test]
    fn test_convert_unscheduled_episode() {
        let json = r#"{"seriesId": 3, "seasonNumber": 1, "episodeNumber": 1, "monitored": false}"#;
        let episode: SonarrEpisode = serde_json::from_str(json).unwrap();
        let episode = SonarrTracker::convert_episode(episode);

        assert_eq!(episode.air_time, None);
        assert!(!episode.monitored);
    }
}
