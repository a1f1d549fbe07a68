/// Data structures and traits for the upstream show tracker.
///
/// This module provides structures to represent tracked series and their
/// scheduled episodes, as well as the trait implemented by tracker adapters.
/// Everything here is a read-only snapshot taken once per run.
mod sonarr;
mod sonarr_types;

pub(crate) use sonarr::SonarrTracker;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while talking to the tracker.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// None of the candidate API base URLs answered
    #[error("Unable to reach the tracker API, tried: {}", .tried.join(", "))]
    Unreachable { tried: Vec<String> },

    /// The API key was rejected
    #[error("Tracker rejected the API key (HTTP {0})")]
    Unauthorized(u16),

    /// Request to the tracker failed
    #[error("Request to {url} failed: {message}")]
    RequestError { url: String, message: String },

    /// Failed to parse the tracker's JSON response
    #[error("Failed to parse response from {url}: {message}")]
    ParseError { url: String, message: String },
}

/// Lifecycle status of a series as reported by the tracker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesStatus {
    /// Announced, no episode has aired yet
    Upcoming,
    Continuing,
    Ended,
    Deleted,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A tracked series.
#[derive(Debug, Clone, PartialEq)]
pub struct Show {
    /// Tracker-assigned identifier
    pub id: u32,
    /// TheTVDB identifier, used to key the generated documents
    pub tvdb_id: u32,
    pub imdb_id: Option<String>,
    pub title: String,
    pub year: Option<i32>,
    pub monitored: bool,
    pub status: SeriesStatus,
    /// Library root of the series as seen by the tracker
    pub path: PathBuf,
}

/// Scheduled air time of an episode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AirTime {
    /// Absolute instant supplied by the tracker
    Utc(DateTime<Utc>),
    /// Wall-clock time without zone, interpreted under the configured offset
    Local(NaiveDateTime),
}

impl AirTime {
    /// Resolves the air time to an absolute instant
    pub fn instant(&self, offset: FixedOffset) -> DateTime<Utc> {
        match self {
            AirTime::Utc(instant) => *instant,
            AirTime::Local(naive) => Utc.from_utc_datetime(
                &(*naive - chrono::Duration::seconds(i64::from(offset.local_minus_utc()))),
            ),
        }
    }
}

/// A single scheduled episode of a series.
#[derive(Debug, Clone, PartialEq)]
pub struct UpcomingEpisode {
    /// Identifier of the owning series
    pub series_id: u32,
    pub season_number: u32,
    pub episode_number: u32,
    /// None if the tracker has not scheduled the episode yet
    pub air_time: Option<AirTime>,
    pub monitored: bool,
}

/// Trait for trackers that can list series and their episodes.
///
/// Implementors only read from the tracker; nothing is ever written back.
pub(crate) trait Tracker {
    /// Fetches all tracked series.
    fn series(&self) -> Result<Vec<Show>, TrackerError>;

    /// Fetches all known episodes of a series.
    ///
    /// # Arguments
    ///
    /// * `series_id` - The tracker-assigned identifier of the series
    fn episodes(&self, series_id: u32) -> Result<Vec<UpcomingEpisode>, TrackerError>;
}
