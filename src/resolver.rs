//! Upcoming show resolution
//!
//! Turns the tracker's series and episode lists into the ordered set of
//! shows premiering inside the look-ahead window, then drives trailer
//! acquisition for each of them.

use crate::ProgressEvent;
use crate::tracker::{SeriesStatus, Show, Tracker, TrackerError};
use crate::trailer::{AcquireError, Acquisition, TrailerAcquirer, TrailerAsset};
use crate::trailer_source::{Candidate, TrailerSource};
use crate::transcode::Transcoder;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use tracing::{debug, info, warn};

/// Options controlling which shows are eligible
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Length of the look-ahead window in days
    pub future_days: u32,
    /// Offset used for tracker times without zone and for calendar dates
    pub utc_offset: FixedOffset,
    /// Require both the show and the premiere episode to be monitored
    pub skip_unmonitored: bool,
    /// Whether an episode airing exactly at the window end is included
    pub inclusive_end: bool,
    /// Only consider series the tracker marks as upcoming
    pub premieres_only: bool,
}

/// A show with a qualifying premiere inside the window
#[derive(Debug, Clone, PartialEq)]
pub struct EligibleShow {
    pub show: Show,
    /// Air instant of the earliest qualifying episode
    pub premiere: DateTime<Utc>,
    /// Calendar date of the premiere under the configured offset
    pub premiere_date: NaiveDate,
}

/// Result of resolving the tracker state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Eligible shows ordered by premiere date, then title
    pub eligible: Vec<EligibleShow>,
    /// Shows that would be eligible if monitoring was not required
    pub skipped_unmonitored: Vec<EligibleShow>,
}

/// Outcome of processing one show
#[derive(Debug, Clone, PartialEq)]
pub enum ShowOutcome {
    Acquired(TrailerAsset),
    AlreadyPresent(TrailerAsset),
    /// Dry run: the candidate that would have been downloaded
    Selected(Candidate),
    SkippedUnmonitored,
    Failed(String),
}

/// Per show line of the run summary
#[derive(Debug, Clone, PartialEq)]
pub struct ShowReport {
    pub show_id: u32,
    pub title: String,
    pub premiere_date: NaiveDate,
    pub outcome: ShowOutcome,
}

/// Computes the eligible show set from the tracker
///
/// # Arguments
///
/// * `tracker` - Source of series and episode metadata
/// * `now` - Start of the window; episodes airing earlier never qualify
/// * `options` - Window length, offset and filters
///
/// # Errors
///
/// Any tracker failure aborts resolution; a partial show list would make
/// the generated documents drop shows that are still upcoming.
pub(crate) fn resolve<T: Tracker>(
    tracker: &T,
    now: DateTime<Utc>,
    options: &ResolveOptions,
) -> Result<Resolution, TrackerError> {
    let window_end = now
        .checked_add_signed(chrono::Duration::days(i64::from(options.future_days)))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    let in_window = |instant: DateTime<Utc>| {
        instant >= now
            && if options.inclusive_end {
                instant <= window_end
            } else {
                instant < window_end
            }
    };

    let series = tracker.series()?;
    debug!(count = series.len(), "Fetched series");

    let mut resolution = Resolution::default();

    for show in series {
        if options.premieres_only && show.status != SeriesStatus::Upcoming {
            continue;
        }

        let episodes = tracker.episodes(show.id)?;

        let mut earliest_any: Option<DateTime<Utc>> = None;
        let mut earliest_monitored: Option<DateTime<Utc>> = None;

        for episode in &episodes {
            if episode.season_number < 1 {
                continue;
            }
            let Some(air_time) = episode.air_time else {
                continue;
            };
            let instant = air_time.instant(options.utc_offset);
            if instant < now {
                continue;
            }

            earliest_any = Some(earliest_any.map_or(instant, |e| e.min(instant)));
            if show.monitored && episode.monitored {
                earliest_monitored = Some(earliest_monitored.map_or(instant, |e| e.min(instant)));
            }
        }

        let premiere = if options.skip_unmonitored {
            earliest_monitored
        } else {
            earliest_any
        };

        match premiere {
            Some(instant) if in_window(instant) => {
                debug!(show = %show.title, premiere = %instant, "Show is eligible");
                resolution
                    .eligible
                    .push(eligible(show, instant, options.utc_offset));
            }
            Some(instant) => {
                debug!(show = %show.title, premiere = %instant, "Premiere outside window");
            }
            None => match earliest_any.filter(|instant| in_window(*instant)) {
                Some(instant) if options.skip_unmonitored => {
                    debug!(show = %show.title, "Skipping unmonitored show");
                    resolution
                        .skipped_unmonitored
                        .push(eligible(show, instant, options.utc_offset));
                }
                _ => debug!(show = %show.title, "No upcoming premiere"),
            },
        }
    }

    sort_shows(&mut resolution.eligible);
    sort_shows(&mut resolution.skipped_unmonitored);

    info!(
        eligible = resolution.eligible.len(),
        skipped_unmonitored = resolution.skipped_unmonitored.len(),
        "Resolved upcoming shows"
    );

    Ok(resolution)
}

fn eligible(show: Show, premiere: DateTime<Utc>, offset: FixedOffset) -> EligibleShow {
    EligibleShow {
        premiere_date: premiere.with_timezone(&offset).date_naive(),
        premiere,
        show,
    }
}

/// Orders by premiere date, then title, then tracker id
fn sort_shows(shows: &mut [EligibleShow]) {
    shows.sort_by(|a, b| {
        a.premiere_date
            .cmp(&b.premiere_date)
            .then_with(|| a.show.title.cmp(&b.show.title))
            .then_with(|| a.show.id.cmp(&b.show.id))
    });
}

/// Acquires trailers for every eligible show, isolating per-show failures
///
/// Skipped unmonitored shows are reported without any acquisition attempt.
pub(crate) fn acquire_all<S, T, F>(
    acquirer: &TrailerAcquirer<'_, S, T>,
    resolution: &Resolution,
    progress: &mut F,
) -> Vec<ShowReport>
where
    S: TrailerSource,
    T: Transcoder,
    F: FnMut(ProgressEvent),
{
    let total = resolution.eligible.len();
    let mut reports = Vec::with_capacity(total + resolution.skipped_unmonitored.len());

    for (index, entry) in resolution.eligible.iter().enumerate() {
        progress(ProgressEvent::AcquisitionStarted {
            index,
            total,
            title: entry.show.title.clone(),
        });

        let outcome = match acquirer.acquire(&entry.show, entry.premiere_date) {
            Ok(Acquisition::Downloaded(asset)) => ShowOutcome::Acquired(asset),
            Ok(Acquisition::AlreadyPresent(asset)) => ShowOutcome::AlreadyPresent(asset),
            Ok(Acquisition::Selected(candidate)) => ShowOutcome::Selected(candidate),
            Err(e) => {
                log_failure(&entry.show, &e);
                ShowOutcome::Failed(e.to_string())
            }
        };

        progress(ProgressEvent::AcquisitionFinished {
            index,
            total,
            title: entry.show.title.clone(),
            outcome: outcome.clone(),
        });

        reports.push(ShowReport {
            show_id: entry.show.id,
            title: entry.show.title.clone(),
            premiere_date: entry.premiere_date,
            outcome,
        });
    }

    reports.extend(resolution.skipped_unmonitored.iter().map(|entry| ShowReport {
        show_id: entry.show.id,
        title: entry.show.title.clone(),
        premiere_date: entry.premiere_date,
        outcome: ShowOutcome::SkippedUnmonitored,
    }));

    reports
}

fn log_failure(show: &Show, error: &AcquireError) {
    match error {
        AcquireError::NoTrailerFound { .. } => {
            info!(show = %show.title, error = %error, "No trailer acquired")
        }
        _ => warn!(show = %show.title, error = %error, "Trailer acquisition failed"),
    }
}
