//! Date label formatting
//!
//! Overlay and collection text renders premiere dates through a small token
//! grammar: `d`, `dd`, `ddd`, `dddd` (day, zero-padded day, short and long
//! weekday), `m`, `mm`, `mmm`, `mmmm` (month, zero-padded month, short and
//! long month name) and `yy`, `yyyy` (two and four digit year). Any other
//! text in the pattern is reproduced verbatim.
//!
//! Weekday and month names are always English.

use chrono::{Datelike, NaiveDate};
use thiserror::Error;

/// Errors that can occur while parsing a date pattern
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateFormatError {
    /// The pattern is empty or whitespace only
    #[error("Date pattern is empty")]
    EmptyPattern,

    /// The pattern does not contain a single date token
    #[error("Date pattern '{0}' contains no day, month or year component")]
    NoComponents(String),

    /// The divider is not one of the supported separators
    #[error("Unsupported divider '{0}', expected '/', '-' or a single space")]
    InvalidDivider(String),

    /// The pattern embeds one separator but would also receive another
    #[error(
        "Date pattern '{pattern}' already separates components with '{embedded}' \
         and would additionally receive divider '{divider}'"
    )]
    DividerConflict {
        pattern: String,
        embedded: char,
        divider: char,
    },
}

/// A single date component recognised in a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateComponent {
    Day,
    DayPadded,
    WeekdayShort,
    WeekdayLong,
    Month,
    MonthPadded,
    MonthShort,
    MonthLong,
    YearShort,
    YearLong,
}

/// Recognised tokens, longest first so `dddd` never splits into `d`s
const TOKENS: &[(&str, DateComponent)] = &[
    ("dddd", DateComponent::WeekdayLong),
    ("mmmm", DateComponent::MonthLong),
    ("yyyy", DateComponent::YearLong),
    ("ddd", DateComponent::WeekdayShort),
    ("mmm", DateComponent::MonthShort),
    ("dd", DateComponent::DayPadded),
    ("mm", DateComponent::MonthPadded),
    ("yy", DateComponent::YearShort),
    ("d", DateComponent::Day),
    ("m", DateComponent::Month),
];

/// Characters accepted as divider and recognised as embedded separators
const SEPARATORS: [char; 3] = ['/', '-', ' '];

const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Component(DateComponent),
    Literal(String),
}

/// A parsed date pattern, reused for every rendered label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateFormatSpec {
    segments: Vec<Segment>,
}

impl DateFormatSpec {
    /// Parses a pattern and an optional divider
    ///
    /// The divider is only inserted between two date components that are
    /// directly adjacent in the pattern (`yyyymmdd`). Components that are
    /// already separated by literal text keep that text unchanged.
    ///
    /// # Errors
    ///
    /// Fails if the pattern is empty, contains no date component, the
    /// divider is unsupported, or the pattern mixes an embedded separator
    /// with a different divider.
    pub fn parse(pattern: &str, divider: Option<&str>) -> Result<Self, DateFormatError> {
        if pattern.trim().is_empty() {
            return Err(DateFormatError::EmptyPattern);
        }

        let divider = parse_divider(divider)?;
        let raw = tokenize(pattern);

        if !raw.iter().any(|s| matches!(s, Segment::Component(_))) {
            return Err(DateFormatError::NoComponents(pattern.to_string()));
        }

        let Some(divider) = divider else {
            return Ok(Self { segments: raw });
        };

        let has_adjacent = raw.windows(2).any(|pair| {
            matches!(
                pair,
                [Segment::Component(_), Segment::Component(_)]
            )
        });

        if has_adjacent {
            if let Some(embedded) = embedded_separator(&raw, divider) {
                return Err(DateFormatError::DividerConflict {
                    pattern: pattern.to_string(),
                    embedded,
                    divider,
                });
            }
        }

        let mut segments = Vec::with_capacity(raw.len() * 2);
        for segment in raw {
            let adjacent = matches!(
                (segments.last(), &segment),
                (Some(Segment::Component(_)), Segment::Component(_))
            );
            if adjacent {
                segments.push(Segment::Literal(divider.to_string()));
            }
            segments.push(segment);
        }

        Ok(Self { segments })
    }

    /// Renders a calendar date using this pattern
    pub fn render(&self, date: NaiveDate) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Component(component) => out.push_str(&render_component(*component, date)),
            }
        }
        out
    }
}

fn parse_divider(divider: Option<&str>) -> Result<Option<char>, DateFormatError> {
    match divider {
        None | Some("") => Ok(None),
        Some(value) => {
            let mut chars = value.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if SEPARATORS.contains(&c) => Ok(Some(c)),
                _ => Err(DateFormatError::InvalidDivider(value.to_string())),
            }
        }
    }
}

fn tokenize(pattern: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = pattern;

    'outer: while !rest.is_empty() {
        for (token, component) in TOKENS {
            if let Some(remaining) = rest.strip_prefix(token) {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Component(*component));
                rest = remaining;
                continue 'outer;
            }
        }

        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            literal.push(c);
        }
        rest = chars.as_str();
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }

    segments
}

/// Finds a separator character embedded between two components that differs
/// from the divider
fn embedded_separator(segments: &[Segment], divider: char) -> Option<char> {
    segments.windows(3).find_map(|triple| match triple {
        [Segment::Component(_), Segment::Literal(text), Segment::Component(_)] => text
            .chars()
            .find(|c| SEPARATORS.contains(c) && *c != divider),
        _ => None,
    })
}

fn render_component(component: DateComponent, date: NaiveDate) -> String {
    let weekday = WEEKDAYS[date.weekday().num_days_from_monday() as usize];
    let month = MONTHS[date.month0() as usize];

    match component {
        DateComponent::Day => date.day().to_string(),
        DateComponent::DayPadded => format!("{:02}", date.day()),
        DateComponent::WeekdayShort => weekday[..3].to_string(),
        DateComponent::WeekdayLong => weekday.to_string(),
        DateComponent::Month => date.month().to_string(),
        DateComponent::MonthPadded => format!("{:02}", date.month()),
        DateComponent::MonthShort => month[..3].to_string(),
        DateComponent::MonthLong => month.to_string(),
        DateComponent::YearShort => format!("{:02}", date.year().rem_euclid(100)),
        DateComponent::YearLong => format!("{:04}", date.year()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_iso_pattern_with_matching_divider() {
        let spec = DateFormatSpec::parse("yyyy-mm-dd", Some("-")).unwrap();
        assert_eq!(spec.render(date(2025, 3, 7)), "2025-03-07");
    }

    #[test]
    fn test_long_form_pattern() {
        let spec = DateFormatSpec::parse("dddd, mmmm d, yyyy", None).unwrap();
        assert_eq!(spec.render(date(2025, 3, 7)), "Friday, March 7, 2025");
    }

    #[test]
    fn test_long_tokens_are_not_split() {
        let spec = DateFormatSpec::parse("dddd", None).unwrap();
        assert_eq!(spec.render(date(2024, 2, 29)), "Thursday");

        let spec = DateFormatSpec::parse("ddd mmm", None).unwrap();
        assert_eq!(spec.render(date(2025, 3, 7)), "Fri Mar");
    }

    #[test]
    fn test_short_year_and_unpadded_values() {
        let spec = DateFormatSpec::parse("m/d/yy", None).unwrap();
        assert_eq!(spec.render(date(2005, 1, 9)), "1/9/05");
    }

    #[test]
    fn test_divider_inserted_between_adjacent_components() {
        let spec = DateFormatSpec::parse("yyyymmdd", Some("/")).unwrap();
        assert_eq!(spec.render(date(2025, 3, 7)), "2025/03/07");

        let spec = DateFormatSpec::parse("ddmm", Some(" ")).unwrap();
        assert_eq!(spec.render(date(2025, 3, 7)), "07 03");
    }

    #[test]
    fn test_divider_not_duplicated_over_embedded_separator() {
        let spec = DateFormatSpec::parse("yyyy-mmdd", Some("-")).unwrap();
        assert_eq!(spec.render(date(2025, 3, 7)), "2025-03-07");

        let spec = DateFormatSpec::parse("dd/mm/yyyy", Some("/")).unwrap();
        assert_eq!(spec.render(date(2025, 3, 7)), "07/03/2025");
    }

    #[test]
    fn test_embedded_separators_win_without_adjacency() {
        // Nothing is adjacent, so the divider never applies
        let spec = DateFormatSpec::parse("dd/mm/yyyy", Some("-")).unwrap();
        assert_eq!(spec.render(date(2025, 3, 7)), "07/03/2025");
    }

    #[test]
    fn test_conflicting_divider_is_rejected() {
        let err = DateFormatSpec::parse("yyyy/mmdd", Some("-")).unwrap_err();
        assert_eq!(
            err,
            DateFormatError::DividerConflict {
                pattern: "yyyy/mmdd".to_string(),
                embedded: '/',
                divider: '-',
            }
        );
    }

    #[test]
    fn test_invalid_divider() {
        assert_eq!(
            DateFormatSpec::parse("yyyy", Some(".")).unwrap_err(),
            DateFormatError::InvalidDivider(".".to_string())
        );
        assert_eq!(
            DateFormatSpec::parse("yyyy", Some("--")).unwrap_err(),
            DateFormatError::InvalidDivider("--".to_string())
        );
    }

    #[test]
    fn test_pattern_without_components() {
        assert_eq!(
            DateFormatSpec::parse("Soon!", None).unwrap_err(),
            DateFormatError::NoComponents("Soon!".to_string())
        );
        assert_eq!(
            DateFormatSpec::parse("   ", None).unwrap_err(),
            DateFormatError::EmptyPattern
        );
    }

    #[test]
    fn test_literal_text_is_verbatim() {
        let spec = DateFormatSpec::parse("Airs mmmm d!", None).unwrap();
        assert_eq!(spec.render(date(2025, 12, 31)), "Airs December 31!");
    }

    #[test]
    fn test_empty_divider_means_none() {
        let spec = DateFormatSpec::parse("yyyymmdd", Some("")).unwrap();
        assert_eq!(spec.render(date(2025, 3, 7)), "20250307");
    }
}
