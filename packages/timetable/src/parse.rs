//! Cell-level parsing: weekdays, time ranges and exam dates.

use std::sync::LazyLock;

use chrono::{NaiveDateTime, Weekday};
use regex::Regex;

/// First `...day` token in a cell.
static DAY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z]{3,6}day)").unwrap_or_else(|_| unreachable!()));

/// `HH:MM - HH:MM`, 24-hour.
static TIME_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([012][0-9]:[0-9]{2}) - ([012][0-9]:[0-9]{2})").unwrap_or_else(|_| unreachable!())
});

/// Weekday names as printed by the English site.
const WEEKDAYS: [(&str, Weekday); 7] = [
    ("Sunday", Weekday::Sun),
    ("Monday", Weekday::Mon),
    ("Tuesday", Weekday::Tue),
    ("Wednesday", Weekday::Wed),
    ("Thursday", Weekday::Thu),
    ("Friday", Weekday::Fri),
    ("Saturday", Weekday::Sat),
];

/// Long-form exam date, e.g. `"December 10, 2015 9:00 AM"`.
pub const EXAM_DATE_FORMAT: &str = "%B %d, %Y %I:%M %p";

/// Session labels containing this marker are in Eastern Standard time.
pub const FALL_MARKER: &str = "Fall";

/// Eastern Daylight correction, in seconds.
pub const EDT_OFFSET_SECS: i64 = 4 * 60 * 60;

/// Eastern Standard correction, in seconds.
pub const EST_OFFSET_SECS: i64 = 5 * 60 * 60;

/// Why a day cell could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayError {
    /// No `...day` token at all.
    Missing,
    /// A `...day` token that is not a weekday name.
    Unknown(String),
}

/// Finds the first weekday token in `text`.
///
/// # Errors
///
/// Returns [`DayError`] if there is no token or the token is not one of the
/// seven English weekday names (case-sensitive).
pub fn parse_weekday(text: &str) -> Result<Weekday, DayError> {
    let token = DAY_RE
        .captures(text)
        .map(|caps| caps[1].to_owned())
        .ok_or(DayError::Missing)?;

    WEEKDAYS
        .iter()
        .find(|(name, _)| *name == token)
        .map(|(_, day)| *day)
        .ok_or(DayError::Unknown(token))
}

/// Extracts the start and end times from a cell, as printed.
#[must_use]
pub fn parse_time_range(text: &str) -> Option<(String, String)> {
    TIME_RANGE_RE
        .captures(text)
        .map(|caps| (caps[1].to_owned(), caps[2].to_owned()))
}

/// Fixed correction for an exam session: `+5h` for fall sessions, `+4h`
/// otherwise.
#[must_use]
pub fn timezone_offset(session_label: &str) -> i64 {
    if session_label.contains(FALL_MARKER) {
        EST_OFFSET_SECS
    } else {
        EDT_OFFSET_SECS
    }
}

/// Converts a long-form exam date to Unix epoch seconds.
///
/// The wall-clock time is read as if it were UTC and then shifted by
/// [`timezone_offset`] for the session.
#[must_use]
pub fn parse_exam_date(text: &str, session_label: &str) -> Option<i64> {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let naive = NaiveDateTime::parse_from_str(&normalized, EXAM_DATE_FORMAT).ok()?;
    Some(naive.and_utc().timestamp() + timezone_offset(session_label))
}
