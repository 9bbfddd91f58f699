// src/freshness.rs
//! Freshness gate: decides whether a newly written envelope really came from
//! this run. Rules are applied in order; the first violation wins.
//!
//! 1. new timestamp absent or empty → `MissingTimestamp`
//! 2. previous present and equal to new → `StaleReuse`
//! 3. new parses as ISO-8601 and is more than the window away from `now`
//!    (either direction) → `FreshnessWindowExceeded`
//!
//! A timestamp that does not parse skips rule 3.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

use crate::config::consts::FRESHNESS_WINDOW_SECS;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FreshnessError {
    #[error("fetched_at is missing")]
    MissingTimestamp,
    #[error("fetched_at unchanged ({fetched_at})")]
    StaleReuse { fetched_at: String },
    #[error("fetched_at {fetched_at} is {age_secs}s from now (window {window_secs}s)")]
    FreshnessWindowExceeded {
        fetched_at: String,
        age_secs: i64,
        window_secs: i64,
    },
}

/// Gate with the default 6 hour window.
pub fn check(
    previous: Option<&str>,
    new: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), FreshnessError> {
    check_within(previous, new, now, Duration::seconds(FRESHNESS_WINDOW_SECS))
}

pub fn check_within(
    previous: Option<&str>,
    new: Option<&str>,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<(), FreshnessError> {
    let new = match new {
        Some(ts) if !ts.is_empty() => ts,
        _ => return Err(FreshnessError::MissingTimestamp),
    };

    if let Some(prev) = previous {
        if !prev.is_empty() && prev == new {
            return Err(FreshnessError::StaleReuse { fetched_at: s!(new) });
        }
    }

    if let Some(parsed) = parse_timestamp(new) {
        let age = (now - parsed).abs();
        if age > window {
            return Err(FreshnessError::FreshnessWindowExceeded {
                fetched_at: s!(new),
                age_secs: age.num_seconds(),
                window_secs: window.num_seconds(),
            });
        }
    } else {
        logd!("fetched_at {new:?} is not ISO-8601; skipping window check");
    }

    Ok(())
}

/// RFC 3339 first, then the looser ISO-8601 shapes extraction scripts emit:
/// minute precision, basic offsets (`+0800`), a space separator, a bare
/// date. Offset-less forms are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    let zoned = match raw.strip_suffix(['Z', 'z']) {
        Some(head) => join!(head, "+00:00"),
        None => s!(raw),
    };
    let with_offset = OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(&zoned, fmt).ok());
    if let Some(dt) = with_offset {
        return Some(dt.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M%#z",
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%Y-%m-%d %H:%M%#z",
];

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];
