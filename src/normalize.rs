use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate};
use regex::Regex;

use crate::{Candidate, ParseError, RawCandidate};

/// Source pages write birth dates as `2 January 1908`.
const BIRTH_DATE_FORMAT: &str = "%d %B %Y";

static ANNOTATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\(.*?\)|\[.*?\]").expect("annotation regex"));
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Parse `<day> <full month name> <year>` as UTC midnight of that date.
pub(crate) fn parse_birth_date(raw: &str) -> Result<i64, ParseError> {
    let trimmed = raw.trim();
    let date = NaiveDate::parse_from_str(trimmed, BIRTH_DATE_FORMAT).map_err(|e| ParseError {
        raw: raw.to_string(),
        reason: e.to_string(),
    })?;
    let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(|| ParseError {
        raw: raw.to_string(),
        reason: "no midnight for date".to_string(),
    })?;
    let epoch = midnight.and_utc().timestamp();
    tracing::debug!(raw = trimmed, epoch, "parsed birth date");
    Ok(epoch)
}

/// Render an epoch the way the source writes dates. Out-of-range values fall
/// back to the bare number.
pub(crate) fn format_birth_date(epoch: i64) -> String {
    match DateTime::from_timestamp(epoch, 0) {
        Some(dt) => dt.format("%-d %B %Y").to_string(),
        None => epoch.to_string(),
    }
}

/// Turn an extracted row into a candidate keyed by its birth-date epoch.
pub(crate) fn normalize_candidate(
    raw: RawCandidate,
    fallback_link: &str,
) -> Result<Candidate, ParseError> {
    let birth_date_epoch = parse_birth_date(&raw.birth_date_raw)?;
    Ok(Candidate {
        name: raw.name,
        country: raw.country,
        birth_date_raw: raw.birth_date_raw,
        birth_date_epoch,
        profile_link: raw
            .profile_link
            .unwrap_or_else(|| fallback_link.to_string()),
    })
}

/// Strip `(...)` and `[...]` annotations: `Kane Tanaka[3]` -> `Kane Tanaka`.
pub(crate) fn clean_person_name(name: &str) -> String {
    let stripped = ANNOTATION_RE.replace_all(name, "");
    WHITESPACE_RE.replace_all(&stripped, " ").trim().to_string()
}
