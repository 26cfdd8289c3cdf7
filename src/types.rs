use serde::Serialize;

/// Fixed fallback when the record holder's own page cannot be linked.
pub(crate) const DEFAULT_SOURCE_URL: &str =
    "https://en.wikipedia.org/wiki/List_of_the_oldest_living_people";

// ── Candidate ────────────────────────────────────────────────────────────

/// The top row of the current source snapshot, after normalisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct Candidate {
    /// Display name as scraped; may still carry `[3]` or `(née ...)` annotations.
    pub(crate) name: String,
    pub(crate) country: String,
    pub(crate) birth_date_raw: String,
    pub(crate) birth_date_epoch: i64,
    pub(crate) profile_link: String,
}

/// A candidate as extracted, before its birth date has been parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct RawCandidate {
    pub(crate) name: String,
    pub(crate) country: String,
    pub(crate) birth_date_raw: String,
    pub(crate) profile_link: Option<String>,
}

// ── KnownBirthdate ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct KnownBirthdate {
    pub(crate) birth_date_epoch: i64,
    pub(crate) times_seen: u32,
    pub(crate) tweeted: bool,
}

// ── Decision ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub(crate) enum Decision {
    /// First sighting: a new row with `times_seen = 1`.
    Record,
    /// Older than a birth date that was already announced.
    SkipSuspectedVandalism { youngest_announced: i64 },
    /// Already announced; the record holder is unchanged.
    SteadyState,
    /// Seen before but not yet trusted; `times_seen` goes up by one.
    Accumulate { times_seen: u32 },
    /// Confirmed often enough: announce, then mark as announced.
    Announce { times_seen: u32 },
}

impl Decision {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            Self::Record => "record",
            Self::SkipSuspectedVandalism { .. } => "skip_suspected_vandalism",
            Self::SteadyState => "steady_state",
            Self::Accumulate { .. } => "accumulate",
            Self::Announce { .. } => "announce",
        }
    }
}

// ── Run results ──────────────────────────────────────────────────────────

/// Emitted once, on the run that announces a new oldest person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct Announcement {
    pub(crate) birth_date_epoch: i64,
    pub(crate) message: String,
    /// Transport failure of the public announcement, if any. The birth date
    /// is marked announced either way.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) notification_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum RunStatus {
    Ok,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct RunReport {
    pub(crate) status: RunStatus,
    pub(crate) birth_date_epoch: i64,
    pub(crate) decision: Decision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) announcement: Option<Announcement>,
    /// True when the decision was computed but nothing was written or sent.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub(crate) dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_row_json_shape() {
        let row = KnownBirthdate {
            birth_date_epoch: -1_956_528_000,
            times_seen: 12,
            tweeted: true,
        };
        assert_eq!(
            serde_json::to_value(row).unwrap(),
            serde_json::json!({ "birth_date_epoch": -1_956_528_000i64, "times_seen": 12, "tweeted": true })
        );
    }

    #[test]
    fn test_report_omits_empty_fields() {
        let report = RunReport {
            status: RunStatus::Ok,
            birth_date_epoch: 5,
            decision: Decision::Accumulate { times_seen: 2 },
            announcement: None,
            dry_run: false,
        };
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            serde_json::json!({
                "status": "ok",
                "birth_date_epoch": 5,
                "decision": { "action": "accumulate", "times_seen": 2 }
            })
        );
    }
}
