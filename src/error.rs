use std::path::PathBuf;

use thiserror::Error;

/// Result alias for a single observation run.
pub(crate) type WatchResult<T> = std::result::Result<T, WatchError>;

/// The source page could not be turned into a candidate.
#[derive(Debug, Error)]
pub(crate) enum ExtractionError {
    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },

    #[error("transport error fetching {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("no table with class 'wikitable' on the source page")]
    MissingTable,

    #[error("source table has no '{0}' column")]
    MissingColumn(&'static str),

    #[error("source table has no data rows")]
    EmptyTable,
}

/// Birth-date text did not match `<day> <month name> <year>`.
#[derive(Debug, Error)]
#[error("unparseable birth date {raw:?}: {reason}")]
pub(crate) struct ParseError {
    pub(crate) raw: String,
    pub(crate) reason: String,
}

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("could not prepare store directory {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("birth date {0} is already recorded")]
    Duplicate(i64),

    #[error("birth date {0} has no history row")]
    UnknownBirthdate(i64),

    #[error("birth date {0} is already announced")]
    AlreadyAnnounced(i64),

    /// The notifier was already called for this birth date but the
    /// announced flag could not be written, so the next run will repeat it.
    #[error("announcement for {birth_date_epoch} was attempted but not recorded ({source}); message: {message}")]
    AnnouncedUnrecorded {
        birth_date_epoch: i64,
        message: String,
        source: Box<StoreError>,
    },
}

#[derive(Debug, Error)]
pub(crate) enum NotificationError {
    #[error("{channel} webhook returned HTTP {status}")]
    Status { channel: String, status: u16 },

    #[error("{channel} transport error: {reason}")]
    Transport { channel: String, reason: String },

    #[error("alert command failed: {0}")]
    Command(String),
}

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed config {path}: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Every fatal outcome of a run. Notification failures are never fatal to
/// the decision engine; they only surface here from the alerting path.
#[derive(Debug, Error)]
pub(crate) enum WatchError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Notification(#[from] NotificationError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl WatchError {
    /// Short label used in operator alerts and log fields.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Extraction(_) => "extraction",
            Self::Parse(_) => "parse",
            Self::Store(_) => "store",
            Self::Notification(_) => "notification",
            Self::Config(_) => "config",
        }
    }
}

