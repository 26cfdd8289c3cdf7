use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{env_optional, ConfigError, WebhookChannel, DEFAULT_SOURCE_URL, DEFAULT_THRESHOLD};

pub(crate) const DEFAULT_DB_FILE: &str = "oldest-watch.sqlite";
pub(crate) const DEFAULT_POLL_MINUTES: u64 = 30;
pub(crate) const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub(crate) const DEFAULT_ALERT_COMMAND: &str = "himalaya template send";

/// On-disk JSON config. Every field is optional; absent fields keep defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub(crate) struct FileConfig {
    #[serde(default)]
    pub(crate) db_path: Option<PathBuf>,
    #[serde(default)]
    pub(crate) source_url: Option<String>,
    #[serde(default)]
    pub(crate) threshold: Option<u32>,
    #[serde(default)]
    pub(crate) poll_interval_minutes: Option<u64>,
    #[serde(default)]
    pub(crate) http_timeout_secs: Option<u64>,
    #[serde(default)]
    pub(crate) announce: Option<WebhookConfig>,
    #[serde(default)]
    pub(crate) alerts: Option<AlertConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub(crate) struct WebhookConfig {
    #[serde(default)]
    pub(crate) webhook_url: Option<String>,
    #[serde(default)]
    pub(crate) channel: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub(crate) struct AlertConfig {
    #[serde(default)]
    pub(crate) webhook_url: Option<String>,
    #[serde(default)]
    pub(crate) channel: Option<String>,
    #[serde(default)]
    pub(crate) email_to: Option<String>,
    #[serde(default)]
    pub(crate) email_from: Option<String>,
    #[serde(default)]
    pub(crate) command: Option<String>,
}

/// Fully resolved settings for one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Settings {
    pub(crate) db_path: PathBuf,
    pub(crate) source_url: String,
    pub(crate) threshold: u32,
    pub(crate) poll_interval: Duration,
    pub(crate) http_timeout: Duration,
    pub(crate) announce_webhook: Option<String>,
    pub(crate) announce_channel: WebhookChannel,
    pub(crate) alert_webhook: Option<String>,
    pub(crate) alert_channel: WebhookChannel,
    pub(crate) alert_email_to: Option<String>,
    pub(crate) alert_email_from: Option<String>,
    pub(crate) alert_command: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_FILE),
            source_url: DEFAULT_SOURCE_URL.to_string(),
            threshold: DEFAULT_THRESHOLD,
            poll_interval: Duration::from_secs(DEFAULT_POLL_MINUTES * 60),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            announce_webhook: None,
            announce_channel: WebhookChannel::Slack,
            alert_webhook: None,
            alert_channel: WebhookChannel::Slack,
            alert_email_to: None,
            alert_email_from: None,
            alert_command: DEFAULT_ALERT_COMMAND.to_string(),
        }
    }
}

/// Missing file means defaults; an unreadable or malformed one is an error.
pub(crate) fn load_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(FileConfig::default()),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_str(&data).map_err(|source| ConfigError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_channel(key: &'static str, value: Option<String>) -> Result<Option<WebhookChannel>, ConfigError> {
    match value {
        None => Ok(None),
        Some(v) => WebhookChannel::parse(&v)
            .map(Some)
            .ok_or(ConfigError::Invalid { key, value: v }),
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: Option<String>) -> Result<Option<T>, ConfigError> {
    match value {
        None => Ok(None),
        Some(v) => v
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: v }),
    }
}

/// At least one minute, and small enough to count in seconds.
pub(crate) fn poll_interval_from_minutes(
    key: &'static str,
    minutes: u64,
) -> Result<Duration, ConfigError> {
    match minutes.checked_mul(60) {
        Some(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::Invalid {
            key,
            value: minutes.to_string(),
        }),
    }
}

impl Settings {
    /// Defaults, then the config file, then `OLDEST_*` environment variables.
    pub(crate) fn resolve(file: FileConfig) -> Result<Self, ConfigError> {
        Self::resolve_with(file, env_optional)
    }

    pub(crate) fn resolve_with(
        file: FileConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut s = Settings::default();
        let announce = file.announce.unwrap_or_default();
        let alerts = file.alerts.unwrap_or_default();

        if let Some(v) = env("OLDEST_DB_PATH").map(PathBuf::from).or(file.db_path) {
            s.db_path = v;
        }
        if let Some(v) = env("OLDEST_SOURCE_URL").or(file.source_url) {
            s.source_url = v;
        }
        if let Some(v) = parse_number::<u32>("OLDEST_THRESHOLD", env("OLDEST_THRESHOLD"))?
            .or(file.threshold)
        {
            s.threshold = v;
        }
        let poll = parse_number::<u64>("OLDEST_POLL_MINUTES", env("OLDEST_POLL_MINUTES"))?
            .or(file.poll_interval_minutes)
            .unwrap_or(DEFAULT_POLL_MINUTES);
        let timeout = parse_number::<u64>("OLDEST_HTTP_TIMEOUT_SECS", env("OLDEST_HTTP_TIMEOUT_SECS"))?
            .or(file.http_timeout_secs)
            .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);

        s.announce_webhook = env("OLDEST_ANNOUNCE_WEBHOOK_URL").or(announce.webhook_url);
        if let Some(c) = parse_channel(
            "OLDEST_ANNOUNCE_CHANNEL",
            env("OLDEST_ANNOUNCE_CHANNEL").or(announce.channel),
        )? {
            s.announce_channel = c;
        }
        s.alert_webhook = env("OLDEST_ALERT_WEBHOOK_URL").or(alerts.webhook_url);
        if let Some(c) = parse_channel(
            "OLDEST_ALERT_CHANNEL",
            env("OLDEST_ALERT_CHANNEL").or(alerts.channel),
        )? {
            s.alert_channel = c;
        }
        s.alert_email_to = env("OLDEST_ALERT_EMAIL_TO").or(alerts.email_to);
        s.alert_email_from = env("OLDEST_ALERT_EMAIL_FROM").or(alerts.email_from);
        if let Some(v) = env("OLDEST_ALERT_COMMAND").or(alerts.command) {
            s.alert_command = v;
        }

        if s.threshold == 0 {
            return Err(ConfigError::Invalid {
                key: "threshold",
                value: "0".into(),
            });
        }
        if timeout == 0 {
            return Err(ConfigError::Invalid {
                key: "http_timeout_secs",
                value: "0".into(),
            });
        }
        s.poll_interval = poll_interval_from_minutes("poll_interval_minutes", poll)?;
        s.http_timeout = Duration::from_secs(timeout);
        Ok(s)
    }
}
