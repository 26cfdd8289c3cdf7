//! Top-level run driver: wires the source, store, engine and notifiers for
//! one observation, and turns outcomes into operator alerts.

use std::thread;

use crate::{
    normalize_candidate, AlertFanout, CandidateSource, CommandAlerter, DecisionEngine,
    LogNotifier, Notifier, RunReport, Settings, SqliteStore, WatchError, WatchResult,
    WebhookAlerter, WebhookNotifier, WikipediaSource,
};

pub(crate) const NEW_OLDEST_SUBJECT: &str = "New oldest person";
pub(crate) const RUN_FAILED_SUBJECT: &str = "oldest-watch run failed";

pub(crate) struct Runner {
    settings: Settings,
    engine: DecisionEngine,
    source: Box<dyn CandidateSource>,
    notifier: Box<dyn Notifier>,
    alerts: AlertFanout,
}

pub(crate) fn build_notifier(settings: &Settings) -> Box<dyn Notifier> {
    match &settings.announce_webhook {
        Some(url) => Box::new(WebhookNotifier::new(
            url.clone(),
            settings.announce_channel,
            settings.http_timeout,
        )),
        None => Box::new(LogNotifier),
    }
}

pub(crate) fn build_alerts(settings: &Settings) -> AlertFanout {
    let mut alerts = AlertFanout::default();
    if let Some(url) = &settings.alert_webhook {
        alerts.push(Box::new(WebhookAlerter::new(
            url.clone(),
            settings.alert_channel,
            settings.http_timeout,
        )));
    }
    if let Some(to) = &settings.alert_email_to {
        match CommandAlerter::new(
            &settings.alert_command,
            to.clone(),
            settings.alert_email_from.clone(),
        ) {
            Ok(alerter) => alerts.push(Box::new(alerter)),
            Err(err) => tracing::warn!(error = %err, "email alerts disabled"),
        }
    }
    alerts
}

impl Runner {
    pub(crate) fn from_settings(settings: Settings) -> Self {
        let source = Box::new(WikipediaSource::new(
            settings.source_url.clone(),
            settings.http_timeout,
        ));
        let notifier = build_notifier(&settings);
        let alerts = build_alerts(&settings);
        if alerts.is_empty() {
            tracing::debug!("no operator alert destination configured");
        }
        Self::new(settings, source, notifier, alerts)
    }

    pub(crate) fn new(
        settings: Settings,
        source: Box<dyn CandidateSource>,
        notifier: Box<dyn Notifier>,
        alerts: AlertFanout,
    ) -> Self {
        let engine = DecisionEngine::new(settings.threshold);
        Self {
            settings,
            engine,
            source,
            notifier,
            alerts,
        }
    }

    /// Fetch, normalise and decide. The store is opened here and closed on
    /// every exit path when it drops. Dry runs only ever read it.
    fn observe(&self, dry_run: bool) -> WatchResult<RunReport> {
        let raw = self.source.fetch_candidate()?;
        let candidate = normalize_candidate(raw, &self.settings.source_url)?;
        let report = if dry_run {
            let store = SqliteStore::open_read_only(&self.settings.db_path)?;
            self.engine.preview(&candidate, &store)?
        } else {
            let store = SqliteStore::open_or_create(&self.settings.db_path)?;
            self.engine.run(&candidate, &store, self.notifier.as_ref())?
        };
        Ok(report)
    }

    /// One run. Fatal errors are logged and alerted, then returned.
    pub(crate) fn run_once(&self, dry_run: bool) -> WatchResult<RunReport> {
        match self.observe(dry_run) {
            Ok(report) => {
                if let Some(announcement) = &report.announcement {
                    let mut body = announcement.message.clone();
                    if let Some(err) = &announcement.notification_error {
                        body.push_str(&format!("\n\nPublic announcement failed: {err}"));
                    }
                    self.alerts.send(NEW_OLDEST_SUBJECT, &body);
                }
                Ok(report)
            }
            Err(err) => {
                tracing::error!(kind = err.kind(), error = %err, "run failed");
                self.alerts
                    .send(RUN_FAILED_SUBJECT, &format!("{} error: {err}", err.kind()));
                Err(err)
            }
        }
    }

    /// Run every poll interval. A failed cycle does not stop the loop; the
    /// next cycle is the retry. `max_runs == 0` means forever.
    pub(crate) fn watch(&self, max_runs: u64) -> Vec<Result<RunReport, WatchError>> {
        let mut results = Vec::new();
        let mut cycle = 0u64;
        loop {
            cycle += 1;
            tracing::info!(cycle, "starting observation run");
            let result = self.run_once(false);
            if max_runs != 0 {
                results.push(result);
                if cycle >= max_runs {
                    return results;
                }
            }
            thread::sleep(self.settings.poll_interval);
        }
    }
}
