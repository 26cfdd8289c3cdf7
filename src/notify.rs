use std::io::Write;
use std::process::Stdio;
use std::time::Duration;

use crate::{build_external_command, NotificationError};

/// Public announcement channel for a new oldest person.
pub(crate) trait Notifier {
    fn announce(&self, message: &str) -> Result<(), NotificationError>;
}

/// Operator-facing alert channel (run failures, new announcements).
pub(crate) trait Alerter {
    fn alert(&self, subject: &str, body: &str) -> Result<(), NotificationError>;
}

// ── Webhooks ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WebhookChannel {
    Slack,
    Discord,
    Teams,
}

impl WebhookChannel {
    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "slack" => Some(Self::Slack),
            "discord" => Some(Self::Discord),
            "teams" => Some(Self::Teams),
            _ => None,
        }
    }

    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Slack => "slack",
            Self::Discord => "discord",
            Self::Teams => "teams",
        }
    }

    pub(crate) fn payload(&self, text: &str) -> serde_json::Value {
        match self {
            Self::Discord => serde_json::json!({ "content": text }),
            Self::Slack | Self::Teams => serde_json::json!({ "text": text }),
        }
    }
}

fn post_webhook(
    agent: &ureq::Agent,
    url: &str,
    channel: WebhookChannel,
    text: &str,
) -> Result<(), NotificationError> {
    let response = agent
        .post(url)
        .set("content-type", "application/json")
        .send_json(channel.payload(text));
    match response {
        Ok(_) => Ok(()),
        Err(ureq::Error::Status(status, _)) => Err(NotificationError::Status {
            channel: channel.as_str().to_string(),
            status,
        }),
        Err(ureq::Error::Transport(err)) => Err(NotificationError::Transport {
            channel: channel.as_str().to_string(),
            reason: err.to_string(),
        }),
    }
}

fn webhook_agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(timeout)
        .timeout_read(timeout)
        .timeout_write(timeout)
        .build()
}

pub(crate) struct WebhookNotifier {
    agent: ureq::Agent,
    url: String,
    channel: WebhookChannel,
}

impl WebhookNotifier {
    pub(crate) fn new(url: String, channel: WebhookChannel, timeout: Duration) -> Self {
        Self {
            agent: webhook_agent(timeout),
            url,
            channel,
        }
    }
}

impl Notifier for WebhookNotifier {
    fn announce(&self, message: &str) -> Result<(), NotificationError> {
        post_webhook(&self.agent, &self.url, self.channel, message)?;
        tracing::info!(channel = self.channel.as_str(), "announcement posted");
        Ok(())
    }
}

/// Used when no public channel is configured: the message only reaches the log.
pub(crate) struct LogNotifier;

impl Notifier for LogNotifier {
    fn announce(&self, message: &str) -> Result<(), NotificationError> {
        tracing::info!(message, "announcement (no public channel configured)");
        Ok(())
    }
}

pub(crate) struct WebhookAlerter {
    agent: ureq::Agent,
    url: String,
    channel: WebhookChannel,
}

impl WebhookAlerter {
    pub(crate) fn new(url: String, channel: WebhookChannel, timeout: Duration) -> Self {
        Self {
            agent: webhook_agent(timeout),
            url,
            channel,
        }
    }
}

impl Alerter for WebhookAlerter {
    fn alert(&self, subject: &str, body: &str) -> Result<(), NotificationError> {
        let text = format!("*{subject}*\n{body}");
        post_webhook(&self.agent, &self.url, self.channel, &text)
    }
}

// ── Mail command ─────────────────────────────────────────────────────────

/// Pipes a plain-text message with headers into a mail command's stdin,
/// `himalaya template send` by default.
pub(crate) struct CommandAlerter {
    command: Vec<String>,
    to: String,
    from: Option<String>,
}

impl CommandAlerter {
    pub(crate) fn new(command: &str, to: String, from: Option<String>) -> Result<Self, String> {
        let command = shlex::split(command).ok_or("malformed alert command (unmatched quotes)")?;
        if command.is_empty() {
            return Err("alert command is empty".into());
        }
        Ok(Self { command, to, from })
    }

    pub(crate) fn render(&self, subject: &str, body: &str) -> String {
        let mut template = String::new();
        if let Some(from) = &self.from {
            template.push_str(&format!("From: {from}\n"));
        }
        template.push_str(&format!("To: {}\n", self.to));
        template.push_str(&format!("Subject: {subject}\n"));
        template.push('\n');
        template.push_str(body);
        template.push('\n');
        template
    }
}

impl Alerter for CommandAlerter {
    fn alert(&self, subject: &str, body: &str) -> Result<(), NotificationError> {
        let template = self.render(subject, body);
        let mut cmd = build_external_command(&self.command[0], &self.command[1..]);
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| NotificationError::Command(format!("{}: {e}", self.command[0])))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(template.as_bytes())
                .map_err(|e| NotificationError::Command(format!("send stdin: {e}")))?;
        }
        let output = child
            .wait_with_output()
            .map_err(|e| NotificationError::Command(format!("send output: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(NotificationError::Command(stderr));
        }
        Ok(())
    }
}

// ── Fan-out ──────────────────────────────────────────────────────────────

/// Sends every alert to all configured destinations. With none configured,
/// alerting is a no-op.
#[derive(Default)]
pub(crate) struct AlertFanout {
    targets: Vec<Box<dyn Alerter>>,
}

impl AlertFanout {
    pub(crate) fn push(&mut self, target: Box<dyn Alerter>) {
        self.targets.push(target);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Best-effort: failures are logged and never propagate.
    pub(crate) fn send(&self, subject: &str, body: &str) {
        for target in &self.targets {
            if let Err(err) = target.alert(subject, body) {
                tracing::warn!(error = %err, subject, "operator alert failed");
            }
        }
    }
}
