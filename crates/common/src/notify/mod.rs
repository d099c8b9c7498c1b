//! Outbound account notifications
//!
//! Delivery is always fire-and-forget: [`dispatch`] spawns the send and only
//! logs a failure. Backends:
//! - `log`: writes the message (including codes) to the log, for development
//! - `webhook`: POSTs a JSON envelope to a mail relay

use crate::config::NotifierConfig;
use crate::errors::{AppError, Result};
use crate::lifecycle::VerificationStatus;
use crate::metrics;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    EmailOtp {
        name: String,
        otp: String,
        expires_in_minutes: i64,
    },
    PasswordReset {
        name: String,
        otp: String,
        expires_in_minutes: i64,
    },
    VerificationStatus {
        name: String,
        status: VerificationStatus,
        reason: Option<String>,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::EmailOtp { .. } => "email_otp",
            Notification::PasswordReset { .. } => "password_reset",
            Notification::VerificationStatus { .. } => "verification_status",
        }
    }

    pub fn subject(&self) -> String {
        match self {
            Notification::EmailOtp { .. } => "Verify your IntelliLib email".to_string(),
            Notification::PasswordReset { .. } => "Reset your IntelliLib password".to_string(),
            Notification::VerificationStatus { .. } => {
                "IntelliLib Researcher Verification Update".to_string()
            }
        }
    }

    pub fn body(&self) -> String {
        match self {
            Notification::EmailOtp {
                name,
                otp,
                expires_in_minutes,
            } => format!(
                "Hello {},\n\nYour verification code is {}. It expires in {} minutes.",
                name, otp, expires_in_minutes
            ),
            Notification::PasswordReset {
                name,
                otp,
                expires_in_minutes,
            } => format!(
                "Hello {},\n\nYour password reset code is {}. It expires in {} minutes. \
                 If you did not request a reset you can ignore this message.",
                name, otp, expires_in_minutes
            ),
            Notification::VerificationStatus {
                name,
                status,
                reason,
            } => {
                let message = match status {
                    VerificationStatus::Approved => "Congratulations! Your researcher verification has been approved. You now have full access to all researcher features.".to_string(),
                    VerificationStatus::Rejected => format!(
                        "Unfortunately, your verification request was not approved.{} You can submit a new verification request with updated documents.",
                        reason.as_deref().map(|r| format!(" Reason: {}", r)).unwrap_or_default()
                    ),
                    _ => "Your verification request is currently being reviewed by our admin team. We will notify you once a decision has been made.".to_string(),
                };
                format!("Hello {},\n\n{}", name, message)
            }
        }
    }
}

/// Trait for notification delivery
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: &str, notification: &Notification) -> Result<()>;
}

/// Writes notifications to the log instead of delivering them
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, recipient: &str, notification: &Notification) -> Result<()> {
        info!(
            to = recipient,
            kind = notification.kind(),
            subject = %notification.subject(),
            body = %notification.body(),
            "Notification (log delivery)"
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct WebhookMessage<'a> {
    from: String,
    to: &'a str,
    subject: String,
    text: String,
    notification: &'a Notification,
}

/// POSTs each notification to a relay endpoint
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    from: String,
}

impl WebhookNotifier {
    pub fn new(url: String, config: &NotifierConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create notifier client: {}", e),
            })?;

        Ok(Self {
            client,
            url,
            from: format!("\"{}\" <{}>", config.from_name, config.from_address),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, recipient: &str, notification: &Notification) -> Result<()> {
        let message = WebhookMessage {
            from: self.from.clone(),
            to: recipient,
            subject: notification.subject(),
            text: notification.body(),
            notification,
        };

        let response = self.client.post(&self.url).json(&message).send().await?;
        if !response.status().is_success() {
            return Err(AppError::UpstreamUnavailable {
                service: "notifier".to_string(),
                message: format!("relay returned {}", response.status()),
            });
        }
        Ok(())
    }
}

/// Keeps every notification in memory, for tests
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, Notification)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(String, Notification)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Wait until at least `count` notifications arrived or `timeout` passed
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<(String, Notification)> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let sent = self.sent();
            if sent.len() >= count || tokio::time::Instant::now() >= deadline {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, recipient: &str, notification: &Notification) -> Result<()> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((recipient.to_string(), notification.clone()));
        }
        Ok(())
    }
}

/// Send in the background. Failures are logged and counted, never returned.
pub fn dispatch(notifier: Arc<dyn Notifier>, recipient: String, notification: Notification) {
    tokio::spawn(async move {
        if let Err(e) = notifier.send(&recipient, &notification).await {
            metrics::record_notification_failure(notification.kind());
            warn!(
                to = %recipient,
                kind = notification.kind(),
                error = %e,
                "Failed to deliver notification"
            );
        }
    });
}

/// Create a notifier based on configuration
pub fn create_notifier(config: &NotifierConfig) -> Result<Arc<dyn Notifier>> {
    match config.kind.as_str() {
        "webhook" => {
            let url = config
                .webhook_url
                .clone()
                .ok_or_else(|| AppError::Configuration {
                    message: "notifier.webhook_url is required for the webhook notifier".to_string(),
                })?;
            Ok(Arc::new(WebhookNotifier::new(url, config)?))
        }
        "log" => Ok(Arc::new(LogNotifier)),
        other => {
            warn!(kind = other, "Unknown notifier kind, using log delivery");
            Ok(Arc::new(LogNotifier))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_body_carries_reason() {
        let n = Notification::VerificationStatus {
            name: "Ada".into(),
            status: VerificationStatus::Rejected,
            reason: Some("ID unclear".into()),
        };
        assert!(n.body().contains("Reason: ID unclear"));
        assert_eq!(n.kind(), "verification_status");
    }

    #[test]
    fn test_webhook_requires_url() {
        let config = NotifierConfig {
            kind: "webhook".into(),
            webhook_url: None,
            ..Default::default()
        };
        assert!(create_notifier(&config).is_err());
    }

    #[tokio::test]
    async fn test_dispatch_reaches_notifier() {
        let recorder = Arc::new(RecordingNotifier::new());
        dispatch(
            recorder.clone(),
            "a@x.org".into(),
            Notification::EmailOtp {
                name: "A".into(),
                otp: "123456".into(),
                expires_in_minutes: 10,
            },
        );

        let sent = recorder.wait_for(1, Duration::from_secs(1)).await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "a@x.org");
    }
}
