use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use netwatch_common::types::Alert;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{NotifyError, Result};
use crate::Notifier;

#[derive(Deserialize)]
struct EmailConfig {
    smtp_host: String,
    smtp_port: u16,
    smtp_username: Option<String>,
    smtp_password: Option<String>,
    from: String,
    recipients: Vec<String>,
}

/// SMTP delivery. Each recipient is attempted up to three times with
/// exponential backoff before being reported as failed.
pub struct EmailNotifier;

impl EmailNotifier {
    pub fn new() -> Self {
        Self
    }

    fn parse_config(config: &Value) -> Result<EmailConfig> {
        serde_json::from_value(config.clone())
            .map_err(|e| NotifyError::InvalidConfig(format!("email: {e}")))
    }

    fn format_subject(alert: &Alert) -> String {
        format!(
            "[netwatch][{}] {} - {}",
            alert.severity, alert.rule_id, alert.host_id
        )
    }

    fn format_body(alert: &Alert) -> String {
        format!(
            "Alert: {severity}\nRule: {rule}\nHost: {host}\nStatus: {status}\nMessage: {message}\nTime: {time}",
            severity = alert.severity,
            rule = alert.rule_id,
            host = alert.host_id,
            status = alert.status,
            message = alert.message,
            time = alert.triggered_at,
        )
    }
}

impl Default for EmailNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn channel_type(&self) -> &str {
        "email"
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        let cfg = Self::parse_config(config)?;
        if cfg.recipients.is_empty() {
            return Err(NotifyError::InvalidConfig(
                "email: recipients must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    async fn send(&self, alert: &Alert, config: &Value) -> Result<()> {
        let cfg = Self::parse_config(config)?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.smtp_host)
            .map_err(|e| NotifyError::Smtp(e.to_string()))?
            .port(cfg.smtp_port);
        if let (Some(user), Some(pass)) = (&cfg.smtp_username, &cfg.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        let transport = builder.build();

        let subject = Self::format_subject(alert);
        let body = Self::format_body(alert);
        let from: Mailbox = cfg
            .from
            .parse()
            .map_err(|e| NotifyError::InvalidConfig(format!("email: bad from address: {e}")))?;

        let mut failed = Vec::new();
        for recipient in &cfg.recipients {
            let to = match recipient.parse() {
                Ok(to) => to,
                Err(e) => {
                    tracing::error!(recipient = %recipient, error = %e, "Bad recipient address");
                    failed.push(recipient.clone());
                    continue;
                }
            };
            let email = Message::builder()
                .from(from.clone())
                .to(to)
                .subject(subject.clone())
                .header(ContentType::TEXT_PLAIN)
                .body(body.clone())
                .map_err(|e| NotifyError::Smtp(e.to_string()))?;

            let mut last_err = None;
            for attempt in 0..3u32 {
                match transport.send(email.clone()).await {
                    Ok(_) => {
                        last_err = None;
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(
                            attempt = attempt + 1,
                            recipient = %recipient,
                            error = %e,
                            "Email send failed, retrying"
                        );
                        last_err = Some(e);
                        if attempt < 2 {
                            tokio::time::sleep(std::time::Duration::from_millis(
                                100 * 2u64.pow(attempt),
                            ))
                            .await;
                        }
                    }
                }
            }

            if let Some(e) = last_err {
                tracing::error!(recipient = %recipient, error = %e, "Email send failed after 3 attempts");
                failed.push(recipient.clone());
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(NotifyError::Delivery(format!(
                "email: {} of {} recipients failed: {}",
                failed.len(),
                cfg.recipients.len(),
                failed.join(", ")
            )))
        }
    }
}
