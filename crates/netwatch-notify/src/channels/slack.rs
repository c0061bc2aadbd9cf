use async_trait::async_trait;
use netwatch_common::types::Alert;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{NotifyError, Result};
use crate::utils::{truncate_string, MAX_DETAIL_LENGTH};
use crate::Notifier;

#[derive(Deserialize)]
struct SlackConfig {
    webhook_url: String,
}

/// Chat-webhook delivery in Slack's incoming-webhook payload format.
pub struct SlackNotifier {
    client: reqwest::Client,
}

impl SlackNotifier {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    fn parse_config(config: &Value) -> Result<SlackConfig> {
        serde_json::from_value(config.clone())
            .map_err(|e| NotifyError::InvalidConfig(format!("slack: {e}")))
    }

    fn format_text(alert: &Alert) -> String {
        format!(
            ":rotating_light: *[{severity}] {host}*\n\
             > {message}\n\
             *Rule*: {rule}  |  *Status*: {status}  |  *Time*: {time}",
            severity = alert.severity,
            host = alert.host_id,
            message = alert.message,
            rule = alert.rule_id,
            status = alert.status,
            time = alert.triggered_at.to_rfc3339(),
        )
    }
}

impl Default for SlackNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    fn channel_type(&self) -> &str {
        "slack"
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        Self::parse_config(config).map(|_| ())
    }

    async fn send(&self, alert: &Alert, config: &Value) -> Result<()> {
        let cfg = Self::parse_config(config)?;
        let payload = serde_json::json!({
            "text": Self::format_text(alert),
        });

        let mut last_err = None;
        for attempt in 0..3u32 {
            match self
                .client
                .post(&cfg.webhook_url)
                .json(&payload)
                .send()
                .await
            {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(());
                    }
                    let body = resp
                        .text()
                        .await
                        .unwrap_or_else(|_| "[failed to read response body]".to_string());
                    tracing::warn!(
                        attempt = attempt + 1,
                        status = %status,
                        "Slack webhook returned non-success status, retrying"
                    );
                    last_err = Some(NotifyError::Api {
                        service: "slack",
                        status: status.as_u16(),
                        body: truncate_string(&body, MAX_DETAIL_LENGTH),
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        error = %e,
                        "Slack webhook request failed, retrying"
                    );
                    last_err = Some(e.into());
                }
            }
            if attempt < 2 {
                tokio::time::sleep(std::time::Duration::from_millis(100 * 2u64.pow(attempt)))
                    .await;
            }
        }

        let err = last_err.unwrap_or_else(|| NotifyError::Delivery("slack: no attempt made".into()));
        tracing::error!(error = %err, "Slack notification failed after 3 attempts");
        Err(err)
    }
}
