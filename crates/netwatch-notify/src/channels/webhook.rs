use async_trait::async_trait;
use netwatch_common::types::Alert;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{NotifyError, Result};
use crate::utils::{truncate_string, MAX_DETAIL_LENGTH};
use crate::Notifier;

#[derive(Deserialize)]
struct WebhookConfig {
    url: String,
    body_template: Option<String>,
}

/// Generic webhook delivery: POSTs a JSON body to the configured URL.
///
/// The body is either the default JSON rendering of the alert or the
/// configured `body_template` with `{{placeholder}}` substitution.
pub struct WebhookNotifier {
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    fn parse_config(config: &Value) -> Result<WebhookConfig> {
        serde_json::from_value(config.clone())
            .map_err(|e| NotifyError::InvalidConfig(format!("webhook: {e}")))
    }

    pub(crate) fn render_body(template: Option<&str>, alert: &Alert) -> String {
        match template {
            Some(template) => template
                .replace("{{alert_id}}", &alert.id)
                .replace("{{rule_id}}", &alert.rule_id)
                .replace("{{host_id}}", &alert.host_id)
                .replace("{{severity}}", &alert.severity.to_string())
                .replace("{{status}}", &alert.status.to_string())
                .replace("{{message}}", &alert.message)
                .replace("{{triggered_at}}", &alert.triggered_at.to_rfc3339()),
            None => serde_json::json!({
                "alert_id": alert.id,
                "rule_id": alert.rule_id,
                "host_id": alert.host_id,
                "severity": alert.severity.to_string(),
                "status": alert.status.to_string(),
                "message": alert.message,
                "triggered_at": alert.triggered_at.to_rfc3339(),
            })
            .to_string(),
        }
    }
}

impl Default for WebhookNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn channel_type(&self) -> &str {
        "webhook"
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        Self::parse_config(config).map(|_| ())
    }

    async fn send(&self, alert: &Alert, config: &Value) -> Result<()> {
        let cfg = Self::parse_config(config)?;
        let body = Self::render_body(cfg.body_template.as_deref(), alert);

        let mut last_err = None;
        for attempt in 0..3u32 {
            match self
                .client
                .post(&cfg.url)
                .header("Content-Type", "application/json")
                .body(body.clone())
                .send()
                .await
            {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(());
                    }
                    let resp_body = resp
                        .text()
                        .await
                        .unwrap_or_else(|_| "[failed to read response body]".to_string());
                    tracing::warn!(
                        attempt = attempt + 1,
                        status = %status,
                        "Webhook returned non-success status, retrying"
                    );
                    last_err = Some(NotifyError::Api {
                        service: "webhook",
                        status: status.as_u16(),
                        body: truncate_string(&resp_body, MAX_DETAIL_LENGTH),
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        error = %e,
                        "Webhook request failed, retrying"
                    );
                    last_err = Some(e.into());
                }
            }
            if attempt < 2 {
                tokio::time::sleep(std::time::Duration::from_millis(100 * 2u64.pow(attempt)))
                    .await;
            }
        }

        let err =
            last_err.unwrap_or_else(|| NotifyError::Delivery("webhook: no attempt made".into()));
        tracing::error!(error = %err, "Webhook notification failed after 3 attempts");
        Err(err)
    }
}
