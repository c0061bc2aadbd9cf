use chrono::{DateTime, Duration, Utc};
use netwatch_alert::evaluator::RuleEvaluator;
use netwatch_alert::lifecycle::{AlertStatistics, Lifecycle};
use netwatch_alert::MetricSource;
use netwatch_common::types::{
    Alert, AlertMute, AlertRule, NotificationChannel, RuleKind, Severity,
};
use netwatch_notify::dispatcher::{DispatchOutcome, Dispatcher};
use netwatch_notify::registry::NotifierRegistry;
use netwatch_notify::utils::redact_sensitive_json;
use netwatch_storage::{AlertStore, DispatchRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::config::ManagerConfig;
use crate::error::ManagerError;

/// A newly fired alert together with its per-channel dispatch outcomes,
/// returned from [`AlertManager::evaluate`] so callers can log delivery
/// failures without the pass itself erroring.
#[derive(Debug, Clone, Serialize)]
pub struct TriggeredAlert {
    pub alert: Alert,
    pub outcomes: HashMap<String, DispatchOutcome>,
}

/// Input for creating or updating a rule.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleParams {
    pub name: String,
    pub kind: RuleKind,
    pub severity: Severity,
    pub cooldown_minutes: i64,
    #[serde(default)]
    pub notification_channels: Vec<String>,
    #[serde(default)]
    pub host_scope: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Input for creating a notification channel.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelParams {
    pub name: String,
    pub channel_type: String,
    pub config: serde_json::Value,
    #[serde(default)]
    pub min_severity: Option<Severity>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Input for creating a mute.
#[derive(Debug, Clone, Deserialize)]
pub struct MuteParams {
    #[serde(default)]
    pub rule_id: Option<String>,
    #[serde(default)]
    pub host_id: Option<String>,
    pub muted_by: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

fn default_enabled() -> bool {
    true
}

/// The single entry point for schedulers and management surfaces.
///
/// Composes the rule evaluator, alert lifecycle, and notification
/// dispatcher over a shared store and metric source. Evaluation passes are
/// serialized: a pass in progress blocks [`evaluate`](Self::evaluate) and
/// makes [`try_evaluate`](Self::try_evaluate) skip.
pub struct AlertManager {
    store: Arc<dyn AlertStore>,
    source: Arc<dyn MetricSource>,
    registry: Arc<NotifierRegistry>,
    dispatcher: Dispatcher,
    lifecycle: Lifecycle,
    evaluator: Mutex<RuleEvaluator>,
    config: ManagerConfig,
}

impl AlertManager {
    pub fn new(
        store: Arc<dyn AlertStore>,
        source: Arc<dyn MetricSource>,
        registry: Arc<NotifierRegistry>,
        config: ManagerConfig,
    ) -> Self {
        let source_timeout = std::time::Duration::from_secs(config.source_timeout_secs);
        let dispatcher = Dispatcher::new(
            store.clone(),
            registry.clone(),
            config.dispatch_max_concurrent,
            std::time::Duration::from_secs(config.dispatch_timeout_secs),
        );
        let evaluator = Mutex::new(RuleEvaluator::new(
            store.clone(),
            source.clone(),
            source_timeout,
        ));
        let lifecycle = Lifecycle::new(store.clone());
        Self {
            store,
            source,
            registry,
            dispatcher,
            lifecycle,
            evaluator,
            config,
        }
    }

    // ---- Evaluation ----

    /// Runs one evaluation pass, blocking if another pass is in progress.
    pub async fn evaluate(&self) -> Result<Vec<TriggeredAlert>, ManagerError> {
        let mut evaluator = self.evaluator.lock().await;
        self.run_pass(&mut evaluator).await
    }

    /// Runs one evaluation pass unless another is already in progress, in
    /// which case the tick is skipped and `None` returned.
    pub async fn try_evaluate(&self) -> Result<Option<Vec<TriggeredAlert>>, ManagerError> {
        match self.evaluator.try_lock() {
            Ok(mut evaluator) => self.run_pass(&mut evaluator).await.map(Some),
            Err(_) => {
                tracing::info!("Evaluation pass already in progress, skipping tick");
                Ok(None)
            }
        }
    }

    async fn run_pass(
        &self,
        evaluator: &mut RuleEvaluator,
    ) -> Result<Vec<TriggeredAlert>, ManagerError> {
        let now = Utc::now();

        let rules = self
            .store
            .list_rules(true)
            .await
            .map_err(|e| ManagerError::FatalPass(format!("failed to load rule set: {e}")))?;
        if rules.is_empty() {
            tracing::debug!("No enabled rules, pass is a no-op");
            return Ok(Vec::new());
        }

        let source_timeout = std::time::Duration::from_secs(self.config.source_timeout_secs);
        let hosts = match timeout(source_timeout, self.source.hosts()).await {
            Ok(Ok(hosts)) => hosts,
            Ok(Err(e)) => {
                return Err(ManagerError::FatalPass(format!(
                    "failed to load host roster: {e}"
                )))
            }
            Err(_) => {
                return Err(ManagerError::FatalPass(
                    "host roster lookup timed out".to_string(),
                ))
            }
        };

        let fired = evaluator
            .evaluate_all(&rules, &hosts, now)
            .await
            .map_err(|e| ManagerError::FatalPass(e.to_string()))?;

        let mut results = Vec::new();
        for alert in fired {
            // Persist before dispatch: a crash mid-dispatch must leave a
            // recoverable triggered alert, never a notified-but-lost one.
            if let Err(e) = self.store.insert_alert(&alert).await {
                tracing::error!(
                    alert_id = %alert.id,
                    rule_id = %alert.rule_id,
                    error = %e,
                    "Failed to persist alert, skipping its dispatch"
                );
                continue;
            }

            let Some(rule) = rules.iter().find(|r| r.id == alert.rule_id) else {
                continue;
            };
            let outcomes = self.dispatcher.dispatch(&alert, rule).await;
            self.log_outcomes(&alert, &outcomes).await;
            results.push(TriggeredAlert { alert, outcomes });
        }

        tracing::info!(
            rules = rules.len(),
            hosts = hosts.len(),
            triggered = results.len(),
            "Evaluation pass complete"
        );
        Ok(results)
    }

    async fn log_outcomes(&self, alert: &Alert, outcomes: &HashMap<String, DispatchOutcome>) {
        for outcome in outcomes.values() {
            let record = DispatchRecord {
                id: netwatch_common::id::next_id(),
                alert_id: alert.id.clone(),
                channel_id: outcome.channel_id.clone(),
                channel_name: outcome.channel_name.clone(),
                channel_type: outcome.channel_type.clone(),
                success: outcome.success,
                detail: outcome.detail.clone(),
                duration_ms: outcome.duration_ms as i64,
                created_at: Utc::now(),
            };
            if let Err(e) = self.store.insert_dispatch_record(&record).await {
                tracing::error!(alert_id = %alert.id, error = %e, "Failed to record dispatch outcome");
            }
        }
    }

    // ---- Rule management ----

    pub async fn create_rule(&self, params: RuleParams) -> Result<AlertRule, ManagerError> {
        self.validate_rule(&params).await?;
        let now = Utc::now();
        let rule = AlertRule {
            id: netwatch_common::id::next_id(),
            name: params.name,
            kind: params.kind,
            severity: params.severity,
            cooldown_minutes: params.cooldown_minutes,
            notification_channels: params.notification_channels,
            host_scope: params.host_scope,
            enabled: params.enabled,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_rule(&rule).await?;
        tracing::info!(rule_id = %rule.id, name = %rule.name, "Rule created");
        Ok(rule)
    }

    pub async fn get_rule(&self, id: &str) -> Result<Option<AlertRule>, ManagerError> {
        Ok(self.store.get_rule(id).await?)
    }

    pub async fn list_rules(&self, enabled_only: bool) -> Result<Vec<AlertRule>, ManagerError> {
        Ok(self.store.list_rules(enabled_only).await?)
    }

    pub async fn update_rule(
        &self,
        id: &str,
        params: RuleParams,
    ) -> Result<AlertRule, ManagerError> {
        self.validate_rule(&params).await?;
        let existing = self
            .store
            .get_rule(id)
            .await?
            .ok_or_else(|| ManagerError::Configuration(format!("unknown rule id: {id}")))?;
        let rule = AlertRule {
            id: existing.id,
            name: params.name,
            kind: params.kind,
            severity: params.severity,
            cooldown_minutes: params.cooldown_minutes,
            notification_channels: params.notification_channels,
            host_scope: params.host_scope,
            enabled: params.enabled,
            created_at: existing.created_at,
            updated_at: Utc::now(),
        };
        self.store.update_rule(&rule).await?;
        Ok(rule)
    }

    pub async fn enable_rule(&self, id: &str) -> Result<bool, ManagerError> {
        Ok(self.store.set_rule_enabled(id, true).await?)
    }

    pub async fn disable_rule(&self, id: &str) -> Result<bool, ManagerError> {
        Ok(self.store.set_rule_enabled(id, false).await?)
    }

    pub async fn delete_rule(&self, id: &str) -> Result<bool, ManagerError> {
        Ok(self.store.delete_rule(id).await?)
    }

    async fn validate_rule(&self, params: &RuleParams) -> Result<(), ManagerError> {
        if params.name.trim().is_empty() {
            return Err(ManagerError::Configuration(
                "rule name must not be blank".to_string(),
            ));
        }
        if params.cooldown_minutes < 0 {
            return Err(ManagerError::Configuration(
                "cooldown_minutes must not be negative".to_string(),
            ));
        }
        if let RuleKind::Threshold {
            metric_name,
            threshold,
            ..
        } = &params.kind
        {
            if metric_name.trim().is_empty() {
                return Err(ManagerError::Configuration(
                    "threshold rule requires a metric_name".to_string(),
                ));
            }
            if !threshold.is_finite() {
                return Err(ManagerError::Configuration(
                    "threshold must be a finite number".to_string(),
                ));
            }
        }
        for channel_id in &params.notification_channels {
            if self.store.get_channel(channel_id).await?.is_none() {
                return Err(ManagerError::Configuration(format!(
                    "unknown notification channel id: {channel_id}"
                )));
            }
        }
        Ok(())
    }

    // ---- Channel management ----

    pub async fn create_channel(
        &self,
        params: ChannelParams,
    ) -> Result<NotificationChannel, ManagerError> {
        if params.name.trim().is_empty() {
            return Err(ManagerError::Configuration(
                "channel name must not be blank".to_string(),
            ));
        }
        self.registry
            .validate_config(&params.channel_type, &params.config)
            .map_err(|e| ManagerError::Configuration(e.to_string()))?;

        let now = Utc::now();
        let channel = NotificationChannel {
            id: netwatch_common::id::next_id(),
            name: params.name,
            channel_type: params.channel_type,
            config: params.config,
            min_severity: params.min_severity,
            enabled: params.enabled,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_channel(&channel).await?;
        tracing::info!(channel_id = %channel.id, channel_type = %channel.channel_type, "Channel created");
        Ok(channel)
    }

    /// Lists channels with secrets redacted from their configs. The
    /// dispatcher reads unredacted configs straight from the store.
    pub async fn list_channels(
        &self,
        channel_type: Option<&str>,
        enabled: Option<bool>,
    ) -> Result<Vec<NotificationChannel>, ManagerError> {
        let mut channels = self.store.list_channels(channel_type, enabled).await?;
        for channel in &mut channels {
            channel.config = redact_sensitive_json(&channel.config);
        }
        Ok(channels)
    }

    pub async fn enable_channel(&self, id: &str) -> Result<bool, ManagerError> {
        Ok(self.store.set_channel_enabled(id, true).await?)
    }

    pub async fn disable_channel(&self, id: &str) -> Result<bool, ManagerError> {
        Ok(self.store.set_channel_enabled(id, false).await?)
    }

    pub async fn delete_channel(&self, id: &str) -> Result<bool, ManagerError> {
        Ok(self.store.delete_channel(id).await?)
    }

    // ---- Mute management ----

    pub async fn create_mute(&self, params: MuteParams) -> Result<AlertMute, ManagerError> {
        let now = Utc::now();
        if let Some(expires) = params.expires_at {
            if expires <= now {
                return Err(ManagerError::Configuration(
                    "mute expires_at must be in the future".to_string(),
                ));
            }
        }
        let mute = AlertMute {
            id: netwatch_common::id::next_id(),
            rule_id: params.rule_id,
            host_id: params.host_id,
            muted_by: params.muted_by,
            reason: params.reason,
            expires_at: params.expires_at,
            created_at: now,
        };
        self.store.insert_mute(&mute).await?;
        tracing::info!(
            mute_id = %mute.id,
            rule_id = mute.rule_id.as_deref().unwrap_or("*"),
            host_id = mute.host_id.as_deref().unwrap_or("*"),
            "Mute created"
        );
        Ok(mute)
    }

    pub async fn unmute(
        &self,
        rule_id: Option<&str>,
        host_id: Option<&str>,
    ) -> Result<u64, ManagerError> {
        Ok(self.store.delete_mutes_matching(rule_id, host_id).await?)
    }

    pub async fn list_active_mutes(&self) -> Result<Vec<AlertMute>, ManagerError> {
        Ok(self.store.active_mutes(Utc::now()).await?)
    }

    /// Deletes mutes whose expiry has passed. Expired mutes are already
    /// inert; this is housekeeping, not correctness.
    pub async fn cleanup_expired_mutes(&self) -> Result<u64, ManagerError> {
        let removed = self.store.delete_expired_mutes(Utc::now()).await?;
        if removed > 0 {
            tracing::info!(count = removed, "Cleaned up expired mutes");
        }
        Ok(removed)
    }

    // ---- Alert queries and lifecycle ----

    pub async fn get_alert(&self, id: &str) -> Result<Option<Alert>, ManagerError> {
        Ok(self.store.get_alert(id).await?)
    }

    pub async fn active_alerts(
        &self,
        severity: Option<Severity>,
        host_id: Option<&str>,
    ) -> Result<Vec<Alert>, ManagerError> {
        Ok(self.store.active_alerts(severity, host_id).await?)
    }

    pub async fn recent_alerts(&self, hours: i64) -> Result<Vec<Alert>, ManagerError> {
        let since = Utc::now() - Duration::hours(hours);
        Ok(self.store.alerts_since(since).await?)
    }

    pub async fn acknowledge(&self, alert_id: &str, by: &str) -> Result<Alert, ManagerError> {
        Ok(self.lifecycle.acknowledge(alert_id, by).await?)
    }

    pub async fn resolve(&self, alert_id: &str) -> Result<Alert, ManagerError> {
        Ok(self.lifecycle.resolve(alert_id).await?)
    }

    /// Bulk-resolves open alerts older than the cutoff; `None` uses the
    /// configured default.
    pub async fn resolve_stale(&self, older_than_hours: Option<i64>) -> Result<u64, ManagerError> {
        let hours = older_than_hours.unwrap_or(self.config.stale_resolve_hours);
        Ok(self.lifecycle.resolve_stale(hours).await?)
    }

    pub async fn statistics(&self, days: i64) -> Result<AlertStatistics, ManagerError> {
        Ok(self.lifecycle.statistics(days).await?)
    }
}
