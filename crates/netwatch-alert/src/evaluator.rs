use chrono::{DateTime, Utc};
use netwatch_common::types::{
    Alert, AlertMute, AlertRule, AlertStatus, CompareOp, DeviceState, RuleKind,
};
use netwatch_storage::AlertStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::error::EvalError;
use crate::MetricSource;

/// Key: (rule_id, host_id)
type PairKey = (String, String);

/// Evaluates the rule set against current readings, applying mute and
/// cooldown suppression.
///
/// The evaluator keeps two per-(rule, host) indexes in memory: the last
/// trigger time (cooldown fast path) and the last observed device state
/// (edge detection for status-change rules). Both fall back to the most
/// recent persisted alert, so suppression survives a restart.
pub struct RuleEvaluator {
    store: Arc<dyn AlertStore>,
    source: Arc<dyn MetricSource>,
    source_timeout: Duration,
    last_triggered: HashMap<PairKey, DateTime<Utc>>,
    last_state: HashMap<PairKey, DeviceState>,
}

impl RuleEvaluator {
    pub fn new(
        store: Arc<dyn AlertStore>,
        source: Arc<dyn MetricSource>,
        source_timeout: Duration,
    ) -> Self {
        Self {
            store,
            source,
            source_timeout,
            last_triggered: HashMap::new(),
            last_state: HashMap::new(),
        }
    }

    /// Runs one evaluation pass over `rules` × `hosts` at time `now`.
    ///
    /// Returns the alerts that fired, in no particular order. The returned
    /// alerts are not yet persisted; the caller owns the
    /// persist-then-dispatch sequencing.
    pub async fn evaluate_all(
        &mut self,
        rules: &[AlertRule],
        hosts: &[String],
        now: DateTime<Utc>,
    ) -> Result<Vec<Alert>, EvalError> {
        let mutes = self.store.active_mutes(now).await?;
        let mut alerts = Vec::new();

        for snapshot in rules {
            // The store is shared with external writers; re-read each rule
            // so an edit or disable that lands mid-pass takes effect.
            let Some(rule) = self.reread(snapshot).await else {
                continue;
            };

            for host in hosts {
                if !rule.applies_to(host) {
                    continue;
                }
                if let Some(alert) = self.evaluate_one(&rule, host, &mutes, now).await {
                    alerts.push(alert);
                }
            }
        }

        Ok(alerts)
    }

    async fn reread(&self, snapshot: &AlertRule) -> Option<AlertRule> {
        match self.store.get_rule(&snapshot.id).await {
            Ok(Some(rule)) if rule.enabled => Some(rule),
            Ok(Some(_)) => {
                tracing::debug!(rule_id = %snapshot.id, "Rule disabled mid-pass, skipping");
                None
            }
            Ok(None) => {
                tracing::debug!(rule_id = %snapshot.id, "Rule deleted mid-pass, skipping");
                None
            }
            Err(e) => {
                tracing::warn!(rule_id = %snapshot.id, error = %e, "Failed to re-read rule, skipping");
                None
            }
        }
    }

    async fn evaluate_one(
        &mut self,
        rule: &AlertRule,
        host: &str,
        mutes: &[AlertMute],
        now: DateTime<Utc>,
    ) -> Option<Alert> {
        if mutes.iter().any(|m| m.matches(&rule.id, host)) {
            tracing::debug!(rule_id = %rule.id, host_id = %host, "Alert suppressed (muted)");
            return None;
        }

        if self.in_cooldown(rule, host, now).await {
            tracing::debug!(rule_id = %rule.id, host_id = %host, "Alert suppressed (cooldown)");
            return None;
        }

        let fired = match &rule.kind {
            RuleKind::Threshold {
                metric_name,
                condition,
                threshold,
            } => {
                self.evaluate_threshold(rule, host, metric_name, *condition, *threshold, now)
                    .await
            }
            RuleKind::StatusChange => self.evaluate_status_change(rule, host, now).await,
        };

        if let Some(alert) = &fired {
            self.last_triggered
                .insert((rule.id.clone(), host.to_string()), now);
            tracing::info!(
                rule_id = %rule.id,
                host_id = %host,
                severity = %alert.severity,
                "Alert triggered"
            );
        }

        fired
    }

    /// True when the most recent trigger for this (rule, host) pair is
    /// within the rule's cooldown window. A storage failure during the
    /// fallback lookup suppresses the unit: skipping one pass is cheaper
    /// than a duplicate trigger.
    async fn in_cooldown(&mut self, rule: &AlertRule, host: &str, now: DateTime<Utc>) -> bool {
        if rule.cooldown_minutes <= 0 {
            return false;
        }
        let key = (rule.id.clone(), host.to_string());

        let last = match self.last_triggered.get(&key) {
            Some(t) => Some(*t),
            None => match self.store.most_recent_alert(&rule.id, host).await {
                Ok(Some(alert)) => {
                    self.last_triggered.insert(key, alert.triggered_at);
                    Some(alert.triggered_at)
                }
                Ok(None) => None,
                Err(e) => {
                    tracing::warn!(
                        rule_id = %rule.id,
                        host_id = %host,
                        error = %e,
                        "Cooldown lookup failed, suppressing this pass"
                    );
                    return true;
                }
            },
        };

        match last {
            Some(t) => now - t < rule.cooldown(),
            None => false,
        }
    }

    async fn evaluate_threshold(
        &self,
        rule: &AlertRule,
        host: &str,
        metric_name: &str,
        condition: CompareOp,
        threshold: f64,
        now: DateTime<Utc>,
    ) -> Option<Alert> {
        let value = match timeout(
            self.source_timeout,
            self.source.latest_value(host, metric_name),
        )
        .await
        {
            Ok(Ok(Some(value))) => value,
            Ok(Ok(None)) => {
                tracing::debug!(host_id = %host, metric = %metric_name, "No reading, rule does not fire");
                return None;
            }
            Ok(Err(e)) => {
                tracing::warn!(host_id = %host, metric = %metric_name, error = %e, "Metric read failed");
                return None;
            }
            Err(_) => {
                tracing::warn!(host_id = %host, metric = %metric_name, "Metric read timed out");
                return None;
            }
        };

        if !condition.check(value, threshold) {
            return None;
        }

        let message = format!(
            "{metric_name} is {value:.1} on {host} ({} {threshold:.1})",
            condition.describe(),
        );
        Some(self.build_alert(rule, host, message, None, now))
    }

    /// Edge-triggered: fires only when the observed state differs from the
    /// previously recorded one. The first observation establishes the
    /// baseline without firing, and an unknown state neither fires nor
    /// moves the baseline.
    async fn evaluate_status_change(
        &mut self,
        rule: &AlertRule,
        host: &str,
        now: DateTime<Utc>,
    ) -> Option<Alert> {
        let state = match timeout(self.source_timeout, self.source.current_state(host)).await {
            Ok(Ok(Some(state))) => state,
            Ok(Ok(None)) => {
                tracing::debug!(host_id = %host, "Device state unknown, rule does not fire");
                return None;
            }
            Ok(Err(e)) => {
                tracing::warn!(host_id = %host, error = %e, "Device state read failed");
                return None;
            }
            Err(_) => {
                tracing::warn!(host_id = %host, "Device state read timed out");
                return None;
            }
        };

        let key = (rule.id.clone(), host.to_string());
        let prior = match self.last_state.get(&key) {
            Some(s) => Some(*s),
            None => match self.store.most_recent_alert(&rule.id, host).await {
                Ok(Some(alert)) => alert.observed_state,
                Ok(None) => None,
                Err(e) => {
                    tracing::warn!(rule_id = %rule.id, host_id = %host, error = %e,
                        "Prior state lookup failed, recording baseline without firing");
                    None
                }
            },
        };

        self.last_state.insert(key, state);

        match prior {
            Some(p) if p != state => {
                let message = match state {
                    DeviceState::Offline => format!("{host} went offline"),
                    DeviceState::Online => format!("{host} came back online"),
                };
                Some(self.build_alert(rule, host, message, Some(state), now))
            }
            _ => None,
        }
    }

    fn build_alert(
        &self,
        rule: &AlertRule,
        host: &str,
        message: String,
        observed_state: Option<DeviceState>,
        now: DateTime<Utc>,
    ) -> Alert {
        Alert {
            id: netwatch_common::id::next_id(),
            rule_id: rule.id.clone(),
            host_id: host.to_string(),
            severity: rule.severity,
            message,
            status: AlertStatus::Triggered,
            triggered_at: now,
            acknowledged_at: None,
            acknowledged_by: None,
            resolved_at: None,
            observed_state,
        }
    }
}
