use chrono::{Duration, Utc};
use netwatch_common::types::{Alert, AlertStatus};
use netwatch_storage::AlertStore;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::AlertError;

/// Alert counts over a trailing window, grouped by severity and status.
#[derive(Debug, Clone, Serialize)]
pub struct AlertStatistics {
    pub window_days: i64,
    pub total: u64,
    pub by_severity: HashMap<String, u64>,
    pub by_status: HashMap<String, u64>,
}

/// Owns the alert state machine: `triggered → acknowledged → resolved`,
/// with `triggered → resolved` allowed directly. `resolved` is terminal.
pub struct Lifecycle {
    store: Arc<dyn AlertStore>,
}

impl Lifecycle {
    pub fn new(store: Arc<dyn AlertStore>) -> Self {
        Self { store }
    }

    /// Marks a triggered alert as acknowledged.
    ///
    /// Only legal from `triggered`; acknowledging an already-acknowledged or
    /// resolved alert is rejected without mutating state.
    pub async fn acknowledge(&self, alert_id: &str, by: &str) -> Result<Alert, AlertError> {
        let mut alert = self.load(alert_id).await?;
        match alert.status {
            AlertStatus::Triggered => {
                alert.status = AlertStatus::Acknowledged;
                alert.acknowledged_at = Some(Utc::now());
                alert.acknowledged_by = Some(by.to_string());
                self.persist(&alert).await?;
                tracing::info!(alert_id = %alert.id, by = %by, "Alert acknowledged");
                Ok(alert)
            }
            status => Err(AlertError::InvalidState {
                action: "acknowledge",
                status,
            }),
        }
    }

    /// Resolves an alert from `triggered` or `acknowledged`.
    ///
    /// Resolving an already-resolved alert is an idempotent no-op that
    /// returns the stored record unchanged.
    pub async fn resolve(&self, alert_id: &str) -> Result<Alert, AlertError> {
        let mut alert = self.load(alert_id).await?;
        if alert.status == AlertStatus::Resolved {
            return Ok(alert);
        }
        alert.status = AlertStatus::Resolved;
        alert.resolved_at = Some(Utc::now());
        self.persist(&alert).await?;
        tracing::info!(alert_id = %alert.id, "Alert resolved");
        Ok(alert)
    }

    /// Bulk-resolves open alerts triggered more than `older_than_hours` ago,
    /// regardless of whether the underlying condition cleared. A safety net
    /// against orphaned open alerts. Returns the number resolved.
    pub async fn resolve_stale(&self, older_than_hours: i64) -> Result<u64, AlertError> {
        let cutoff = Utc::now() - Duration::hours(older_than_hours);
        let stale = self.store.unresolved_older_than(cutoff).await?;
        let mut resolved = 0u64;

        for mut alert in stale {
            alert.status = AlertStatus::Resolved;
            alert.resolved_at = Some(Utc::now());
            match self.store.update_alert(&alert).await {
                Ok(true) => resolved += 1,
                Ok(false) => {
                    tracing::warn!(alert_id = %alert.id, "Stale alert vanished before resolve")
                }
                Err(e) => {
                    tracing::error!(alert_id = %alert.id, error = %e, "Failed to resolve stale alert")
                }
            }
        }

        if resolved > 0 {
            tracing::info!(count = resolved, older_than_hours, "Resolved stale alerts");
        }
        Ok(resolved)
    }

    /// Alert counts within the trailing `days` window.
    pub async fn statistics(&self, days: i64) -> Result<AlertStatistics, AlertError> {
        let since = Utc::now() - Duration::days(days);
        let alerts = self.store.alerts_since(since).await?;

        let mut by_severity: HashMap<String, u64> = HashMap::new();
        let mut by_status: HashMap<String, u64> = HashMap::new();
        for alert in &alerts {
            *by_severity.entry(alert.severity.to_string()).or_default() += 1;
            *by_status.entry(alert.status.to_string()).or_default() += 1;
        }

        Ok(AlertStatistics {
            window_days: days,
            total: alerts.len() as u64,
            by_severity,
            by_status,
        })
    }

    async fn load(&self, alert_id: &str) -> Result<Alert, AlertError> {
        self.store
            .get_alert(alert_id)
            .await?
            .ok_or_else(|| AlertError::NotFound(alert_id.to_string()))
    }

    async fn persist(&self, alert: &Alert) -> Result<(), AlertError> {
        if !self.store.update_alert(alert).await? {
            return Err(AlertError::NotFound(alert.id.clone()));
        }
        Ok(())
    }
}
