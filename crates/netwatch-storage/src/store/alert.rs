use chrono::{DateTime, Utc};
use netwatch_common::types::{Alert, AlertStatus, Severity};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, QueryFilter, QueryOrder,
};

use crate::entities::alert::{self, Column, Entity};
use crate::error::{Result, StorageError};
use crate::store::SqlStore;

fn to_domain(m: alert::Model) -> Result<Alert> {
    let severity = m.severity.parse().map_err(|detail| StorageError::Decode {
        column: "severity",
        detail,
    })?;
    let status = m.status.parse().map_err(|detail| StorageError::Decode {
        column: "status",
        detail,
    })?;
    let observed_state = m
        .observed_state
        .as_deref()
        .map(str::parse)
        .transpose()
        .map_err(|detail| StorageError::Decode {
            column: "observed_state",
            detail,
        })?;
    Ok(Alert {
        id: m.id,
        rule_id: m.rule_id,
        host_id: m.host_id,
        severity,
        message: m.message,
        status,
        triggered_at: m.triggered_at.with_timezone(&Utc),
        acknowledged_at: m.acknowledged_at.map(|t| t.with_timezone(&Utc)),
        acknowledged_by: m.acknowledged_by,
        resolved_at: m.resolved_at.map(|t| t.with_timezone(&Utc)),
        observed_state,
    })
}

fn to_active(alert: &Alert) -> alert::ActiveModel {
    alert::ActiveModel {
        id: Set(alert.id.clone()),
        rule_id: Set(alert.rule_id.clone()),
        host_id: Set(alert.host_id.clone()),
        severity: Set(alert.severity.to_string()),
        message: Set(alert.message.clone()),
        status: Set(alert.status.to_string()),
        triggered_at: Set(alert.triggered_at.fixed_offset()),
        acknowledged_at: Set(alert.acknowledged_at.map(|t| t.fixed_offset())),
        acknowledged_by: Set(alert.acknowledged_by.clone()),
        resolved_at: Set(alert.resolved_at.map(|t| t.fixed_offset())),
        observed_state: Set(alert.observed_state.map(|s| s.to_string())),
    }
}

impl SqlStore {
    pub async fn insert_alert(&self, alert: &Alert) -> Result<()> {
        to_active(alert).insert(self.db()).await?;
        Ok(())
    }

    pub async fn get_alert(&self, id: &str) -> Result<Option<Alert>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        model.map(to_domain).transpose()
    }

    pub async fn update_alert(&self, alert: &Alert) -> Result<bool> {
        let existing = Entity::find_by_id(alert.id.as_str()).one(self.db()).await?;
        if existing.is_none() {
            return Ok(false);
        }
        to_active(alert).update(self.db()).await?;
        Ok(true)
    }

    pub async fn most_recent_alert(&self, rule_id: &str, host_id: &str) -> Result<Option<Alert>> {
        let model = Entity::find()
            .filter(Column::RuleId.eq(rule_id))
            .filter(Column::HostId.eq(host_id))
            .order_by(Column::TriggeredAt, Order::Desc)
            .one(self.db())
            .await?;
        model.map(to_domain).transpose()
    }

    pub async fn active_alerts(
        &self,
        severity: Option<Severity>,
        host_id: Option<&str>,
    ) -> Result<Vec<Alert>> {
        let mut q = Entity::find().filter(Column::Status.ne(AlertStatus::Resolved.to_string()));
        if let Some(sev) = severity {
            q = q.filter(Column::Severity.eq(sev.to_string()));
        }
        if let Some(host) = host_id {
            q = q.filter(Column::HostId.eq(host));
        }
        let rows = q
            .order_by(Column::TriggeredAt, Order::Desc)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_domain).collect()
    }

    pub async fn alerts_since(&self, since: DateTime<Utc>) -> Result<Vec<Alert>> {
        let rows = Entity::find()
            .filter(Column::TriggeredAt.gte(since.fixed_offset()))
            .order_by(Column::TriggeredAt, Order::Desc)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_domain).collect()
    }

    pub async fn unresolved_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<Alert>> {
        let rows = Entity::find()
            .filter(Column::Status.ne(AlertStatus::Resolved.to_string()))
            .filter(Column::TriggeredAt.lt(cutoff.fixed_offset()))
            .order_by(Column::TriggeredAt, Order::Asc)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_domain).collect()
    }
}
