use chrono::Utc;
use netwatch_common::types::{AlertRule, RuleKind};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, QueryFilter, QueryOrder,
};

use crate::entities::alert_rule::{self, Column, Entity};
use crate::error::{Result, StorageError};
use crate::store::SqlStore;

fn to_domain(m: alert_rule::Model) -> Result<AlertRule> {
    let kind = RuleKind::from_parts(&m.rule_type, &m.config_json)
        .map_err(|detail| StorageError::Decode {
            column: "config_json",
            detail,
        })?;
    let severity = m.severity.parse().map_err(|detail| StorageError::Decode {
        column: "severity",
        detail,
    })?;
    let notification_channels: Vec<String> = serde_json::from_str(&m.channels_json)?;
    Ok(AlertRule {
        id: m.id,
        name: m.name,
        kind,
        severity,
        cooldown_minutes: m.cooldown_minutes,
        notification_channels,
        host_scope: m.host_scope,
        enabled: m.enabled,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    })
}

fn to_active(rule: &AlertRule) -> Result<alert_rule::ActiveModel> {
    Ok(alert_rule::ActiveModel {
        id: Set(rule.id.clone()),
        name: Set(rule.name.clone()),
        rule_type: Set(rule.kind.name().to_string()),
        severity: Set(rule.severity.to_string()),
        cooldown_minutes: Set(rule.cooldown_minutes),
        channels_json: Set(serde_json::to_string(&rule.notification_channels)?),
        host_scope: Set(rule.host_scope.clone()),
        enabled: Set(rule.enabled),
        config_json: Set(rule.kind.params().to_string()),
        created_at: Set(rule.created_at.fixed_offset()),
        updated_at: Set(rule.updated_at.fixed_offset()),
    })
}

impl SqlStore {
    pub async fn insert_rule(&self, rule: &AlertRule) -> Result<()> {
        to_active(rule)?.insert(self.db()).await?;
        Ok(())
    }

    pub async fn get_rule(&self, id: &str) -> Result<Option<AlertRule>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        model.map(to_domain).transpose()
    }

    pub async fn list_rules(&self, enabled_only: bool) -> Result<Vec<AlertRule>> {
        let mut q = Entity::find();
        if enabled_only {
            q = q.filter(Column::Enabled.eq(true));
        }
        let rows = q.order_by(Column::CreatedAt, Order::Desc).all(self.db()).await?;
        rows.into_iter().map(to_domain).collect()
    }

    pub async fn update_rule(&self, rule: &AlertRule) -> Result<bool> {
        let existing = Entity::find_by_id(rule.id.as_str()).one(self.db()).await?;
        if existing.is_none() {
            return Ok(false);
        }
        let mut am = to_active(rule)?;
        am.updated_at = Set(Utc::now().fixed_offset());
        am.update(self.db()).await?;
        Ok(true)
    }

    pub async fn set_rule_enabled(&self, id: &str, enabled: bool) -> Result<bool> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        let Some(m) = model else {
            return Ok(false);
        };
        let mut am: alert_rule::ActiveModel = m.into();
        am.enabled = Set(enabled);
        am.updated_at = Set(Utc::now().fixed_offset());
        am.update(self.db()).await?;
        Ok(true)
    }

    pub async fn delete_rule(&self, id: &str) -> Result<bool> {
        let res = Entity::delete_by_id(id).exec(self.db()).await?;
        Ok(res.rows_affected > 0)
    }
}
