use chrono::{DateTime, Utc};
use netwatch_common::types::AlertMute;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, EntityTrait, Order, QueryFilter,
    QueryOrder,
};

use crate::entities::alert_mute::{self, Column, Entity};
use crate::error::Result;
use crate::store::SqlStore;

fn to_domain(m: alert_mute::Model) -> AlertMute {
    AlertMute {
        id: m.id,
        rule_id: m.rule_id,
        host_id: m.host_id,
        muted_by: m.muted_by,
        reason: m.reason,
        expires_at: m.expires_at.map(|t| t.with_timezone(&Utc)),
        created_at: m.created_at.with_timezone(&Utc),
    }
}

impl SqlStore {
    pub async fn insert_mute(&self, mute: &AlertMute) -> Result<()> {
        let am = alert_mute::ActiveModel {
            id: Set(mute.id.clone()),
            rule_id: Set(mute.rule_id.clone()),
            host_id: Set(mute.host_id.clone()),
            muted_by: Set(mute.muted_by.clone()),
            reason: Set(mute.reason.clone()),
            expires_at: Set(mute.expires_at.map(|t| t.fixed_offset())),
            created_at: Set(mute.created_at.fixed_offset()),
        };
        am.insert(self.db()).await?;
        Ok(())
    }

    pub async fn list_mutes(&self) -> Result<Vec<AlertMute>> {
        let rows = Entity::find()
            .order_by(Column::CreatedAt, Order::Desc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_domain).collect())
    }

    pub async fn active_mutes(&self, now: DateTime<Utc>) -> Result<Vec<AlertMute>> {
        let rows = Entity::find()
            .filter(
                Condition::any()
                    .add(Column::ExpiresAt.is_null())
                    .add(Column::ExpiresAt.gt(now.fixed_offset())),
            )
            .order_by(Column::CreatedAt, Order::Desc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_domain).collect())
    }

    pub async fn delete_mutes_matching(
        &self,
        rule_id: Option<&str>,
        host_id: Option<&str>,
    ) -> Result<u64> {
        let mut q = Entity::delete_many();
        q = match rule_id {
            Some(r) => q.filter(Column::RuleId.eq(r)),
            None => q.filter(Column::RuleId.is_null()),
        };
        q = match host_id {
            Some(h) => q.filter(Column::HostId.eq(h)),
            None => q.filter(Column::HostId.is_null()),
        };
        let res = q.exec(self.db()).await?;
        Ok(res.rows_affected)
    }

    pub async fn delete_expired_mutes(&self, now: DateTime<Utc>) -> Result<u64> {
        let res = Entity::delete_many()
            .filter(Column::ExpiresAt.is_not_null())
            .filter(Column::ExpiresAt.lte(now.fixed_offset()))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected)
    }
}
