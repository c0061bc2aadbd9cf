use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, QueryFilter, QueryOrder,
};

use crate::entities::dispatch_log::{self, Column, Entity};
use crate::error::Result;
use crate::store::SqlStore;
use crate::DispatchRecord;

fn to_domain(m: dispatch_log::Model) -> DispatchRecord {
    DispatchRecord {
        id: m.id,
        alert_id: m.alert_id,
        channel_id: m.channel_id,
        channel_name: m.channel_name,
        channel_type: m.channel_type,
        success: m.success,
        detail: m.detail,
        duration_ms: m.duration_ms,
        created_at: m.created_at.with_timezone(&Utc),
    }
}

impl SqlStore {
    pub async fn insert_dispatch_record(&self, record: &DispatchRecord) -> Result<()> {
        let am = dispatch_log::ActiveModel {
            id: Set(record.id.clone()),
            alert_id: Set(record.alert_id.clone()),
            channel_id: Set(record.channel_id.clone()),
            channel_name: Set(record.channel_name.clone()),
            channel_type: Set(record.channel_type.clone()),
            success: Set(record.success),
            detail: Set(record.detail.clone()),
            duration_ms: Set(record.duration_ms),
            created_at: Set(record.created_at.fixed_offset()),
        };
        am.insert(self.db()).await?;
        Ok(())
    }

    pub async fn dispatch_records_for_alert(&self, alert_id: &str) -> Result<Vec<DispatchRecord>> {
        let rows = Entity::find()
            .filter(Column::AlertId.eq(alert_id))
            .order_by(Column::CreatedAt, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_domain).collect())
    }
}
