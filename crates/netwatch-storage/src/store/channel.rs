use chrono::Utc;
use netwatch_common::types::NotificationChannel;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, QueryFilter, QueryOrder,
};

use crate::entities::notification_channel::{self, Column, Entity};
use crate::error::{Result, StorageError};
use crate::store::SqlStore;

fn to_domain(m: notification_channel::Model) -> Result<NotificationChannel> {
    let min_severity = m
        .min_severity
        .as_deref()
        .map(str::parse)
        .transpose()
        .map_err(|detail| StorageError::Decode {
            column: "min_severity",
            detail,
        })?;
    let config = serde_json::from_str(&m.config_json)?;
    Ok(NotificationChannel {
        id: m.id,
        name: m.name,
        channel_type: m.channel_type,
        config,
        min_severity,
        enabled: m.enabled,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    })
}

fn to_active(channel: &NotificationChannel) -> notification_channel::ActiveModel {
    notification_channel::ActiveModel {
        id: Set(channel.id.clone()),
        name: Set(channel.name.clone()),
        channel_type: Set(channel.channel_type.clone()),
        config_json: Set(channel.config.to_string()),
        min_severity: Set(channel.min_severity.map(|s| s.to_string())),
        enabled: Set(channel.enabled),
        created_at: Set(channel.created_at.fixed_offset()),
        updated_at: Set(channel.updated_at.fixed_offset()),
    }
}

impl SqlStore {
    pub async fn insert_channel(&self, channel: &NotificationChannel) -> Result<()> {
        to_active(channel).insert(self.db()).await?;
        Ok(())
    }

    pub async fn get_channel(&self, id: &str) -> Result<Option<NotificationChannel>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        model.map(to_domain).transpose()
    }

    pub async fn list_channels(
        &self,
        channel_type: Option<&str>,
        enabled: Option<bool>,
    ) -> Result<Vec<NotificationChannel>> {
        let mut q = Entity::find();
        if let Some(ct) = channel_type {
            q = q.filter(Column::ChannelType.eq(ct));
        }
        if let Some(en) = enabled {
            q = q.filter(Column::Enabled.eq(en));
        }
        let rows = q.order_by(Column::CreatedAt, Order::Desc).all(self.db()).await?;
        rows.into_iter().map(to_domain).collect()
    }

    pub async fn set_channel_enabled(&self, id: &str, enabled: bool) -> Result<bool> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        let Some(m) = model else {
            return Ok(false);
        };
        let mut am: notification_channel::ActiveModel = m.into();
        am.enabled = Set(enabled);
        am.updated_at = Set(Utc::now().fixed_offset());
        am.update(self.db()).await?;
        Ok(true)
    }

    pub async fn delete_channel(&self, id: &str) -> Result<bool> {
        let res = Entity::delete_by_id(id).exec(self.db()).await?;
        Ok(res.rows_affected > 0)
    }
}
