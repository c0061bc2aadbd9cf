use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m001_initial_schema"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.get_connection().execute_unprepared(UP_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.get_connection().execute_unprepared(DOWN_SQL).await?;
        Ok(())
    }
}

const UP_SQL: &str = "
CREATE TABLE IF NOT EXISTS alert_rules (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL UNIQUE,
    rule_type TEXT NOT NULL,
    severity TEXT NOT NULL DEFAULT 'info',
    cooldown_minutes INTEGER NOT NULL DEFAULT 5,
    channels_json TEXT NOT NULL DEFAULT '[]',
    host_scope TEXT,
    enabled INTEGER NOT NULL DEFAULT 1,
    config_json TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_alert_rules_enabled ON alert_rules(enabled);

CREATE TABLE IF NOT EXISTS alerts (
    id TEXT PRIMARY KEY NOT NULL,
    rule_id TEXT NOT NULL,
    host_id TEXT NOT NULL,
    severity TEXT NOT NULL,
    message TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'triggered',
    triggered_at TEXT NOT NULL,
    acknowledged_at TEXT,
    acknowledged_by TEXT,
    resolved_at TEXT,
    observed_state TEXT
);
CREATE INDEX IF NOT EXISTS idx_alerts_rule_host ON alerts(rule_id, host_id, triggered_at DESC);
CREATE INDEX IF NOT EXISTS idx_alerts_status ON alerts(status);
CREATE INDEX IF NOT EXISTS idx_alerts_triggered_at ON alerts(triggered_at DESC);

CREATE TABLE IF NOT EXISTS notification_channels (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL UNIQUE,
    channel_type TEXT NOT NULL,
    config_json TEXT NOT NULL DEFAULT '{}',
    min_severity TEXT,
    enabled INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_channels_type ON notification_channels(channel_type);
CREATE INDEX IF NOT EXISTS idx_channels_enabled ON notification_channels(enabled);

CREATE TABLE IF NOT EXISTS alert_mutes (
    id TEXT PRIMARY KEY NOT NULL,
    rule_id TEXT,
    host_id TEXT,
    muted_by TEXT NOT NULL,
    reason TEXT,
    expires_at TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_mutes_expires_at ON alert_mutes(expires_at);

CREATE TABLE IF NOT EXISTS dispatch_log (
    id TEXT PRIMARY KEY NOT NULL,
    alert_id TEXT NOT NULL,
    channel_id TEXT NOT NULL,
    channel_name TEXT NOT NULL,
    channel_type TEXT NOT NULL,
    success INTEGER NOT NULL,
    detail TEXT,
    duration_ms INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_dispatch_log_alert ON dispatch_log(alert_id);
CREATE INDEX IF NOT EXISTS idx_dispatch_log_channel ON dispatch_log(channel_id);
";

const DOWN_SQL: &str = "
DROP TABLE IF EXISTS dispatch_log;
DROP TABLE IF EXISTS alert_mutes;
DROP TABLE IF EXISTS notification_channels;
DROP TABLE IF EXISTS alerts;
DROP TABLE IF EXISTS alert_rules;
";
