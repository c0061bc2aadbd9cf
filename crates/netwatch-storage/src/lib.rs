//! Durable storage for rules, alerts, notification channels, and mutes.
//!
//! The alerting core consumes storage through the [`AlertStore`] trait; the
//! default implementation ([`store::SqlStore`]) uses SeaORM over SQLite (WAL
//! mode) or any other backend the connection URL names. [`memory::MemoryStore`]
//! implements the same contract in process memory for tests and embedders.

pub mod entities;
pub mod error;
pub mod memory;
pub mod store;


use async_trait::async_trait;
use chrono::{DateTime, Utc};
use netwatch_common::types::{Alert, AlertMute, AlertRule, NotificationChannel, Severity};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One persisted delivery outcome: a single channel's success or failure for
/// a single alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub id: String,
    pub alert_id: String,
    pub channel_id: String,
    pub channel_name: String,
    pub channel_type: String,
    pub success: bool,
    pub detail: Option<String>,
    pub duration_ms: i64,
    pub created_at: DateTime<Utc>,
}

/// Persistence contract consumed by the alerting core.
///
/// Implementations must be safe to share across tasks (`Send + Sync`); the
/// evaluator, dispatcher, and management calls all hold the same store
/// concurrently. The store is also shared with external writers — a rule may
/// be edited or disabled between two reads within one evaluation pass, and
/// implementations make no snapshot guarantee.
#[async_trait]
pub trait AlertStore: Send + Sync {
    // ---- Rules ----

    async fn insert_rule(&self, rule: &AlertRule) -> Result<()>;

    async fn get_rule(&self, id: &str) -> Result<Option<AlertRule>>;

    /// Lists rules, newest first. With `enabled_only`, disabled rules are
    /// filtered out.
    async fn list_rules(&self, enabled_only: bool) -> Result<Vec<AlertRule>>;

    /// Replaces a rule record by id. Returns false when the id is unknown.
    async fn update_rule(&self, rule: &AlertRule) -> Result<bool>;

    async fn set_rule_enabled(&self, id: &str, enabled: bool) -> Result<bool>;

    async fn delete_rule(&self, id: &str) -> Result<bool>;

    // ---- Alerts ----

    async fn insert_alert(&self, alert: &Alert) -> Result<()>;

    async fn get_alert(&self, id: &str) -> Result<Option<Alert>>;

    /// Replaces an alert record by id. Returns false when the id is unknown.
    async fn update_alert(&self, alert: &Alert) -> Result<bool>;

    /// The most recently triggered alert for a (rule, host) pair, regardless
    /// of lifecycle status. Used for cooldown and edge detection.
    async fn most_recent_alert(&self, rule_id: &str, host_id: &str) -> Result<Option<Alert>>;

    /// Non-resolved alerts, newest first, with optional severity and host
    /// filters.
    async fn active_alerts(
        &self,
        severity: Option<Severity>,
        host_id: Option<&str>,
    ) -> Result<Vec<Alert>>;

    /// Alerts triggered at or after `since`, newest first.
    async fn alerts_since(&self, since: DateTime<Utc>) -> Result<Vec<Alert>>;

    /// Non-resolved alerts triggered strictly before `cutoff`.
    async fn unresolved_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<Alert>>;

    // ---- Notification channels ----

    async fn insert_channel(&self, channel: &NotificationChannel) -> Result<()>;

    async fn get_channel(&self, id: &str) -> Result<Option<NotificationChannel>>;

    async fn list_channels(
        &self,
        channel_type: Option<&str>,
        enabled: Option<bool>,
    ) -> Result<Vec<NotificationChannel>>;

    async fn set_channel_enabled(&self, id: &str, enabled: bool) -> Result<bool>;

    async fn delete_channel(&self, id: &str) -> Result<bool>;

    // ---- Mutes ----

    async fn insert_mute(&self, mute: &AlertMute) -> Result<()>;

    async fn list_mutes(&self) -> Result<Vec<AlertMute>>;

    /// Mutes whose `expires_at` is null or after `now`.
    async fn active_mutes(&self, now: DateTime<Utc>) -> Result<Vec<AlertMute>>;

    /// Deletes mutes whose scope columns equal the given pair exactly
    /// (`None` matches a stored null). Returns the number removed.
    async fn delete_mutes_matching(
        &self,
        rule_id: Option<&str>,
        host_id: Option<&str>,
    ) -> Result<u64>;

    /// Deletes mutes whose `expires_at` has passed. Returns the number removed.
    async fn delete_expired_mutes(&self, now: DateTime<Utc>) -> Result<u64>;

    // ---- Dispatch log ----

    async fn insert_dispatch_record(&self, record: &DispatchRecord) -> Result<()>;

    async fn dispatch_records_for_alert(&self, alert_id: &str) -> Result<Vec<DispatchRecord>>;
}
