//! In-process [`AlertStore`] used by tests and single-process embedders.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use netwatch_common::types::{Alert, AlertMute, AlertRule, NotificationChannel, Severity};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::Result;
use crate::{AlertStore, DispatchRecord};

#[derive(Default)]
struct Inner {
    rules: HashMap<String, AlertRule>,
    alerts: HashMap<String, Alert>,
    channels: HashMap<String, NotificationChannel>,
    mutes: HashMap<String, AlertMute>,
    dispatch_log: Vec<DispatchRecord>,
}

/// Keeps every record in `RwLock`-guarded maps. Ordering guarantees match
/// [`crate::store::SqlStore`]: list queries return newest first.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn insert_rule(&self, rule: &AlertRule) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.rules.insert(rule.id.clone(), rule.clone());
        Ok(())
    }

    async fn get_rule(&self, id: &str) -> Result<Option<AlertRule>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.rules.get(id).cloned())
    }

    async fn list_rules(&self, enabled_only: bool) -> Result<Vec<AlertRule>> {
        let inner = self.inner.read().unwrap();
        let mut rules: Vec<AlertRule> = inner
            .rules
            .values()
            .filter(|r| !enabled_only || r.enabled)
            .cloned()
            .collect();
        rules.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rules)
    }

    async fn update_rule(&self, rule: &AlertRule) -> Result<bool> {
        let mut inner = self.inner.write().unwrap();
        if !inner.rules.contains_key(&rule.id) {
            return Ok(false);
        }
        inner.rules.insert(rule.id.clone(), rule.clone());
        Ok(true)
    }

    async fn set_rule_enabled(&self, id: &str, enabled: bool) -> Result<bool> {
        let mut inner = self.inner.write().unwrap();
        match inner.rules.get_mut(id) {
            Some(rule) => {
                rule.enabled = enabled;
                rule.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_rule(&self, id: &str) -> Result<bool> {
        let mut inner = self.inner.write().unwrap();
        Ok(inner.rules.remove(id).is_some())
    }

    async fn insert_alert(&self, alert: &Alert) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.alerts.insert(alert.id.clone(), alert.clone());
        Ok(())
    }

    async fn get_alert(&self, id: &str) -> Result<Option<Alert>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.alerts.get(id).cloned())
    }

    async fn update_alert(&self, alert: &Alert) -> Result<bool> {
        let mut inner = self.inner.write().unwrap();
        if !inner.alerts.contains_key(&alert.id) {
            return Ok(false);
        }
        inner.alerts.insert(alert.id.clone(), alert.clone());
        Ok(true)
    }

    async fn most_recent_alert(&self, rule_id: &str, host_id: &str) -> Result<Option<Alert>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .alerts
            .values()
            .filter(|a| a.rule_id == rule_id && a.host_id == host_id)
            .max_by_key(|a| a.triggered_at)
            .cloned())
    }

    async fn active_alerts(
        &self,
        severity: Option<Severity>,
        host_id: Option<&str>,
    ) -> Result<Vec<Alert>> {
        let inner = self.inner.read().unwrap();
        let mut alerts: Vec<Alert> = inner
            .alerts
            .values()
            .filter(|a| a.is_open())
            .filter(|a| severity.map_or(true, |s| a.severity == s))
            .filter(|a| host_id.map_or(true, |h| a.host_id == h))
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
        Ok(alerts)
    }

    async fn alerts_since(&self, since: DateTime<Utc>) -> Result<Vec<Alert>> {
        let inner = self.inner.read().unwrap();
        let mut alerts: Vec<Alert> = inner
            .alerts
            .values()
            .filter(|a| a.triggered_at >= since)
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
        Ok(alerts)
    }

    async fn unresolved_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<Alert>> {
        let inner = self.inner.read().unwrap();
        let mut alerts: Vec<Alert> = inner
            .alerts
            .values()
            .filter(|a| a.is_open() && a.triggered_at < cutoff)
            .cloned()
            .collect();
        alerts.sort_by_key(|a| a.triggered_at);
        Ok(alerts)
    }

    async fn insert_channel(&self, channel: &NotificationChannel) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.channels.insert(channel.id.clone(), channel.clone());
        Ok(())
    }

    async fn get_channel(&self, id: &str) -> Result<Option<NotificationChannel>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.channels.get(id).cloned())
    }

    async fn list_channels(
        &self,
        channel_type: Option<&str>,
        enabled: Option<bool>,
    ) -> Result<Vec<NotificationChannel>> {
        let inner = self.inner.read().unwrap();
        let mut channels: Vec<NotificationChannel> = inner
            .channels
            .values()
            .filter(|c| channel_type.map_or(true, |ct| c.channel_type == ct))
            .filter(|c| enabled.map_or(true, |en| c.enabled == en))
            .cloned()
            .collect();
        channels.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(channels)
    }

    async fn set_channel_enabled(&self, id: &str, enabled: bool) -> Result<bool> {
        let mut inner = self.inner.write().unwrap();
        match inner.channels.get_mut(id) {
            Some(channel) => {
                channel.enabled = enabled;
                channel.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_channel(&self, id: &str) -> Result<bool> {
        let mut inner = self.inner.write().unwrap();
        Ok(inner.channels.remove(id).is_some())
    }

    async fn insert_mute(&self, mute: &AlertMute) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.mutes.insert(mute.id.clone(), mute.clone());
        Ok(())
    }

    async fn list_mutes(&self) -> Result<Vec<AlertMute>> {
        let inner = self.inner.read().unwrap();
        let mut mutes: Vec<AlertMute> = inner.mutes.values().cloned().collect();
        mutes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(mutes)
    }

    async fn active_mutes(&self, now: DateTime<Utc>) -> Result<Vec<AlertMute>> {
        let inner = self.inner.read().unwrap();
        let mut mutes: Vec<AlertMute> = inner
            .mutes
            .values()
            .filter(|m| m.is_active(now))
            .cloned()
            .collect();
        mutes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(mutes)
    }

    async fn delete_mutes_matching(
        &self,
        rule_id: Option<&str>,
        host_id: Option<&str>,
    ) -> Result<u64> {
        let mut inner = self.inner.write().unwrap();
        let before = inner.mutes.len();
        inner
            .mutes
            .retain(|_, m| m.rule_id.as_deref() != rule_id || m.host_id.as_deref() != host_id);
        Ok((before - inner.mutes.len()) as u64)
    }

    async fn delete_expired_mutes(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.inner.write().unwrap();
        let before = inner.mutes.len();
        inner
            .mutes
            .retain(|_, m| m.expires_at.map_or(true, |t| t > now));
        Ok((before - inner.mutes.len()) as u64)
    }

    async fn insert_dispatch_record(&self, record: &DispatchRecord) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.dispatch_log.push(record.clone());
        Ok(())
    }

    async fn dispatch_records_for_alert(&self, alert_id: &str) -> Result<Vec<DispatchRecord>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .dispatch_log
            .iter()
            .filter(|r| r.alert_id == alert_id)
            .cloned()
            .collect())
    }
}
