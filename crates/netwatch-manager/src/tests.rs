use async_trait::async_trait;
use chrono::{Duration, Utc};
use netwatch_alert::MetricSource;
use netwatch_common::types::{
    Alert, AlertMute, AlertStatus, CompareOp, DeviceState, RuleKind, Severity,
};
use netwatch_notify::error::Result as NotifyResult;
use netwatch_notify::registry::NotifierRegistry;
use netwatch_notify::Notifier;
use netwatch_storage::memory::MemoryStore;
use netwatch_storage::AlertStore;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::config::ManagerConfig;
use crate::error::ManagerError;
use crate::manager::{AlertManager, ChannelParams, MuteParams, RuleParams};

struct FakeSource {
    hosts: Vec<String>,
    values: Mutex<HashMap<(String, String), f64>>,
    roster_fails: bool,
}

impl FakeSource {
    fn new(hosts: &[&str]) -> Self {
        Self {
            hosts: hosts.iter().map(|h| h.to_string()).collect(),
            values: Mutex::new(HashMap::new()),
            roster_fails: false,
        }
    }

    fn set_value(&self, host: &str, metric: &str, value: f64) {
        self.values
            .lock()
            .unwrap()
            .insert((host.to_string(), metric.to_string()), value);
    }
}

#[async_trait]
impl MetricSource for FakeSource {
    async fn hosts(&self) -> anyhow::Result<Vec<String>> {
        if self.roster_fails {
            anyhow::bail!("device API unreachable");
        }
        Ok(self.hosts.clone())
    }

    async fn latest_value(&self, host_id: &str, metric_name: &str) -> anyhow::Result<Option<f64>> {
        Ok(self
            .values
            .lock()
            .unwrap()
            .get(&(host_id.to_string(), metric_name.to_string()))
            .copied())
    }

    async fn current_state(&self, _host_id: &str) -> anyhow::Result<Option<DeviceState>> {
        Ok(None)
    }
}

struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn channel_type(&self) -> &str {
        "fake"
    }

    fn validate_config(&self, _config: &Value) -> NotifyResult<()> {
        Ok(())
    }

    async fn send(&self, alert: &Alert, _config: &Value) -> NotifyResult<()> {
        self.sent.lock().unwrap().push(alert.id.clone());
        Ok(())
    }
}

fn cpu_rule_params(channels: Vec<String>, cooldown_minutes: i64) -> RuleParams {
    RuleParams {
        name: "cpu high".into(),
        kind: RuleKind::Threshold {
            metric_name: "cpu_usage".into(),
            condition: CompareOp::Gt,
            threshold: 80.0,
        },
        severity: Severity::Warning,
        cooldown_minutes,
        notification_channels: channels,
        host_scope: None,
        enabled: true,
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    notifier: Arc<RecordingNotifier>,
    manager: AlertManager,
}

fn harness(source: FakeSource) -> Harness {
    netwatch_common::id::init(1, 1);
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let mut registry = NotifierRegistry::new();
    registry.register(notifier.clone());
    let manager = AlertManager::new(
        store.clone(),
        Arc::new(source),
        Arc::new(registry),
        ManagerConfig::default(),
    );
    Harness {
        store,
        notifier,
        manager,
    }
}

#[tokio::test]
async fn full_pass_triggers_persists_and_dispatches() {
    let source = FakeSource::new(&["h-1"]);
    source.set_value("h-1", "cpu_usage", 85.0);
    let h = harness(source);

    let channel = h
        .manager
        .create_channel(ChannelParams {
            name: "ops".into(),
            channel_type: "fake".into(),
            config: serde_json::json!({}),
            min_severity: None,
            enabled: true,
        })
        .await
        .unwrap();

    let rule = h
        .manager
        .create_rule(cpu_rule_params(vec![channel.id.clone()], 5))
        .await
        .unwrap();

    let triggered = h.manager.evaluate().await.unwrap();
    assert_eq!(triggered.len(), 1);
    let fired = &triggered[0];
    assert_eq!(fired.alert.rule_id, rule.id);
    assert_eq!(fired.alert.status, AlertStatus::Triggered);
    assert!(fired.outcomes[&channel.id].success);

    // Persisted before dispatch and visible through queries.
    let stored = h.manager.get_alert(&fired.alert.id).await.unwrap().unwrap();
    assert_eq!(stored.id, fired.alert.id);
    assert_eq!(h.manager.active_alerts(None, None).await.unwrap().len(), 1);

    // The notifier actually received it, and the outcome was recorded.
    assert_eq!(h.notifier.sent.lock().unwrap().len(), 1);
    let records = h
        .store
        .dispatch_records_for_alert(&fired.alert.id)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].success);
}

#[tokio::test]
async fn second_pass_within_cooldown_is_quiet() {
    let source = FakeSource::new(&["h-1"]);
    source.set_value("h-1", "cpu_usage", 85.0);
    let h = harness(source);
    h.manager
        .create_rule(cpu_rule_params(vec![], 5))
        .await
        .unwrap();

    assert_eq!(h.manager.evaluate().await.unwrap().len(), 1);
    assert!(h.manager.evaluate().await.unwrap().is_empty());
}

#[tokio::test]
async fn try_evaluate_runs_when_idle() {
    let source = FakeSource::new(&["h-1"]);
    source.set_value("h-1", "cpu_usage", 85.0);
    let h = harness(source);
    h.manager
        .create_rule(cpu_rule_params(vec![], 0))
        .await
        .unwrap();

    let result = h.manager.try_evaluate().await.unwrap();
    assert_eq!(result.unwrap().len(), 1);
}

#[tokio::test]
async fn mute_silences_and_unmute_resumes() {
    let source = FakeSource::new(&["h-1"]);
    source.set_value("h-1", "cpu_usage", 85.0);
    let h = harness(source);
    let rule = h
        .manager
        .create_rule(cpu_rule_params(vec![], 0))
        .await
        .unwrap();

    h.manager
        .create_mute(MuteParams {
            rule_id: Some(rule.id.clone()),
            host_id: None,
            muted_by: "ops".into(),
            reason: Some("maintenance window".into()),
            expires_at: None,
        })
        .await
        .unwrap();

    assert!(h.manager.evaluate().await.unwrap().is_empty());
    assert_eq!(h.manager.list_active_mutes().await.unwrap().len(), 1);

    assert_eq!(h.manager.unmute(Some(&rule.id), None).await.unwrap(), 1);
    assert_eq!(h.manager.evaluate().await.unwrap().len(), 1);
}

#[tokio::test]
async fn rule_validation_rejects_bad_definitions() {
    let h = harness(FakeSource::new(&[]));

    let blank_name = RuleParams {
        name: "  ".into(),
        ..cpu_rule_params(vec![], 5)
    };
    assert!(matches!(
        h.manager.create_rule(blank_name).await.unwrap_err(),
        ManagerError::Configuration(_)
    ));

    let empty_metric = RuleParams {
        kind: RuleKind::Threshold {
            metric_name: "".into(),
            condition: CompareOp::Gt,
            threshold: 80.0,
        },
        ..cpu_rule_params(vec![], 5)
    };
    assert!(h.manager.create_rule(empty_metric).await.is_err());

    let nan_threshold = RuleParams {
        kind: RuleKind::Threshold {
            metric_name: "cpu_usage".into(),
            condition: CompareOp::Gt,
            threshold: f64::NAN,
        },
        ..cpu_rule_params(vec![], 5)
    };
    assert!(h.manager.create_rule(nan_threshold).await.is_err());

    let negative_cooldown = cpu_rule_params(vec![], -1);
    assert!(h.manager.create_rule(negative_cooldown).await.is_err());

    let ghost_channel = cpu_rule_params(vec!["ghost".into()], 5);
    assert!(matches!(
        h.manager.create_rule(ghost_channel).await.unwrap_err(),
        ManagerError::Configuration(_)
    ));
}

#[tokio::test]
async fn status_change_params_need_no_threshold_fields() {
    let h = harness(FakeSource::new(&[]));
    let params = RuleParams {
        name: "offline watch".into(),
        kind: RuleKind::StatusChange,
        severity: Severity::Critical,
        cooldown_minutes: 0,
        notification_channels: vec![],
        host_scope: Some("edge-7".into()),
        enabled: true,
    };
    let rule = h.manager.create_rule(params).await.unwrap();
    assert_eq!(rule.kind, RuleKind::StatusChange);
}

#[tokio::test]
async fn channel_creation_validates_type_and_config() {
    netwatch_common::id::init(1, 1);
    let store = Arc::new(MemoryStore::new());
    let manager = AlertManager::new(
        store,
        Arc::new(FakeSource::new(&[])),
        Arc::new(NotifierRegistry::default()),
        ManagerConfig::default(),
    );

    let unknown_type = manager
        .create_channel(ChannelParams {
            name: "pager".into(),
            channel_type: "carrier-pigeon".into(),
            config: serde_json::json!({}),
            min_severity: None,
            enabled: true,
        })
        .await
        .unwrap_err();
    assert!(matches!(unknown_type, ManagerError::Configuration(_)));

    let bad_config = manager
        .create_channel(ChannelParams {
            name: "mail".into(),
            channel_type: "email".into(),
            config: serde_json::json!({"smtp_host": "smtp.example.com"}),
            min_severity: None,
            enabled: true,
        })
        .await
        .unwrap_err();
    assert!(matches!(bad_config, ManagerError::Configuration(_)));

    let ok = manager
        .create_channel(ChannelParams {
            name: "mail".into(),
            channel_type: "email".into(),
            config: serde_json::json!({
                "smtp_host": "smtp.example.com",
                "smtp_port": 587,
                "from": "alerts@example.com",
                "recipients": ["ops@example.com"]
            }),
            min_severity: Some(Severity::Warning),
            enabled: true,
        })
        .await;
    assert!(ok.is_ok());
}

#[tokio::test]
async fn listed_channel_configs_are_redacted() {
    let h = harness(FakeSource::new(&[]));
    h.manager
        .create_channel(ChannelParams {
            name: "hook".into(),
            channel_type: "fake".into(),
            config: serde_json::json!({"url": "https://example.com", "api_key": "s3cret"}),
            min_severity: None,
            enabled: true,
        })
        .await
        .unwrap();

    let listed = h.manager.list_channels(None, None).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].config["api_key"], "***");
    assert_eq!(listed[0].config["url"], "https://example.com");
}

#[tokio::test]
async fn mute_expiry_must_be_in_the_future() {
    let h = harness(FakeSource::new(&[]));
    let err = h
        .manager
        .create_mute(MuteParams {
            rule_id: None,
            host_id: None,
            muted_by: "ops".into(),
            reason: None,
            expires_at: Some(Utc::now() - Duration::minutes(1)),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ManagerError::Configuration(_)));
}

#[tokio::test]
async fn cleanup_removes_expired_mutes() {
    let h = harness(FakeSource::new(&[]));
    let now = Utc::now();
    h.store
        .insert_mute(&AlertMute {
            id: "m-old".into(),
            rule_id: None,
            host_id: None,
            muted_by: "ops".into(),
            reason: None,
            expires_at: Some(now - Duration::hours(1)),
            created_at: now - Duration::hours(2),
        })
        .await
        .unwrap();

    assert_eq!(h.manager.cleanup_expired_mutes().await.unwrap(), 1);
    assert!(h.manager.list_active_mutes().await.unwrap().is_empty());
}

#[tokio::test]
async fn roster_failure_aborts_the_pass() {
    let mut source = FakeSource::new(&["h-1"]);
    source.roster_fails = true;
    let h = harness(source);
    h.manager
        .create_rule(cpu_rule_params(vec![], 0))
        .await
        .unwrap();

    let err = h.manager.evaluate().await.unwrap_err();
    assert!(matches!(err, ManagerError::FatalPass(_)));
}

#[tokio::test]
async fn resolve_stale_uses_configured_default() {
    let h = harness(FakeSource::new(&[]));
    let old = Alert {
        id: "a-old".into(),
        rule_id: "r-1".into(),
        host_id: "h-1".into(),
        severity: Severity::Warning,
        message: "stale".into(),
        status: AlertStatus::Triggered,
        triggered_at: Utc::now() - Duration::hours(49),
        acknowledged_at: None,
        acknowledged_by: None,
        resolved_at: None,
        observed_state: None,
    };
    h.store.insert_alert(&old).await.unwrap();

    // Default stale cutoff is 48 hours.
    assert_eq!(h.manager.resolve_stale(None).await.unwrap(), 1);
    let alert = h.manager.get_alert("a-old").await.unwrap().unwrap();
    assert_eq!(alert.status, AlertStatus::Resolved);
}

#[tokio::test]
async fn lifecycle_passthrough_acknowledge_and_resolve() {
    let source = FakeSource::new(&["h-1"]);
    source.set_value("h-1", "cpu_usage", 85.0);
    let h = harness(source);
    h.manager
        .create_rule(cpu_rule_params(vec![], 0))
        .await
        .unwrap();

    let triggered = h.manager.evaluate().await.unwrap();
    let alert_id = triggered[0].alert.id.clone();

    let acked = h.manager.acknowledge(&alert_id, "ops").await.unwrap();
    assert_eq!(acked.status, AlertStatus::Acknowledged);
    let resolved = h.manager.resolve(&alert_id).await.unwrap();
    assert_eq!(resolved.status, AlertStatus::Resolved);

    let stats = h.manager.statistics(7).await.unwrap();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.by_status.get("resolved"), Some(&1));
}

#[test]
fn config_defaults_from_empty_toml() {
    let config: ManagerConfig = toml::from_str("").unwrap();
    assert_eq!(config.dispatch_max_concurrent, 5);
    assert_eq!(config.dispatch_timeout_secs, 30);
    assert_eq!(config.source_timeout_secs, 10);
    assert_eq!(config.stale_resolve_hours, 48);

    let overridden: ManagerConfig =
        toml::from_str("dispatch_timeout_secs = 5\ndispatch_max_concurrent = 2").unwrap();
    assert_eq!(overridden.dispatch_timeout_secs, 5);
    assert_eq!(overridden.dispatch_max_concurrent, 2);
    assert_eq!(overridden.source_timeout_secs, 10);
}
