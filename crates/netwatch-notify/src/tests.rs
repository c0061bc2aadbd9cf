use async_trait::async_trait;
use chrono::Utc;
use netwatch_common::types::{
    Alert, AlertRule, AlertStatus, CompareOp, NotificationChannel, RuleKind, Severity,
};
use netwatch_storage::memory::MemoryStore;
use netwatch_storage::AlertStore;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::channels::webhook::WebhookNotifier;
use crate::dispatcher::Dispatcher;
use crate::error::{NotifyError, Result};
use crate::registry::NotifierRegistry;
use crate::Notifier;

struct RecordingNotifier {
    type_name: &'static str,
    sent: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            sent: Mutex::new(Vec::new()),
        }
    }

    fn sent_alert_ids(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn channel_type(&self) -> &str {
        self.type_name
    }

    fn validate_config(&self, _config: &Value) -> Result<()> {
        Ok(())
    }

    async fn send(&self, alert: &Alert, _config: &Value) -> Result<()> {
        self.sent.lock().unwrap().push(alert.id.clone());
        Ok(())
    }
}

struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    fn channel_type(&self) -> &str {
        "failing"
    }

    fn validate_config(&self, _config: &Value) -> Result<()> {
        Ok(())
    }

    async fn send(&self, _alert: &Alert, _config: &Value) -> Result<()> {
        Err(NotifyError::Delivery("endpoint rejected the payload".into()))
    }
}

struct SlowNotifier;

#[async_trait]
impl Notifier for SlowNotifier {
    fn channel_type(&self) -> &str {
        "slow"
    }

    fn validate_config(&self, _config: &Value) -> Result<()> {
        Ok(())
    }

    async fn send(&self, _alert: &Alert, _config: &Value) -> Result<()> {
        tokio::time::sleep(Duration::from_millis(300)).await;
        Ok(())
    }
}

fn make_alert(severity: Severity) -> Alert {
    Alert {
        id: "a-1".into(),
        rule_id: "r-1".into(),
        host_id: "h-1".into(),
        severity,
        message: "cpu_usage is 85.0 on h-1 (above 80.0)".into(),
        status: AlertStatus::Triggered,
        triggered_at: Utc::now(),
        acknowledged_at: None,
        acknowledged_by: None,
        resolved_at: None,
        observed_state: None,
    }
}

fn make_rule(channel_ids: &[&str]) -> AlertRule {
    let now = Utc::now();
    AlertRule {
        id: "r-1".into(),
        name: "cpu high".into(),
        kind: RuleKind::Threshold {
            metric_name: "cpu_usage".into(),
            condition: CompareOp::Gt,
            threshold: 80.0,
        },
        severity: Severity::Warning,
        cooldown_minutes: 5,
        notification_channels: channel_ids.iter().map(|c| c.to_string()).collect(),
        host_scope: None,
        enabled: true,
        created_at: now,
        updated_at: now,
    }
}

fn make_channel(
    id: &str,
    channel_type: &str,
    min_severity: Option<Severity>,
    enabled: bool,
) -> NotificationChannel {
    let now = Utc::now();
    NotificationChannel {
        id: id.to_string(),
        name: format!("{id} channel"),
        channel_type: channel_type.to_string(),
        config: serde_json::json!({}),
        min_severity,
        enabled,
        created_at: now,
        updated_at: now,
    }
}

async fn store_with(channels: &[NotificationChannel]) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    for channel in channels {
        store.insert_channel(channel).await.unwrap();
    }
    store
}

fn dispatcher(store: Arc<MemoryStore>, registry: NotifierRegistry) -> Dispatcher {
    Dispatcher::new(
        store,
        Arc::new(registry),
        5,
        Duration::from_millis(100),
    )
}

// ── Registry ──

#[test]
fn registry_default_has_builtin_notifiers() {
    let registry = NotifierRegistry::default();
    let mut names = registry.notifier_names();
    names.sort();
    assert_eq!(names, vec!["email", "slack", "webhook"]);
}

#[test]
fn registry_unknown_type_is_a_configuration_error() {
    let registry = NotifierRegistry::default();
    let err = registry
        .validate_config("nonexistent", &serde_json::json!({}))
        .unwrap_err();
    assert!(
        err.to_string().contains("unknown channel type"),
        "error message was: {err}"
    );
}

#[test]
fn email_notifier_validates_config() {
    let registry = NotifierRegistry::default();

    let valid = serde_json::json!({
        "smtp_host": "smtp.example.com",
        "smtp_port": 587,
        "from": "alerts@example.com",
        "recipients": ["ops@example.com"]
    });
    assert!(registry.validate_config("email", &valid).is_ok());

    let missing_host = serde_json::json!({
        "smtp_port": 587,
        "from": "alerts@example.com",
        "recipients": ["ops@example.com"]
    });
    assert!(registry.validate_config("email", &missing_host).is_err());

    let empty_recipients = serde_json::json!({
        "smtp_host": "smtp.example.com",
        "smtp_port": 587,
        "from": "alerts@example.com",
        "recipients": []
    });
    assert!(registry.validate_config("email", &empty_recipients).is_err());
}

#[test]
fn slack_notifier_validates_config() {
    let registry = NotifierRegistry::default();
    let valid = serde_json::json!({"webhook_url": "https://hooks.slack.com/services/T/B/x"});
    assert!(registry.validate_config("slack", &valid).is_ok());
    assert!(registry.validate_config("slack", &serde_json::json!({})).is_err());
}

#[test]
fn webhook_notifier_validates_config() {
    let registry = NotifierRegistry::default();
    let valid = serde_json::json!({"url": "https://hooks.example.com/alert"});
    assert!(registry.validate_config("webhook", &valid).is_ok());
    assert!(registry.validate_config("webhook", &serde_json::json!({})).is_err());
}

#[test]
fn webhook_body_template_substitutes_placeholders() {
    let alert = make_alert(Severity::Critical);
    let body = WebhookNotifier::render_body(
        Some("{{host_id}}:{{severity}}:{{message}}"),
        &alert,
    );
    assert_eq!(body, "h-1:critical:cpu_usage is 85.0 on h-1 (above 80.0)");

    let default_body = WebhookNotifier::render_body(None, &alert);
    let parsed: Value = serde_json::from_str(&default_body).unwrap();
    assert_eq!(parsed["alert_id"], "a-1");
    assert_eq!(parsed["severity"], "critical");
    assert_eq!(parsed["status"], "triggered");
}

// ── Dispatcher ──

#[tokio::test]
async fn dispatch_filters_by_min_severity() {
    let email_like = Arc::new(RecordingNotifier::new("fake"));
    let mut registry = NotifierRegistry::new();
    registry.register(email_like.clone());

    let store = store_with(&[
        make_channel("email-1", "fake", Some(Severity::Info), true),
        make_channel("slack-1", "fake", Some(Severity::Critical), true),
    ])
    .await;

    let alert = make_alert(Severity::Warning);
    let rule = make_rule(&["email-1", "slack-1"]);
    let outcomes = dispatcher(store, registry).dispatch(&alert, &rule).await;

    // The critical-only channel is skipped entirely, not reported as failed.
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes.contains_key("email-1"));
    assert!(outcomes["email-1"].success);
    assert_eq!(email_like.sent_alert_ids(), vec!["a-1".to_string()]);
}

#[tokio::test]
async fn one_failing_channel_never_blocks_another() {
    let good = Arc::new(RecordingNotifier::new("fake"));
    let mut registry = NotifierRegistry::new();
    registry.register(good.clone());
    registry.register(Arc::new(FailingNotifier));

    let store = store_with(&[
        make_channel("c-bad", "failing", None, true),
        make_channel("c-good", "fake", None, true),
    ])
    .await;

    let alert = make_alert(Severity::Warning);
    let rule = make_rule(&["c-bad", "c-good"]);
    let outcomes = dispatcher(store, registry).dispatch(&alert, &rule).await;

    assert_eq!(outcomes.len(), 2);
    assert!(!outcomes["c-bad"].success);
    assert!(outcomes["c-bad"]
        .detail
        .as_deref()
        .unwrap()
        .contains("rejected"));
    assert!(outcomes["c-good"].success);
    assert_eq!(good.sent_alert_ids(), vec!["a-1".to_string()]);
}

#[tokio::test]
async fn timed_out_channel_is_recorded_as_failed() {
    let fast = Arc::new(RecordingNotifier::new("fake"));
    let mut registry = NotifierRegistry::new();
    registry.register(fast.clone());
    registry.register(Arc::new(SlowNotifier));

    let store = store_with(&[
        make_channel("c-slow", "slow", None, true),
        make_channel("c-fast", "fake", None, true),
    ])
    .await;

    let alert = make_alert(Severity::Warning);
    let rule = make_rule(&["c-slow", "c-fast"]);
    let outcomes = dispatcher(store, registry).dispatch(&alert, &rule).await;

    assert_eq!(outcomes.len(), 2);
    assert!(!outcomes["c-slow"].success);
    assert!(outcomes["c-slow"]
        .detail
        .as_deref()
        .unwrap()
        .contains("timed out"));
    assert!(outcomes["c-fast"].success);
}

#[tokio::test]
async fn unknown_channel_type_is_a_per_channel_failure() {
    let store = store_with(&[make_channel("c-1", "pager-duty", None, true)]).await;
    let alert = make_alert(Severity::Warning);
    let rule = make_rule(&["c-1"]);
    let outcomes = dispatcher(store, NotifierRegistry::new())
        .dispatch(&alert, &rule)
        .await;

    assert_eq!(outcomes.len(), 1);
    assert!(!outcomes["c-1"].success);
    assert!(outcomes["c-1"]
        .detail
        .as_deref()
        .unwrap()
        .contains("unknown channel type"));
}

#[tokio::test]
async fn missing_channel_record_is_a_per_channel_failure() {
    let store = store_with(&[]).await;
    let alert = make_alert(Severity::Warning);
    let rule = make_rule(&["ghost"]);
    let outcomes = dispatcher(store, NotifierRegistry::new())
        .dispatch(&alert, &rule)
        .await;

    assert_eq!(outcomes.len(), 1);
    assert!(!outcomes["ghost"].success);
    assert!(outcomes["ghost"].detail.as_deref().unwrap().contains("not found"));
}

#[tokio::test]
async fn disabled_channel_is_dropped_silently() {
    let recording = Arc::new(RecordingNotifier::new("fake"));
    let mut registry = NotifierRegistry::new();
    registry.register(recording.clone());

    let store = store_with(&[make_channel("c-off", "fake", None, false)]).await;
    let alert = make_alert(Severity::Warning);
    let rule = make_rule(&["c-off"]);
    let outcomes = dispatcher(store, registry).dispatch(&alert, &rule).await;

    assert!(outcomes.is_empty());
    assert!(recording.sent_alert_ids().is_empty());
}

#[tokio::test]
async fn rule_without_channels_dispatches_to_nothing() {
    let store = store_with(&[]).await;
    let alert = make_alert(Severity::Warning);
    let rule = make_rule(&[]);
    let outcomes = dispatcher(store, NotifierRegistry::default())
        .dispatch(&alert, &rule)
        .await;
    assert!(outcomes.is_empty());
}
