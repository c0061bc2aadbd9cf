use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Alert severity level, ordered from lowest to highest.
///
/// # Examples
///
/// ```
/// use netwatch_common::types::Severity;
///
/// let sev: Severity = "warning".parse().unwrap();
/// assert_eq!(sev, Severity::Warning);
/// assert_eq!(sev.to_string(), "warning");
/// assert!(Severity::Critical > Severity::Info);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// Online/offline state of a monitored device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceState {
    Online,
    Offline,
}

impl std::fmt::Display for DeviceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceState::Online => write!(f, "online"),
            DeviceState::Offline => write!(f, "offline"),
        }
    }
}

impl std::str::FromStr for DeviceState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "online" => Ok(DeviceState::Online),
            "offline" => Ok(DeviceState::Offline),
            _ => Err(format!("unknown device state: {s}")),
        }
    }
}

/// Comparison operator for threshold rules.
///
/// `Eq`/`Ne` compare floating-point metric values exactly, with no epsilon
/// tolerance. Rules relying on them against continuously sampled metrics
/// are prone to never matching; prefer the inequality operators.
///
/// # Examples
///
/// ```
/// use netwatch_common::types::CompareOp;
///
/// let op: CompareOp = ">=".parse().unwrap();
/// assert!(op.check(85.0, 80.0));
/// assert!(!op.check(79.9, 80.0));
/// assert_eq!(op.to_string(), ">=");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

impl CompareOp {
    pub fn check(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Gt => value > threshold,
            Self::Lt => value < threshold,
            Self::Gte => value >= threshold,
            Self::Lte => value <= threshold,
            Self::Eq => value == threshold,
            Self::Ne => value != threshold,
        }
    }

    /// Short English rendering used in alert messages.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Gt => "above",
            Self::Lt => "below",
            Self::Gte => "at or above",
            Self::Lte => "at or below",
            Self::Eq => "equal to",
            Self::Ne => "not equal to",
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Gte => ">=",
            Self::Lte => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for CompareOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ">" | "gt" | "greater_than" => Ok(Self::Gt),
            "<" | "lt" | "less_than" => Ok(Self::Lt),
            ">=" | "gte" | "greater_equal" => Ok(Self::Gte),
            "<=" | "lte" | "less_equal" => Ok(Self::Lte),
            "==" | "eq" | "equal" => Ok(Self::Eq),
            "!=" | "ne" | "not_equal" => Ok(Self::Ne),
            _ => Err(format!("unknown compare operator: {s}")),
        }
    }
}

/// Kind-specific parameters of an alert rule.
///
/// Threshold rules compare the latest reading of a named metric against a
/// fixed value; status-change rules fire on online/offline transitions and
/// carry no parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleKind {
    Threshold {
        metric_name: String,
        condition: CompareOp,
        threshold: f64,
    },
    StatusChange,
}

impl RuleKind {
    /// Stable type tag, used as the `rule_type` storage column.
    pub fn name(&self) -> &'static str {
        match self {
            RuleKind::Threshold { .. } => "threshold",
            RuleKind::StatusChange => "status_change",
        }
    }

    /// Kind parameters as a JSON object (empty for status-change rules),
    /// used as the `config_json` storage column.
    pub fn params(&self) -> serde_json::Value {
        match self {
            RuleKind::Threshold {
                metric_name,
                condition,
                threshold,
            } => serde_json::json!({
                "metric_name": metric_name,
                "condition": condition.to_string(),
                "threshold": threshold,
            }),
            RuleKind::StatusChange => serde_json::json!({}),
        }
    }

    /// Rebuild from the `rule_type` / `config_json` column pair.
    pub fn from_parts(rule_type: &str, params: &str) -> Result<Self, String> {
        match rule_type {
            "threshold" => {
                let v: serde_json::Value =
                    serde_json::from_str(params).map_err(|e| format!("bad rule config: {e}"))?;
                let metric_name = v
                    .get("metric_name")
                    .and_then(|m| m.as_str())
                    .ok_or("threshold rule config missing metric_name")?
                    .to_string();
                let condition = v
                    .get("condition")
                    .and_then(|c| c.as_str())
                    .ok_or("threshold rule config missing condition")?
                    .parse()?;
                let threshold = v
                    .get("threshold")
                    .and_then(|t| t.as_f64())
                    .ok_or("threshold rule config missing threshold")?;
                Ok(RuleKind::Threshold {
                    metric_name,
                    condition,
                    threshold,
                })
            }
            "status_change" => Ok(RuleKind::StatusChange),
            other => Err(format!("unknown rule type: {other}")),
        }
    }
}

/// A monitoring policy: when and for which hosts an alert fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: String,
    pub name: String,
    pub kind: RuleKind,
    pub severity: Severity,
    /// Minimum minutes between repeat triggers for the same (rule, host) pair.
    pub cooldown_minutes: i64,
    /// Channel ids to notify on trigger, in configured order.
    pub notification_channels: Vec<String>,
    /// Restrict the rule to one host; `None` means all hosts.
    pub host_scope: Option<String>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AlertRule {
    pub fn applies_to(&self, host_id: &str) -> bool {
        match &self.host_scope {
            Some(scope) => scope == host_id,
            None => true,
        }
    }

    pub fn cooldown(&self) -> Duration {
        Duration::minutes(self.cooldown_minutes.max(0))
    }
}

/// Lifecycle status of an alert.
///
/// Transitions: `triggered → acknowledged → resolved`, or `triggered →
/// resolved` directly. `resolved` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Triggered,
    Acknowledged,
    Resolved,
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertStatus::Triggered => write!(f, "triggered"),
            AlertStatus::Acknowledged => write!(f, "acknowledged"),
            AlertStatus::Resolved => write!(f, "resolved"),
        }
    }
}

impl std::str::FromStr for AlertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "triggered" => Ok(AlertStatus::Triggered),
            "acknowledged" => Ok(AlertStatus::Acknowledged),
            "resolved" => Ok(AlertStatus::Resolved),
            _ => Err(format!("unknown alert status: {s}")),
        }
    }
}

/// One instance of a rule firing for one host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub rule_id: String,
    pub host_id: String,
    /// Copied from the rule at trigger time; rule edits never alter past alerts.
    pub severity: Severity,
    pub message: String,
    pub status: AlertStatus,
    pub triggered_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    /// Device state observed when the alert fired (status-change rules only).
    pub observed_state: Option<DeviceState>,
}

impl Alert {
    pub fn is_open(&self) -> bool {
        self.status != AlertStatus::Resolved
    }
}

/// A notification delivery destination.
///
/// `config` is an opaque JSON object interpreted by the notifier registered
/// for `channel_type`; alerts below `min_severity` are not sent here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationChannel {
    pub id: String,
    pub name: String,
    pub channel_type: String,
    pub config: serde_json::Value,
    pub min_severity: Option<Severity>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationChannel {
    /// True when this channel accepts alerts of the given severity.
    pub fn accepts(&self, severity: Severity) -> bool {
        match self.min_severity {
            Some(min) => severity >= min,
            None => true,
        }
    }
}

/// A temporary or indefinite alert suppression.
///
/// `rule_id` and `host_id` are each nullable; `None` matches everything in
/// that dimension, so a mute with both unset suppresses all alerting.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use netwatch_common::types::AlertMute;
///
/// let mute = AlertMute {
///     id: "m-1".into(),
///     rule_id: Some("r-1".into()),
///     host_id: None,
///     muted_by: "ops".into(),
///     reason: None,
///     expires_at: None,
///     created_at: Utc::now(),
/// };
/// assert!(mute.is_active(Utc::now()));
/// assert!(mute.matches("r-1", "any-host"));
/// assert!(!mute.matches("r-2", "any-host"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertMute {
    pub id: String,
    pub rule_id: Option<String>,
    pub host_id: Option<String>,
    pub muted_by: String,
    pub reason: Option<String>,
    /// `None` means indefinite — removed only by explicit unmute.
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl AlertMute {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires) => expires > now,
            None => true,
        }
    }

    pub fn matches(&self, rule_id: &str, host_id: &str) -> bool {
        let rule_ok = self.rule_id.as_deref().map_or(true, |r| r == rule_id);
        let host_ok = self.host_id.as_deref().map_or(true, |h| h == host_id);
        rule_ok && host_ok
    }
}
