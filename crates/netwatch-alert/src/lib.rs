//! Rule evaluation and alert lifecycle management.
//!
//! [`evaluator::RuleEvaluator`] runs one evaluation pass: for each enabled
//! rule and in-scope host it applies mute and cooldown suppression, then
//! evaluates the rule condition against readings pulled from a
//! [`MetricSource`]. [`lifecycle::Lifecycle`] owns the
//! triggered → acknowledged → resolved state machine.

pub mod error;
pub mod evaluator;
pub mod lifecycle;


use async_trait::async_trait;
use netwatch_common::types::DeviceState;

/// Supplier of current metric and device-state readings, typically backed by
/// a device-API client.
///
/// Readings are best effort: `Ok(None)` means "no reading available", which
/// never fails an evaluation pass. Errors are treated the same way for a
/// single (rule, host) unit and logged.
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// The fleet roster for this evaluation pass.
    async fn hosts(&self) -> anyhow::Result<Vec<String>>;

    /// Latest value of a named metric for a host, if one has been collected.
    async fn latest_value(&self, host_id: &str, metric_name: &str)
        -> anyhow::Result<Option<f64>>;

    /// Current online/offline state of a host, `None` when unknown.
    async fn current_state(&self, host_id: &str) -> anyhow::Result<Option<DeviceState>>;
}
