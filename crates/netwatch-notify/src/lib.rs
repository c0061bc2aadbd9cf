//! Notification delivery with pluggable channel support.
//!
//! Triggered alerts are fanned out by the [`dispatcher::Dispatcher`] to the
//! [`Notifier`] implementations registered in a [`registry::NotifierRegistry`],
//! filtered by each channel's minimum severity. Built-in notifiers cover
//! email (SMTP), Slack-style chat webhooks, and generic webhooks.

pub mod channels;
pub mod dispatcher;
pub mod error;
pub mod registry;
pub mod utils;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use netwatch_common::types::Alert;
use serde_json::Value;

use crate::error::Result;

/// Delivery of alerts through one channel type (e.g. SMTP, a chat webhook).
///
/// One notifier instance serves every channel of its type; the channel's
/// `config` blob is passed to each call, so a config edit takes effect on the
/// next dispatch without re-registration. A notifier may retry transient
/// failures internally before reporting its final outcome; the dispatcher
/// never retries.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// The channel type this notifier serves (e.g. `"email"`, `"slack"`).
    fn channel_type(&self) -> &str;

    /// Validates a channel's JSON config against this notifier's expected
    /// schema. Called at channel create time.
    fn validate_config(&self, config: &Value) -> Result<()>;

    /// Delivers the alert using the given channel config.
    ///
    /// # Errors
    ///
    /// Returns an error when delivery definitively failed (after any
    /// internal retries).
    async fn send(&self, alert: &Alert, config: &Value) -> Result<()>;
}
