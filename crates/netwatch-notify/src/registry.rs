use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{NotifyError, Result};
use crate::Notifier;

/// Registry of available [`Notifier`]s, keyed by channel type.
///
/// Constructed at startup and injected into the dispatcher and the manager;
/// there is no process-wide mutable table, so tests can swap in fakes
/// freely.
///
/// # Examples
///
/// ```
/// use netwatch_notify::registry::NotifierRegistry;
///
/// let registry = NotifierRegistry::default();
/// assert!(registry.has_notifier("email"));
/// assert!(registry.has_notifier("slack"));
/// assert!(registry.has_notifier("webhook"));
/// assert!(!registry.has_notifier("carrier-pigeon"));
/// ```
pub struct NotifierRegistry {
    notifiers: HashMap<String, Arc<dyn Notifier>>,
}

impl NotifierRegistry {
    pub fn new() -> Self {
        Self {
            notifiers: HashMap::new(),
        }
    }

    pub fn register(&mut self, notifier: Arc<dyn Notifier>) {
        let name = notifier.channel_type().to_string();
        self.notifiers.insert(name, notifier);
    }

    pub fn get(&self, channel_type: &str) -> Option<Arc<dyn Notifier>> {
        self.notifiers.get(channel_type).cloned()
    }

    pub fn has_notifier(&self, channel_type: &str) -> bool {
        self.notifiers.contains_key(channel_type)
    }

    pub fn notifier_names(&self) -> Vec<&str> {
        self.notifiers.keys().map(|s| s.as_str()).collect()
    }

    /// Validates a channel config against the notifier registered for
    /// `channel_type`.
    pub fn validate_config(&self, channel_type: &str, config: &Value) -> Result<()> {
        let notifier = self
            .get(channel_type)
            .ok_or_else(|| NotifyError::UnknownChannelType(channel_type.to_string()))?;
        notifier.validate_config(config)
    }
}

impl Default for NotifierRegistry {
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(crate::channels::email::EmailNotifier::new()));
        registry.register(Arc::new(crate::channels::slack::SlackNotifier::new()));
        registry.register(Arc::new(crate::channels::webhook::WebhookNotifier::new()));
        registry
    }
}
