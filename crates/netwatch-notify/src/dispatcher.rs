use netwatch_common::types::{Alert, AlertRule, NotificationChannel};
use netwatch_storage::AlertStore;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::time::timeout;

use crate::error::NotifyError;
use crate::registry::NotifierRegistry;
use crate::utils::{truncate_string, MAX_DETAIL_LENGTH};

/// Final result of attempting delivery of one alert through one channel.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchOutcome {
    pub channel_id: String,
    pub channel_name: String,
    pub channel_type: String,
    pub success: bool,
    pub detail: Option<String>,
    pub duration_ms: u64,
}

/// Fans a triggered alert out to its rule's channels in parallel.
///
/// Channel records are re-read from the store at dispatch time, so edits
/// that land between trigger and dispatch take effect. Deliveries run on a
/// semaphore-bounded worker pool with a per-channel timeout; one channel's
/// failure or timeout never blocks another's delivery, and there is no
/// cross-channel rollback.
pub struct Dispatcher {
    store: Arc<dyn AlertStore>,
    registry: Arc<NotifierRegistry>,
    max_concurrent: usize,
    send_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn AlertStore>,
        registry: Arc<NotifierRegistry>,
        max_concurrent: usize,
        send_timeout: Duration,
    ) -> Self {
        Self {
            store,
            registry,
            max_concurrent: max_concurrent.max(1),
            send_timeout,
        }
    }

    /// Delivers `alert` to every qualifying channel of `rule`.
    ///
    /// Disabled channels and channels whose `min_severity` exceeds the
    /// alert's severity are dropped without an outcome entry. Missing
    /// channel records and unregistered channel types are configuration
    /// errors recorded as per-channel failures. A rule with no qualifying
    /// channels yields an empty map.
    pub async fn dispatch(
        &self,
        alert: &Alert,
        rule: &AlertRule,
    ) -> HashMap<String, DispatchOutcome> {
        let mut outcomes = HashMap::new();
        let mut qualifying: Vec<NotificationChannel> = Vec::new();

        for channel_id in &rule.notification_channels {
            match self.store.get_channel(channel_id).await {
                Ok(Some(channel)) => {
                    if !channel.enabled {
                        tracing::debug!(channel_id = %channel_id, "Channel disabled, dropped");
                        continue;
                    }
                    if !channel.accepts(alert.severity) {
                        tracing::debug!(
                            channel_id = %channel_id,
                            severity = %alert.severity,
                            "Alert below channel min_severity, skipped"
                        );
                        continue;
                    }
                    qualifying.push(channel);
                }
                Ok(None) => {
                    outcomes.insert(
                        channel_id.clone(),
                        DispatchOutcome {
                            channel_id: channel_id.clone(),
                            channel_name: String::new(),
                            channel_type: String::new(),
                            success: false,
                            detail: Some(format!("channel {channel_id} not found")),
                            duration_ms: 0,
                        },
                    );
                }
                Err(e) => {
                    outcomes.insert(
                        channel_id.clone(),
                        DispatchOutcome {
                            channel_id: channel_id.clone(),
                            channel_name: String::new(),
                            channel_type: String::new(),
                            success: false,
                            detail: Some(e.to_string()),
                            duration_ms: 0,
                        },
                    );
                }
            }
        }

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::new();

        for channel in qualifying {
            // Unregistered channel types are a configuration error; no
            // worker is spawned for them.
            let Some(notifier) = self.registry.get(&channel.channel_type) else {
                let err = NotifyError::UnknownChannelType(channel.channel_type.clone());
                outcomes.insert(
                    channel.id.clone(),
                    DispatchOutcome {
                        channel_id: channel.id.clone(),
                        channel_name: channel.name.clone(),
                        channel_type: channel.channel_type.clone(),
                        success: false,
                        detail: Some(err.to_string()),
                        duration_ms: 0,
                    },
                );
                continue;
            };

            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                // The semaphore is never closed while dispatching; treat a
                // closed pool as a failed delivery rather than panicking.
                outcomes.insert(
                    channel.id.clone(),
                    DispatchOutcome {
                        channel_id: channel.id.clone(),
                        channel_name: channel.name.clone(),
                        channel_type: channel.channel_type.clone(),
                        success: false,
                        detail: Some("worker pool closed".to_string()),
                        duration_ms: 0,
                    },
                );
                continue;
            };

            let alert = alert.clone();
            let send_timeout = self.send_timeout;
            let handle = tokio::spawn(async move {
                let started = Instant::now();
                let (success, detail) =
                    match timeout(send_timeout, notifier.send(&alert, &channel.config)).await {
                        Ok(Ok(())) => (true, None),
                        Ok(Err(e)) => (false, Some(truncate_string(&e.to_string(), MAX_DETAIL_LENGTH))),
                        Err(_) => (false, Some(format!("timed out after {send_timeout:?}"))),
                    };
                drop(permit);
                DispatchOutcome {
                    channel_id: channel.id.clone(),
                    channel_name: channel.name.clone(),
                    channel_type: channel.channel_type.clone(),
                    success,
                    detail,
                    duration_ms: started.elapsed().as_millis() as u64,
                }
            });
            handles.push(handle);
        }

        for handle in handles {
            match handle.await {
                Ok(outcome) => {
                    if outcome.success {
                        tracing::info!(
                            alert_id = %alert.id,
                            channel = %outcome.channel_name,
                            duration_ms = outcome.duration_ms,
                            "Notification delivered"
                        );
                    } else {
                        tracing::warn!(
                            alert_id = %alert.id,
                            channel = %outcome.channel_name,
                            detail = outcome.detail.as_deref().unwrap_or("-"),
                            "Notification delivery failed"
                        );
                    }
                    outcomes.insert(outcome.channel_id.clone(), outcome);
                }
                Err(e) => {
                    tracing::error!(alert_id = %alert.id, error = %e, "Dispatch worker panicked");
                }
            }
        }

        outcomes
    }
}
