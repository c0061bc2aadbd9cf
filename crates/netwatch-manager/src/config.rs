use serde::{Deserialize, Serialize};

use crate::error::ManagerError;

/// Tunables for the alerting engine, loaded from TOML.
///
/// Every field has a default, so an empty file (or an absent section) yields
/// a working configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Worker pool size for parallel channel dispatch.
    #[serde(default = "default_dispatch_max_concurrent")]
    pub dispatch_max_concurrent: usize,

    /// Per-channel delivery timeout in seconds.
    #[serde(default = "default_dispatch_timeout_secs")]
    pub dispatch_timeout_secs: u64,

    /// Timeout in seconds for each metric-source call.
    #[serde(default = "default_source_timeout_secs")]
    pub source_timeout_secs: u64,

    /// Default cutoff for `resolve_stale` housekeeping.
    #[serde(default = "default_stale_resolve_hours")]
    pub stale_resolve_hours: i64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            dispatch_max_concurrent: default_dispatch_max_concurrent(),
            dispatch_timeout_secs: default_dispatch_timeout_secs(),
            source_timeout_secs: default_source_timeout_secs(),
            stale_resolve_hours: default_stale_resolve_hours(),
        }
    }
}

fn default_dispatch_max_concurrent() -> usize {
    5
}

fn default_dispatch_timeout_secs() -> u64 {
    30
}

fn default_source_timeout_secs() -> u64 {
    10
}

fn default_stale_resolve_hours() -> i64 {
    48
}

impl ManagerConfig {
    pub fn load(path: &str) -> Result<Self, ManagerError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ManagerError::Configuration(format!("cannot read {path}: {e}")))?;
        toml::from_str(&content)
            .map_err(|e| ManagerError::Configuration(format!("cannot parse {path}: {e}")))
    }
}
