use netwatch_common::types::AlertStatus;
use netwatch_storage::error::StorageError;

/// Errors from alert lifecycle operations.
///
/// # Examples
///
/// ```rust
/// use netwatch_alert::error::AlertError;
/// use netwatch_common::types::AlertStatus;
///
/// let err = AlertError::InvalidState {
///     action: "acknowledge",
///     status: AlertStatus::Resolved,
/// };
/// assert!(err.to_string().contains("resolved"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    /// The referenced alert does not exist.
    #[error("Alert: alert not found (id={0})")]
    NotFound(String),

    /// The requested lifecycle transition is not legal from the alert's
    /// current status. State is left untouched.
    #[error("Alert: cannot {action} an alert in '{status}' state")]
    InvalidState {
        action: &'static str,
        status: AlertStatus,
    },

    /// An underlying storage failure.
    #[error("Alert: {0}")]
    Storage(#[from] StorageError),
}

/// Errors that abort an entire evaluation pass.
///
/// Per-unit failures (one host's reading, one rule's re-read) are logged and
/// skipped instead; only failures that leave the pass without its inputs
/// (the mute set) surface here.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("Eval: {0}")]
    Storage(#[from] StorageError),
}
