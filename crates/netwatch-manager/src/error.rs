use netwatch_alert::error::AlertError;
use netwatch_storage::error::StorageError;

/// Errors surfaced by the alert manager facade.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    /// Invalid rule, channel, or mute definition. Raised at create/update
    /// time, never silently accepted.
    #[error("Manager: invalid configuration: {0}")]
    Configuration(String),

    /// The evaluation pass could not obtain its inputs (rule set or host
    /// roster). The pass is aborted; the scheduler should retry next tick.
    #[error("Manager: evaluation pass aborted: {0}")]
    FatalPass(String),

    /// An illegal alert lifecycle transition or a missing alert.
    #[error(transparent)]
    Lifecycle(#[from] AlertError),

    /// A storage failure outside the evaluation pass.
    #[error(transparent)]
    Storage(#[from] StorageError),
}
