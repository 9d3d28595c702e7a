//! Dispatch-surface errors.

use thiserror::Error;

/// Errors surfaced synchronously by the machine API.
///
/// Runtime failures inside guards, hooks, actions, and subscribers are
/// never raised here; they travel through the lifecycle bus as exception
/// records.
#[derive(Debug, Error)]
pub enum MachineError {
    #[error("machine is not initialized; call initialize first")]
    NotInitialized,

    #[error("machine is already initialized")]
    AlreadyInitialized,

    #[error("machine is stopped and no longer accepts events")]
    Stopped,

    #[error("unknown state '{id}'")]
    UnknownState { id: String },

    #[error("failed to spawn dispatch worker")]
    WorkerSpawn(#[from] std::io::Error),
}
