//! Build errors for machine construction.

use thiserror::Error;

/// Errors that can occur while assembling a state tree.
///
/// Construction errors are surfaced synchronously to the builder's
/// caller; they never travel through the lifecycle bus.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("state '{id}' is already defined in this machine")]
    DuplicateState { id: String },

    #[error("state handle does not belong to this machine")]
    UnknownHandle,

    #[error("state '{child}' already has a parent")]
    AlreadyParented { child: String },

    #[error("making '{child}' a substate of '{parent}' would create a cycle")]
    WouldCycle { parent: String, child: String },

    #[error("initial substate '{child}' is not a direct child of '{parent}'")]
    InitialNotChild { parent: String, child: String },

    #[error("composite state '{state}' has no initial substate")]
    MissingInitialSubstate { state: String },
}
