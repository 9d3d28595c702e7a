//! Core state machine types and logic.
//!
//! This module contains the pure part of the runtime:
//! - identity traits for states, events, and argument payloads
//! - the arena-backed state tree with its hierarchy queries
//! - transitions and guard predicates
//!
//! Nothing here performs dispatch or touches a thread; the imperative
//! shell around this core lives in [`crate::dispatch`].

mod ident;
mod state;
mod transition;
mod tree;

pub use ident::{EventArgs, EventId, StateId};
pub use state::{HistoryKind, StateHook};
pub use transition::{BoxError, Guard, HookResult, Transition};
pub use tree::StateHandle;

pub(crate) use tree::StateTree;
