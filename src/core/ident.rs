//! Identity traits for states, events, and event arguments.
//!
//! A machine is generic over three user-supplied types: the state id,
//! the event id, and the argument payload carried with each posted event.
//! Ids are plain comparable values, typically fieldless enums.

use std::fmt::Debug;
use std::hash::Hash;

/// Identifier for a state within one machine.
///
/// Ids are drawn from a finite type chosen by the caller and must be
/// unique within a machine. The `id_enum!` macro implements this trait
/// for plain enums.
///
/// # Example
///
/// ```rust
/// use treeline::core::StateId;
///
/// #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
/// enum Door {
///     Open,
///     Closed,
/// }
///
/// impl StateId for Door {
///     fn name(&self) -> &str {
///         match self {
///             Self::Open => "Open",
///             Self::Closed => "Closed",
///         }
///     }
/// }
///
/// assert_eq!(Door::Open.name(), "Open");
/// ```
pub trait StateId: Clone + Eq + Hash + Debug + Send + Sync + 'static {
    /// Get the state's name for display and logging.
    fn name(&self) -> &str;
}

/// Identifier for an event that can trigger transitions.
///
/// Event ids key the per-state transition tables, so they need the same
/// comparable-value shape as state ids.
pub trait EventId: Clone + Eq + Hash + Debug + Send + Sync + 'static {
    /// Get the event's name for display and logging.
    fn name(&self) -> &str;
}

/// Argument payload posted alongside an event.
///
/// The runtime never inspects the payload; it is cloned into lifecycle
/// records and passed by reference to guards and actions. Any cloneable,
/// debuggable, thread-safe type qualifies, including `()` (the default).
pub trait EventArgs: Clone + Debug + Send + Sync + 'static {}

impl<T: Clone + Debug + Send + Sync + 'static> EventArgs for T {}
