//! Per-state configuration accepted by the machine builder.

use crate::core::{HistoryKind, HookResult, StateId, StateHook};

/// Declarative description of one state: id, optional entry and exit
/// hooks, and its history kind.
///
/// # Example
///
/// ```rust
/// use treeline::builder::StateConfig;
/// use treeline::core::{HistoryKind, StateId};
///
/// #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
/// enum Mode {
///     Running,
/// }
///
/// impl StateId for Mode {
///     fn name(&self) -> &str {
///         "Running"
///     }
/// }
///
/// let config = StateConfig::new(Mode::Running)
///     .on_entry(|| println!("spinning up"))
///     .history(HistoryKind::Shallow);
/// # let _ = config;
/// ```
pub struct StateConfig<S: StateId> {
    pub(crate) id: S,
    pub(crate) entry: Option<StateHook>,
    pub(crate) exit: Option<StateHook>,
    pub(crate) history: HistoryKind,
}

impl<S: StateId> StateConfig<S> {
    pub fn new(id: S) -> Self {
        StateConfig {
            id,
            entry: None,
            exit: None,
            history: HistoryKind::None,
        }
    }

    /// Set an infallible entry hook.
    pub fn on_entry<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.entry = Some(Box::new(move || {
            hook();
            Ok(())
        }));
        self
    }

    /// Set an entry hook that may fail.
    pub fn try_on_entry<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> HookResult + Send + Sync + 'static,
    {
        self.entry = Some(Box::new(hook));
        self
    }

    /// Set an infallible exit hook.
    pub fn on_exit<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.exit = Some(Box::new(move || {
            hook();
            Ok(())
        }));
        self
    }

    /// Set an exit hook that may fail.
    pub fn try_on_exit<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> HookResult + Send + Sync + 'static,
    {
        self.exit = Some(Box::new(hook));
        self
    }

    /// Set the history kind (default [`HistoryKind::None`]).
    pub fn history(mut self, kind: HistoryKind) -> Self {
        self.history = kind;
        self
    }
}
