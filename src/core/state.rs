//! State nodes: hooks, hierarchy links, and per-state transition tables.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::ident::{EventArgs, EventId, StateId};
use crate::core::transition::{HookResult, Transition};
use crate::core::tree::StateHandle;

/// What a composite state's initial pointer returns to on re-entry.
///
/// `Shallow` restores the most recently exited direct child, `Deep`
/// restores the leaf that was active when the composite was last exited.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryKind {
    /// Re-entry always follows the initial substate pointer.
    #[default]
    None,
    /// Re-entry resumes at the most recently exited direct child.
    Shallow,
    /// Re-entry resumes at the leaf that was active on exit.
    Deep,
}

/// Nullary entry or exit hook.
pub type StateHook = Box<dyn Fn() -> HookResult + Send + Sync>;

/// One state in the tree.
///
/// Nodes are created through the builder and never mutated structurally
/// after the machine is built. The history slot lives in the machine's
/// runtime, not here, so the tree stays read-only during dispatch.
pub(crate) struct StateNode<S: StateId, E: EventId, A: EventArgs> {
    pub(crate) id: S,
    pub(crate) parent: Option<StateHandle>,
    pub(crate) children: Vec<StateHandle>,
    pub(crate) initial: Option<StateHandle>,
    pub(crate) history: HistoryKind,
    pub(crate) entry: Option<StateHook>,
    pub(crate) exit: Option<StateHook>,
    pub(crate) table: HashMap<E, Vec<Transition<A>>>,
}

impl<S: StateId, E: EventId, A: EventArgs> StateNode<S, E, A> {
    pub(crate) fn new(
        id: S,
        entry: Option<StateHook>,
        exit: Option<StateHook>,
        history: HistoryKind,
    ) -> Self {
        StateNode {
            id,
            parent: None,
            children: Vec::new(),
            initial: None,
            history,
            entry,
            exit,
            table: HashMap::new(),
        }
    }

    /// Append a transition under `event`; insertion order is match order.
    pub(crate) fn add_transition(&mut self, event: E, transition: Transition<A>) {
        self.table.entry(event).or_default().push(transition);
    }

    pub(crate) fn transitions(&self, event: &E) -> &[Transition<A>] {
        self.table.get(event).map(Vec::as_slice).unwrap_or(&[])
    }
}
