//! Arena-backed state forest with hierarchy queries.
//!
//! States live in a flat arena and reference each other by index, so a
//! transition can point at a state that is declared later without any
//! forward-reference juggling. All queries here are pure; the only
//! mutable per-machine data (current leaf, history slots) lives in the
//! dispatcher runtime.

use std::collections::HashMap;

use crate::core::ident::{EventArgs, EventId, StateId};
use crate::core::state::{HistoryKind, StateHook, StateNode};
use crate::core::transition::{HookResult, Transition};

/// Copyable reference to a state in one machine's tree.
///
/// Handles are arena indices scoped to the builder that produced them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StateHandle(pub(crate) usize);

/// The immutable state forest owned by a machine.
pub(crate) struct StateTree<S: StateId, E: EventId, A: EventArgs> {
    nodes: Vec<StateNode<S, E, A>>,
    index: HashMap<S, StateHandle>,
}

impl<S: StateId, E: EventId, A: EventArgs> StateTree<S, E, A> {
    pub(crate) fn new() -> Self {
        StateTree {
            nodes: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Insert a node; the caller has already rejected duplicate ids.
    pub(crate) fn insert(
        &mut self,
        id: S,
        entry: Option<StateHook>,
        exit: Option<StateHook>,
        history: HistoryKind,
    ) -> StateHandle {
        let handle = StateHandle(self.nodes.len());
        self.index.insert(id.clone(), handle);
        self.nodes.push(StateNode::new(id, entry, exit, history));
        handle
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn contains(&self, handle: StateHandle) -> bool {
        handle.0 < self.nodes.len()
    }

    pub(crate) fn lookup(&self, id: &S) -> Option<StateHandle> {
        self.index.get(id).copied()
    }

    pub(crate) fn id(&self, handle: StateHandle) -> &S {
        &self.nodes[handle.0].id
    }

    pub(crate) fn parent(&self, handle: StateHandle) -> Option<StateHandle> {
        self.nodes[handle.0].parent
    }

    pub(crate) fn initial(&self, handle: StateHandle) -> Option<StateHandle> {
        self.nodes[handle.0].initial
    }

    pub(crate) fn history_kind(&self, handle: StateHandle) -> HistoryKind {
        self.nodes[handle.0].history
    }

    pub(crate) fn is_leaf(&self, handle: StateHandle) -> bool {
        self.nodes[handle.0].children.is_empty()
    }

    pub(crate) fn set_parent(&mut self, parent: StateHandle, child: StateHandle) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    pub(crate) fn set_initial(&mut self, parent: StateHandle, child: StateHandle) {
        self.nodes[parent.0].initial = Some(child);
    }

    pub(crate) fn add_transition(
        &mut self,
        source: StateHandle,
        event: E,
        transition: Transition<A>,
    ) {
        self.nodes[source.0].add_transition(event, transition);
    }

    pub(crate) fn transitions(&self, handle: StateHandle, event: &E) -> &[Transition<A>] {
        self.nodes[handle.0].transitions(event)
    }

    pub(crate) fn run_entry(&self, handle: StateHandle) -> HookResult {
        match &self.nodes[handle.0].entry {
            Some(hook) => hook(),
            None => Ok(()),
        }
    }

    pub(crate) fn run_exit(&self, handle: StateHandle) -> HookResult {
        match &self.nodes[handle.0].exit {
            Some(hook) => hook(),
            None => Ok(()),
        }
    }

    pub(crate) fn depth(&self, handle: StateHandle) -> usize {
        let mut depth = 0;
        let mut cursor = self.parent(handle);
        while let Some(up) = cursor {
            depth += 1;
            cursor = self.parent(up);
        }
        depth
    }

    /// Whether `ancestor` is `state` itself or a proper ancestor of it.
    pub(crate) fn is_self_or_ancestor(&self, ancestor: StateHandle, state: StateHandle) -> bool {
        let mut cursor = Some(state);
        while let Some(s) = cursor {
            if s == ancestor {
                return true;
            }
            cursor = self.parent(s);
        }
        false
    }

    /// Lowest common ancestor, or `None` when the two states sit in
    /// different trees of the forest.
    pub(crate) fn lca(&self, a: StateHandle, b: StateHandle) -> Option<StateHandle> {
        let mut a = Some(a);
        let mut b = Some(b);
        let mut depth_a = a.map(|s| self.depth(s)).unwrap_or(0);
        let mut depth_b = b.map(|s| self.depth(s)).unwrap_or(0);

        while depth_a > depth_b {
            a = a.and_then(|s| self.parent(s));
            depth_a -= 1;
        }
        while depth_b > depth_a {
            b = b.and_then(|s| self.parent(s));
            depth_b -= 1;
        }
        while a != b {
            a = a.and_then(|s| self.parent(s));
            b = b.and_then(|s| self.parent(s));
        }
        a
    }

    /// Top-down path from `from` (exclusive) to `to` (inclusive).
    ///
    /// `from` must be `None` (walk from the root) or an ancestor of `to`;
    /// passing `Some(to)` yields an empty path.
    pub(crate) fn path_down(&self, from: Option<StateHandle>, to: StateHandle) -> Vec<StateHandle> {
        let mut path = Vec::new();
        let mut cursor = Some(to);
        while let Some(s) = cursor {
            if Some(s) == from {
                break;
            }
            path.push(s);
            cursor = self.parent(s);
        }
        path.reverse();
        path
    }

    /// First composite state lacking an initial substate pointer, if any.
    pub(crate) fn composite_without_initial(&self) -> Option<StateHandle> {
        self.nodes
            .iter()
            .enumerate()
            .find(|(_, node)| !node.children.is_empty() && node.initial.is_none())
            .map(|(i, _)| StateHandle(i))
    }
}
