//! The dispatch engine.
//!
//! Both dispatcher variants funnel into [`dispatch_one`], which resolves
//! the handler for one event, runs the exit/action/entry chain, and
//! reports progress through the lifecycle bus. Failures raised by user
//! callbacks are captured as exception records and never abort the
//! chain or roll back the commit.

use chrono::Utc;
use tracing::{debug, trace};

use crate::bus::{
    BeginDispatchRecord, Bus, ExceptionRecord, Fault, TransitionCompletedRecord,
    TransitionDeclinedRecord,
};
use crate::core::{
    BoxError, EventArgs, EventId, HistoryKind, StateHandle, StateId, StateTree, Transition,
};

/// The mutable per-machine data: current leaf and history slots.
///
/// Everything else a machine holds is read-only after build, so this is
/// the only thing the dispatcher has to lock.
pub(crate) struct Runtime {
    pub(crate) current: Option<StateHandle>,
    history: Vec<Option<StateHandle>>,
}

impl Runtime {
    pub(crate) fn new(states: usize) -> Self {
        Runtime {
            current: None,
            history: vec![None; states],
        }
    }

    fn slot(&self, state: StateHandle) -> Option<StateHandle> {
        self.history[state.0]
    }

    fn set_slot(&mut self, state: StateHandle, value: StateHandle) {
        self.history[state.0] = Some(value);
    }
}

fn report<S: StateId, E: EventId, A: EventArgs>(
    bus: &Bus<S, E, A>,
    event: Option<&E>,
    args: Option<&A>,
    source: Option<&S>,
    initialized: bool,
    err: BoxError,
) {
    bus.publish_exception(ExceptionRecord {
        event: event.cloned(),
        source: source.cloned(),
        args: args.cloned(),
        fault: Fault::from(err),
        machine_initialized: initialized,
        at: Utc::now(),
    });
}

fn run_actions<S: StateId, E: EventId, A: EventArgs>(
    tree: &StateTree<S, E, A>,
    bus: &Bus<S, E, A>,
    owner: StateHandle,
    transition: &Transition<A>,
    event: &E,
    args: &A,
) {
    for action in &transition.actions {
        if let Err(err) = action(args) {
            report(bus, Some(event), Some(args), Some(tree.id(owner)), true, err);
        }
    }
}

/// Descend from `from` to a leaf, running entry hooks top-down.
///
/// A populated history slot wins over the initial substate pointer. Deep
/// slots hold the leaf recorded on exit, so the walk down to it enters
/// every intermediate state on the way.
fn drill<S: StateId, E: EventId, A: EventArgs>(
    tree: &StateTree<S, E, A>,
    rt: &mut Runtime,
    bus: &Bus<S, E, A>,
    from: StateHandle,
    event: Option<&E>,
    args: Option<&A>,
    initialized: bool,
) -> StateHandle {
    let mut node = from;
    loop {
        let remembered = match tree.history_kind(node) {
            HistoryKind::None => None,
            HistoryKind::Shallow | HistoryKind::Deep => rt.slot(node),
        };
        let Some(stop) = remembered.or_else(|| tree.initial(node)) else {
            break;
        };
        for state in tree.path_down(Some(node), stop) {
            trace!(state = tree.id(state).name(), "enter");
            if let Err(err) = tree.run_entry(state) {
                report(bus, event, args, Some(tree.id(state)), initialized, err);
            }
        }
        node = stop;
    }
    debug_assert!(tree.is_leaf(node));
    node
}

/// Enter `root` and drill to its initial leaf.
///
/// Not a dispatched event: emits no begin-dispatch and no terminal
/// record. Entry failures are reported with `machine_initialized` false
/// and do not stop the drill.
pub(crate) fn initialize<S: StateId, E: EventId, A: EventArgs>(
    tree: &StateTree<S, E, A>,
    rt: &mut Runtime,
    bus: &Bus<S, E, A>,
    root: StateHandle,
) {
    debug!(root = tree.id(root).name(), "initializing machine");
    if let Err(err) = tree.run_entry(root) {
        report(bus, None, None, Some(tree.id(root)), false, err);
    }
    let leaf = drill(tree, rt, bus, root, None, None, false);
    rt.current = Some(leaf);
}

/// Run one full dispatch cycle for `event`.
pub(crate) fn dispatch_one<S: StateId, E: EventId, A: EventArgs>(
    tree: &StateTree<S, E, A>,
    rt: &mut Runtime,
    bus: &Bus<S, E, A>,
    event: E,
    args: A,
) {
    let Some(leaf) = rt.current else {
        return;
    };

    debug!(
        event = event.name(),
        source = tree.id(leaf).name(),
        "begin dispatch"
    );
    bus.publish_begin(BeginDispatchRecord {
        event: event.clone(),
        source: tree.id(leaf).clone(),
        args: args.clone(),
        at: Utc::now(),
    });

    // Walk ancestors from the leaf; first transition whose guard passes
    // wins. A raising guard counts as false and keeps the scan going.
    let mut selected: Option<(StateHandle, &Transition<A>)> = None;
    let mut cursor = Some(leaf);
    'resolve: while let Some(state) = cursor {
        for transition in tree.transitions(state, &event) {
            match transition.check_guard(&args) {
                Ok(true) => {
                    selected = Some((state, transition));
                    break 'resolve;
                }
                Ok(false) => {}
                Err(err) => {
                    report(bus, Some(&event), Some(&args), Some(tree.id(state)), true, err);
                }
            }
        }
        cursor = tree.parent(state);
    }

    let Some((owner, transition)) = selected else {
        debug!(event = event.name(), "transition declined");
        bus.publish_declined(TransitionDeclinedRecord {
            event,
            source: tree.id(leaf).clone(),
            args,
            at: Utc::now(),
        });
        return;
    };

    let Some(target) = transition.target else {
        run_actions(tree, bus, owner, transition, &event, &args);
        bus.publish_completed(TransitionCompletedRecord {
            event,
            source: tree.id(owner).clone(),
            target: tree.id(leaf).clone(),
            args,
            at: Utc::now(),
        });
        return;
    };

    // An external self-transition exits and re-enters its state, so the
    // boundary sits one level above it; otherwise the boundary is the
    // lowest common ancestor of the owning state and the target.
    let boundary = if owner == target {
        tree.parent(owner)
    } else {
        tree.lca(owner, target)
    };

    // Exit bottom-up from the leaf to the boundary, capturing history on
    // the parent of every exited state.
    let mut cursor = Some(leaf);
    while let Some(state) = cursor {
        if Some(state) == boundary {
            break;
        }
        if let Some(parent) = tree.parent(state) {
            match tree.history_kind(parent) {
                HistoryKind::Shallow => rt.set_slot(parent, state),
                HistoryKind::Deep => rt.set_slot(parent, leaf),
                HistoryKind::None => {}
            }
        }
        trace!(state = tree.id(state).name(), "exit");
        if let Err(err) = tree.run_exit(state) {
            report(bus, Some(&event), Some(&args), Some(tree.id(state)), true, err);
        }
        cursor = tree.parent(state);
    }

    run_actions(tree, bus, owner, transition, &event, &args);

    for state in tree.path_down(boundary, target) {
        trace!(state = tree.id(state).name(), "enter");
        if let Err(err) = tree.run_entry(state) {
            report(bus, Some(&event), Some(&args), Some(tree.id(state)), true, err);
        }
    }

    let resolved = drill(tree, rt, bus, target, Some(&event), Some(&args), true);
    rt.current = Some(resolved);
    debug!(
        event = event.name(),
        source = tree.id(owner).name(),
        target = tree.id(resolved).name(),
        "transition completed"
    );
    bus.publish_completed(TransitionCompletedRecord {
        event,
        source: tree.id(owner).clone(),
        target: tree.id(resolved).clone(),
        args,
        at: Utc::now(),
    });
}
