//! Builder for constructing state machines.

use crate::builder::error::BuildError;
use crate::builder::state::StateConfig;
use crate::core::{EventArgs, EventId, StateHandle, StateId, StateTree, Transition};
use crate::dispatch::{ActiveMachine, PassiveMachine};

/// Assembles a state tree, then hands back a passive or active machine.
///
/// The builder is consumed by `build_passive`/`build_active`, so the
/// tree cannot be mutated structurally once a machine exists.
///
/// # Example
///
/// ```rust
/// use treeline::builder::{MachineBuilder, StateConfig};
/// use treeline::core::Transition;
/// use treeline::id_enum;
///
/// id_enum! {
///     enum Phase { Drafting, Review, Published }
/// }
/// id_enum! {
///     enum Action { Submit, Approve }
/// }
///
/// let mut builder = MachineBuilder::<Phase, Action>::new();
/// let drafting = builder.state(StateConfig::new(Phase::Drafting))?;
/// let review = builder.state(StateConfig::new(Phase::Review))?;
/// let published = builder.state(StateConfig::new(Phase::Published))?;
///
/// builder.transition(drafting, Action::Submit, Transition::to(review))?;
/// builder.transition(review, Action::Approve, Transition::to(published))?;
///
/// let machine = builder.build_passive()?;
/// machine.initialize(drafting).unwrap();
/// # Ok::<(), treeline::builder::BuildError>(())
/// ```
pub struct MachineBuilder<S: StateId, E: EventId, A: EventArgs = ()> {
    tree: StateTree<S, E, A>,
}

impl<S: StateId, E: EventId, A: EventArgs> MachineBuilder<S, E, A> {
    pub fn new() -> Self {
        MachineBuilder {
            tree: StateTree::new(),
        }
    }

    /// Create a state; ids must be unique within the machine.
    pub fn state(&mut self, config: StateConfig<S>) -> Result<StateHandle, BuildError> {
        if self.tree.lookup(&config.id).is_some() {
            return Err(BuildError::DuplicateState {
                id: config.id.name().to_string(),
            });
        }
        Ok(self
            .tree
            .insert(config.id, config.entry, config.exit, config.history))
    }

    /// Create a state and attach it under `parent` in one step.
    pub fn substate_of(
        &mut self,
        parent: StateHandle,
        config: StateConfig<S>,
    ) -> Result<StateHandle, BuildError> {
        self.check(parent)?;
        let child = self.state(config)?;
        self.substate(parent, child)?;
        Ok(child)
    }

    /// Attach `child` under `parent`.
    ///
    /// Rejects children that already have a parent and links that would
    /// close a cycle.
    pub fn substate(&mut self, parent: StateHandle, child: StateHandle) -> Result<(), BuildError> {
        self.check(parent)?;
        self.check(child)?;
        if self.tree.parent(child).is_some() {
            return Err(BuildError::AlreadyParented {
                child: self.tree.id(child).name().to_string(),
            });
        }
        if self.tree.is_self_or_ancestor(child, parent) {
            return Err(BuildError::WouldCycle {
                parent: self.tree.id(parent).name().to_string(),
                child: self.tree.id(child).name().to_string(),
            });
        }
        self.tree.set_parent(parent, child);
        Ok(())
    }

    /// Pick which direct child `parent` drills into on entry.
    pub fn initial(&mut self, parent: StateHandle, child: StateHandle) -> Result<(), BuildError> {
        self.check(parent)?;
        self.check(child)?;
        if self.tree.parent(child) != Some(parent) {
            return Err(BuildError::InitialNotChild {
                parent: self.tree.id(parent).name().to_string(),
                child: self.tree.id(child).name().to_string(),
            });
        }
        self.tree.set_initial(parent, child);
        Ok(())
    }

    /// Append a transition to `source`'s table under `event`.
    ///
    /// Transitions added for the same event are tried in insertion order.
    pub fn transition(
        &mut self,
        source: StateHandle,
        event: E,
        transition: Transition<A>,
    ) -> Result<(), BuildError> {
        self.check(source)?;
        if let Some(target) = transition.target {
            self.check(target)?;
        }
        self.tree.add_transition(source, event, transition);
        Ok(())
    }

    /// Finish construction as a passive (caller-drained) machine.
    pub fn build_passive(self) -> Result<PassiveMachine<S, E, A>, BuildError> {
        Ok(PassiveMachine::new(self.seal()?))
    }

    /// Finish construction as an active (worker-drained) machine.
    pub fn build_active(self) -> Result<ActiveMachine<S, E, A>, BuildError> {
        Ok(ActiveMachine::new(self.seal()?))
    }

    fn seal(self) -> Result<StateTree<S, E, A>, BuildError> {
        if let Some(offender) = self.tree.composite_without_initial() {
            return Err(BuildError::MissingInitialSubstate {
                state: self.tree.id(offender).name().to_string(),
            });
        }
        Ok(self.tree)
    }

    fn check(&self, handle: StateHandle) -> Result<(), BuildError> {
        if self.tree.contains(handle) {
            Ok(())
        } else {
            Err(BuildError::UnknownHandle)
        }
    }
}

impl<S: StateId, E: EventId, A: EventArgs> Default for MachineBuilder<S, E, A> {
    fn default() -> Self {
        Self::new()
    }
}
