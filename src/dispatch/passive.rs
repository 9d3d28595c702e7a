//! Passive (synchronous) dispatcher.

use std::sync::Arc;

use crate::core::{EventArgs, EventId, StateHandle, StateId, StateTree};
use crate::dispatch::{EventSender, MachineCore, MachineError};

/// State machine drained on the caller's thread.
///
/// [`send`](PassiveMachine::send) only enqueues; nothing runs until
/// [`execute`](PassiveMachine::execute) drains the queue. Guards, hooks,
/// actions, and subscribers all run on the thread that called `execute`.
///
/// The handle is cheap to clone; clones share the same machine.
///
/// # Example
///
/// ```rust
/// use treeline::builder::{MachineBuilder, StateConfig};
/// use treeline::core::Transition;
/// use treeline::id_enum;
///
/// id_enum! {
///     enum Light { Red, Green }
/// }
/// id_enum! {
///     enum Signal { Change }
/// }
///
/// let mut builder = MachineBuilder::<Light, Signal>::new();
/// let red = builder.state(StateConfig::new(Light::Red)).unwrap();
/// let green = builder.state(StateConfig::new(Light::Green)).unwrap();
/// builder.transition(red, Signal::Change, Transition::to(green)).unwrap();
///
/// let machine = builder.build_passive().unwrap();
/// machine.initialize(red).unwrap();
/// machine.send(Signal::Change, ()).unwrap();
/// machine.execute().unwrap();
///
/// assert_eq!(machine.current_state_id(), Some(Light::Green));
/// ```
pub struct PassiveMachine<S: StateId, E: EventId, A: EventArgs = ()> {
    pub(super) core: Arc<MachineCore<S, E, A>>,
}

impl<S: StateId, E: EventId, A: EventArgs> Clone for PassiveMachine<S, E, A> {
    fn clone(&self) -> Self {
        PassiveMachine {
            core: Arc::clone(&self.core),
        }
    }
}

impl<S: StateId, E: EventId, A: EventArgs> PassiveMachine<S, E, A> {
    pub(crate) fn new(tree: StateTree<S, E, A>) -> Self {
        PassiveMachine {
            core: Arc::new(MachineCore::new(tree)),
        }
    }

    /// Enter `root`, drill to the initial leaf, and mark the machine live.
    pub fn initialize(&self, root: StateHandle) -> Result<(), MachineError> {
        self.core.initialize(root)
    }

    /// [`initialize`](Self::initialize) by state id instead of handle.
    pub fn initialize_id(&self, id: &S) -> Result<(), MachineError> {
        let root = self.core.resolve(id)?;
        self.core.initialize(root)
    }

    /// Append an event to the queue and return immediately.
    pub fn send(&self, event: E, args: A) -> Result<(), MachineError> {
        self.core.enqueue(event, args)
    }

    /// Drain the queue on the calling thread until it is empty.
    ///
    /// Events sent by callbacks during the drain are processed in the
    /// same call, in FIFO order after everything already queued.
    pub fn execute(&self) -> Result<(), MachineError> {
        if !self.core.is_initialized() {
            return Err(MachineError::NotInitialized);
        }
        self.core.drain();
        Ok(())
    }

    /// The id of the current leaf state, or `None` before initialization.
    pub fn current_state_id(&self) -> Option<S> {
        self.core.current_state_id()
    }

    pub fn is_initialized(&self) -> bool {
        self.core.is_initialized()
    }

    /// A cheap-clone handle for posting events from callbacks or other
    /// threads.
    pub fn sender(&self) -> EventSender<E, A> {
        EventSender::new(Arc::clone(&self.core))
    }

    /// Refuse further sends. Events already queued can still be drained
    /// with [`execute`](Self::execute).
    pub fn stop(&self) {
        self.core.stop();
    }
}
