//! Active (asynchronous) dispatcher.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tracing::debug;

use crate::bus::relock;
use crate::core::{EventArgs, EventId, StateHandle, StateId, StateTree};
use crate::dispatch::{EventSender, MachineCore, MachineError};

/// State machine drained by a dedicated worker thread.
///
/// [`initialize`](ActiveMachine::initialize) runs the initial drill on
/// the calling thread, then starts the worker. From that point on every
/// guard, hook, action, and subscriber runs on the worker;
/// [`send`](ActiveMachine::send) never blocks and never runs user code.
///
/// Dropping the machine (or calling [`shutdown`](ActiveMachine::shutdown))
/// refuses further sends, lets the worker drain the remaining queue, and
/// joins it.
pub struct ActiveMachine<S: StateId, E: EventId, A: EventArgs = ()> {
    pub(super) core: Arc<MachineCore<S, E, A>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<S: StateId, E: EventId, A: EventArgs> ActiveMachine<S, E, A> {
    pub(crate) fn new(tree: StateTree<S, E, A>) -> Self {
        ActiveMachine {
            core: Arc::new(MachineCore::new(tree)),
            worker: Mutex::new(None),
        }
    }

    /// Enter `root`, drill to the initial leaf, then start the worker.
    pub fn initialize(&self, root: StateHandle) -> Result<(), MachineError> {
        self.core.initialize(root)?;
        self.spawn_worker()
    }

    /// [`initialize`](Self::initialize) by state id instead of handle.
    pub fn initialize_id(&self, id: &S) -> Result<(), MachineError> {
        let root = self.core.resolve(id)?;
        self.core.initialize(root)?;
        self.spawn_worker()
    }

    fn spawn_worker(&self) -> Result<(), MachineError> {
        let core = Arc::clone(&self.core);
        let handle = std::thread::Builder::new()
            .name("treeline-dispatch".to_string())
            .spawn(move || {
                debug!("dispatch worker started");
                while let Some((event, args)) = core.queue.wait_pop() {
                    core.dispatch(event, args);
                }
                debug!("dispatch worker stopped");
            })?;
        *relock(&self.worker) = Some(handle);
        Ok(())
    }

    /// Append an event, signal the worker, and return immediately.
    pub fn send(&self, event: E, args: A) -> Result<(), MachineError> {
        self.core.enqueue(event, args)
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

    /// Refuse further sends, let the worker drain the queue, and join it.
    ///
    /// Idempotent; also run on drop.
    pub fn shutdown(&self) {
        self.core.stop();
        let handle = relock(&self.worker).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                debug!("dispatch worker panicked before join");
            }
        }
    }
}

impl<S: StateId, E: EventId, A: EventArgs> Drop for ActiveMachine<S, E, A> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
