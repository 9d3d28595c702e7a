//! Event dispatch: the imperative shell around the core state tree.
//!
//! Two dispatcher variants share one engine. The passive machine drains
//! its queue on whichever thread calls [`PassiveMachine::execute`]; the
//! active machine owns a worker thread that drains as events arrive.

mod active;
mod engine;
mod error;
mod passive;
mod queue;

pub use active::ActiveMachine;
pub use error::MachineError;
pub use passive::PassiveMachine;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, TryLockError};

use crate::bus::{
    relock, BeginDispatchRecord, Bus, ExceptionRecord, TransitionCompletedRecord,
    TransitionDeclinedRecord,
};
use crate::core::{EventArgs, EventId, HookResult, StateHandle, StateId, StateTree};
use engine::Runtime;
use queue::EventQueue;

/// Sentinel for "no current state" in the lock-free current cache.
const NO_STATE: usize = usize::MAX;

/// State shared between a machine's public handle, its senders, and
/// (for the active variant) its worker thread.
pub(crate) struct MachineCore<S: StateId, E: EventId, A: EventArgs> {
    tree: StateTree<S, E, A>,
    runtime: Mutex<Runtime>,
    queue: EventQueue<E, A>,
    bus: Bus<S, E, A>,
    /// Mirror of `Runtime::current`, updated after each dispatch so
    /// callbacks can query the current state without taking the runtime
    /// lock they are already under.
    current_cache: AtomicUsize,
    initialized: AtomicBool,
    stopped: AtomicBool,
}

impl<S: StateId, E: EventId, A: EventArgs> MachineCore<S, E, A> {
    pub(crate) fn new(tree: StateTree<S, E, A>) -> Self {
        let states = tree.len();
        MachineCore {
            tree,
            runtime: Mutex::new(Runtime::new(states)),
            queue: EventQueue::new(),
            bus: Bus::new(),
            current_cache: AtomicUsize::new(NO_STATE),
            initialized: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub(crate) fn resolve(&self, id: &S) -> Result<StateHandle, MachineError> {
        self.tree.lookup(id).ok_or_else(|| MachineError::UnknownState {
            id: id.name().to_string(),
        })
    }

    /// Run the initial drill and mark the machine live.
    pub(crate) fn initialize(&self, root: StateHandle) -> Result<(), MachineError> {
        if self.is_initialized() {
            return Err(MachineError::AlreadyInitialized);
        }
        if !self.tree.contains(root) {
            return Err(MachineError::UnknownState {
                id: format!("handle #{}", root.0),
            });
        }
        {
            let mut rt = relock(&self.runtime);
            engine::initialize(&self.tree, &mut rt, &self.bus, root);
            self.cache_current(&rt);
        }
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    /// Append to the queue; dispatch-before-initialize and send-after-stop
    /// are the caller's mistakes and are surfaced synchronously.
    pub(crate) fn enqueue(&self, event: E, args: A) -> Result<(), MachineError> {
        if !self.is_initialized() {
            return Err(MachineError::NotInitialized);
        }
        if self.stopped.load(Ordering::Acquire) {
            return Err(MachineError::Stopped);
        }
        self.queue.push(event, args);
        Ok(())
    }

    /// Dispatch one event under the runtime lock.
    pub(crate) fn dispatch(&self, event: E, args: A) {
        let mut rt = relock(&self.runtime);
        engine::dispatch_one(&self.tree, &mut rt, &self.bus, event, args);
        self.cache_current(&rt);
    }

    /// Drain the queue on the calling thread. Reentrant sends made by
    /// callbacks land on the same queue and are picked up by this loop.
    ///
    /// A reentrant drain (a callback calling `execute`) finds the lock
    /// held and returns; the outer drain finishes the queue.
    pub(crate) fn drain(&self) {
        let mut rt = match self.runtime.try_lock() {
            Ok(rt) => rt,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return,
        };
        while let Some((event, args)) = self.queue.try_pop() {
            engine::dispatch_one(&self.tree, &mut rt, &self.bus, event, args);
            self.cache_current(&rt);
        }
    }

    fn cache_current(&self, rt: &Runtime) {
        let index = rt.current.map(|leaf| leaf.0).unwrap_or(NO_STATE);
        self.current_cache.store(index, Ordering::Release);
    }

    pub(crate) fn current_state_id(&self) -> Option<S> {
        match self.current_cache.load(Ordering::Acquire) {
            NO_STATE => None,
            index => Some(self.tree.id(StateHandle(index)).clone()),
        }
    }

    pub(crate) fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        self.queue.close();
    }
}

/// Cheap-clone handle for posting events without owning the machine.
///
/// Handed out by [`PassiveMachine::sender`] and [`ActiveMachine::sender`];
/// the usual way for an action or subscriber to post follow-up events
/// from inside a dispatch.
pub struct EventSender<E, A = ()> {
    post: Arc<dyn Fn(E, A) -> Result<(), MachineError> + Send + Sync>,
}

impl<E, A> Clone for EventSender<E, A> {
    fn clone(&self) -> Self {
        EventSender {
            post: Arc::clone(&self.post),
        }
    }
}

impl<E, A> EventSender<E, A> {
    pub(crate) fn new<S: StateId>(core: Arc<MachineCore<S, E, A>>) -> Self
    where
        E: EventId,
        A: EventArgs,
    {
        EventSender {
            post: Arc::new(move |event, args| core.enqueue(event, args)),
        }
    }

    /// Append an event to the owning machine's queue.
    pub fn send(&self, event: E, args: A) -> Result<(), MachineError> {
        (self.post)(event, args)
    }
}

/// Subscription surface shared by both machine variants.
macro_rules! delegate_subscriptions {
    ($machine:ident) => {
        impl<S: StateId, E: EventId, A: EventArgs> $machine<S, E, A> {
            /// Subscribe to begin-dispatch records.
            pub fn subscribe_begin_dispatch(
                &self,
                subscriber: impl Fn(&BeginDispatchRecord<S, E, A>) -> HookResult
                    + Send
                    + Sync
                    + 'static,
            ) {
                self.core.bus.subscribe_begin(subscriber);
            }

            /// Subscribe to transition-declined records.
            pub fn subscribe_transition_declined(
                &self,
                subscriber: impl Fn(&TransitionDeclinedRecord<S, E, A>) -> HookResult
                    + Send
                    + Sync
                    + 'static,
            ) {
                self.core.bus.subscribe_declined(subscriber);
            }

            /// Subscribe to transition-completed records.
            pub fn subscribe_transition_completed(
                &self,
                subscriber: impl Fn(&TransitionCompletedRecord<S, E, A>) -> HookResult
                    + Send
                    + Sync
                    + 'static,
            ) {
                self.core.bus.subscribe_completed(subscriber);
            }

            /// Subscribe to exception records.
            pub fn subscribe_exception_thrown(
                &self,
                subscriber: impl Fn(&ExceptionRecord<S, E, A>) -> HookResult
                    + Send
                    + Sync
                    + 'static,
            ) {
                self.core.bus.subscribe_exception(subscriber);
            }
        }
    };
}

delegate_subscriptions!(PassiveMachine);
delegate_subscriptions!(ActiveMachine);
