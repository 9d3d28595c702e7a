//! Lifecycle event bus.
//!
//! Every dispatch reports its progress through four channels:
//!
//! | Channel | When |
//! |---|---|
//! | begin dispatch | immediately before handler resolution |
//! | transition declined | no transition matched after all guards were scanned |
//! | transition completed | after the commit of an internal or external transition |
//! | exception thrown | any guard, hook, action, or subscriber failure |
//!
//! Subscribers are called synchronously in registration order, on the
//! thread running the dispatch. A subscriber that fails is reported as a
//! further exception record; failures raised while delivering exception
//! records themselves are logged and dropped, which breaks the loop.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use tracing::warn;

use crate::core::{BoxError, EventArgs, EventId, HookResult, StateId};

/// Cloneable capture of a failed callback's error.
#[derive(Clone)]
pub struct Fault(Arc<dyn std::error::Error + Send + Sync>);

impl Fault {
    /// The failure message, as produced by the error's `Display`.
    pub fn message(&self) -> String {
        self.0.to_string()
    }
}

impl From<BoxError> for Fault {
    fn from(err: BoxError) -> Self {
        Fault(Arc::from(err))
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fault({})", self.0)
    }
}

impl Serialize for Fault {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        serializer.collect_str(&self.0)
    }
}

/// Emitted immediately before handler resolution starts.
#[derive(Clone, Debug, Serialize)]
pub struct BeginDispatchRecord<S, E, A> {
    /// The event being dispatched.
    pub event: E,
    /// The leaf state that was current when dispatch began.
    pub source: S,
    /// The arguments posted with the event.
    pub args: A,
    /// When the record was emitted.
    pub at: DateTime<Utc>,
}

/// Emitted when no transition matched the dispatched event.
#[derive(Clone, Debug, Serialize)]
pub struct TransitionDeclinedRecord<S, E, A> {
    /// The event that found no handler.
    pub event: E,
    /// The leaf state that was current when dispatch began.
    pub source: S,
    /// The arguments posted with the event.
    pub args: A,
    /// When the record was emitted.
    pub at: DateTime<Utc>,
}

/// Emitted after a transition committed.
#[derive(Clone, Debug, Serialize)]
pub struct TransitionCompletedRecord<S, E, A> {
    /// The event that triggered the transition.
    pub event: E,
    /// The state that owned the selected transition.
    pub source: S,
    /// The leaf the machine rests in after the commit. For an internal
    /// transition this is the unchanged current leaf.
    pub target: S,
    /// The arguments posted with the event.
    pub args: A,
    /// When the record was emitted.
    pub at: DateTime<Utc>,
}

/// Emitted for every captured guard, hook, action, or subscriber failure.
///
/// During initialization there is no dispatched event, so `event` and
/// `args` are absent and `machine_initialized` is false.
#[derive(Clone, Debug, Serialize)]
pub struct ExceptionRecord<S, E, A> {
    /// The event being dispatched when the failure occurred, if any.
    pub event: Option<E>,
    /// The state whose guard, hook, or action failed, if known.
    pub source: Option<S>,
    /// The arguments posted with the event, if any.
    pub args: Option<A>,
    /// The captured failure.
    pub fault: Fault,
    /// Whether initialization had completed when the failure occurred.
    pub machine_initialized: bool,
    /// When the record was emitted.
    pub at: DateTime<Utc>,
}

type Subscriber<T> = Arc<dyn Fn(&T) -> HookResult + Send + Sync>;
type Channel<T> = Mutex<Vec<Subscriber<T>>>;

/// Registration lists for the four lifecycle channels.
pub(crate) struct Bus<S: StateId, E: EventId, A: EventArgs> {
    begin: Channel<BeginDispatchRecord<S, E, A>>,
    declined: Channel<TransitionDeclinedRecord<S, E, A>>,
    completed: Channel<TransitionCompletedRecord<S, E, A>>,
    exception: Channel<ExceptionRecord<S, E, A>>,
}

/// Lock, ignoring poisoning from a panicked callback.
pub(crate) fn relock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Deliver to a snapshot of the registration list so subscribers may
/// register further callbacks from inside their own callback.
fn deliver<T>(channel: &Channel<T>, record: &T) -> Vec<BoxError> {
    let subscribers: Vec<_> = relock(channel).iter().cloned().collect();
    let mut faults = Vec::new();
    for subscriber in subscribers {
        if let Err(fault) = subscriber(record) {
            faults.push(fault);
        }
    }
    faults
}

impl<S: StateId, E: EventId, A: EventArgs> Bus<S, E, A> {
    pub(crate) fn new() -> Self {
        Bus {
            begin: Mutex::new(Vec::new()),
            declined: Mutex::new(Vec::new()),
            completed: Mutex::new(Vec::new()),
            exception: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn subscribe_begin(
        &self,
        subscriber: impl Fn(&BeginDispatchRecord<S, E, A>) -> HookResult + Send + Sync + 'static,
    ) {
        relock(&self.begin).push(Arc::new(subscriber));
    }

    pub(crate) fn subscribe_declined(
        &self,
        subscriber: impl Fn(&TransitionDeclinedRecord<S, E, A>) -> HookResult + Send + Sync + 'static,
    ) {
        relock(&self.declined).push(Arc::new(subscriber));
    }

    pub(crate) fn subscribe_completed(
        &self,
        subscriber: impl Fn(&TransitionCompletedRecord<S, E, A>) -> HookResult + Send + Sync + 'static,
    ) {
        relock(&self.completed).push(Arc::new(subscriber));
    }

    pub(crate) fn subscribe_exception(
        &self,
        subscriber: impl Fn(&ExceptionRecord<S, E, A>) -> HookResult + Send + Sync + 'static,
    ) {
        relock(&self.exception).push(Arc::new(subscriber));
    }

    pub(crate) fn publish_begin(&self, record: BeginDispatchRecord<S, E, A>) {
        let faults = deliver(&self.begin, &record);
        self.report_subscriber_faults(faults, &record.event, &record.source, &record.args);
    }

    pub(crate) fn publish_declined(&self, record: TransitionDeclinedRecord<S, E, A>) {
        let faults = deliver(&self.declined, &record);
        self.report_subscriber_faults(faults, &record.event, &record.source, &record.args);
    }

    pub(crate) fn publish_completed(&self, record: TransitionCompletedRecord<S, E, A>) {
        let faults = deliver(&self.completed, &record);
        self.report_subscriber_faults(faults, &record.event, &record.source, &record.args);
    }

    /// Exception records are the end of the line: faults raised by their
    /// subscribers are logged and dropped rather than re-emitted.
    pub(crate) fn publish_exception(&self, record: ExceptionRecord<S, E, A>) {
        for fault in deliver(&self.exception, &record) {
            warn!(fault = %fault, "exception subscriber failed; dropping");
        }
    }

    fn report_subscriber_faults(&self, faults: Vec<BoxError>, event: &E, source: &S, args: &A) {
        for fault in faults {
            self.publish_exception(ExceptionRecord {
                event: Some(event.clone()),
                source: Some(source.clone()),
                args: Some(args.clone()),
                fault: Fault::from(fault),
                machine_initialized: true,
                at: Utc::now(),
            });
        }
    }
}
