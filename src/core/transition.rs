//! Transitions and guard predicates.
//!
//! A transition belongs to the state that owns its table entry. Its guard
//! decides whether it applies to a posted event, its actions run with the
//! event arguments, and its optional target distinguishes external
//! transitions from internal ones.

use crate::core::tree::StateHandle;

/// Boxed error produced by a failing guard, action, or entry/exit hook.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for user callbacks invoked by the runtime.
pub type HookResult = Result<(), BoxError>;

type Predicate<A> = Box<dyn Fn(&A) -> Result<bool, BoxError> + Send + Sync>;

/// Fallible predicate over the event arguments.
///
/// A guard that returns an error is treated as having said no, and the
/// failure is reported through the lifecycle bus. An absent guard is
/// equivalent to one that always returns true.
///
/// # Example
///
/// ```rust
/// use treeline::core::Guard;
///
/// let positive = Guard::new(|amount: &i64| *amount > 0);
///
/// assert_eq!(positive.check(&5).unwrap(), true);
/// assert_eq!(positive.check(&-1).unwrap(), false);
/// ```
pub struct Guard<A> {
    predicate: Predicate<A>,
}

impl<A> Guard<A> {
    /// Create a guard from an infallible predicate.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&A) -> bool + Send + Sync + 'static,
    {
        Guard {
            predicate: Box::new(move |args| Ok(predicate(args))),
        }
    }

    /// Create a guard from a predicate that may fail.
    pub fn fallible<F>(predicate: F) -> Self
    where
        F: Fn(&A) -> Result<bool, BoxError> + Send + Sync + 'static,
    {
        Guard {
            predicate: Box::new(predicate),
        }
    }

    /// Evaluate the guard against the event arguments.
    pub fn check(&self, args: &A) -> Result<bool, BoxError> {
        (self.predicate)(args)
    }
}

type Action<A> = Box<dyn Fn(&A) -> HookResult + Send + Sync>;

/// A transition out of (or within) one state.
///
/// Constructed with [`Transition::to`] for external transitions or
/// [`Transition::internal`] for internal ones, then configured fluently.
/// The source state is implied by the table the transition is added to.
///
/// An external transition whose target equals its source is a
/// self-transition: the state is exited and re-entered. An internal
/// transition runs its actions without touching any entry or exit hook.
///
/// Actions run in the order they were added. A failing action is reported
/// through the lifecycle bus and does not stop the remaining actions.
pub struct Transition<A> {
    pub(crate) guard: Option<Guard<A>>,
    pub(crate) actions: Vec<Action<A>>,
    pub(crate) target: Option<StateHandle>,
}

impl<A> Transition<A> {
    /// External transition to `target`.
    pub fn to(target: StateHandle) -> Self {
        Transition {
            guard: None,
            actions: Vec::new(),
            target: Some(target),
        }
    }

    /// Internal transition: actions only, no exit or entry runs.
    pub fn internal() -> Self {
        Transition {
            guard: None,
            actions: Vec::new(),
            target: None,
        }
    }

    /// Guard the transition with an infallible predicate.
    pub fn when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&A) -> bool + Send + Sync + 'static,
    {
        self.guard = Some(Guard::new(predicate));
        self
    }

    /// Guard the transition with a predicate that may fail.
    pub fn try_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&A) -> Result<bool, BoxError> + Send + Sync + 'static,
    {
        self.guard = Some(Guard::fallible(predicate));
        self
    }

    /// Append an infallible action.
    pub fn action<F>(mut self, action: F) -> Self
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        self.actions.push(Box::new(move |args| {
            action(args);
            Ok(())
        }));
        self
    }

    /// Append an action that may fail.
    pub fn try_action<F>(mut self, action: F) -> Self
    where
        F: Fn(&A) -> HookResult + Send + Sync + 'static,
    {
        self.actions.push(Box::new(action));
        self
    }

    /// Whether this transition is internal (no target).
    pub fn is_internal(&self) -> bool {
        self.target.is_none()
    }

    /// Evaluate the guard; absent guards pass.
    pub(crate) fn check_guard(&self, args: &A) -> Result<bool, BoxError> {
        match &self.guard {
            Some(guard) => guard.check(args),
            None => Ok(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_allows_matching_args() {
        let guard = Guard::new(|n: &u32| *n > 10);

        assert!(guard.check(&11).unwrap());
        assert!(!guard.check(&3).unwrap());
    }

    #[test]
    fn guard_is_deterministic() {
        let guard = Guard::new(|n: &u32| n % 2 == 0);

        assert_eq!(guard.check(&4).unwrap(), guard.check(&4).unwrap());
    }

    #[test]
    fn fallible_guard_propagates_error() {
        let guard = Guard::fallible(|_: &u32| Err("guard blew up".into()));

        let err = guard.check(&0).unwrap_err();
        assert_eq!(err.to_string(), "guard blew up");
    }

    #[test]
    fn absent_guard_always_passes() {
        let transition: Transition<u32> = Transition::internal();

        assert!(transition.check_guard(&0).unwrap());
    }

    #[test]
    fn internal_has_no_target() {
        let transition: Transition<()> = Transition::internal();
        assert!(transition.is_internal());

        let external: Transition<()> = Transition::to(StateHandle(0));
        assert!(!external.is_internal());
    }

    #[test]
    fn actions_are_kept_in_order() {
        let transition: Transition<()> = Transition::internal()
            .action(|_| {})
            .try_action(|_| Ok(()))
            .action(|_| {});

        assert_eq!(transition.actions.len(), 3);
    }

    #[test]
    fn when_installs_guard() {
        let transition: Transition<u32> = Transition::internal().when(|n| *n == 7);

        assert!(transition.check_guard(&7).unwrap());
        assert!(!transition.check_guard(&8).unwrap());
    }
}
