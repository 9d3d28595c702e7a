//! Treeline: a hierarchical state machine runtime.
//!
//! Treeline implements UML-statechart semantics on a "pure core,
//! imperative shell" split: the state tree, transitions, and hierarchy
//! queries are pure values, while dispatch runs in one of two shells
//! sharing a single engine:
//!
//! - [`PassiveMachine`]: `send` enqueues, `execute` drains the queue on
//!   the caller's thread
//! - [`ActiveMachine`]: `send` enqueues and a dedicated worker thread
//!   drains as events arrive
//!
//! # Core Concepts
//!
//! - **States** form a tree; composites declare an initial substate and
//!   may keep shallow or deep history
//! - **Transitions** carry an optional guard, an ordered action list,
//!   and an optional target (no target means internal)
//! - **Dispatch** walks the hierarchy from the current leaf to find a
//!   handler, exits up to the transition's boundary, runs the actions,
//!   enters down to the target, then drills to a leaf
//! - **Lifecycle bus** reports begin-dispatch, declined, completed, and
//!   exception records to subscribers; callback failures become records,
//!   never panics or API errors
//!
//! # Example
//!
//! ```rust
//! use treeline::builder::{MachineBuilder, StateConfig};
//! use treeline::core::Transition;
//! use treeline::id_enum;
//!
//! id_enum! {
//!     enum Player { Stopped, Playing, Paused }
//! }
//! id_enum! {
//!     enum Button { Play, Pause, Stop }
//! }
//!
//! let mut builder = MachineBuilder::<Player, Button>::new();
//! let stopped = builder.state(StateConfig::new(Player::Stopped))?;
//! let playing = builder.state(StateConfig::new(Player::Playing))?;
//! let paused = builder.state(StateConfig::new(Player::Paused))?;
//!
//! builder.transition(stopped, Button::Play, Transition::to(playing))?;
//! builder.transition(playing, Button::Pause, Transition::to(paused))?;
//! builder.transition(paused, Button::Play, Transition::to(playing))?;
//! builder.transition(playing, Button::Stop, Transition::to(stopped))?;
//!
//! let machine = builder.build_passive()?;
//! machine.initialize(stopped).unwrap();
//!
//! machine.send(Button::Play, ()).unwrap();
//! machine.send(Button::Pause, ()).unwrap();
//! machine.execute().unwrap();
//!
//! assert_eq!(machine.current_state_id(), Some(Player::Paused));
//! # Ok::<(), treeline::builder::BuildError>(())
//! ```

pub mod builder;
pub mod bus;
pub mod core;
pub mod dispatch;

// Re-export commonly used types
pub use builder::{BuildError, MachineBuilder, StateConfig};
pub use bus::{
    BeginDispatchRecord, ExceptionRecord, Fault, TransitionCompletedRecord,
    TransitionDeclinedRecord,
};
pub use core::{
    BoxError, EventArgs, EventId, Guard, HistoryKind, HookResult, StateHandle, StateId, Transition,
};
pub use dispatch::{ActiveMachine, EventSender, MachineError, PassiveMachine};
