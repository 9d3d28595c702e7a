//! Builder API for machine construction.
//!
//! States are declared with [`StateConfig`], wired into a hierarchy and
//! transition tables through [`MachineBuilder`], and frozen into a
//! passive or active machine by the `build_*` methods. All structural
//! validation happens here; by the time a machine exists its tree is
//! immutable.

pub mod error;
pub mod machine;
pub mod macros;
pub mod state;

pub use error::BuildError;
pub use machine::MachineBuilder;
pub use state::StateConfig;
