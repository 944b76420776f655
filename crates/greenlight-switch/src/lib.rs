//! Environment cutover for one team: the ordered step sequence and
//! the orchestrator that wraps it with admission, validation, the
//! state-store commit and routing regeneration.
//!
//! The executor is all-or-nothing from the state store's point of
//! view. It drives the environment runtime through the cutover steps
//! and only the orchestrator, after every step has succeeded, commits
//! the new active environment via compare-and-set. A failure at any
//! step leaves the record exactly as it was.

mod executor;
mod orchestrator;
mod runtime;

pub use executor::{AbortHandle, StepFailure, SwitchExecutor, SwitchStep};
pub use orchestrator::{Orchestrator, RoutingSink, SwitchError, SwitchResult};
pub use runtime::{EnvironmentRuntime, RuntimeFuture};
