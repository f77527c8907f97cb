//! Feature orchestration: picks the next unchecked feature, hands its prompt
//! to the user, verifies the agent's work, and applies the completion
//! policy.
//!
//! `machine` is the pure transition table. `Controller` owns the mutable
//! state, performs the effects each transition asks for, and reports to an
//! [`OrchestratorListener`].

pub mod controller;
pub mod listener;
pub mod machine;
pub mod session;

pub use controller::{Controller, RunOutcome, VerifyOutcome};
pub use listener::{HandoffSink, NullListener, NullSink, OrchestratorListener};
pub use machine::{Effect, Event, OrchestratorState, Transition};
pub use session::ExecutionSession;
