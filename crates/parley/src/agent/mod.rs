//! Turn runtime: the [`Orchestrator`] tool-use loop and its supporting modules.
//!
//! - [`orchestrator::Orchestrator`]: the bounded turn loop. Start here.
//! - [`config::OrchestratorConfig`]: model, sampling, round bound, timeouts
//!   and the window, summarizer and invoker settings.
//! - [`events`]: [`EventHandler`] and [`TurnEvent`] for observing a turn,
//!   plus the [`TurnOutcome`] a turn returns.
//! - [`ordering`]: the tool-call ordering check every delta must pass.
//! - [`title`]: conversation titles from the opening message.

pub mod config;
pub mod error;
pub mod events;
pub(crate) mod execution;
pub mod orchestrator;
pub mod ordering;
pub mod title;

#[cfg(test)]
pub(crate) mod testing;

pub use config::OrchestratorConfig;
pub use error::TurnError;
pub use events::{
    CompositeEventHandler, EventHandler, FnEventHandler, LoggingHandler, NoopHandler, TurnEvent,
    TurnOutcome, TurnStatus,
};
pub use orchestrator::Orchestrator;
pub use ordering::{OrderingViolation, check_ordering};
pub use title::{DEFAULT_TITLE, fallback_title, generate_title};
