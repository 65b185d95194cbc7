//! Context window management: the bounded window sent to the model and the
//! running summary standing in for everything older.
//!
//! - [`window`]: [`ContextWindowBuilder`] applies the threshold/tail policy and
//!   decides when a new summary is needed.
//! - [`summarizer`]: [`Summarizer`] merges not-yet-covered messages into the
//!   running summary, with a deterministic fallback.

pub mod summarizer;
pub mod window;

pub use summarizer::{Summarizer, SummarizerConfig};
pub use window::{BuiltWindow, ContextWindowBuilder, WindowConfig};
