//! LLM interaction layer: the backend seam, retry and turn ids.
//!
//! - [`backend`]: [`ChatBackend`], implemented by [`OpenAiClient`](crate::OpenAiClient)
//!   and by scripted backends in tests.
//! - [`retry`]: transient error detection (429, 5xx, network failures) with
//!   exponential backoff. Never retries 400/401 or malformed responses.
//! - [`tracing`]: correlation ids for turns and rounds.

pub mod backend;
pub mod retry;
pub mod tracing;

pub use backend::ChatBackend;
pub use retry::{RetryConfig, retry_with_backoff};
pub use tracing::{generate_turn_id, round_span_id};
