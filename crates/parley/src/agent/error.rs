//! Errors that abort a turn.
//!
//! Tool failures are not here: they become failed tool results and the model
//! sees them.

use super::ordering::OrderingViolation;
use crate::conversation::Message;

#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    /// The LLM request failed (network, HTTP error, rate limit, timeout,
    /// malformed response). `confirmed` ends at the last fully matched round
    /// and is safe to persist.
    #[error("LLM request failed: {reason}")]
    RequestFailed {
        reason: String,
        confirmed: Vec<Message>,
        summary: Option<Message>,
    },

    /// The stop signal was raised between rounds.
    #[error("turn cancelled")]
    Cancelled {
        confirmed: Vec<Message>,
        summary: Option<Message>,
    },

    /// The delta broke the tool-call ordering. A logic defect; nothing from
    /// the turn may be persisted.
    #[error("ordering violation: {0}")]
    OrderingViolation(#[from] OrderingViolation),
}

impl TurnError {
    /// Messages from the aborted turn that may be persisted.
    pub fn confirmed(&self) -> &[Message] {
        match self {
            Self::RequestFailed { confirmed, .. } | Self::Cancelled { confirmed, .. } => confirmed,
            Self::OrderingViolation(_) => &[],
        }
    }

    /// Summary produced before the turn aborted.
    pub fn summary(&self) -> Option<&Message> {
        match self {
            Self::RequestFailed { summary, .. } | Self::Cancelled { summary, .. } => {
                summary.as_ref()
            }
            Self::OrderingViolation(_) => None,
        }
    }
}
