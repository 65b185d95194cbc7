//! Structural check of the message ordering the chat-completions API demands.
//!
//! Every assistant message with tool calls must be followed immediately by
//! exactly one tool message per call (any order, matching ids), and no tool
//! message may appear outside such a group.

use crate::conversation::{Message, MessageRole};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderingViolation {
    /// Index of the offending message.
    pub index: usize,
    pub reason: String,
}

impl fmt::Display for OrderingViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "message {}: {}", self.index, self.reason)
    }
}

impl std::error::Error for OrderingViolation {}

fn violation(index: usize, reason: impl Into<String>) -> OrderingViolation {
    OrderingViolation {
        index,
        reason: reason.into(),
    }
}

/// Check `messages` (summaries are ignored) for ordering breaches.
pub fn check_ordering(messages: &[Message]) -> Result<(), OrderingViolation> {
    // Ids still awaiting a result, and where their request was.
    let mut pending: HashSet<&str> = HashSet::new();
    let mut group_start = 0;

    for (index, msg) in messages.iter().enumerate() {
        if msg.is_summary {
            continue;
        }
        if msg.role == MessageRole::Tool {
            let Some(id) = msg.tool_call_id.as_deref() else {
                return Err(violation(index, "tool message without tool_call_id"));
            };
            if !pending.remove(id) {
                return Err(violation(
                    index,
                    format!("tool result '{id}' does not answer a pending tool call"),
                ));
            }
            continue;
        }
        if !pending.is_empty() {
            return Err(violation(
                group_start,
                format!("{} tool call(s) left without a result", pending.len()),
            ));
        }
        if msg.tool_call_id.is_some() {
            return Err(violation(index, "tool_call_id on a non-tool message"));
        }
        if !msg.tool_calls.is_empty() {
            if msg.role != MessageRole::Assistant {
                return Err(violation(index, "tool calls on a non-assistant message"));
            }
            for call in &msg.tool_calls {
                if !pending.insert(call.id.as_str()) {
                    return Err(violation(
                        index,
                        format!("duplicate tool call id '{}'", call.id),
                    ));
                }
            }
            group_start = index;
        }
    }

    if pending.is_empty() {
        Ok(())
    } else {
        Err(violation(
            group_start,
            format!("{} tool call(s) left without a result", pending.len()),
        ))
    }
}
