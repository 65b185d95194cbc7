//! Builds the bounded [`ContextWindow`] sent to the model.
//!
//! Short conversations are sent whole. Once the number of non-summary
//! messages exceeds `summary_threshold`, only the last `context_limit`
//! messages are sent verbatim and everything before them is represented by a
//! running summary. The tail never starts inside an assistant tool-call
//! group, so every tool result in the window has its request next to it.

use super::summarizer::Summarizer;
use crate::conversation::{ContextWindow, Message, MessageRole};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct WindowConfig {
    /// Conversations with at most this many non-summary messages are sent
    /// whole.
    pub summary_threshold: usize,
    /// Number of recent non-summary messages kept verbatim past the
    /// threshold. Treated as at least 1 so the newest message is always sent.
    pub context_limit: usize,
}

impl WindowConfig {
    pub fn new(summary_threshold: usize, context_limit: usize) -> Self {
        Self {
            summary_threshold,
            context_limit: context_limit.max(1),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            summary_threshold: 20,
            context_limit: 10,
        }
    }
}

/// Result of [`ContextWindowBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct BuiltWindow {
    pub window: ContextWindow,
    /// A summary produced by this build. The caller persists it.
    pub new_summary: Option<Message>,
}

pub struct ContextWindowBuilder<'a> {
    config: &'a WindowConfig,
    summarizer: Summarizer<'a>,
}

impl<'a> ContextWindowBuilder<'a> {
    pub fn new(config: &'a WindowConfig, summarizer: Summarizer<'a>) -> Self {
        Self { config, summarizer }
    }

    /// Build the window for `history` (summaries and dialogue in stored
    /// order). Summarizes at most once.
    pub async fn build(&self, history: &[Message], title: &str) -> BuiltWindow {
        let dialogue: Vec<&Message> = history.iter().filter(|m| !m.is_summary).collect();
        let latest_summary = history.iter().rev().find(|m| m.is_summary);

        let split = tail_start(&dialogue, self.config);
        if split == 0 {
            return BuiltWindow {
                window: ContextWindow {
                    summary: None,
                    recent: dialogue.into_iter().cloned().collect(),
                },
                new_summary: None,
            };
        }
        let recent: Vec<Message> = dialogue[split..].iter().map(|m| (*m).clone()).collect();

        if let Some(summary) = latest_summary
            && summary.summarized_through.unwrap_or(0) >= split
        {
            debug!(
                "Reusing stored summary covering {} message(s)",
                summary.summarized_through.unwrap_or(0)
            );
            return BuiltWindow {
                window: ContextWindow {
                    summary: Some(summary.clone()),
                    recent,
                },
                new_summary: None,
            };
        }

        let covered = latest_summary
            .and_then(|s| s.summarized_through)
            .unwrap_or(0)
            .min(split);
        let segment: Vec<Message> = dialogue[covered..split]
            .iter()
            .map(|m| (*m).clone())
            .collect();
        debug!(
            "Summarizing messages {covered}..{split} of {} (threshold {})",
            dialogue.len(),
            self.config.summary_threshold
        );
        let summary = self
            .summarizer
            .summarize(
                &segment,
                latest_summary.map(|s| s.text()),
                title,
                split,
            )
            .await;
        BuiltWindow {
            window: ContextWindow {
                summary: Some(summary.clone()),
                recent,
            },
            new_summary: Some(summary),
        }
    }
}

/// Index of the first dialogue message kept verbatim. 0 means everything is
/// sent and no summary is needed.
pub fn tail_start(dialogue: &[&Message], config: &WindowConfig) -> usize {
    if dialogue.len() <= config.summary_threshold {
        return 0;
    }
    let mut split = dialogue.len().saturating_sub(config.context_limit.max(1));
    // A tool result must stay with the assistant message that requested it.
    while split > 0 && split < dialogue.len() && dialogue[split].role == MessageRole::Tool {
        split -= 1;
    }
    split
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ordering::check_ordering;
    use crate::agent::testing::ScriptedBackend;
    use crate::context::summarizer::SummarizerConfig;
    use crate::conversation::ToolCall;

    /// `pairs` plain exchanges, each user + assistant.
    fn plain_history(pairs: usize) -> Vec<Message> {
        (0..pairs)
            .flat_map(|i| {
                [
                    Message::user(format!("question {i}")),
                    Message::assistant_text(format!("answer {i}")),
                ]
            })
            .collect()
    }

    /// One exchange with `k` tool calls: user, assistant(tool_calls), k tools,
    /// assistant.
    fn tool_exchange(tag: usize, k: usize) -> Vec<Message> {
        let calls: Vec<ToolCall> = (0..k)
            .map(|j| ToolCall::new(format!("c{tag}-{j}"), "lookup", "{}"))
            .collect();
        let mut out = vec![
            Message::user(format!("question {tag}")),
            Message::assistant_tool_calls(None, calls.clone()),
        ];
        out.extend(calls.iter().map(|c| Message::tool_result(&c.id, "ok")));
        out.push(Message::assistant_text(format!("answer {tag}")));
        out
    }

    async fn build(
        backend: &ScriptedBackend,
        config: &WindowConfig,
        history: &[Message],
    ) -> BuiltWindow {
        let summarizer_config = SummarizerConfig::default();
        let builder = ContextWindowBuilder::new(
            config,
            Summarizer::new(backend, &summarizer_config, "test-model"),
        );
        builder.build(history, "Test").await
    }

    #[tokio::test]
    async fn below_threshold_sends_everything() {
        let backend = ScriptedBackend::new();
        let history = plain_history(10);
        let built = build(&backend, &WindowConfig::default(), &history).await;
        assert!(built.window.summary.is_none());
        assert!(built.new_summary.is_none());
        assert_eq!(built.window.recent, history);
        assert_eq!(backend.summary_calls(), 0);
    }

    #[tokio::test]
    async fn crossing_threshold_summarizes_exactly_once() {
        let backend = ScriptedBackend::new().with_summary_reply(Ok("older talk".into()));
        let config = WindowConfig::default();
        let mut history = plain_history(11);
        assert_eq!(history.len(), 22);

        let built = build(&backend, &config, &history).await;
        assert_eq!(backend.summary_calls(), 1);
        let summary = built.new_summary.clone().unwrap();
        assert_eq!(summary.summarized_through, Some(12));
        assert_eq!(built.window.recent.len(), 10);
        assert_eq!(built.window.recent[0].text(), "question 6");
        assert_eq!(built.window.summary.as_ref().unwrap().text(), "older talk");

        // Rebuilding with the stored summary and no new messages reuses it.
        history.push(summary);
        let rebuilt = build(&backend, &config, &history).await;
        assert_eq!(backend.summary_calls(), 1);
        assert!(rebuilt.new_summary.is_none());
        assert_eq!(rebuilt.window.summary.unwrap().text(), "older talk");
    }

    #[tokio::test]
    async fn incremental_summary_covers_only_new_messages() {
        let backend = ScriptedBackend::new().with_summary_reply(Ok("merged".into()));
        let config = WindowConfig::default();
        let mut history = plain_history(11);
        history.push(Message::summary("first twelve", 12));
        history.extend(plain_history(2));

        let built = build(&backend, &config, &history).await;
        assert_eq!(backend.summary_calls(), 1);
        assert_eq!(built.new_summary.unwrap().summarized_through, Some(16));

        let request = &backend.summary_requests()[0];
        let user = request.messages[1].content.as_deref().unwrap();
        assert!(user.contains("=== EXISTING SUMMARY ===\nfirst twelve"));
        // Messages 12..16 only.
        assert!(user.contains("[user]: question 6"));
        assert!(user.contains("[assistant]: answer 7"));
        assert!(!user.contains("question 5"));
        assert!(!user.contains("question 8"));
    }

    #[tokio::test]
    async fn tail_never_splits_tool_groups_at_any_boundary() {
        let backend = ScriptedBackend::new().with_summary_reply(Ok("s".into()));
        let mut history = Vec::new();
        for tag in 0..8 {
            history.extend(tool_exchange(tag, 1 + tag % 3));
        }
        for limit in 1..history.len() {
            let config = WindowConfig {
                summary_threshold: limit,
                context_limit: limit,
            };
            let built = build(&backend, &config, &history).await;
            let recent = &built.window.recent;
            assert_ne!(
                recent.first().map(|m| m.role),
                Some(MessageRole::Tool),
                "limit {limit}: tail starts with a tool result"
            );
            check_ordering(recent)
                .unwrap_or_else(|v| panic!("limit {limit}: {v}"));
        }
    }

    #[tokio::test]
    async fn tail_start_moves_back_to_group_start() {
        let mut history = plain_history(9);
        history.extend(tool_exchange(100, 3));
        let dialogue: Vec<&Message> = history.iter().collect();
        let config = WindowConfig {
            summary_threshold: 20,
            context_limit: 4,
        };
        // Naive split = 20, which is the second tool result of the group.
        assert_eq!(dialogue[20].role, MessageRole::Tool);
        assert_eq!(tail_start(&dialogue, &config), 19);
        assert!(dialogue[19].requests_tools());
    }

    #[tokio::test]
    async fn zero_context_limit_still_sends_newest_message() {
        let backend = ScriptedBackend::new().with_summary_reply(Ok("older talk".into()));
        let mut history = plain_history(12);
        history.push(Message::user("latest"));
        let config = WindowConfig {
            summary_threshold: 20,
            context_limit: 0,
        };
        let dialogue: Vec<&Message> = history.iter().collect();
        assert_eq!(tail_start(&dialogue, &config), 24);

        let built = build(&backend, &config, &history).await;
        assert_eq!(built.window.recent.len(), 1);
        assert_eq!(built.window.recent[0].text(), "latest");
        assert_eq!(built.new_summary.unwrap().summarized_through, Some(24));
        assert_eq!(WindowConfig::new(20, 0).context_limit, 1);
    }
}
