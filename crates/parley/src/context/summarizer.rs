//! Incremental running summary of the older part of a conversation.
//!
//! The summary is never rebuilt from scratch: the existing summary text is
//! merged with the messages it does not yet cover in a single LLM call. When
//! that call fails a deterministic fallback is produced instead, so
//! summarization never fails a turn.

use crate::api::ChatBackend;
use crate::conversation::{Message, MessageRole};
use crate::{ChatMessage, ChatRequest};
use std::time::Duration;
use tracing::{debug, warn};

/// System prompt of every summarization request.
pub(crate) const SUMMARIZATION_PROMPT: &str = "\
You maintain the running summary of a conversation between a user and an assistant \
that can call tools. Summarize the messages you are given concisely. Focus on:
- The topics the user asked about and the answers given
- Facts returned by tools (values, names, identifiers) that later answers may rely on
- Decisions and conclusions reached
- Questions or tool-call obligations that are still open

Rules:
- Only include facts explicitly stated in the messages. Do not infer or extrapolate.
- If there is an existing summary, merge the new information into it to produce a single \
  cohesive summary that replaces the existing one entirely.
- Respond with the summary text only.";

/// Characters of the opening question kept in a fallback summary.
const FALLBACK_OPENING_CHARS: usize = 100;

#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    /// Model override; the orchestrator's model is used when `None`.
    pub model: Option<String>,
    pub max_summary_tokens: u32,
    pub temperature: f32,
    /// Timeout of the summarization request.
    pub timeout: Duration,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_summary_tokens: 512,
            temperature: 0.3,
            timeout: Duration::from_secs(60),
        }
    }
}

pub struct Summarizer<'a> {
    backend: &'a dyn ChatBackend,
    config: &'a SummarizerConfig,
    main_model: &'a str,
}

impl<'a> Summarizer<'a> {
    pub fn new(
        backend: &'a dyn ChatBackend,
        config: &'a SummarizerConfig,
        main_model: &'a str,
    ) -> Self {
        Self {
            backend,
            config,
            main_model,
        }
    }

    pub fn model(&self) -> &str {
        self.config.model.as_deref().unwrap_or(self.main_model)
    }

    /// Summarize `segment` on top of `existing`, returning a summary message
    /// that covers the first `summarized_through` non-summary messages.
    pub async fn summarize(
        &self,
        segment: &[Message],
        existing: Option<&str>,
        title: &str,
        summarized_through: usize,
    ) -> Message {
        let text = match self.request_summary(segment, existing, title).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Summarization failed, using fallback summary: {e}");
                fallback_summary(segment, existing)
            }
        };
        Message::summary(text, summarized_through)
    }

    async fn request_summary(
        &self,
        segment: &[Message],
        existing: Option<&str>,
        title: &str,
    ) -> Result<String, String> {
        let (system, user) = build_summarization_request(segment, existing, title);
        let body = ChatRequest {
            model: self.model().to_string(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            max_tokens: self.config.max_summary_tokens,
            temperature: Some(self.config.temperature),
            tools: None,
        };
        debug!(
            "Summarizing {} message(s) with {} (existing summary: {})",
            segment.len(),
            body.model,
            existing.is_some()
        );
        let completion = tokio::time::timeout(self.config.timeout, self.backend.chat(&body))
            .await
            .map_err(|_| "summarization request timed out".to_string())??;
        let text = completion.content.unwrap_or_default().trim().to_string();
        if text.is_empty() {
            return Err("empty summary".into());
        }
        Ok(text)
    }
}

/// Build the (system, user) prompt pair for one summarization call.
pub fn build_summarization_request(
    segment: &[Message],
    existing: Option<&str>,
    title: &str,
) -> (String, String) {
    let mut content = String::new();
    if !title.is_empty() {
        content.push_str(&format!("Conversation title: {title}\n\n"));
    }
    if let Some(existing) = existing {
        content.push_str("=== EXISTING SUMMARY ===\n");
        content.push_str(existing);
        content.push_str("\n\n=== NEW MESSAGES TO SUMMARIZE ===\n");
    }
    for msg in segment {
        content.push_str(&format_for_summary(msg));
        content.push_str("\n\n");
    }
    (SUMMARIZATION_PROMPT.to_string(), content)
}

fn format_for_summary(msg: &Message) -> String {
    if msg.requests_tools() {
        let calls = msg
            .tool_calls
            .iter()
            .map(|c| format!("{}({})", c.name, c.arguments))
            .collect::<Vec<_>>()
            .join(", ");
        return match msg.content.as_deref().filter(|c| !c.is_empty()) {
            Some(text) => format!("[assistant]: {text} (called {calls})"),
            None => format!("[assistant]: called {calls}"),
        };
    }
    match msg.content.as_deref() {
        Some(text) => format!("[{}]: {text}", msg.role),
        None => format!("[{}]: [no content]", msg.role),
    }
}

/// Deterministic summary used when the LLM call fails: counts of questions
/// and answers plus the opening question.
pub fn fallback_summary(segment: &[Message], existing: Option<&str>) -> String {
    let users: Vec<&Message> = segment
        .iter()
        .filter(|m| m.role == MessageRole::User)
        .collect();
    let answers = segment
        .iter()
        .filter(|m| m.role == MessageRole::Assistant && !m.requests_tools())
        .count();

    let mut parts = Vec::new();
    if !users.is_empty() {
        parts.push(format!("User asked {} questions", users.len()));
    }
    if answers > 0 {
        parts.push(format!("Assistant provided {answers} responses"));
    }
    if let Some(first) = users.first() {
        let text = first.text();
        let mut opening: String = text.chars().take(FALLBACK_OPENING_CHARS).collect();
        if text.chars().count() > FALLBACK_OPENING_CHARS {
            opening.push_str("...");
        }
        parts.push(format!("Started with: {opening}"));
    }
    let fresh = if parts.is_empty() {
        "Earlier messages contained only tool activity.".to_string()
    } else {
        format!("{}.", parts.join(". "))
    };
    match existing {
        Some(existing) => format!("{existing}\n{fresh}"),
        None => fresh,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::ScriptedBackend;
    use crate::conversation::ToolCall;

    #[test]
    fn request_without_existing_summary() {
        let messages = vec![
            Message::user("What's the weather in Delhi?"),
            Message::assistant_tool_calls(
                None,
                vec![ToolCall::new("1", "get_weather", r#"{"location":"Delhi"}"#)],
            ),
            Message::tool_result("1", "34°C"),
        ];
        let (system, user) = build_summarization_request(&messages, None, "Delhi weather");
        assert!(system.contains("running summary"));
        assert!(user.starts_with("Conversation title: Delhi weather"));
        assert!(user.contains("[user]: What's the weather in Delhi?"));
        assert!(user.contains(r#"[assistant]: called get_weather({"location":"Delhi"})"#));
        assert!(user.contains("[tool]: 34°C"));
        assert!(!user.contains("EXISTING SUMMARY"));
    }

    #[test]
    fn request_with_existing_summary() {
        let (_, user) = build_summarization_request(
            &[Message::user("And Mumbai?")],
            Some("User checked Delhi weather: 34°C."),
            "",
        );
        assert!(user.contains("=== EXISTING SUMMARY ===\nUser checked Delhi weather"));
        assert!(user.contains("=== NEW MESSAGES TO SUMMARIZE ==="));
    }

    #[test]
    fn fallback_counts_and_quotes_opening() {
        let long = "a".repeat(150);
        let messages = vec![
            Message::user(long),
            Message::assistant_text("sure"),
            Message::user("thanks"),
            Message::assistant_text("welcome"),
        ];
        let text = fallback_summary(&messages, None);
        assert!(text.starts_with("User asked 2 questions. Assistant provided 2 responses."));
        assert!(text.contains(&format!("Started with: {}...", "a".repeat(100))));

        let merged = fallback_summary(&[Message::user("hi")], Some("Earlier."));
        assert!(merged.starts_with("Earlier.\nUser asked 1 questions"));
    }

    #[tokio::test]
    async fn summarize_uses_model_reply() {
        let backend = ScriptedBackend::new().with_summary_reply(Ok("Talked about Delhi.".into()));
        let config = SummarizerConfig::default();
        let summarizer = Summarizer::new(&backend, &config, "main-model");
        let msg = summarizer
            .summarize(&[Message::user("Delhi?")], None, "", 1)
            .await;
        assert!(msg.is_summary);
        assert_eq!(msg.role, MessageRole::System);
        assert_eq!(msg.text(), "Talked about Delhi.");
        assert_eq!(msg.summarized_through, Some(1));
        assert_eq!(backend.summary_calls(), 1);
        assert_eq!(backend.summary_requests()[0].model, "main-model");
    }

    #[tokio::test]
    async fn summarize_falls_back_on_failure() {
        let backend = ScriptedBackend::new().with_summary_reply(Err("LLM API HTTP 500".into()));
        let config = SummarizerConfig {
            model: Some("cheap-model".into()),
            ..Default::default()
        };
        let summarizer = Summarizer::new(&backend, &config, "main-model");
        assert_eq!(summarizer.model(), "cheap-model");
        let msg = summarizer
            .summarize(&[Message::user("Delhi?")], None, "", 1)
            .await;
        assert!(msg.is_summary);
        assert_eq!(msg.text(), "User asked 1 questions. Started with: Delhi?.");
    }
}
