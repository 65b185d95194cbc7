//! Conversation titles from the opening user message.

use crate::api::ChatBackend;
use crate::{ChatMessage, ChatRequest};
use std::time::Duration;
use tracing::{debug, warn};

pub(crate) const TITLE_SYSTEM_PROMPT: &str = "\
You write short, descriptive titles for conversations. \
Reply with the title only, nothing else.";

/// Title used when there is nothing to derive one from.
pub const DEFAULT_TITLE: &str = "New Conversation";

const MAX_TITLE_CHARS: usize = 50;
const OPENING_CHARS: usize = 300;

/// Ask the model for a 4–6 word title, falling back to
/// [`fallback_title`] when the request fails or returns nothing usable.
pub async fn generate_title(backend: &dyn ChatBackend, model: &str, first_message: &str) -> String {
    if first_message.trim().is_empty() {
        return DEFAULT_TITLE.into();
    }
    let opening: String = first_message.chars().take(OPENING_CHARS).collect();
    let body = ChatRequest {
        model: model.to_string(),
        messages: vec![
            ChatMessage::system(TITLE_SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "Write a 4-6 word title for a conversation that opens with:\n\n\"{opening}\"\n\nTitle:"
            )),
        ],
        max_tokens: 20,
        temperature: Some(0.3),
        tools: None,
    };
    match tokio::time::timeout(Duration::from_secs(30), backend.chat(&body)).await {
        Ok(Ok(completion)) => {
            if let Some(title) = completion.content.as_deref().and_then(clean_title) {
                debug!("Generated title: {title}");
                return title;
            }
            warn!("Title request returned no usable title");
        }
        Ok(Err(e)) => warn!("Title generation failed: {e}"),
        Err(_) => warn!("Title generation timed out"),
    }
    fallback_title(first_message)
}

/// Strip quotes and cap the length. `None` when nothing is left.
fn clean_title(raw: &str) -> Option<String> {
    let stripped: String = raw.chars().filter(|c| *c != '"' && *c != '\'').collect();
    let title = stripped.trim();
    if title.is_empty() {
        return None;
    }
    Some(cap_length(title))
}

fn cap_length(title: &str) -> String {
    if title.chars().count() <= MAX_TITLE_CHARS {
        return title.to_string();
    }
    let kept: String = title.chars().take(MAX_TITLE_CHARS - 3).collect();
    format!("{kept}...")
}

/// The first five words of `text` with punctuation removed.
pub fn fallback_title(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();
    let words: Vec<&str> = cleaned.split_whitespace().collect();
    if words.is_empty() {
        return DEFAULT_TITLE.into();
    }
    let title = if words.len() <= 5 {
        words.join(" ")
    } else {
        format!("{}...", words[..5].join(" "))
    };
    cap_length(&title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::ScriptedBackend;

    #[test]
    fn fallback_takes_five_words() {
        assert_eq!(
            fallback_title("What's the weather like in Delhi today?"),
            "Whats the weather like in..."
        );
        assert_eq!(fallback_title("Hello!"), "Hello");
        assert_eq!(fallback_title("?!"), DEFAULT_TITLE);
        assert_eq!(fallback_title(""), DEFAULT_TITLE);
    }

    #[test]
    fn fallback_caps_long_words() {
        let title = fallback_title(&"x".repeat(80));
        assert_eq!(title.chars().count(), 50);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn clean_strips_quotes() {
        assert_eq!(clean_title("\"Delhi Weather Check\"").unwrap(), "Delhi Weather Check");
        assert_eq!(clean_title("  '' "), None);
    }

    #[tokio::test]
    async fn generated_title_is_cleaned() {
        let backend = ScriptedBackend::new().with_title_reply(Ok("'Delhi Weather Today'".into()));
        let title = generate_title(&backend, "m", "What's the weather in Delhi?").await;
        assert_eq!(title, "Delhi Weather Today");
    }

    #[tokio::test]
    async fn failed_request_falls_back() {
        let backend = ScriptedBackend::new().with_title_reply(Err("LLM API HTTP 500".into()));
        let title = generate_title(&backend, "m", "Hello there").await;
        assert_eq!(title, "Hello there");
        assert_eq!(generate_title(&backend, "m", "   ").await, DEFAULT_TITLE);
    }
}
