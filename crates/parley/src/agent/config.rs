//! Configuration of the [`Orchestrator`](super::orchestrator::Orchestrator).
//!
//! Every knob has a default; [`OrchestratorConfig::new`] only needs a model.
//!
//! ```ignore
//! let config = OrchestratorConfig::new("gpt-4o-mini")
//!     .with_system_prompt("You are a travel assistant.")
//!     .with_max_rounds(8)
//!     .with_parallel_tools(true)
//!     .with_retries(3);
//! ```
//!
//! Nested module configs are plain struct fields:
//!
//! ```ignore
//! let config = OrchestratorConfig {
//!     window: WindowConfig { summary_threshold: 40, context_limit: 16 },
//!     ..OrchestratorConfig::new("gpt-4o-mini")
//! };
//! ```

use crate::api::retry::RetryConfig;
use crate::context::summarizer::SummarizerConfig;
use crate::context::window::WindowConfig;
use crate::tools::invoker::InvokerConfig;
use std::time::Duration;

/// System prompt sent ahead of the context window on every request.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a helpful assistant. Answer the user's questions directly and concisely. \
When a question needs live or external data, call one of the available tools and \
base your answer on its result. If a tool fails, explain what went wrong instead \
of guessing.";

/// Closing assistant message of a turn that ran out of rounds.
pub const DEFAULT_APOLOGY: &str = "\
I'm sorry, I wasn't able to finish working on that request. \
Could you try rephrasing it or breaking it into smaller questions?";

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub model: String,
    pub system_prompt: String,
    /// Maximum completion tokens per request. 0 leaves it to the API.
    pub max_tokens: u32,
    pub temperature: f32,
    /// Maximum model requests per turn.
    pub max_rounds: u32,
    /// Timeout of a single LLM request, retries excluded.
    pub request_timeout: Duration,
    /// Run the tool calls of one round concurrently. Results are still
    /// appended in emission order.
    pub parallel_tools: bool,
    pub retry: RetryConfig,
    /// Answer and closing message when the round bound is hit.
    pub apology: String,
    pub window: WindowConfig,
    pub summarizer: SummarizerConfig,
    pub invoker: InvokerConfig,
}

impl OrchestratorConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_tokens: 1024,
            temperature: 0.7,
            max_rounds: 5,
            request_timeout: Duration::from_secs(60),
            parallel_tools: false,
            retry: RetryConfig::default(),
            apology: DEFAULT_APOLOGY.into(),
            window: WindowConfig::default(),
            summarizer: SummarizerConfig::default(),
            invoker: InvokerConfig::default(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Values below 1 are raised to 1.
    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_parallel_tools(mut self, parallel: bool) -> Self {
        self.parallel_tools = parallel;
        self
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = max_retries;
        self
    }

    pub fn with_apology(mut self, apology: impl Into<String>) -> Self {
        self.apology = apology.into();
        self
    }

    pub fn with_window(mut self, window: WindowConfig) -> Self {
        self.window = window;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.invoker.timeout = timeout;
        self
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::new(crate::DEFAULT_MODEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.model, crate::DEFAULT_MODEL);
        assert_eq!(config.max_rounds, 5);
        assert_eq!(config.window.summary_threshold, 20);
        assert_eq!(config.window.context_limit, 10);
        assert_eq!(config.invoker.timeout, Duration::from_secs(30));
        assert!(!config.parallel_tools);
    }

    #[test]
    fn builders_override_fields() {
        let config = OrchestratorConfig::new("m")
            .with_max_rounds(0)
            .with_parallel_tools(true)
            .with_retries(4)
            .with_tool_timeout(Duration::from_secs(3));
        assert_eq!(config.max_rounds, 1);
        assert!(config.parallel_tools);
        assert_eq!(config.retry.max_retries, 4);
        assert_eq!(config.invoker.timeout, Duration::from_secs(3));
    }
}
