//! File-backed gateway settings shared by the terminal and web binaries.
//!
//! Every field has a default, so a settings file only lists what it changes:
//!
//! ```json
//! {
//!   "model": "gpt-4o",
//!   "max_rounds": 8,
//!   "store": { "kind": "json_file", "dir": "./conversations" },
//!   "provider": { "transport": "stdio", "command": ["python", "weather_server.py"] }
//! }
//! ```
//!
//! CLI flags are applied on top by the binaries.

use crate::agent::OrchestratorConfig;
use crate::api::RetryConfig;
use crate::context::summarizer::SummarizerConfig;
use crate::context::window::WindowConfig;
use crate::store::{ConversationStore, JsonFileStore, MemoryStore, StoreError};
use crate::tools::invoker::InvokerConfig;
use crate::tools::provider::ProviderSpec;
use crate::{DEFAULT_API_KEY_ENV, DEFAULT_BASE_URL, DEFAULT_MODEL, OpenAiClient};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("environment variable {0} is not set")]
    MissingApiKey(String),
}

/// Where conversations are kept.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreSettings {
    #[default]
    Memory,
    JsonFile { dir: PathBuf },
}

impl StoreSettings {
    pub fn open(&self) -> Result<Arc<dyn ConversationStore>, StoreError> {
        Ok(match self {
            Self::Memory => Arc::new(MemoryStore::new()),
            Self::JsonFile { dir } => Arc::new(JsonFileStore::open(dir)?),
        })
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct GatewaySettings {
    /// Base URL of the OpenAI-compatible API.
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub model: String,
    /// `None` keeps the built-in prompt.
    pub system_prompt: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub max_rounds: u32,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub parallel_tools: bool,
    pub summary_threshold: usize,
    pub context_limit: usize,
    pub summary_model: Option<String>,
    pub summary_max_tokens: u32,
    pub tool_timeout_secs: u64,
    pub max_result_bytes: usize,
    pub validate_tool_args: bool,
    pub store: StoreSettings,
    /// Provider connected at startup, if any.
    pub provider: Option<ProviderSpec>,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        let orchestrator = OrchestratorConfig::default();
        let summarizer = SummarizerConfig::default();
        let invoker = InvokerConfig::default();
        let window = WindowConfig::default();
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key_env: DEFAULT_API_KEY_ENV.into(),
            model: DEFAULT_MODEL.into(),
            system_prompt: None,
            max_tokens: orchestrator.max_tokens,
            temperature: orchestrator.temperature,
            max_rounds: orchestrator.max_rounds,
            request_timeout_secs: orchestrator.request_timeout.as_secs(),
            max_retries: orchestrator.retry.max_retries,
            parallel_tools: orchestrator.parallel_tools,
            summary_threshold: window.summary_threshold,
            context_limit: window.context_limit,
            summary_model: None,
            summary_max_tokens: summarizer.max_summary_tokens,
            tool_timeout_secs: invoker.timeout.as_secs(),
            max_result_bytes: invoker.max_result_bytes,
            validate_tool_args: invoker.validate_args,
            store: StoreSettings::default(),
            provider: None,
        }
    }
}

impl GatewaySettings {
    /// Read settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `load(path)` when a path is given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, SettingsError> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        let mut config = OrchestratorConfig::new(&self.model)
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature)
            .with_max_rounds(self.max_rounds)
            .with_request_timeout(Duration::from_secs(self.request_timeout_secs))
            .with_parallel_tools(self.parallel_tools)
            .with_window(WindowConfig::new(self.summary_threshold, self.context_limit));
        if let Some(prompt) = &self.system_prompt {
            config = config.with_system_prompt(prompt);
        }
        config.retry = RetryConfig::with_retries(self.max_retries);
        config.summarizer = SummarizerConfig {
            model: self.summary_model.clone(),
            max_summary_tokens: self.summary_max_tokens,
            ..SummarizerConfig::default()
        };
        config.invoker = InvokerConfig {
            timeout: Duration::from_secs(self.tool_timeout_secs),
            validate_args: self.validate_tool_args,
            max_result_bytes: self.max_result_bytes,
        };
        config
    }

    pub fn api_key(&self) -> Result<String, SettingsError> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| SettingsError::MissingApiKey(self.api_key_env.clone()))
    }

    /// Client for the configured endpoint, keyed from the environment.
    pub fn client(&self) -> Result<OpenAiClient, String> {
        let key = self.api_key().map_err(|e| e.to_string())?;
        OpenAiClient::with_base_url(key, &self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parley.json");
        std::fs::write(
            &path,
            r#"{
                "model": "gpt-4o",
                "max_rounds": 8,
                "store": {"kind": "json_file", "dir": "/tmp/convs"},
                "provider": {"transport": "http", "url": "http://localhost:8000/mcp"}
            }"#,
        )
        .unwrap();

        let settings = GatewaySettings::load(&path).unwrap();
        assert_eq!(settings.model, "gpt-4o");
        assert_eq!(settings.max_rounds, 8);
        assert_eq!(settings.summary_threshold, 20);
        assert_eq!(settings.context_limit, 10);
        assert_eq!(
            settings.store,
            StoreSettings::JsonFile {
                dir: PathBuf::from("/tmp/convs")
            }
        );
        assert_eq!(
            settings.provider,
            Some(ProviderSpec::http("http://localhost:8000/mcp"))
        );
    }

    #[test]
    fn orchestrator_config_carries_every_knob() {
        let settings = GatewaySettings {
            system_prompt: Some("Be terse.".into()),
            max_rounds: 3,
            summary_threshold: 30,
            context_limit: 12,
            summary_model: Some("gpt-4o-mini".into()),
            tool_timeout_secs: 5,
            max_retries: 0,
            ..GatewaySettings::default()
        };
        let config = settings.orchestrator_config();
        assert_eq!(config.system_prompt, "Be terse.");
        assert_eq!(config.max_rounds, 3);
        assert_eq!(config.window.summary_threshold, 30);
        assert_eq!(config.window.context_limit, 12);
        assert_eq!(config.summarizer.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(config.invoker.timeout, Duration::from_secs(5));
        assert_eq!(config.retry.max_retries, 0);
    }

    #[test]
    fn zero_limits_are_raised_to_one() {
        let settings = GatewaySettings {
            max_rounds: 0,
            context_limit: 0,
            ..GatewaySettings::default()
        };
        let config = settings.orchestrator_config();
        assert_eq!(config.max_rounds, 1);
        assert_eq!(config.window.context_limit, 1);
    }

    #[test]
    fn bad_files_report_their_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = GatewaySettings::load(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
        assert!(err.to_string().contains("broken.json"));

        let missing = GatewaySettings::load(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(missing, SettingsError::Read { .. }));
    }

    #[test]
    fn missing_key_names_the_variable() {
        let settings = GatewaySettings {
            api_key_env: "PARLEY_TEST_KEY_THAT_IS_NOT_SET".into(),
            ..GatewaySettings::default()
        };
        let err = settings.api_key().unwrap_err();
        assert_eq!(
            err.to_string(),
            "environment variable PARLEY_TEST_KEY_THAT_IS_NOT_SET is not set"
        );
    }
}
