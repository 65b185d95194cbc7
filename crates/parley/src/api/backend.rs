//! The seam between the orchestrator and the LLM service.

use crate::{ChatCompletion, ChatRequest, OpenAiClient};
use futures::future::BoxFuture;

/// Something that answers chat completion requests.
///
/// [`OpenAiClient`] is the production implementation. Errors are plain
/// strings so [`retry_with_backoff`](super::retry::retry_with_backoff) can
/// classify them.
pub trait ChatBackend: Send + Sync {
    fn chat<'a>(&'a self, body: &'a ChatRequest) -> BoxFuture<'a, Result<ChatCompletion, String>>;
}

impl ChatBackend for OpenAiClient {
    fn chat<'a>(&'a self, body: &'a ChatRequest) -> BoxFuture<'a, Result<ChatCompletion, String>> {
        Box::pin(OpenAiClient::chat(self, body))
    }
}

impl<T: ChatBackend + ?Sized> ChatBackend for std::sync::Arc<T> {
    fn chat<'a>(&'a self, body: &'a ChatRequest) -> BoxFuture<'a, Result<ChatCompletion, String>> {
        (**self).chat(body)
    }
}
