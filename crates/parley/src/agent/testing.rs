//! Scripted [`ChatBackend`] for unit tests.
//!
//! Dialogue requests are answered from a queue. Summarization and title
//! requests are recognized by their system prompt and answered separately, so
//! tests can count them.

use super::title::TITLE_SYSTEM_PROMPT;
use crate::api::ChatBackend;
use crate::context::summarizer::SUMMARIZATION_PROMPT;
use crate::{ChatCompletion, ChatRequest, WireToolCall};
use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::sync::Mutex;

pub(crate) struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<ChatCompletion, String>>>,
    dialogue: Mutex<Vec<ChatRequest>>,
    summaries: Mutex<Vec<ChatRequest>>,
    summary_reply: Mutex<Result<String, String>>,
    title_reply: Mutex<Result<String, String>>,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            dialogue: Mutex::new(Vec::new()),
            summaries: Mutex::new(Vec::new()),
            summary_reply: Mutex::new(Ok("Summary of earlier messages.".into())),
            title_reply: Mutex::new(Ok("Scripted Title".into())),
        }
    }

    pub(crate) fn then(self, reply: Result<ChatCompletion, String>) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub(crate) fn then_text(self, text: &str) -> Self {
        self.then(Ok(ChatCompletion::text(text)))
    }

    pub(crate) fn then_err(self, error: &str) -> Self {
        self.then(Err(error.to_string()))
    }

    /// Queue a tool-call round; `calls` are `(id, name, arguments)`.
    pub(crate) fn then_tools(self, calls: &[(&str, &str, &str)]) -> Self {
        self.then(Ok(ChatCompletion::tool_calls(
            calls
                .iter()
                .map(|(id, name, args)| WireToolCall::function(*id, *name, *args))
                .collect(),
        )))
    }

    pub(crate) fn with_summary_reply(self, reply: Result<String, String>) -> Self {
        *self.summary_reply.lock().unwrap() = reply;
        self
    }

    pub(crate) fn with_title_reply(self, reply: Result<String, String>) -> Self {
        *self.title_reply.lock().unwrap() = reply;
        self
    }

    pub(crate) fn dialogue_requests(&self) -> Vec<ChatRequest> {
        self.dialogue.lock().unwrap().clone()
    }

    pub(crate) fn summary_requests(&self) -> Vec<ChatRequest> {
        self.summaries.lock().unwrap().clone()
    }

    pub(crate) fn summary_calls(&self) -> usize {
        self.summaries.lock().unwrap().len()
    }

    pub(crate) fn remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }

    fn system_prompt(body: &ChatRequest) -> Option<&str> {
        body.messages.first().and_then(|m| m.content.as_deref())
    }
}

impl ChatBackend for ScriptedBackend {
    fn chat<'a>(&'a self, body: &'a ChatRequest) -> BoxFuture<'a, Result<ChatCompletion, String>> {
        let reply = match Self::system_prompt(body) {
            Some(SUMMARIZATION_PROMPT) => {
                self.summaries.lock().unwrap().push(body.clone());
                self.summary_reply
                    .lock()
                    .unwrap()
                    .clone()
                    .map(ChatCompletion::text)
            }
            Some(TITLE_SYSTEM_PROMPT) => self
                .title_reply
                .lock()
                .unwrap()
                .clone()
                .map(ChatCompletion::text),
            _ => {
                self.dialogue.lock().unwrap().push(body.clone());
                self.replies
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| Err("script exhausted".into()))
            }
        };
        Box::pin(async move { reply })
    }
}
