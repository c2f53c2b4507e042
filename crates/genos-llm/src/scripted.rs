//! Scripted completion client for tests
//!
//! Returns queued responses in order and records every request it saw, so
//! tests can assert on prompt content and retry behavior.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{CompletionClient, CompletionRequest, LlmError};

pub struct ScriptedClient {
    responses: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue another response after construction.
    pub fn push_response(&self, response: impl Into<String>) {
        self.responses.lock().push_back(response.into());
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        self.requests.lock().push(request);
        self.responses
            .lock()
            .pop_front()
            .ok_or_else(|| LlmError::Call("scripted client exhausted".into()))
    }
}
