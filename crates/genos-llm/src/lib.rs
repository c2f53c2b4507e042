//! # Genos LLM
//!
//! The completion-service boundary. The engine treats the model as an
//! opaque text-completion service: request in, text out, with a defined
//! structured-output contract on top. A schema-non-conforming response is
//! an error the caller handles (one stricter retry, then park the work),
//! never a crash.

pub mod http;
pub mod scripted;

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::warn;

use genos_common::GenosError;

pub use http::HttpClient;
pub use scripted::ScriptedClient;

/// A single completion call.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            temperature: 0.3,
            max_tokens: 1024,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// The retry variant sent after a malformed response: same request with
    /// an explicit formatting reminder appended.
    pub fn stricter(&self) -> Self {
        let mut retry = self.clone();
        retry.prompt.push_str(
            "\n\nIMPORTANT: respond with valid JSON matching the requested schema \
             and nothing else. No prose, no code fences.",
        );
        retry.temperature = 0.0;
        retry
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("completion call failed: {0}")]
    Call(String),

    #[error("completion timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed structured output: {0}")]
    Malformed(String),
}

impl From<LlmError> for GenosError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Call(msg) => GenosError::TransientIo(msg),
            LlmError::Timeout(d) => GenosError::Timeout(format!("completion call after {d:?}")),
            LlmError::Malformed(msg) => GenosError::MalformedModelOutput(msg),
        }
    }
}

/// The completion seam. Implementations wrap an actual model backend;
/// tests use [`ScriptedClient`].
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;
}

/// Run a completion with a hard timeout; a timeout is a failure for retry
/// purposes, never a partial success.
pub async fn complete_with_timeout(
    client: &dyn CompletionClient,
    request: CompletionRequest,
    timeout: Duration,
) -> Result<String, LlmError> {
    tokio::time::timeout(timeout, client.complete(request))
        .await
        .map_err(|_| LlmError::Timeout(timeout))?
}

/// Parse a structured JSON response, tolerating fenced code blocks and
/// surrounding prose.
pub fn parse_structured<T: DeserializeOwned>(raw: &str) -> Result<T, LlmError> {
    let candidate = extract_json(raw);
    serde_json::from_str(candidate).map_err(|e| LlmError::Malformed(e.to_string()))
}

/// Structured completion: one attempt, then one stricter retry on
/// malformed output.
pub async fn structured<T: DeserializeOwned>(
    client: &dyn CompletionClient,
    request: CompletionRequest,
    timeout: Duration,
) -> Result<T, LlmError> {
    let response = complete_with_timeout(client, request.clone(), timeout).await?;
    match parse_structured(&response) {
        Ok(parsed) => Ok(parsed),
        Err(first_err) => {
            warn!(error = %first_err, "malformed completion, retrying with stricter prompt");
            let retry = complete_with_timeout(client, request.stricter(), timeout).await?;
            parse_structured(&retry)
        }
    }
}

/// Best-effort extraction of the JSON body from a completion response.
fn extract_json(raw: &str) -> &str {
    let trimmed = raw.trim();

    // Fenced code block, optionally tagged `json`.
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            return after[..end].trim();
        }
    }

    // Outermost object or array inside surrounding prose.
    let open = trimmed.find(['{', '[']);
    let close = trimmed.rfind(['}', ']']);
    if let (Some(open), Some(close)) = (open, close) {
        if open < close {
            return &trimmed[open..=close];
        }
    }

    trimmed
}
