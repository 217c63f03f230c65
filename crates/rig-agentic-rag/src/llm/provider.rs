//! LLM port definition
//!
//! The workflow talks to language models only through `LlmPort`. Concrete
//! providers (the Rig adapter, test fakes) implement it; nodes never know
//! which one they hold.

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::RagError;
use crate::state::ChatMessage;

/// Per-call generation options
///
/// Both fields are passed through to the provider untouched; `reasoning`
/// is an opaque effort hint such as `"low"` or `"medium"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Reasoning-effort hint
    pub reasoning: Option<String>,
}

impl GenerationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }
}

/// Plain text generation result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LlmResponse {
    /// Generated text
    pub text: String,
    /// Reasoning trace, when the provider exposes one
    pub thinking: String,
}

impl LlmResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            thinking: String::new(),
        }
    }

    pub fn with_thinking(mut self, thinking: impl Into<String>) -> Self {
        self.thinking = thinking.into();
        self
    }
}

/// Target shape for structured generation
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredSchema {
    /// Schema title, used in prompts and logs
    pub name: String,
    /// JSON schema of the expected value
    pub schema: serde_json::Value,
}

impl StructuredSchema {
    pub fn new(name: impl Into<String>, schema: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }
}

/// Lazy, finite, non-restartable sequence of text fragments
///
/// Concatenation is the consumer's job; the producer only yields fragments.
pub struct TokenStream {
    inner: Pin<Box<dyn Stream<Item = Result<String, RagError>> + Send>>,
}

impl TokenStream {
    /// Create a new stream from any compatible async stream
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<String, RagError>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }

    /// Create a single-fragment stream from a complete text
    ///
    /// Useful for providers that don't support streaming.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(futures::stream::once(async move { Ok(text) }))
    }

    /// A stream that yields nothing
    pub fn empty() -> Self {
        Self::new(futures::stream::empty())
    }

    pub fn into_inner(self) -> Pin<Box<dyn Stream<Item = Result<String, RagError>> + Send>> {
        self.inner
    }
}

impl Stream for TokenStream {
    type Item = Result<String, RagError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for TokenStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStream").finish_non_exhaustive()
    }
}

/// Core LLM port
///
/// Mirrors the three ways the workflow uses a model:
/// - `generate` for free text (summaries)
/// - `generate_structured` for typed output (plans, judgments)
/// - `stream` for the final answer
#[async_trait]
pub trait LlmPort: Send + Sync {
    /// Generate free text
    async fn generate(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<LlmResponse, RagError>;

    /// Generate a JSON value conforming to `schema`
    ///
    /// Fails with `SchemaViolation` when the model output is not valid JSON.
    async fn generate_structured(
        &self,
        messages: &[ChatMessage],
        schema: &StructuredSchema,
        options: &GenerationOptions,
    ) -> Result<serde_json::Value, RagError>;

    /// Stream text fragments
    ///
    /// Default implementation falls back to non-streaming `generate()`.
    async fn stream(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<TokenStream, RagError> {
        let response = self.generate(messages, options).await?;
        Ok(TokenStream::from_text(response.text))
    }

    /// Provider name for logging
    fn name(&self) -> &str;
}
