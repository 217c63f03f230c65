//! `LlmPort` over a Rig `Agent<M>`
//!
//! System messages are joined into the preamble (after the agent's own),
//! the last non-system message becomes the prompt, and everything in
//! between is history.
//!
//! Structured generation appends the JSON schema to the preamble with an
//! instruction to reply with JSON only, then extracts the value from the
//! reply text. `generate` keeps the provider's reasoning items as the
//! response's thinking trace. Streaming forwards text fragments and drops
//! reasoning, tool-call and final-response items.
//!
//! Provider-specific request fields (Ollama's `num_ctx`, for example) go
//! through `with_additional_params`; the reasoning hint is merged into the
//! same object.
//!
//! ```rust,ignore
//! use rig::client::{CompletionClient, ProviderClient};
//! use rig::providers::ollama;
//! use rig_agentic_rag::compat::RigLlmAdapter;
//!
//! let client = ollama::Client::from_env();
//! let agent = client.agent("gpt-oss:20b").build();
//! let llm = RigLlmAdapter::with_name(agent, "ollama")
//!     .with_reasoning_flag("think")
//!     .with_additional_params(serde_json::json!({ "num_ctx": 16384 }));
//! ```

use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;

use rig::agent::Agent;
use rig::completion::{Completion, CompletionModel, CompletionRequestBuilder, Message as RigMessage};
use rig::message::AssistantContent;
use serde_json::{Map, Value};
use rig::streaming::StreamedAssistantContent;
use rig::OneOrMany;

use crate::error::RagError;
use crate::llm::{extract_json, GenerationOptions, LlmPort, LlmResponse, StructuredSchema, TokenStream};
use crate::state::{ChatMessage, Role};

pub struct RigLlmAdapter<M>
where
    M: CompletionModel + Send + Sync,
{
    agent: Arc<Agent<M>>,
    name: String,
    /// Provider request field that receives the reasoning hint
    reasoning_param: Option<String>,
    /// Send `true` instead of the hint text
    reasoning_as_flag: bool,
    additional_params: Map<String, Value>,
}

impl<M> RigLlmAdapter<M>
where
    M: CompletionModel + Send + Sync,
{
    pub fn new(agent: Agent<M>) -> Self {
        Self::with_name(agent, "rig")
    }

    /// Wrap `agent` under a provider name used in logs and errors
    pub fn with_name(agent: Agent<M>, name: impl Into<String>) -> Self {
        Self {
            agent: Arc::new(agent),
            name: name.into(),
            reasoning_param: None,
            reasoning_as_flag: false,
            additional_params: Map::new(),
        }
    }

    /// Send reasoning hints as `{ <param>: <hint> }` in the provider's
    /// additional request parameters (e.g. `"reasoning_effort"`)
    pub fn with_reasoning_param(mut self, param: impl Into<String>) -> Self {
        self.reasoning_param = Some(param.into());
        self.reasoning_as_flag = false;
        self
    }

    /// Send `{ <param>: true }` whenever a reasoning hint is present.
    ///
    /// Rig's Ollama provider only accepts a boolean `think`.
    pub fn with_reasoning_flag(mut self, param: impl Into<String>) -> Self {
        self.reasoning_param = Some(param.into());
        self.reasoning_as_flag = true;
        self
    }

    /// Extra provider request fields sent with every call.
    ///
    /// Non-object values are ignored.
    pub fn with_additional_params(mut self, params: Value) -> Self {
        if let Value::Object(params) = params {
            self.additional_params.extend(params);
        }
        self
    }

    pub fn agent(&self) -> &Agent<M> {
        &self.agent
    }

    fn failure(&self, err: impl std::fmt::Display) -> RagError {
        RagError::port_failure(self.name.clone(), err.to_string())
    }

    async fn request(
        &self,
        messages: &[ChatMessage],
        extra_preamble: Option<String>,
        options: &GenerationOptions,
    ) -> Result<CompletionRequestBuilder<M>, RagError> {
        let mut conversation = build_rig_conversation(messages);
        if let Some(extra) = extra_preamble {
            conversation.preamble = Some(match conversation.preamble {
                Some(preamble) => format!("{}\n\n{}", preamble, extra),
                None => extra,
            });
        }

        let mut builder = self
            .agent
            .completion(conversation.prompt, conversation.history)
            .await
            .map_err(|e| self.failure(e))?;

        if let Some(system_preamble) = conversation.preamble {
            let preamble = match self.agent.preamble.as_deref() {
                Some(agent_preamble) => format!("{}\n\n{}", agent_preamble, system_preamble),
                None => system_preamble,
            };
            builder = builder.preamble(preamble);
        }

        if let Some(max_tokens) = options.max_tokens {
            builder = builder.max_tokens(max_tokens as u64);
        }

        if let Some(params) = request_params(
            &self.additional_params,
            self.reasoning_param.as_deref(),
            self.reasoning_as_flag,
            options.reasoning.as_deref(),
        ) {
            builder = builder.additional_params(params);
        }

        Ok(builder)
    }
}

#[async_trait]
impl<M> LlmPort for RigLlmAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    async fn generate(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<LlmResponse, RagError> {
        let response = self
            .request(messages, None, options)
            .await?
            .send()
            .await
            .map_err(|e| self.failure(e))?;

        Ok(response_from_choice(&response.choice))
    }

    async fn generate_structured(
        &self,
        messages: &[ChatMessage],
        schema: &StructuredSchema,
        options: &GenerationOptions,
    ) -> Result<serde_json::Value, RagError> {
        let response = self
            .request(messages, Some(schema_instruction(schema)), options)
            .await?
            .send()
            .await
            .map_err(|e| self.failure(e))?;

        extract_json(&text_from_choice(&response.choice))
    }

    async fn stream(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<TokenStream, RagError> {
        let stream = self
            .request(messages, None, options)
            .await?
            .stream()
            .await
            .map_err(|e| self.failure(e))?;

        let port = self.name.clone();
        let mapped = stream.filter_map(move |item| {
            let port = port.clone();
            async move {
                match item {
                    Ok(StreamedAssistantContent::Text(text)) => Some(Ok(text.text)),
                    Ok(_) => None,
                    Err(err) => Some(Err(RagError::port_failure(port, err.to_string()))),
                }
            }
        });

        Ok(TokenStream::new(mapped))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Additional params for one call: the fixed ones plus the reasoning hint
fn request_params(
    fixed: &Map<String, Value>,
    reasoning_param: Option<&str>,
    as_flag: bool,
    hint: Option<&str>,
) -> Option<Value> {
    let mut params = fixed.clone();
    if let (Some(param), Some(hint)) = (reasoning_param, hint) {
        let value = if as_flag {
            Value::Bool(true)
        } else {
            Value::String(hint.to_string())
        };
        params.insert(param.to_string(), value);
    }

    (!params.is_empty()).then_some(Value::Object(params))
}

fn schema_instruction(schema: &StructuredSchema) -> String {
    format!(
        "Respond with a single JSON value named {} that conforms to this JSON schema. \
         Output only the JSON, with no commentary.\n\n{}",
        schema.name,
        serde_json::to_string_pretty(&schema.schema).unwrap_or_default()
    )
}

struct RigConversation {
    prompt: RigMessage,
    history: Vec<RigMessage>,
    preamble: Option<String>,
}

fn build_rig_conversation(messages: &[ChatMessage]) -> RigConversation {
    let mut system_parts = Vec::new();
    let mut rig_messages = Vec::new();

    for message in messages {
        match message.role {
            Role::System => {
                if !message.content.trim().is_empty() {
                    system_parts.push(message.content.clone());
                }
            }
            Role::User => rig_messages.push(RigMessage::user(message.content.clone())),
            Role::Assistant => rig_messages.push(RigMessage::Assistant {
                id: None,
                content: OneOrMany::one(AssistantContent::text(message.content.clone())),
            }),
        }
    }

    let prompt = rig_messages.pop().unwrap_or_else(|| RigMessage::user(""));
    let preamble = if system_parts.is_empty() {
        None
    } else {
        Some(system_parts.join("\n\n"))
    };

    RigConversation {
        prompt,
        history: rig_messages,
        preamble,
    }
}

/// Text items become the response text, reasoning items its thinking trace
fn response_from_choice(choice: &OneOrMany<AssistantContent>) -> LlmResponse {
    let thinking = choice
        .iter()
        .filter_map(|item| match item {
            AssistantContent::Reasoning(reasoning) => Some(reasoning.reasoning.join("")),
            _ => None,
        })
        .filter(|trace| !trace.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    LlmResponse::new(text_from_choice(choice)).with_thinking(thinking)
}

fn text_from_choice(choice: &OneOrMany<AssistantContent>) -> String {
    choice
        .iter()
        .filter_map(|item| match item {
            AssistantContent::Text(text) => Some(text.text.as_str()),
            _ => None,
        })
        .collect()
}

impl<M> std::fmt::Debug for RigLlmAdapter<M>
where
    M: CompletionModel + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RigLlmAdapter")
            .field("name", &self.name)
            .field("reasoning_param", &self.reasoning_param)
            .field("reasoning_as_flag", &self.reasoning_as_flag)
            .field("additional_params", &self.additional_params)
            .finish()
    }
}
