//! Answer node: stream the final answer grounded in all retrieved blocks
//!
//! The answer sees the full `search_results`, not the summary, plus a
//! bounded window of prior conversation. Fragments are forwarded as
//! `AnswerDelta` events as they arrive; the node's own result is the
//! concatenated text.

use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use tracing::info;

use super::{bounded, log_fallback, truncate_chars, NodeContext, WorkflowNode};
use crate::error::RagError;
use crate::llm::LlmPort;
use crate::state::{ChatMessage, RagState, RagUpdate};
use crate::workflow::config::WorkflowConfig;
use crate::workflow::engine::WorkflowStep;
use crate::workflow::events::WorkflowEvent;

/// Answer given when the model produces nothing usable
pub const FALLBACK_ANSWER: &str = "Sorry, I could not generate an answer.";

const NO_SEARCH_RESULTS: &str = "(no search results)";

pub struct AnswerNode {
    llm: Arc<dyn LlmPort>,
    config: Arc<WorkflowConfig>,
}

impl AnswerNode {
    pub fn new(llm: Arc<dyn LlmPort>, config: Arc<WorkflowConfig>) -> Self {
        Self { llm, config }
    }

    /// Prompt messages: system prompt, trailing history window, then the request
    pub fn build_messages(&self, state: &RagState) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(self.config.prompts.answer_system())];

        let skip = state
            .chat_history
            .len()
            .saturating_sub(self.config.history_window);
        messages.extend(state.chat_history.iter().skip(skip).map(|m| {
            ChatMessage::new(
                m.role,
                truncate_chars(&m.content, self.config.history_max_chars),
            )
        }));

        let context = if state.search_results.is_empty() {
            NO_SEARCH_RESULTS.to_string()
        } else {
            state.joined_results()
        };
        messages.push(ChatMessage::user(format!(
            "## Search results\n{}\n\n## Question\n{}",
            context, state.question
        )));

        messages
    }

    /// Stream the answer, forwarding each fragment to `ctx`
    pub async fn generate(&self, state: &RagState, ctx: &NodeContext) -> Result<String, RagError> {
        let messages = self.build_messages(state);
        let options = self.config.answer.options();

        bounded(self.config.answer.timeout, async {
            let mut stream = self.llm.stream(&messages, &options).await?;
            let mut answer = String::new();

            while let Some(fragment) = stream.next().await {
                let fragment = fragment?;
                if fragment.is_empty() {
                    continue;
                }
                ctx.emit(WorkflowEvent::AnswerDelta {
                    text: fragment.clone(),
                });
                answer.push_str(&fragment);
            }

            if answer.trim().is_empty() {
                return Err(RagError::empty_result("answer stream produced no text"));
            }
            Ok(answer)
        })
        .await
    }
}

#[async_trait]
impl WorkflowNode for AnswerNode {
    fn step(&self) -> WorkflowStep {
        WorkflowStep::Answer
    }

    async fn run(&self, state: &RagState, ctx: &NodeContext) -> RagUpdate {
        info!(
            blocks = state.search_results.len(),
            history = state.chat_history.len(),
            "Generating answer"
        );

        let answer = match self.generate(state, ctx).await {
            Ok(answer) => answer,
            Err(e) => {
                log_fallback(self.step(), &e, "Answer generation failed; using fallback");
                FALLBACK_ANSWER.to_string()
            }
        };

        info!(chars = answer.chars().count(), "Answer complete");
        RagUpdate::empty().with_answer(answer)
    }
}
