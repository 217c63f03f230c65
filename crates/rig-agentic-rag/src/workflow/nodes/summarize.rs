//! Summarize node: condense accumulated retrieval blocks for the judge

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{bounded, log_fallback, NodeContext, WorkflowNode};
use crate::error::RagError;
use crate::llm::{LlmPort, LlmResponse};
use crate::state::{ChatMessage, RagState, RagUpdate};
use crate::workflow::config::WorkflowConfig;
use crate::workflow::engine::WorkflowStep;
use crate::workflow::events::WorkflowEvent;

/// Summary used when nothing has been retrieved
pub const NO_RESULTS_SUMMARY: &str = "no results";

pub struct SummarizeNode {
    llm: Arc<dyn LlmPort>,
    config: Arc<WorkflowConfig>,
}

impl SummarizeNode {
    pub fn new(llm: Arc<dyn LlmPort>, config: Arc<WorkflowConfig>) -> Self {
        Self { llm, config }
    }

    /// Ask the model to condense `results_text` for `question`.
    ///
    /// The response carries the model's thinking trace, if it returned one.
    pub async fn summarize(
        &self,
        question: &str,
        results_text: &str,
    ) -> Result<LlmResponse, RagError> {
        let messages = vec![
            ChatMessage::system(self.config.prompts.summarize.clone()),
            ChatMessage::user(format!(
                "## Question\n{}\n\n## Search results\n{}",
                question, results_text
            )),
        ];
        let options = self.config.summarize.options();

        let response = bounded(
            self.config.summarize.timeout,
            self.llm.generate(&messages, &options),
        )
        .await?;

        if response.text.trim().is_empty() {
            return Err(RagError::empty_result("summary is empty"));
        }
        Ok(response)
    }
}

#[async_trait]
impl WorkflowNode for SummarizeNode {
    fn step(&self) -> WorkflowStep {
        WorkflowStep::Summarize
    }

    async fn run(&self, state: &RagState, ctx: &NodeContext) -> RagUpdate {
        if state.search_results.is_empty() {
            warn!("No search results; skipping summarization");
            ctx.emit(WorkflowEvent::Summarized {
                chars: NO_RESULTS_SUMMARY.chars().count(),
                fallback: true,
            });
            return RagUpdate::empty().with_summary(NO_RESULTS_SUMMARY);
        }

        let results_text = state.joined_results();
        let (summary, fallback) = match self.summarize(&state.question, &results_text).await {
            Ok(response) => {
                if !response.thinking.trim().is_empty() {
                    debug!(thinking = %response.thinking, "Summarizer reasoning");
                    ctx.emit(WorkflowEvent::Thinking {
                        step: self.step(),
                        trace: response.thinking,
                    });
                }
                (response.text, false)
            }
            Err(e) => {
                log_fallback(self.step(), &e, "Summarization failed; using raw results");
                (results_text, true)
            }
        };

        let chars = summary.chars().count();
        info!(chars, fallback, "Summarization complete");
        ctx.emit(WorkflowEvent::Summarized { chars, fallback });

        RagUpdate::empty().with_summary(summary)
    }
}
