//! Judge node: decide whether the summary suffices to answer
//!
//! The judge is the only writer of loop increments, and the place the loop
//! bound is enforced: once `loop_count` reaches `max_loop_count` the pending
//! subtasks are cleared whatever the verdict, so the engine moves to answer.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::{bounded, log_fallback, NodeContext, WorkflowNode};
use crate::error::RagError;
use crate::llm::{generate_typed, LlmPort};
use crate::state::{ChatMessage, RagState, RagUpdate, Subtask};
use crate::workflow::config::WorkflowConfig;
use crate::workflow::engine::WorkflowStep;
use crate::workflow::events::WorkflowEvent;

/// Appended to the reason when an "insufficient" verdict names no follow-up work
pub const INSUFFICIENT_WITHOUT_FOLLOW_UP_NOTE: &str =
    " (no concrete follow-up could be identified; answering with the information at hand)";

/// Sufficiency verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct JudgeResult {
    /// Whether the information is sufficient to answer the question
    pub sufficient: bool,

    /// Reason for the verdict
    pub reason: String,

    /// Subtasks for the missing information (only when not sufficient)
    #[serde(default)]
    pub additional_subtasks: Option<Vec<Subtask>>,
}

impl JudgeResult {
    /// Build a verdict; the result is already validated
    pub fn new(
        sufficient: bool,
        reason: impl Into<String>,
        additional_subtasks: Option<Vec<Subtask>>,
    ) -> Self {
        Self {
            sufficient,
            reason: reason.into(),
            additional_subtasks,
        }
        .validated()
    }

    /// A "sufficient" verdict with the given reason
    pub fn sufficient(reason: impl Into<String>) -> Self {
        Self::new(true, reason, None)
    }

    /// The verdict substituted when judging fails
    pub fn fallback(error: &RagError) -> Self {
        let reason = match error {
            RagError::Timeout(_) => {
                "judgment timed out; answering with the information at hand".to_string()
            }
            other => format!(
                "judgment failed ({}); answering with the information at hand",
                other.kind()
            ),
        };
        Self::sufficient(reason)
    }

    /// Enforce consistency between the verdict and its follow-up work.
    ///
    /// - sufficient ⇒ no follow-up subtasks
    /// - insufficient without follow-up subtasks ⇒ sufficient, with a note
    ///
    /// Idempotent.
    pub fn validated(mut self) -> Self {
        if self.sufficient {
            self.additional_subtasks = None;
        } else if self
            .additional_subtasks
            .as_ref()
            .map_or(true, |subtasks| subtasks.is_empty())
        {
            self.sufficient = true;
            self.reason.push_str(INSUFFICIENT_WITHOUT_FOLLOW_UP_NOTE);
            self.additional_subtasks = None;
        }
        self
    }

    /// Follow-up subtasks (empty when sufficient)
    pub fn follow_up(&self) -> &[Subtask] {
        self.additional_subtasks.as_deref().unwrap_or(&[])
    }
}

pub struct JudgeNode {
    llm: Arc<dyn LlmPort>,
    config: Arc<WorkflowConfig>,
}

impl JudgeNode {
    pub fn new(llm: Arc<dyn LlmPort>, config: Arc<WorkflowConfig>) -> Self {
        Self { llm, config }
    }

    /// Ask the model for a verdict and validate it
    pub async fn judge(&self, question: &str, summary: &str) -> Result<JudgeResult, RagError> {
        let messages = vec![
            ChatMessage::system(self.config.prompts.judge.clone()),
            ChatMessage::user(format!(
                "## Question\n{}\n\n## Summary of search results\n{}",
                question, summary
            )),
        ];
        let options = self.config.judge.options();

        let raw: JudgeResult = bounded(
            self.config.judge.timeout,
            generate_typed(self.llm.as_ref(), &messages, &options),
        )
        .await?;

        Ok(raw.validated())
    }
}

#[async_trait]
impl WorkflowNode for JudgeNode {
    fn step(&self) -> WorkflowStep {
        WorkflowStep::Judge
    }

    async fn run(&self, state: &RagState, ctx: &NodeContext) -> RagUpdate {
        info!(loop_count = state.loop_count, "Judging sufficiency");

        let result = match self.judge(&state.question, &state.summary).await {
            Ok(result) => result,
            Err(e) => {
                log_fallback(self.step(), &e, "Judgment failed; treating as sufficient");
                JudgeResult::fallback(&e)
            }
        };
        info!(sufficient = result.sufficient, reason = %result.reason, "Judgment");

        let loop_count = state.loop_count.saturating_add(1);
        let subtasks = if result.sufficient {
            Vec::new()
        } else if loop_count >= self.config.max_loop_count {
            info!(
                max_loop_count = self.config.max_loop_count,
                "Loop limit reached; answering with current information"
            );
            Vec::new()
        } else {
            result.follow_up().to_vec()
        };

        ctx.emit(WorkflowEvent::Judged {
            sufficient: result.sufficient,
            reason: result.reason.clone(),
            loop_count,
            follow_up: subtasks.len(),
        });

        RagUpdate::empty()
            .with_subtasks(subtasks)
            .with_loop_count(loop_count)
    }
}
