//! Planning node: split the question into retrieval subtasks

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::{bounded, log_fallback, NodeContext, WorkflowNode};
use crate::error::RagError;
use crate::llm::{generate_typed, LlmPort};
use crate::state::{ChatMessage, RagState, RagUpdate, Subtask};
use crate::workflow::config::WorkflowConfig;
use crate::workflow::engine::WorkflowStep;
use crate::workflow::events::WorkflowEvent;

/// Purpose of the single subtask used when planning fails
pub const FALLBACK_PURPOSE: &str = "basic investigation";

/// Structured planner output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PlanningResult {
    /// Subtasks to investigate (at most 3)
    pub subtasks: Vec<Subtask>,
}

pub struct PlanNode {
    llm: Arc<dyn LlmPort>,
    config: Arc<WorkflowConfig>,
}

impl PlanNode {
    pub fn new(llm: Arc<dyn LlmPort>, config: Arc<WorkflowConfig>) -> Self {
        Self { llm, config }
    }

    /// The subtask used whenever the planner cannot produce one
    pub fn fallback(question: &str) -> Vec<Subtask> {
        vec![Subtask::new(FALLBACK_PURPOSE, [question])]
    }

    /// Ask the model for a plan; an empty plan is an `EmptyResult`
    pub async fn plan(&self, question: &str) -> Result<Vec<Subtask>, RagError> {
        let messages = vec![
            ChatMessage::system(self.config.prompts.planner.clone()),
            ChatMessage::user(question),
        ];
        let options = self.config.plan.options();

        let result: PlanningResult = bounded(
            self.config.plan.timeout,
            generate_typed(self.llm.as_ref(), &messages, &options),
        )
        .await?;

        if result.subtasks.is_empty() {
            return Err(RagError::empty_result("planner returned no subtasks"));
        }
        Ok(result.subtasks)
    }
}

#[async_trait]
impl WorkflowNode for PlanNode {
    fn step(&self) -> WorkflowStep {
        WorkflowStep::Plan
    }

    async fn run(&self, state: &RagState, ctx: &NodeContext) -> RagUpdate {
        info!(question = %state.question, "Planning subtasks");

        let (mut subtasks, fallback) = match self.plan(&state.question).await {
            Ok(subtasks) => (subtasks, false),
            Err(e) => {
                log_fallback(self.step(), &e, "Planning failed; using fallback subtask");
                (Self::fallback(&state.question), true)
            }
        };

        if subtasks.len() > self.config.max_subtasks {
            warn!(
                planned = subtasks.len(),
                max = self.config.max_subtasks,
                "Planner exceeded subtask limit; dropping the excess"
            );
            subtasks.truncate(self.config.max_subtasks);
        }

        info!(subtasks = subtasks.len(), fallback, "Planning complete");
        ctx.emit(WorkflowEvent::Planned {
            subtasks: subtasks.clone(),
            fallback,
        });

        RagUpdate::empty().with_subtasks(subtasks).with_loop_count(0)
    }
}
