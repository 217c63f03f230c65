//! Workflow engine: the plan → search → summarize → judge loop
//!
//! ```text
//!  PLAN ──▶ SEARCH ──▶ SUMMARIZE ──▶ JUDGE ──┬──▶ ANSWER ──▶ DONE
//!              ▲                             │
//!              └──── subtasks pending ───────┘
//! ```
//!
//! Nodes run strictly one after another. After every step the engine
//! applies the node's update, decides the next step, and (when running on a
//! thread) overwrites that thread's checkpoint. `JUDGE → SEARCH` is taken
//! only while subtasks are pending and the loop budget remains, so a run
//! performs at most `max_loop_count` judge evaluations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::config::WorkflowConfig;
use super::events::{EventSender, WorkflowEvent};
use super::nodes::{
    AnswerNode, JudgeNode, NodeContext, PlanNode, SearchNode, SummarizeNode, WorkflowNode,
};
use crate::checkpoint::{Checkpoint, Checkpointer};
use crate::error::RagError;
use crate::llm::LlmPort;
use crate::retrieval::{Reranker, VectorStore};
use crate::state::RagState;

/// Workflow steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    Plan,
    Search,
    Summarize,
    Judge,
    Answer,
    Done,
}

impl WorkflowStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Search => "search",
            Self::Summarize => "summarize",
            Self::Judge => "judge",
            Self::Answer => "answer",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The step after `completed`, given the state that step produced
pub fn next_step(completed: WorkflowStep, state: &RagState, max_loop_count: u32) -> WorkflowStep {
    match completed {
        WorkflowStep::Plan => WorkflowStep::Search,
        WorkflowStep::Search => WorkflowStep::Summarize,
        WorkflowStep::Summarize => WorkflowStep::Judge,
        WorkflowStep::Judge => {
            if state.has_pending_subtasks() && state.loop_count < max_loop_count {
                WorkflowStep::Search
            } else {
                WorkflowStep::Answer
            }
        }
        WorkflowStep::Answer | WorkflowStep::Done => WorkflowStep::Done,
    }
}

/// Runs questions through the workflow
pub struct WorkflowEngine {
    config: Arc<WorkflowConfig>,
    plan: PlanNode,
    search: SearchNode,
    summarize: SummarizeNode,
    judge: JudgeNode,
    answer: AnswerNode,
    checkpointer: Option<Arc<dyn Checkpointer>>,
}

impl WorkflowEngine {
    /// Build an engine; fails if `config` does not validate
    pub fn new(
        llm: Arc<dyn LlmPort>,
        store: Arc<dyn VectorStore>,
        reranker: Arc<dyn Reranker>,
        config: WorkflowConfig,
    ) -> Result<Self, RagError> {
        config.validate()?;
        let config = Arc::new(config);

        Ok(Self {
            plan: PlanNode::new(Arc::clone(&llm), Arc::clone(&config)),
            search: SearchNode::new(store, reranker, Arc::clone(&config)),
            summarize: SummarizeNode::new(Arc::clone(&llm), Arc::clone(&config)),
            judge: JudgeNode::new(Arc::clone(&llm), Arc::clone(&config)),
            answer: AnswerNode::new(llm, Arc::clone(&config)),
            config,
            checkpointer: None,
        })
    }

    /// Persist a checkpoint after every step of thread-keyed runs
    pub fn with_checkpointer(mut self, checkpointer: Arc<dyn Checkpointer>) -> Self {
        self.checkpointer = Some(checkpointer);
        self
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn checkpointer(&self) -> Option<&Arc<dyn Checkpointer>> {
        self.checkpointer.as_ref()
    }

    fn node(&self, step: WorkflowStep) -> Option<&dyn WorkflowNode> {
        let node: &dyn WorkflowNode = match step {
            WorkflowStep::Plan => &self.plan,
            WorkflowStep::Search => &self.search,
            WorkflowStep::Summarize => &self.summarize,
            WorkflowStep::Judge => &self.judge,
            WorkflowStep::Answer => &self.answer,
            WorkflowStep::Done => return None,
        };
        Some(node)
    }

    /// Answer a standalone question (no thread, no checkpoints)
    pub async fn invoke(&self, question: &str) -> RagState {
        self.invoke_with_context(RagState::new(question), &NodeContext::new())
            .await
    }

    /// Run a prepared state from `PLAN`, reporting progress to `events`
    pub async fn invoke_with_events(&self, state: RagState, events: EventSender) -> RagState {
        self.invoke_with_context(state, &NodeContext::with_events(events))
            .await
    }

    /// Run a prepared state from `PLAN` without checkpointing
    pub async fn invoke_with_context(&self, state: RagState, ctx: &NodeContext) -> RagState {
        self.drive(None, WorkflowStep::Plan, state, 0, ctx).await
    }

    /// Ask a question on a conversation thread.
    ///
    /// The thread's last checkpoint (if any) supplies the chat history,
    /// extended with its question and answer. The new run always starts
    /// at `PLAN`.
    pub async fn ask(&self, thread_id: &str, question: &str) -> Result<RagState, RagError> {
        self.ask_with_context(thread_id, question, &NodeContext::new())
            .await
    }

    pub async fn ask_with_context(
        &self,
        thread_id: &str,
        question: &str,
        ctx: &NodeContext,
    ) -> Result<RagState, RagError> {
        let history = match self.checkpoint(thread_id).await? {
            Some(previous) => previous.state.history_with_turn(),
            None => Vec::new(),
        };
        info!(thread_id, history = history.len(), "New question on thread");

        let state = RagState::new(question).with_chat_history(history);
        Ok(self
            .drive(Some(thread_id), WorkflowStep::Plan, state, 0, ctx)
            .await)
    }

    /// Continue a thread's interrupted run from the step after its last checkpoint.
    ///
    /// A finished run is returned unchanged. Fails if the thread has no
    /// checkpoint or no checkpointer is configured.
    pub async fn resume(&self, thread_id: &str) -> Result<RagState, RagError> {
        self.resume_with_context(thread_id, &NodeContext::new())
            .await
    }

    pub async fn resume_with_context(
        &self,
        thread_id: &str,
        ctx: &NodeContext,
    ) -> Result<RagState, RagError> {
        if self.checkpointer.is_none() {
            return Err(RagError::checkpoint_error("no checkpointer configured"));
        }

        let checkpoint = self.checkpoint(thread_id).await?.ok_or_else(|| {
            RagError::checkpoint_error(format!("no checkpoint for thread '{}'", thread_id))
        })?;

        if checkpoint.is_finished() {
            debug!(thread_id, "Checkpoint already finished; nothing to resume");
            return Ok(checkpoint.state);
        }

        info!(
            thread_id,
            next = %checkpoint.next,
            sequence = checkpoint.sequence,
            "Resuming from checkpoint"
        );
        Ok(self
            .drive(
                Some(thread_id),
                checkpoint.next,
                checkpoint.state,
                checkpoint.sequence,
                ctx,
            )
            .await)
    }

    /// Latest checkpoint for a thread (`None` without a checkpointer)
    pub async fn checkpoint(&self, thread_id: &str) -> Result<Option<Checkpoint>, RagError> {
        match &self.checkpointer {
            Some(checkpointer) => checkpointer.load(thread_id).await,
            None => Ok(None),
        }
    }

    async fn drive(
        &self,
        thread_id: Option<&str>,
        start: WorkflowStep,
        mut state: RagState,
        mut sequence: u64,
        ctx: &NodeContext,
    ) -> RagState {
        let mut step = start;

        while let Some(node) = self.node(step) {
            debug!(step = %node.step(), loop_count = state.loop_count, "Running step");
            ctx.emit(WorkflowEvent::StepStarted { step: node.step() });

            let update = node.run(&state, ctx).await;
            state = state.apply_update(update);

            let next = next_step(step, &state, self.config.max_loop_count);
            sequence += 1;
            debug!(from = %step, to = %next, "Transition");

            if let Some(thread_id) = thread_id {
                self.save_checkpoint(thread_id, sequence, step, next, &state)
                    .await;
            }
            step = next;
        }

        info!(
            loop_count = state.loop_count,
            blocks = state.search_results.len(),
            "Workflow finished"
        );
        ctx.emit(WorkflowEvent::Finished {
            answer: state.answer.clone(),
        });
        state
    }

    async fn save_checkpoint(
        &self,
        thread_id: &str,
        sequence: u64,
        completed: WorkflowStep,
        next: WorkflowStep,
        state: &RagState,
    ) {
        let Some(checkpointer) = &self.checkpointer else {
            return;
        };

        let checkpoint = Checkpoint::new(thread_id, sequence, completed, next, state.clone());
        match checkpointer.save(&checkpoint).await {
            Ok(()) => debug!(thread_id, sequence, step = %completed, "Checkpoint saved"),
            Err(e) => warn!(thread_id, error = %e, "Failed to save checkpoint; continuing"),
        }
    }
}

impl fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("config", &self.config)
            .field("checkpointing", &self.checkpointer.is_some())
            .finish_non_exhaustive()
    }
}
