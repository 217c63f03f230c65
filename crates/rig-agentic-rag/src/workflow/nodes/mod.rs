//! Workflow nodes
//!
//! Each node reads the current `RagState` and returns a `RagUpdate`. Port
//! failures never escape a node: every call is bounded by the node's
//! timeout, and any timeout or error is replaced by the node's fallback.
//!
//! - [`PlanNode`]: question → subtasks
//! - [`SearchNode`]: subtasks → retrieval blocks (hybrid search, fusion, rerank)
//! - [`SummarizeNode`]: retrieval blocks → summary
//! - [`JudgeNode`]: summary → verdict, loop count, follow-up subtasks
//! - [`AnswerNode`]: retrieval blocks + history → streamed answer

pub mod answer;
pub mod judge;
pub mod plan;
pub mod search;
pub mod summarize;

pub use answer::{AnswerNode, FALLBACK_ANSWER};
pub use judge::{JudgeNode, JudgeResult, INSUFFICIENT_WITHOUT_FOLLOW_UP_NOTE};
pub use plan::{PlanNode, PlanningResult, FALLBACK_PURPOSE};
pub use search::SearchNode;
pub use summarize::{SummarizeNode, NO_RESULTS_SUMMARY};

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

use super::engine::WorkflowStep;
use super::events::{EventSender, WorkflowEvent};
use crate::error::RagError;
use crate::state::{RagState, RagUpdate};

/// Per-invocation context handed to every node
#[derive(Debug, Clone, Default)]
pub struct NodeContext {
    events: Option<EventSender>,
}

impl NodeContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: EventSender) -> Self {
        Self {
            events: Some(events),
        }
    }

    /// Report progress; a missing or closed channel is ignored
    pub fn emit(&self, event: WorkflowEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

/// One step of the workflow
#[async_trait]
pub trait WorkflowNode: Send + Sync {
    /// The step this node implements
    fn step(&self) -> WorkflowStep;

    /// Compute this step's update; never fails
    async fn run(&self, state: &RagState, ctx: &NodeContext) -> RagUpdate;
}

/// Await `future` for at most `timeout`.
///
/// Elapsed time becomes `RagError::Timeout`; the inner future is dropped,
/// which cancels the port call.
pub async fn bounded<T, F>(timeout: Duration, future: F) -> Result<T, RagError>
where
    F: Future<Output = Result<T, RagError>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(RagError::Timeout(timeout)),
    }
}

/// Log an error a node is replacing with its fallback.
///
/// Port-facing kinds are expected and logged as warnings. Any other kind
/// means a port reported something it should not; the node still falls
/// back, but the error is logged as one.
pub fn log_fallback(step: WorkflowStep, err: &RagError, action: &str) {
    if err.is_fallback_eligible() {
        warn!(step = %step, error = %err, kind = err.kind(), "{}", action);
    } else {
        error!(
            step = %step,
            error = %err,
            kind = err.kind(),
            "Unexpected {} from a port. {}",
            err.kind(),
            action
        );
    }
}

/// First `max_chars` characters of `text`
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}
