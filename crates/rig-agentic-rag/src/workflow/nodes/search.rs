//! Document search node: hybrid retrieval for every pending subtask
//!
//! Per query: similarity and keyword search run concurrently, their rankings
//! are fused with RRF, the fused candidates are reranked, and each surviving
//! text is cut to `max_return_chars`. The texts of all queries of a subtask
//! form one block:
//!
//! ```text
//! [Purpose: <purpose>]
//! <text 1>
//! ---
//! <text 2>
//! ```

use async_trait::async_trait;
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info};

use super::{bounded, log_fallback, truncate_chars, NodeContext, WorkflowNode};
use crate::error::RagError;
use crate::retrieval::{reciprocal_rank_fusion, Reranker, VectorStore};
use crate::state::{RagState, RagUpdate, Subtask};
use crate::workflow::config::WorkflowConfig;
use crate::workflow::engine::WorkflowStep;
use crate::workflow::events::WorkflowEvent;

const BLOCK_SEPARATOR: &str = "\n---\n";

/// Render one subtask's retrieved texts as a block
pub fn render_block(purpose: &str, texts: &[String]) -> String {
    format!("[Purpose: {}]\n{}", purpose, texts.join(BLOCK_SEPARATOR))
}

pub struct SearchNode {
    store: Arc<dyn VectorStore>,
    reranker: Arc<dyn Reranker>,
    config: Arc<WorkflowConfig>,
}

impl SearchNode {
    pub fn new(
        store: Arc<dyn VectorStore>,
        reranker: Arc<dyn Reranker>,
        config: Arc<WorkflowConfig>,
    ) -> Self {
        Self {
            store,
            reranker,
            config,
        }
    }

    /// Reranked, truncated texts for one query
    pub async fn retrieve(&self, query: &str) -> Result<Vec<String>, RagError> {
        let settings = &self.config.retrieval;
        debug!(query = %query, "Searching");

        let (similar, keyword) = bounded(settings.timeout, async {
            tokio::try_join!(
                self.store.similarity_search(query, settings.top_k),
                self.store.keyword_search(query, settings.top_k),
            )
        })
        .await?;

        let fused = reciprocal_rank_fusion(
            &similar,
            &keyword,
            settings.top_k,
            settings.keyword_weight,
        );
        debug!(
            query = %query,
            similar = similar.len(),
            keyword = keyword.len(),
            fused = fused.len(),
            "Fused rankings"
        );

        let reranked = bounded(
            settings.timeout,
            self.reranker.rerank(query, fused, settings.rerank_top_k),
        )
        .await?;

        Ok(reranked
            .iter()
            .map(|r| truncate_chars(&r.chunk.text, settings.max_return_chars).to_string())
            .collect())
    }

    /// The block for one subtask, or `None` when no query found anything
    pub async fn search_subtask(&self, subtask: &Subtask) -> Result<Option<String>, RagError> {
        let per_query = try_join_all(subtask.queries.iter().map(|q| self.retrieve(q))).await?;
        let texts: Vec<String> = per_query.into_iter().flatten().collect();

        if texts.is_empty() {
            return Ok(None);
        }
        Ok(Some(render_block(&subtask.purpose, &texts)))
    }
}

#[async_trait]
impl WorkflowNode for SearchNode {
    fn step(&self) -> WorkflowStep {
        WorkflowStep::Search
    }

    async fn run(&self, state: &RagState, ctx: &NodeContext) -> RagUpdate {
        info!(subtasks = state.subtasks.len(), "Searching documents");

        let mut blocks = Vec::new();
        for subtask in &state.subtasks {
            match self.search_subtask(subtask).await {
                Ok(Some(block)) => blocks.push(block),
                Ok(None) => debug!(purpose = %subtask.purpose, "No results for subtask"),
                Err(e) => {
                    debug!(purpose = %subtask.purpose, "Subtask search failed");
                    log_fallback(self.step(), &e, "Search failed; abandoning remaining subtasks");
                    break;
                }
            }
        }

        let total_blocks = state.search_results.len() + blocks.len();
        info!(new_blocks = blocks.len(), total_blocks, "Search complete");
        ctx.emit(WorkflowEvent::Searched {
            new_blocks: blocks.len(),
            total_blocks,
        });

        RagUpdate::empty()
            .with_search_results(blocks)
            .clear_subtasks()
    }
}
