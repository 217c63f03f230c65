//! Retrieval ports: vector/keyword store, reranker and embedder
//!
//! All three are read-mostly services the search node calls concurrently
//! for independent queries, so every method takes `&self`.

use async_trait::async_trait;

use crate::error::RagError;
use crate::state::{DocumentChunk, SearchResult};

/// Document store offering both retrieval signals fused by the search node.
///
/// Both searches return an empty list, not an error, when the store is
/// empty or nothing matches.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Index chunks, replacing any chunk with the same id. Returns the number indexed.
    async fn add_documents(&self, chunks: Vec<DocumentChunk>) -> Result<usize, RagError>;

    /// Embedding-similarity ranking, best first
    async fn similarity_search(&self, query: &str, k: usize)
        -> Result<Vec<SearchResult>, RagError>;

    /// Keyword-relevance ranking, best first
    async fn keyword_search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>, RagError>;

    /// Number of indexed chunks
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Second-stage ranker applied to the fused candidates
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Reorder `results` for `query` and keep the best `top_k`.
    ///
    /// Must return an empty list for empty input.
    async fn rerank(
        &self,
        query: &str,
        results: Vec<SearchResult>,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, RagError>;
}

/// Text embedding model
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed every text; the output has one vector per input, in order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError>;

    fn name(&self) -> &str;
}

/// Reranker that keeps the fused order and truncates
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughReranker;

#[async_trait]
impl Reranker for PassthroughReranker {
    async fn rerank(
        &self,
        _query: &str,
        mut results: Vec<SearchResult>,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, RagError> {
        results.truncate(top_k);
        Ok(results)
    }
}
