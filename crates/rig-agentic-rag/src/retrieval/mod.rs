//! Hybrid retrieval
//!
//! The search node asks a `VectorStore` for two independent rankings per
//! query, fuses them with weighted Reciprocal Rank Fusion and hands the
//! fused candidates to a `Reranker`.

mod fusion;
mod memory;
mod rerank;
mod store;

pub use fusion::{reciprocal_rank_fusion, rrf_contribution, RRF_SMOOTHING};
pub use memory::{keyword_query, InMemoryVectorStore, StoredChunk};
pub use rerank::{apply_scores, LlmReranker, PassageScore, RelevanceScores, DEFAULT_PASSAGE_CHARS};
pub use store::{Embedder, PassthroughReranker, Reranker, VectorStore};
