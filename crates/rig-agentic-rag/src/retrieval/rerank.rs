//! LLM-scored reranker
//!
//! Scores every `(query, passage)` pair in one structured call and reorders
//! the fused candidates by that score, the way a cross-encoder would. The
//! relevance score replaces the fused score on each kept result.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

use super::store::Reranker;
use crate::error::RagError;
use crate::llm::{generate_typed, GenerationOptions, LlmPort};
use crate::state::{ChatMessage, SearchResult};

/// Passage text shown to the model is cut to this many characters
pub const DEFAULT_PASSAGE_CHARS: usize = 1000;

const RERANK_PROMPT: &str = "You rank search results. For every numbered passage, rate how well \
it helps answer the query on a scale from 0 (unrelated) to 10 (answers it directly). \
Return one score per passage, identified by its number.";

/// Relevance of one passage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PassageScore {
    /// Passage number as shown in the prompt
    pub index: usize,
    /// 0 (unrelated) to 10 (directly answers the query)
    pub score: f64,
}

/// Model output for one rerank call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RelevanceScores {
    pub scores: Vec<PassageScore>,
}

/// Reranker that asks an `LlmPort` to score passages
pub struct LlmReranker {
    llm: Arc<dyn LlmPort>,
    options: GenerationOptions,
    passage_chars: usize,
}

impl LlmReranker {
    pub fn new(llm: Arc<dyn LlmPort>) -> Self {
        Self {
            llm,
            options: GenerationOptions::default(),
            passage_chars: DEFAULT_PASSAGE_CHARS,
        }
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_passage_chars(mut self, passage_chars: usize) -> Self {
        self.passage_chars = passage_chars;
        self
    }

    fn messages(&self, query: &str, results: &[SearchResult]) -> Vec<ChatMessage> {
        let passages = results
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let text: String = r.chunk.text.chars().take(self.passage_chars).collect();
                format!("[{}] {}", i, text)
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        vec![
            ChatMessage::system(RERANK_PROMPT),
            ChatMessage::user(format!("## Query\n{}\n\n## Passages\n{}", query, passages)),
        ]
    }
}

/// Order `results` by model score, best first.
///
/// Unscored passages keep their fused order behind every scored one.
/// Out-of-range indices are ignored; the first score for an index wins.
pub fn apply_scores(
    results: Vec<SearchResult>,
    scores: &[PassageScore],
    top_k: usize,
) -> Vec<SearchResult> {
    let mut by_index: Vec<Option<f64>> = vec![None; results.len()];
    for score in scores {
        if let Some(slot) = by_index.get_mut(score.index) {
            if slot.is_none() && score.score.is_finite() {
                *slot = Some(score.score);
            }
        }
    }

    let mut scored: Vec<(Option<f64>, SearchResult)> = by_index.into_iter().zip(results).collect();
    scored.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => b.partial_cmp(a).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    scored
        .into_iter()
        .take(top_k)
        .map(|(score, mut result)| {
            if let Some(score) = score {
                result.score = score;
            }
            result
        })
        .collect()
}

#[async_trait]
impl Reranker for LlmReranker {
    async fn rerank(
        &self,
        query: &str,
        results: Vec<SearchResult>,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, RagError> {
        if results.len() <= 1 || top_k == 0 {
            return Ok(results.into_iter().take(top_k).collect());
        }

        let messages = self.messages(query, &results);
        let relevance: RelevanceScores =
            generate_typed(self.llm.as_ref(), &messages, &self.options).await?;

        debug!(
            candidates = results.len(),
            scored = relevance.scores.len(),
            "Reranked candidates"
        );
        Ok(apply_scores(results, &relevance.scores, top_k))
    }
}

impl std::fmt::Debug for LlmReranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmReranker")
            .field("llm", &self.llm.name())
            .field("passage_chars", &self.passage_chars)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmResponse, StructuredSchema};
    use crate::state::DocumentChunk;
    use std::sync::Mutex;

    /// Returns a fixed JSON value and records the prompts it saw
    struct FixedScores {
        reply: Result<serde_json::Value, String>,
        prompts: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl FixedScores {
        fn new(reply: serde_json::Value) -> Self {
            Self {
                reply: Ok(reply),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err("model offline".to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LlmPort for FixedScores {
        async fn generate(
            &self,
            _messages: &[ChatMessage],
            _options: &GenerationOptions,
        ) -> Result<LlmResponse, RagError> {
            unreachable!("reranker only uses structured generation")
        }

        async fn generate_structured(
            &self,
            messages: &[ChatMessage],
            schema: &StructuredSchema,
            _options: &GenerationOptions,
        ) -> Result<serde_json::Value, RagError> {
            assert_eq!(schema.name, "RelevanceScores");
            self.prompts.lock().unwrap().push(messages.to_vec());
            self.reply
                .clone()
                .map_err(|message| RagError::port_failure("fixed", message))
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn hit(id: &str, text: &str, score: f64) -> SearchResult {
        SearchResult::new(DocumentChunk::new(id, text, "src"), score)
    }

    fn candidates() -> Vec<SearchResult> {
        vec![
            hit("a", "the cat sat on the mat", 0.03),
            hit("b", "rrf fuses rankings by position", 0.02),
            hit("c", "bm25 weighs term frequency", 0.01),
        ]
    }

    fn ids(results: &[SearchResult]) -> Vec<&str> {
        results.iter().map(|r| r.id()).collect()
    }

    #[tokio::test]
    async fn test_reorders_by_model_score() {
        let llm = Arc::new(FixedScores::new(serde_json::json!({
            "scores": [
                { "index": 0, "score": 1.0 },
                { "index": 1, "score": 9.5 },
                { "index": 2, "score": 6.0 }
            ]
        })));
        let reranker = LlmReranker::new(llm.clone());

        let reranked = reranker
            .rerank("how does rrf work", candidates(), 2)
            .await
            .unwrap();

        assert_eq!(ids(&reranked), vec!["b", "c"]);
        assert_eq!(reranked[0].score, 9.5);
        assert_eq!(llm.calls(), 1);

        let prompt = &llm.prompts.lock().unwrap()[0];
        assert!(prompt[1].content.contains("how does rrf work"));
        assert!(prompt[1].content.contains("[2] bm25 weighs term frequency"));
    }

    #[tokio::test]
    async fn test_unscored_passages_keep_fused_order_last() {
        let llm = Arc::new(FixedScores::new(serde_json::json!({
            "scores": [{ "index": 2, "score": 4.0 }, { "index": 7, "score": 10.0 }]
        })));

        let reranked = LlmReranker::new(llm).rerank("q", candidates(), 5).await.unwrap();

        assert_eq!(ids(&reranked), vec!["c", "a", "b"]);
        assert_eq!(reranked[1].score, 0.03);
    }

    #[tokio::test]
    async fn test_small_inputs_skip_the_model() {
        let llm = Arc::new(FixedScores::failing());
        let reranker = LlmReranker::new(llm.clone());

        assert!(reranker.rerank("q", Vec::new(), 5).await.unwrap().is_empty());
        let single = reranker
            .rerank("q", vec![hit("a", "only", 1.0)], 5)
            .await
            .unwrap();
        assert_eq!(ids(&single), vec!["a"]);
        assert!(reranker.rerank("q", candidates(), 0).await.unwrap().is_empty());
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_model_failure_is_reported() {
        let reranker = LlmReranker::new(Arc::new(FixedScores::failing()));
        let result = reranker.rerank("q", candidates(), 2).await;
        assert!(matches!(result, Err(RagError::PortFailure { .. })));
    }

    #[tokio::test]
    async fn test_malformed_scores_are_schema_violation() {
        let llm = Arc::new(FixedScores::new(serde_json::json!({ "ranking": [1, 0] })));
        let result = LlmReranker::new(llm).rerank("q", candidates(), 2).await;
        assert!(matches!(result, Err(RagError::SchemaViolation(_))));
    }

    #[test]
    fn test_passages_are_truncated_in_prompt() {
        let reranker = LlmReranker::new(Arc::new(FixedScores::failing())).with_passage_chars(3);
        let messages = reranker.messages("q", &candidates());
        assert!(messages[1].content.contains("[0] the\n\n[1] rrf"));
    }

    static_assertions::assert_impl_all!(LlmReranker: Reranker, Send, Sync);
}
