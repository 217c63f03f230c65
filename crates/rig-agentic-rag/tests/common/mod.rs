//! Shared fakes for integration tests
//!
//! - `ScriptedLlm`: per-role reply queues (plan, judge, rerank, summary, answer)
//! - `ScriptedStore`: canned similarity/keyword rankings keyed by query
//! - `LetterEmbedder`: deterministic 26-dimensional letter-frequency vectors

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use rig_agentic_rag::llm::{GenerationOptions, LlmPort, LlmResponse, StructuredSchema, TokenStream};
use rig_agentic_rag::retrieval::{Embedder, PassthroughReranker, VectorStore};
use rig_agentic_rag::{
    ChatMessage, DocumentChunk, RagError, SearchResult, WorkflowConfig, WorkflowEngine,
};

// =============================================================================
// Scripted LLM
// =============================================================================

/// One scripted model reply
#[derive(Debug, Clone)]
pub enum Reply {
    /// Structured JSON (plan, judge)
    Json(Value),
    /// Free text (summary) or the full answer as a single fragment
    Text(String),
    /// Summary text with a reasoning trace
    Reasoned { text: String, thinking: String },
    /// Answer fragments, streamed in order
    Fragments(Vec<String>),
    /// Fragments followed by a stream error
    BrokenStream(Vec<String>),
    /// Port failure
    Fail(String),
    /// Never completes within any reasonable timeout
    Hang,
}

impl Reply {
    pub fn plan(subtasks: Value) -> Self {
        Self::Json(json!({ "subtasks": subtasks }))
    }

    pub fn sufficient(reason: &str) -> Self {
        Self::Json(json!({ "sufficient": true, "reason": reason }))
    }

    pub fn insufficient(reason: &str, follow_up: Value) -> Self {
        Self::Json(json!({
            "sufficient": false,
            "reason": reason,
            "additional_subtasks": follow_up,
        }))
    }
}

#[derive(Debug, Default)]
pub struct ScriptedLlm {
    plans: Mutex<VecDeque<Reply>>,
    judgments: Mutex<VecDeque<Reply>>,
    rerankings: Mutex<VecDeque<Reply>>,
    summaries: Mutex<VecDeque<Reply>>,
    answers: Mutex<VecDeque<Reply>>,
    plan_calls: AtomicUsize,
    judge_calls: AtomicUsize,
    rerank_calls: AtomicUsize,
    summary_calls: AtomicUsize,
    answer_calls: AtomicUsize,
    answer_prompts: Mutex<Vec<Vec<ChatMessage>>>,
    summary_prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plan(self, reply: Reply) -> Self {
        lock(&self.plans).push_back(reply);
        self
    }

    pub fn with_judgment(self, reply: Reply) -> Self {
        lock(&self.judgments).push_back(reply);
        self
    }

    pub fn with_reranking(self, reply: Reply) -> Self {
        lock(&self.rerankings).push_back(reply);
        self
    }

    pub fn with_summary(self, reply: Reply) -> Self {
        lock(&self.summaries).push_back(reply);
        self
    }

    pub fn with_answer(self, reply: Reply) -> Self {
        lock(&self.answers).push_back(reply);
        self
    }

    pub fn plan_calls(&self) -> usize {
        self.plan_calls.load(Ordering::SeqCst)
    }

    pub fn judge_calls(&self) -> usize {
        self.judge_calls.load(Ordering::SeqCst)
    }

    pub fn rerank_calls(&self) -> usize {
        self.rerank_calls.load(Ordering::SeqCst)
    }

    pub fn summary_calls(&self) -> usize {
        self.summary_calls.load(Ordering::SeqCst)
    }

    pub fn answer_calls(&self) -> usize {
        self.answer_calls.load(Ordering::SeqCst)
    }

    pub fn answer_prompts(&self) -> Vec<Vec<ChatMessage>> {
        lock(&self.answer_prompts).clone()
    }

    pub fn summary_prompts(&self) -> Vec<Vec<ChatMessage>> {
        lock(&self.summary_prompts).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn last_user_text(messages: &[ChatMessage]) -> String {
    messages
        .last()
        .map(|m| m.content.clone())
        .unwrap_or_default()
}

async fn hang() {
    tokio::time::sleep(Duration::from_secs(3600)).await;
}

#[async_trait]
impl LlmPort for ScriptedLlm {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        _options: &GenerationOptions,
    ) -> Result<LlmResponse, RagError> {
        self.summary_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.summary_prompts).push(messages.to_vec());

        let reply = lock(&self.summaries).pop_front();
        match reply {
            None => Ok(LlmResponse::new("scripted summary")),
            Some(Reply::Text(text)) => Ok(LlmResponse::new(text)),
            Some(Reply::Reasoned { text, thinking }) => {
                Ok(LlmResponse::new(text).with_thinking(thinking))
            }
            Some(Reply::Fail(message)) => Err(RagError::port_failure("scripted", message)),
            Some(Reply::Hang) => {
                hang().await;
                Err(RagError::port_failure("scripted", "woke from hang"))
            }
            Some(other) => panic!("unexpected summary reply: {:?}", other),
        }
    }

    async fn generate_structured(
        &self,
        messages: &[ChatMessage],
        schema: &StructuredSchema,
        _options: &GenerationOptions,
    ) -> Result<Value, RagError> {
        let reply = match schema.name.as_str() {
            "PlanningResult" => {
                self.plan_calls.fetch_add(1, Ordering::SeqCst);
                let reply = lock(&self.plans).pop_front();
                reply.unwrap_or_else(|| {
                    Reply::plan(json!([{
                        "purpose": "default",
                        "queries": [last_user_text(messages)],
                    }]))
                })
            }
            "JudgeResult" => {
                self.judge_calls.fetch_add(1, Ordering::SeqCst);
                let reply = lock(&self.judgments).pop_front();
                reply.unwrap_or_else(|| Reply::sufficient("scripted default"))
            }
            "RelevanceScores" => {
                self.rerank_calls.fetch_add(1, Ordering::SeqCst);
                let reply = lock(&self.rerankings).pop_front();
                reply.unwrap_or_else(|| Reply::Json(json!({ "scores": [] })))
            }
            other => panic!("unexpected schema: {}", other),
        };

        match reply {
            Reply::Json(value) => Ok(value),
            Reply::Text(text) => Err(RagError::schema_violation(format!("not JSON: {}", text))),
            Reply::Fail(message) => Err(RagError::port_failure("scripted", message)),
            Reply::Hang => {
                hang().await;
                Err(RagError::port_failure("scripted", "woke from hang"))
            }
            other => panic!("unexpected structured reply: {:?}", other),
        }
    }

    async fn stream(
        &self,
        messages: &[ChatMessage],
        _options: &GenerationOptions,
    ) -> Result<TokenStream, RagError> {
        self.answer_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.answer_prompts).push(messages.to_vec());

        let reply = lock(&self.answers).pop_front();
        match reply {
            None => Ok(TokenStream::from_text("scripted answer")),
            Some(Reply::Text(text)) => Ok(TokenStream::from_text(text)),
            Some(Reply::Fragments(fragments)) => Ok(TokenStream::new(futures::stream::iter(
                fragments.into_iter().map(Ok),
            ))),
            Some(Reply::BrokenStream(fragments)) => {
                let items = fragments
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(RagError::port_failure(
                        "scripted",
                        "stream broke",
                    ))));
                Ok(TokenStream::new(futures::stream::iter(items)))
            }
            Some(Reply::Fail(message)) => Err(RagError::port_failure("scripted", message)),
            Some(Reply::Hang) => {
                hang().await;
                Err(RagError::port_failure("scripted", "woke from hang"))
            }
            Some(other) => panic!("unexpected answer reply: {:?}", other),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

// =============================================================================
// Scripted store
// =============================================================================

pub fn chunk(id: &str, text: &str) -> DocumentChunk {
    DocumentChunk::new(id, text, "test")
}

/// Store with canned rankings.
///
/// Unknown queries return one chunk `doc:<query>` from both searches;
/// queries registered as failing return a port failure.
#[derive(Debug, Default)]
pub struct ScriptedStore {
    similar: Mutex<HashMap<String, Vec<DocumentChunk>>>,
    keyword: Mutex<HashMap<String, Vec<DocumentChunk>>>,
    empty: Mutex<HashSet<String>>,
    failing: Mutex<HashSet<String>>,
    queries: Mutex<Vec<String>>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rankings(
        self,
        query: &str,
        similar: Vec<DocumentChunk>,
        keyword: Vec<DocumentChunk>,
    ) -> Self {
        lock(&self.similar).insert(query.to_string(), similar);
        lock(&self.keyword).insert(query.to_string(), keyword);
        self
    }

    pub fn with_empty(self, query: &str) -> Self {
        lock(&self.empty).insert(query.to_string());
        self
    }

    pub fn with_failure(self, query: &str) -> Self {
        lock(&self.failing).insert(query.to_string());
        self
    }

    /// Queries seen by `similarity_search`, in call order
    pub fn queries(&self) -> Vec<String> {
        lock(&self.queries).clone()
    }

    fn ranking(
        &self,
        table: &Mutex<HashMap<String, Vec<DocumentChunk>>>,
        query: &str,
        k: usize,
    ) -> Result<Vec<SearchResult>, RagError> {
        if lock(&self.failing).contains(query) {
            return Err(RagError::port_failure("store", format!("failed on '{}'", query)));
        }
        if lock(&self.empty).contains(query) {
            return Ok(Vec::new());
        }

        let chunks = lock(table)
            .get(query)
            .cloned()
            .unwrap_or_else(|| vec![chunk(&format!("doc:{}", query), &format!("text for {}", query))]);

        let count = chunks.len();
        Ok(chunks
            .into_iter()
            .take(k)
            .enumerate()
            .map(|(rank, chunk)| SearchResult::new(chunk, (count - rank) as f64))
            .collect())
    }
}

#[async_trait]
impl VectorStore for ScriptedStore {
    async fn add_documents(&self, chunks: Vec<DocumentChunk>) -> Result<usize, RagError> {
        Ok(chunks.len())
    }

    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>, RagError> {
        lock(&self.queries).push(query.to_string());
        self.ranking(&self.similar, query, k)
    }

    async fn keyword_search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>, RagError> {
        self.ranking(&self.keyword, query, k)
    }

    async fn len(&self) -> usize {
        0
    }
}

// =============================================================================
// Embedder
// =============================================================================

/// Letter-frequency embedding: texts sharing letters are similar
#[derive(Debug, Default)]
pub struct LetterEmbedder;

#[async_trait]
impl Embedder for LetterEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0f32; 26];
                for c in text.chars().filter(|c| c.is_ascii_alphabetic()) {
                    vector[(c.to_ascii_lowercase() as u8 - b'a') as usize] += 1.0;
                }
                vector
            })
            .collect())
    }

    fn name(&self) -> &str {
        "letters"
    }
}

// =============================================================================
// Engine helpers
// =============================================================================

/// Config with short timeouts so hanging fakes fail fast
pub fn fast_config() -> WorkflowConfig {
    WorkflowConfig::default().with_node_timeout(Duration::from_millis(200))
}

pub fn engine(llm: Arc<ScriptedLlm>, store: Arc<ScriptedStore>, config: WorkflowConfig) -> WorkflowEngine {
    WorkflowEngine::new(llm, store, Arc::new(PassthroughReranker), config)
        .expect("valid config")
}
