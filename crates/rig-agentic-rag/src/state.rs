// src/state.rs
//! Workflow state threaded through the plan → search → summarize → judge loop
//!
//! `RagState` is owned by exactly one in-flight invocation. Nodes never
//! mutate it directly; they return a `RagUpdate` which the engine applies
//! between steps, the same way supersteps fold vertex updates into state.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// Message role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A single chat turn (prompt messages and conversation history alike)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// A retrieval goal: what to find out, and the queries used to find it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct Subtask {
    /// What this subtask should establish; the judge measures sufficiency against it
    pub purpose: String,
    /// Search queries issued for this purpose
    pub queries: Vec<String>,
}

impl Subtask {
    pub fn new<I, Q>(purpose: impl Into<String>, queries: I) -> Self
    where
        I: IntoIterator<Item = Q>,
        Q: Into<String>,
    {
        Self {
            purpose: purpose.into(),
            queries: queries.into_iter().map(Into::into).collect(),
        }
    }
}

/// A chunk of an ingested document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentChunk {
    /// Identity key for deduplication and fusion
    pub id: String,
    pub text: String,
    /// Originating file name
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl DocumentChunk {
    pub fn new(id: impl Into<String>, text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            source: source.into(),
            page: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A ranked retrieval hit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub chunk: DocumentChunk,
    /// Similarity, keyword, fused or reranker score depending on the producer
    pub score: f64,
}

impl SearchResult {
    pub fn new(chunk: DocumentChunk, score: f64) -> Self {
        Self { chunk, score }
    }

    pub fn id(&self) -> &str {
        &self.chunk.id
    }
}

/// The complete state of one question's retrieval-and-reasoning loop
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RagState {
    /// The user question; fixed at creation
    pub question: String,

    /// Prior conversation turns
    #[serde(default)]
    pub chat_history: Vec<ChatMessage>,

    /// Pending retrieval goals; empty means no further retrieval is requested
    #[serde(default)]
    pub subtasks: Vec<Subtask>,

    /// Rendered retrieval blocks, appended across iterations and never truncated
    #[serde(default)]
    pub search_results: Vec<String>,

    /// Latest condensation of `search_results`
    #[serde(default)]
    pub summary: String,

    /// Final answer, written at most once
    #[serde(default)]
    pub answer: String,

    /// Completed judge evaluations
    #[serde(default)]
    pub loop_count: u32,
}

impl RagState {
    /// Create a fresh state for a question
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Default::default()
        }
    }

    /// Attach prior conversation turns
    pub fn with_chat_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.chat_history = history;
        self
    }

    /// Whether retrieval work is pending
    pub fn has_pending_subtasks(&self) -> bool {
        !self.subtasks.is_empty()
    }

    pub fn has_answer(&self) -> bool {
        !self.answer.is_empty()
    }

    /// Render all accumulated retrieval blocks as one text
    pub fn joined_results(&self) -> String {
        self.search_results.join("\n\n")
    }

    /// Apply a node's partial update, producing the next state.
    ///
    /// `search_results` only ever grows and `answer` is never overwritten
    /// once set; a second answer is dropped with a warning.
    pub fn apply_update(&self, update: RagUpdate) -> Self {
        let mut next = self.clone();

        if let Some(subtasks) = update.subtasks {
            next.subtasks = subtasks;
        }

        next.search_results.extend(update.new_search_results);

        if let Some(summary) = update.summary {
            next.summary = summary;
        }

        if let Some(answer) = update.answer {
            if next.answer.is_empty() {
                next.answer = answer;
            } else {
                warn!("answer already set; ignoring second answer update");
            }
        }

        if let Some(loop_count) = update.loop_count {
            next.loop_count = loop_count;
        }

        next
    }

    /// Conversation history extended with this state's question and answer.
    ///
    /// Used to seed the next question on the same thread.
    pub fn history_with_turn(&self) -> Vec<ChatMessage> {
        let mut history = self.chat_history.clone();
        history.push(ChatMessage::user(self.question.clone()));
        if self.has_answer() {
            history.push(ChatMessage::assistant(self.answer.clone()));
        }
        history
    }
}

/// Partial state produced by a node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RagUpdate {
    /// Replacement subtask list
    pub subtasks: Option<Vec<Subtask>>,
    /// Blocks to append to `search_results`
    pub new_search_results: Vec<String>,
    /// Replacement summary
    pub summary: Option<String>,
    /// Final answer
    pub answer: Option<String>,
    /// Replacement loop count
    pub loop_count: Option<u32>,
}

impl RagUpdate {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.subtasks.is_none()
            && self.new_search_results.is_empty()
            && self.summary.is_none()
            && self.answer.is_none()
            && self.loop_count.is_none()
    }

    pub fn with_subtasks(mut self, subtasks: Vec<Subtask>) -> Self {
        self.subtasks = Some(subtasks);
        self
    }

    pub fn clear_subtasks(self) -> Self {
        self.with_subtasks(Vec::new())
    }

    pub fn with_search_results(mut self, blocks: Vec<String>) -> Self {
        self.new_search_results = blocks;
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_answer(mut self, answer: impl Into<String>) -> Self {
        self.answer = Some(answer.into());
        self
    }

    pub fn with_loop_count(mut self, loop_count: u32) -> Self {
        self.loop_count = Some(loop_count);
        self
    }
}
