//! Workflow configuration
//!
//! One immutable `WorkflowConfig` is handed to the engine at construction
//! and shared by every node: loop bound, per-node timeouts and token
//! budgets, reasoning hints, retrieval parameters and prompts.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::prompts::Prompts;
use crate::error::RagError;
use crate::llm::GenerationOptions;

/// Budget for one LLM-backed node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSettings {
    /// Upper bound on the port call
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Maximum tokens to generate (`None` leaves the provider default)
    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Reasoning-effort hint passed through to the provider
    #[serde(default)]
    pub reasoning: Option<String>,
}

impl NodeSettings {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            max_tokens: None,
            reasoning: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Generation options for a call made under these settings
    pub fn options(&self) -> GenerationOptions {
        GenerationOptions {
            max_tokens: self.max_tokens,
            reasoning: self.reasoning.clone(),
        }
    }
}

/// Hybrid retrieval parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalSettings {
    /// Candidates requested from each retrieval signal, and kept after fusion
    pub top_k: usize,

    /// Results kept after reranking, per query
    pub rerank_top_k: usize,

    /// Weight of the keyword ranking in fusion, in `[0, 1]`
    pub keyword_weight: f64,

    /// Per-result text limit in characters
    pub max_return_chars: usize,

    /// Upper bound on each store/reranker call
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 20,
            rerank_top_k: 5,
            keyword_weight: 0.3,
            max_return_chars: 8000,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Complete workflow configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Maximum judge evaluations per invocation
    pub max_loop_count: u32,

    /// Planner output is truncated to this many subtasks
    pub max_subtasks: usize,

    pub plan: NodeSettings,
    pub summarize: NodeSettings,
    pub judge: NodeSettings,
    pub answer: NodeSettings,
    pub retrieval: RetrievalSettings,

    /// Number of trailing chat-history messages given to the answer node
    pub history_window: usize,

    /// Per-message character limit for that history
    pub history_max_chars: usize,

    #[serde(default)]
    pub prompts: Prompts,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        let structured = NodeSettings::new(Duration::from_secs(120))
            .with_max_tokens(4096)
            .with_reasoning("low");

        Self {
            max_loop_count: 2,
            max_subtasks: 3,
            plan: structured.clone(),
            summarize: NodeSettings::new(Duration::from_secs(180))
                .with_max_tokens(4096)
                .with_reasoning("low"),
            judge: structured,
            answer: NodeSettings::new(Duration::from_secs(300)).with_reasoning("medium"),
            retrieval: RetrievalSettings::default(),
            history_window: 4,
            history_max_chars: 500,
            prompts: Prompts::default(),
        }
    }
}

impl WorkflowConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_loop_count(mut self, max: u32) -> Self {
        self.max_loop_count = max;
        self
    }

    pub fn with_max_subtasks(mut self, max: usize) -> Self {
        self.max_subtasks = max;
        self
    }

    pub fn with_plan(mut self, settings: NodeSettings) -> Self {
        self.plan = settings;
        self
    }

    pub fn with_summarize(mut self, settings: NodeSettings) -> Self {
        self.summarize = settings;
        self
    }

    pub fn with_judge(mut self, settings: NodeSettings) -> Self {
        self.judge = settings;
        self
    }

    pub fn with_answer(mut self, settings: NodeSettings) -> Self {
        self.answer = settings;
        self
    }

    pub fn with_retrieval(mut self, retrieval: RetrievalSettings) -> Self {
        self.retrieval = retrieval;
        self
    }

    pub fn with_keyword_weight(mut self, weight: f64) -> Self {
        self.retrieval.keyword_weight = weight;
        self
    }

    /// Set the answer node's history window and per-message limit
    pub fn with_history(mut self, window: usize, max_chars: usize) -> Self {
        self.history_window = window;
        self.history_max_chars = max_chars;
        self
    }

    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Set every node timeout at once
    pub fn with_node_timeout(mut self, timeout: Duration) -> Self {
        for node in [
            &mut self.plan,
            &mut self.summarize,
            &mut self.judge,
            &mut self.answer,
        ] {
            node.timeout = timeout;
        }
        self.retrieval.timeout = timeout;
        self
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<(), RagError> {
        if self.max_loop_count == 0 {
            return Err(RagError::config_error("max_loop_count must be at least 1"));
        }
        if self.max_subtasks == 0 {
            return Err(RagError::config_error("max_subtasks must be at least 1"));
        }

        let weight = self.retrieval.keyword_weight;
        if !(0.0..=1.0).contains(&weight) {
            return Err(RagError::config_error(format!(
                "keyword_weight must be within [0, 1], got {}",
                weight
            )));
        }
        if self.retrieval.top_k == 0 || self.retrieval.rerank_top_k == 0 {
            return Err(RagError::config_error(
                "retrieval top_k and rerank_top_k must be greater than 0",
            ));
        }
        if self.retrieval.max_return_chars == 0 {
            return Err(RagError::config_error("max_return_chars must be greater than 0"));
        }

        let timeouts = [
            ("plan", self.plan.timeout),
            ("summarize", self.summarize.timeout),
            ("judge", self.judge.timeout),
            ("answer", self.answer.timeout),
            ("retrieval", self.retrieval.timeout),
        ];
        if let Some((node, _)) = timeouts.iter().find(|(_, t)| t.is_zero()) {
            return Err(RagError::config_error(format!(
                "{} timeout must be greater than 0",
                node
            )));
        }

        Ok(())
    }
}
