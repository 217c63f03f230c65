//! # Configuration Module
//!
//! Loads the assistant's settings from environment variables (and a `.env`
//! file, if present) and turns them into the library's `WorkflowConfig`.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `OLLAMA_API_BASE_URL` | `http://localhost:11434` |
//! | `OLLAMA_MODEL` | `gpt-oss:20b` |
//! | `RAG_EMBEDDING_MODEL` | `nomic-embed-text` |
//! | `RAG_DATA_DIR` | `.rag` |
//! | `RAG_MAX_LOOP_COUNT` | `2` |
//! | `RAG_KEYWORD_WEIGHT` | `0.3` |
//! | `RAG_CHUNK_SIZE` / `RAG_CHUNK_OVERLAP` | `500` / `100` |
//! | `RAG_TEMPERATURE` | `0.8` |
//! | `RAG_NUM_CTX` | `16384` |
//! | `RAG_RERANK` | `true` |
//! | `RAG_REASONING_PARAM` | unset (reasoning hints not sent) |
//! | `RAG_COMPRESS_CHECKPOINTS` | `true` |

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

use rig_agentic_rag::ingestion::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use rig_agentic_rag::WorkflowConfig;

// =============================================================================
// CONFIGURATION STRUCT
// =============================================================================
/// Settings for the command-line assistant.
///
/// # Rust Concept: Owned Fields
///
/// Every field is owned (`String`, `PathBuf`), so an `AppConfig` can be moved
/// into the assistant without any lifetime bookkeeping.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Ollama server URL
    pub ollama_host: String,

    /// Chat model used by every workflow node
    pub model: String,

    /// Embedding model used for indexing and similarity search
    pub embedding_model: String,

    /// Directory holding the corpus file and thread checkpoints
    pub data_dir: PathBuf,

    /// Upper bound on judge evaluations per question
    pub max_loop_count: u32,

    /// Weight of the keyword ranking in fusion (similarity gets the rest)
    pub keyword_weight: f64,

    pub chunk_size: usize,
    pub chunk_overlap: usize,

    /// Sampling temperature (0.0 - 2.0)
    pub temperature: f64,

    /// Ollama context window in tokens
    pub num_ctx: u32,

    /// Let the chat model rescore fused candidates before they are kept
    pub rerank: bool,

    /// Provider request field carrying reasoning hints (e.g. `think`)
    pub reasoning_param: Option<String>,

    /// zstd-compress thread checkpoints
    pub compress_checkpoints: bool,
}

// =============================================================================
// DEFAULT IMPLEMENTATION
// =============================================================================
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ollama_host: "http://localhost:11434".to_string(),
            model: "gpt-oss:20b".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            data_dir: PathBuf::from(".rag"),
            max_loop_count: 2,
            keyword_weight: 0.3,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            temperature: 0.8,
            num_ctx: 16384,
            rerank: true,
            reasoning_param: None,
            compress_checkpoints: true,
        }
    }
}

// =============================================================================
// CONFIGURATION LOADING
// =============================================================================
impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset variables keep their defaults; set but unparsable ones are errors.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut config = AppConfig::default();

        if let Ok(val) = env::var("OLLAMA_API_BASE_URL") {
            config.ollama_host = val;
        }

        if let Ok(val) = env::var("OLLAMA_MODEL") {
            config.model = val;
        }

        if let Ok(val) = env::var("RAG_EMBEDDING_MODEL") {
            config.embedding_model = val;
        }

        if let Ok(val) = env::var("RAG_DATA_DIR") {
            config.data_dir = PathBuf::from(val);
        }

        if let Ok(val) = env::var("RAG_MAX_LOOP_COUNT") {
            config.max_loop_count = val
                .parse()
                .context("RAG_MAX_LOOP_COUNT must be a positive integer")?;
        }

        if let Ok(val) = env::var("RAG_KEYWORD_WEIGHT") {
            config.keyword_weight = val
                .parse()
                .context("RAG_KEYWORD_WEIGHT must be a number between 0 and 1 (e.g., 0.3)")?;
        }

        if let Ok(val) = env::var("RAG_CHUNK_SIZE") {
            config.chunk_size = val
                .parse()
                .context("RAG_CHUNK_SIZE must be a positive integer")?;
        }

        if let Ok(val) = env::var("RAG_CHUNK_OVERLAP") {
            config.chunk_overlap = val
                .parse()
                .context("RAG_CHUNK_OVERLAP must be a non-negative integer")?;
        }

        if let Ok(val) = env::var("RAG_TEMPERATURE") {
            config.temperature = val
                .parse()
                .context("RAG_TEMPERATURE must be a number between 0.0 and 2.0")?;
        }

        if let Ok(val) = env::var("RAG_NUM_CTX") {
            config.num_ctx = val
                .parse()
                .context("RAG_NUM_CTX must be a positive integer")?;
        }

        if let Ok(val) = env::var("RAG_RERANK") {
            config.rerank = val.parse().context("RAG_RERANK must be true or false")?;
        }

        if let Ok(val) = env::var("RAG_REASONING_PARAM") {
            let val = val.trim().to_string();
            config.reasoning_param = (!val.is_empty()).then_some(val);
        }

        if let Ok(val) = env::var("RAG_COMPRESS_CHECKPOINTS") {
            config.compress_checkpoints = val
                .parse()
                .context("RAG_COMPRESS_CHECKPOINTS must be true or false")?;
        }

        Ok(config)
    }

    /// Validate the configuration before anything touches the network or disk.
    pub fn validate(&self) -> Result<()> {
        if self.model.is_empty() {
            anyhow::bail!("OLLAMA_MODEL cannot be empty");
        }

        if self.embedding_model.is_empty() {
            anyhow::bail!("RAG_EMBEDDING_MODEL cannot be empty");
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            anyhow::bail!(
                "RAG_TEMPERATURE must be between 0.0 and 2.0, got {}",
                self.temperature
            );
        }

        if self.num_ctx == 0 {
            anyhow::bail!("RAG_NUM_CTX must be at least 1");
        }

        if self.chunk_size == 0 {
            anyhow::bail!("RAG_CHUNK_SIZE must be at least 1");
        }

        if self.chunk_overlap >= self.chunk_size {
            anyhow::bail!(
                "RAG_CHUNK_OVERLAP ({}) must be smaller than RAG_CHUNK_SIZE ({})",
                self.chunk_overlap,
                self.chunk_size
            );
        }

        self.workflow_config()
            .validate()
            .context("Invalid workflow settings")?;

        Ok(())
    }

    /// Library workflow configuration derived from these settings
    pub fn workflow_config(&self) -> WorkflowConfig {
        WorkflowConfig::default()
            .with_max_loop_count(self.max_loop_count)
            .with_keyword_weight(self.keyword_weight)
    }

    /// JSON file holding the ingested chunks and their embeddings
    pub fn corpus_path(&self) -> PathBuf {
        self.data_dir.join("corpus.json")
    }

    /// Directory of per-thread checkpoint files
    pub fn checkpoint_dir(&self) -> PathBuf {
        self.data_dir.join("threads")
    }
}
