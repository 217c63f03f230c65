//! # Agent Module
//!
//! Wires the agentic RAG workflow to Ollama through Rig:
//! - a Rig agent wrapped as the workflow's LLM port, carrying the sampling
//!   settings (temperature, context window)
//! - the same model rescoring fused candidates as the reranker
//! - a Rig embedding model feeding the in-memory hybrid index
//! - a JSON corpus file so ingested chunks survive between runs
//! - file checkpoints so conversation threads can be continued

use anyhow::{Context, Result};
use rig::client::{CompletionClient, EmbeddingsClient, ProviderClient};
use rig::providers::ollama;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use rig_agentic_rag::compat::{RigEmbedder, RigLlmAdapter};
use rig_agentic_rag::retrieval::VectorStore;
use rig_agentic_rag::{
    Checkpointer, DataIngestion, Embedder, FileCheckpointer, InMemoryVectorStore, LlmPort,
    LlmReranker, PassthroughReranker, Reranker, StoredChunk, TextFileLoader, WorkflowEngine,
};

use crate::config::AppConfig;

/// Ollama's reasoning switch; Rig only accepts a boolean for it
const OLLAMA_THINK_PARAM: &str = "think";

// =============================================================================
// RAG ASSISTANT
// =============================================================================
/// Builds the pieces of the workflow from an `AppConfig`.
pub struct RagAssistant {
    config: AppConfig,
    client: ollama::Client,
}

impl RagAssistant {
    pub fn new(config: AppConfig) -> Self {
        // Rig 0.27 reads the Ollama host from OLLAMA_API_BASE_URL
        std::env::set_var("OLLAMA_API_BASE_URL", &config.ollama_host);
        let client = ollama::Client::from_env();

        debug!(
            host = %config.ollama_host,
            model = %config.model,
            embedding_model = %config.embedding_model,
            "Connected to Ollama"
        );

        Self { config, client }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn embedder(&self) -> Arc<dyn Embedder> {
        let model = self.client.embedding_model(&self.config.embedding_model);
        Arc::new(RigEmbedder::with_name(model, self.config.embedding_model.clone()))
    }

    fn llm(&self) -> Arc<dyn LlmPort> {
        let agent = self
            .client
            .agent(&self.config.model)
            .temperature(self.config.temperature)
            .build();

        // Rig merges these into Ollama's `options` object
        let adapter = RigLlmAdapter::with_name(agent, format!("ollama/{}", self.config.model))
            .with_additional_params(serde_json::json!({ "num_ctx": self.config.num_ctx }));

        match self.config.reasoning_param.as_deref() {
            Some(OLLAMA_THINK_PARAM) => Arc::new(adapter.with_reasoning_flag(OLLAMA_THINK_PARAM)),
            Some(param) => Arc::new(adapter.with_reasoning_param(param)),
            None => Arc::new(adapter),
        }
    }

    fn reranker(&self, llm: Arc<dyn LlmPort>) -> Arc<dyn Reranker> {
        if self.config.rerank {
            Arc::new(LlmReranker::new(llm))
        } else {
            Arc::new(PassthroughReranker)
        }
    }

    /// The hybrid index rebuilt from the corpus file (empty if there is none)
    pub async fn load_store(&self) -> Result<Arc<InMemoryVectorStore>> {
        let chunks = read_corpus(&self.config.corpus_path()).await?;
        info!(chunks = chunks.len(), "Loaded corpus");
        let store = InMemoryVectorStore::from_snapshot(self.embedder(), chunks)
            .context("Failed to build the search index")?;
        Ok(Arc::new(store))
    }

    /// Ingest files or directories and persist the updated corpus.
    ///
    /// Returns the number of chunks indexed by this call.
    pub async fn ingest(&self, paths: &[PathBuf]) -> Result<usize> {
        let store = self.load_store().await?;
        let loader = TextFileLoader::new(self.config.chunk_size, self.config.chunk_overlap)
            .context("Invalid chunking settings")?;
        let ingestion = DataIngestion::new(Arc::new(loader), store.clone());

        let mut indexed = 0;
        for path in paths {
            let count = ingestion
                .ingest(path)
                .await
                .with_context(|| format!("Failed to ingest {}", path.display()))?;
            info!(path = %path.display(), chunks = count, "Ingested");
            indexed += count;
        }

        write_corpus(&self.config.corpus_path(), &store.snapshot().await).await?;
        info!(indexed, total = store.len().await, "Corpus saved");

        Ok(indexed)
    }

    /// A workflow engine over the saved corpus, checkpointing to the data dir
    pub async fn engine(&self) -> Result<WorkflowEngine> {
        let store = self.load_store().await?;
        if store.is_empty().await {
            warn!("Corpus is empty; run `ingest` first for grounded answers");
        }

        let checkpointer: Arc<dyn Checkpointer> = Arc::new(FileCheckpointer::new(
            self.config.checkpoint_dir(),
            self.config.compress_checkpoints,
        ));

        let llm = self.llm();
        let engine = WorkflowEngine::new(
            Arc::clone(&llm),
            store,
            self.reranker(llm),
            self.config.workflow_config(),
        )?
        .with_checkpointer(checkpointer);

        Ok(engine)
    }
}

// =============================================================================
// CORPUS FILE
// =============================================================================
/// Read the saved chunks; a missing file is an empty corpus
pub async fn read_corpus(path: &Path) -> Result<Vec<StoredChunk>> {
    let json = match tokio::fs::read_to_string(path).await {
        Ok(json) => json,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read corpus {}", path.display()))
        }
    };

    serde_json::from_str(&json).with_context(|| format!("Corrupt corpus file {}", path.display()))
}

/// Write the chunks via a temp file and rename
pub async fn write_corpus(path: &Path, chunks: &[StoredChunk]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let json = serde_json::to_vec(chunks).context("Failed to serialize corpus")?;
    let temp = path.with_extension(format!("json.{}.tmp", uuid::Uuid::new_v4()));

    tokio::fs::write(&temp, json)
        .await
        .with_context(|| format!("Failed to write {}", temp.display()))?;
    tokio::fs::rename(&temp, path)
        .await
        .with_context(|| format!("Failed to replace {}", path.display()))?;

    Ok(())
}
