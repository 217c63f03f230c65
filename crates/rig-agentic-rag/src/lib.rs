//! rig-agentic-rag: an agentic retrieval-and-reasoning loop for Rig
//!
//! A question is decomposed into search subtasks, each subtask runs a
//! hybrid (embedding + keyword) search fused with Reciprocal Rank Fusion,
//! the accumulated results are summarized, and a judge decides whether to
//! answer or loop back with follow-up subtasks. The final answer is
//! streamed.
//!
//! - [`workflow`]: the engine, its nodes, configuration and events
//! - [`retrieval`]: store/reranker/embedder ports, RRF and an in-memory hybrid store
//! - [`ingestion`]: text loading and chunking into a store
//! - [`checkpoint`]: thread-keyed persistence of run state
//! - [`llm`]: the model port and structured-output helpers
//! - [`compat`]: adapters from Rig agents and embedding models
//!
//! ```rust,ignore
//! use rig::client::{CompletionClient, EmbeddingsClient, ProviderClient};
//! use rig::providers::ollama;
//! use rig_agentic_rag::compat::{RigEmbedder, RigLlmAdapter};
//! use rig_agentic_rag::{InMemoryVectorStore, LlmReranker, WorkflowConfig, WorkflowEngine};
//!
//! let client = ollama::Client::from_env();
//! let llm = Arc::new(RigLlmAdapter::with_name(client.agent("gpt-oss:20b").build(), "ollama"));
//! let embedder = Arc::new(RigEmbedder::new(client.embedding_model("nomic-embed-text")));
//! let store = Arc::new(InMemoryVectorStore::new(embedder)?);
//!
//! let reranker = Arc::new(LlmReranker::new(llm.clone()));
//!
//! let engine = WorkflowEngine::new(llm, store, reranker, WorkflowConfig::default())?;
//! let state = engine.invoke("What does the loop bound guarantee?").await;
//! println!("{}", state.answer);
//! ```

pub mod checkpoint;
pub mod compat;
pub mod error;
pub mod ingestion;
pub mod llm;
pub mod retrieval;
pub mod state;
pub mod workflow;

pub use error::RagError;
pub use state::{ChatMessage, DocumentChunk, RagState, RagUpdate, Role, SearchResult, Subtask};

pub use checkpoint::{
    create_checkpointer, Checkpoint, Checkpointer, CheckpointerConfig, FileCheckpointer,
    MemoryCheckpointer,
};
#[cfg(feature = "checkpointer-sqlite")]
pub use checkpoint::SqliteCheckpointer;

pub use ingestion::{DataIngestion, DataLoader, TextFileLoader};
pub use llm::{GenerationOptions, LlmPort, LlmResponse, StructuredSchema, TokenStream};
pub use retrieval::{
    reciprocal_rank_fusion, Embedder, InMemoryVectorStore, LlmReranker, PassthroughReranker,
    Reranker, StoredChunk, VectorStore,
};
pub use workflow::{
    event_channel, EventReceiver, EventSender, JudgeResult, NodeContext, PlanningResult, Prompts,
    WorkflowConfig, WorkflowEngine, WorkflowEvent, WorkflowStep,
};
pub use compat::{RigEmbedder, RigLlmAdapter};
