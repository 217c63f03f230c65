//! Thread-keyed checkpoints
//!
//! After every completed step the engine writes the whole `RagState` for the
//! conversation thread, overwriting the previous checkpoint for that thread.
//! A checkpoint is enough to inspect a run or resume it from the next step;
//! it is not a rollback log.
//!
//! # Backends
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                Checkpointer                  │
//! │  ┌──────────┐  ┌──────────┐  ┌──────────┐   │
//! │  │  Memory  │  │   File   │  │  SQLite  │   │
//! │  └──────────┘  └──────────┘  └──────────┘   │
//! │        └────────────┼────────────┘           │
//! │                     ▼                        │
//! │     Checkpoint { thread_id, next, state }    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use rig_agentic_rag::checkpoint::{create_checkpointer, CheckpointerConfig};
//!
//! let checkpointer = create_checkpointer(CheckpointerConfig::File {
//!     path: PathBuf::from("./checkpoints"),
//!     compression: true,
//! })
//! .await?;
//!
//! if let Some(checkpoint) = checkpointer.load("thread-1").await? {
//!     println!("next step: {}", checkpoint.next);
//! }
//! ```

mod file;
#[cfg(feature = "checkpointer-sqlite")]
mod sqlite;

pub use file::FileCheckpointer;
#[cfg(feature = "checkpointer-sqlite")]
pub use sqlite::SqliteCheckpointer;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::RagError;
use crate::state::RagState;
use crate::workflow::WorkflowStep;

/// Snapshot of one thread's workflow after a completed step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Conversation thread this checkpoint belongs to
    pub thread_id: String,

    /// Number of steps completed in the current invocation
    pub sequence: u64,

    /// The step that just completed
    pub completed: WorkflowStep,

    /// The step a resumed run starts with
    pub next: WorkflowStep,

    /// State after `completed` was applied
    pub state: RagState,

    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Checkpoint {
    pub fn new(
        thread_id: impl Into<String>,
        sequence: u64,
        completed: WorkflowStep,
        next: WorkflowStep,
        state: RagState,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            sequence,
            completed,
            next,
            state,
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Whether the invocation that wrote this checkpoint ran to completion
    pub fn is_finished(&self) -> bool {
        self.next == WorkflowStep::Done
    }
}

/// Durable store of the latest checkpoint per thread.
///
/// Writes for one thread are last-write-wins; threads never interact.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Store `checkpoint`, replacing any previous one for its thread
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), RagError>;

    /// Latest checkpoint for a thread, or `None` if the thread is unknown
    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, RagError>;

    /// All thread ids with a checkpoint, sorted ascending
    async fn list_threads(&self) -> Result<Vec<String>, RagError>;

    /// Remove a thread's checkpoint; unknown threads are not an error
    async fn delete(&self, thread_id: &str) -> Result<(), RagError>;

    /// Remove every checkpoint
    async fn clear(&self) -> Result<usize, RagError> {
        let threads = self.list_threads().await?;
        for thread_id in &threads {
            self.delete(thread_id).await?;
        }
        Ok(threads.len())
    }
}

/// Backend selection for `create_checkpointer`
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CheckpointerConfig {
    /// In-memory checkpointing (not durable)
    #[default]
    Memory,

    /// One JSON file per thread
    File {
        /// Directory holding the checkpoint files
        path: PathBuf,
        /// Whether to compress checkpoint data with zstd
        compression: bool,
    },

    /// SQLite database (requires `checkpointer-sqlite` feature)
    #[cfg(feature = "checkpointer-sqlite")]
    Sqlite {
        /// Database file, or `:memory:`
        path: String,
    },
}

/// In-memory checkpointer for tests and single-process use
#[derive(Debug, Default)]
pub struct MemoryCheckpointer {
    checkpoints: RwLock<HashMap<String, Checkpoint>>,
}

impl MemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Checkpointer for MemoryCheckpointer {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), RagError> {
        let mut checkpoints = self.checkpoints.write().await;
        checkpoints.insert(checkpoint.thread_id.clone(), checkpoint.clone());
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, RagError> {
        let checkpoints = self.checkpoints.read().await;
        Ok(checkpoints.get(thread_id).cloned())
    }

    async fn list_threads(&self) -> Result<Vec<String>, RagError> {
        let checkpoints = self.checkpoints.read().await;
        let mut threads: Vec<String> = checkpoints.keys().cloned().collect();
        threads.sort();
        Ok(threads)
    }

    async fn delete(&self, thread_id: &str) -> Result<(), RagError> {
        let mut checkpoints = self.checkpoints.write().await;
        checkpoints.remove(thread_id);
        Ok(())
    }
}

/// Create a checkpointer from configuration
pub async fn create_checkpointer(
    config: CheckpointerConfig,
) -> Result<Arc<dyn Checkpointer>, RagError> {
    match config {
        CheckpointerConfig::Memory => Ok(Arc::new(MemoryCheckpointer::new())),

        CheckpointerConfig::File { path, compression } => {
            Ok(Arc::new(FileCheckpointer::new(path, compression)))
        }

        #[cfg(feature = "checkpointer-sqlite")]
        CheckpointerConfig::Sqlite { path } => Ok(Arc::new(SqliteCheckpointer::new(&path).await?)),
    }
}
