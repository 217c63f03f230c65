//! Document ingestion: load → chunk → index
//!
//! Runs once per corpus, outside the reasoning loop.

mod loader;

pub use loader::{
    clean_text, split_chars, TextFileLoader, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE,
};

use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::RagError;
use crate::retrieval::VectorStore;
use crate::state::DocumentChunk;

/// Source of document chunks
pub trait DataLoader: Send + Sync {
    /// Load and chunk everything under `path`
    fn load(&self, path: &Path) -> Result<Vec<DocumentChunk>, RagError>;
}

/// Load documents and index them into a store
pub struct DataIngestion {
    loader: Arc<dyn DataLoader>,
    store: Arc<dyn VectorStore>,
}

impl DataIngestion {
    pub fn new(loader: Arc<dyn DataLoader>, store: Arc<dyn VectorStore>) -> Self {
        Self { loader, store }
    }

    /// Ingest one file or directory, returning the number of chunks indexed.
    ///
    /// A load that yields no chunks is skipped with a warning.
    pub async fn ingest(&self, path: &Path) -> Result<usize, RagError> {
        info!(path = %path.display(), "Starting ingestion");

        let loader = Arc::clone(&self.loader);
        let owned = path.to_path_buf();
        let chunks = tokio::task::spawn_blocking(move || loader.load(&owned))
            .await
            .map_err(|e| RagError::ingestion_error(format!("Loader task failed: {}", e)))??;

        if chunks.is_empty() {
            warn!(path = %path.display(), "No chunks produced; skipping indexing");
            return Ok(0);
        }

        let count = self.store.add_documents(chunks).await?;
        info!(path = %path.display(), chunks = count, "Ingestion complete");
        Ok(count)
    }
}
