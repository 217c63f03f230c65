//! `Embedder` over a Rig embedding model
//!
//! Texts are sent in batches of at most `M::MAX_DOCUMENTS`; Rig's `f64`
//! vectors are narrowed to `f32` for storage.

use async_trait::async_trait;
use rig::embeddings::EmbeddingModel;

use crate::error::RagError;
use crate::retrieval::Embedder;

pub struct RigEmbedder<M>
where
    M: EmbeddingModel,
{
    model: M,
    name: String,
}

impl<M> RigEmbedder<M>
where
    M: EmbeddingModel,
{
    pub fn new(model: M) -> Self {
        Self::with_name(model, "rig-embedding")
    }

    pub fn with_name(model: M, name: impl Into<String>) -> Self {
        Self {
            model,
            name: name.into(),
        }
    }

    pub fn ndims(&self) -> usize {
        self.model.ndims()
    }
}

#[async_trait]
impl<M> Embedder for RigEmbedder<M>
where
    M: EmbeddingModel + Send + Sync + 'static,
{
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(M::MAX_DOCUMENTS.max(1)) {
            let embeddings = self
                .model
                .embed_texts(batch.to_vec())
                .await
                .map_err(|e| RagError::port_failure(self.name.clone(), e.to_string()))?;

            if embeddings.len() != batch.len() {
                return Err(RagError::port_failure(
                    self.name.clone(),
                    format!(
                        "expected {} embeddings, got {}",
                        batch.len(),
                        embeddings.len()
                    ),
                ));
            }

            vectors.extend(
                embeddings
                    .into_iter()
                    .map(|embedding| embedding.vec.into_iter().map(|v| v as f32).collect()),
            );
        }

        Ok(vectors)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<M> std::fmt::Debug for RigEmbedder<M>
where
    M: EmbeddingModel,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RigEmbedder")
            .field("name", &self.name)
            .field("ndims", &self.model.ndims())
            .finish()
    }
}
