//! Adapters from Rig's model types to this crate's ports
//!
//! - [`RigLlmAdapter`]: any Rig `Agent<M>` as an [`LlmPort`](crate::llm::LlmPort)
//! - [`RigEmbedder`]: any Rig embedding model as an [`Embedder`](crate::retrieval::Embedder)

pub mod rig_embedder;
pub mod rig_llm_adapter;

pub use rig_embedder::RigEmbedder;
pub use rig_llm_adapter::RigLlmAdapter;
