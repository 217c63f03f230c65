//! LLM port abstractions for the agentic RAG loop
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │     plan / summarize / judge / answer   │
//! └─────────────────┬───────────────────────┘
//!                   │ uses
//!                   ▼
//! ┌─────────────────────────────────────────┐
//! │            LlmPort (trait)              │
//! │  - generate(messages, options)          │
//! │  - generate_structured(.., schema, ..)  │
//! │  - stream(messages, options)            │
//! └─────────────────┬───────────────────────┘
//!                   │ implemented by
//!                   ▼
//! ┌─────────────────────────────────────────┐
//! │   RigLlmAdapter (wraps any Rig Agent)   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Typed structured output goes through [`generate_typed`], which derives the
//! JSON schema from the Rust type.

mod provider;
mod structured;

pub use provider::{GenerationOptions, LlmPort, LlmResponse, StructuredSchema, TokenStream};
pub use structured::{extract_json, generate_typed, schema_for};
