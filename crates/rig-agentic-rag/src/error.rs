// src/error.rs
//! Error types for the agentic RAG loop
//!
//! Nodes never propagate these upward: every node turns a port error into a
//! deterministic fallback value. The variants still matter because the
//! fallback reason recorded in state and logs names the failure kind.

use std::time::Duration;
use thiserror::Error;

/// Errors produced by ports, nodes, checkpointers and ingestion.
#[derive(Debug, Error)]
pub enum RagError {
    /// A port call exceeded its node-level budget
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Any other failure reported by an external port
    #[error("Port failure in {port}: {message}")]
    PortFailure { port: String, message: String },

    /// The port answered with a structurally valid but useless result
    #[error("Empty result: {0}")]
    EmptyResult(String),

    /// Structured output could not be parsed into the target shape
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    /// Checkpoint persistence failed
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Document loading or indexing failed
    #[error("Ingestion error: {0}")]
    Ingestion(String),

    /// Invalid workflow configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RagError {
    /// Create a port failure for the named port
    pub fn port_failure(port: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PortFailure {
            port: port.into(),
            message: message.into(),
        }
    }

    pub fn empty_result(message: impl Into<String>) -> Self {
        Self::EmptyResult(message.into())
    }

    pub fn schema_violation(message: impl Into<String>) -> Self {
        Self::SchemaViolation(message.into())
    }

    pub fn checkpoint_error(message: impl Into<String>) -> Self {
        Self::Checkpoint(message.into())
    }

    pub fn ingestion_error(message: impl Into<String>) -> Self {
        Self::Ingestion(message.into())
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Short, stable name of the failure kind (used in fallback reasons)
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::PortFailure { .. } => "port failure",
            Self::EmptyResult(_) => "empty result",
            Self::SchemaViolation(_) => "schema violation",
            Self::Checkpoint(_) => "checkpoint error",
            Self::Ingestion(_) => "ingestion error",
            Self::Config(_) => "configuration error",
        }
    }

    /// Whether this is a failure a node expects from its ports.
    ///
    /// Only the four port-facing kinds qualify. Nodes fall back on every
    /// error, but log the other kinds as errors rather than warnings.
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_)
                | Self::PortFailure { .. }
                | Self::EmptyResult(_)
                | Self::SchemaViolation(_)
        )
    }
}

impl From<serde_json::Error> for RagError {
    fn from(err: serde_json::Error) -> Self {
        Self::SchemaViolation(err.to_string())
    }
}
