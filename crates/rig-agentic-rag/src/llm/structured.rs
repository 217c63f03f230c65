//! Typed structured generation on top of `LlmPort::generate_structured`
//!
//! The schema is derived from the target type with `schemars`; whatever the
//! provider returns is deserialized into that type, and any mismatch becomes
//! `RagError::SchemaViolation`.

use regex::Regex;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use std::sync::OnceLock;

use super::provider::{GenerationOptions, LlmPort, StructuredSchema};
use crate::error::RagError;
use crate::state::ChatMessage;

/// Build the structured-output schema for `T`
pub fn schema_for<T: JsonSchema>() -> StructuredSchema {
    let root = schemars::schema_for!(T);
    let schema = serde_json::to_value(&root).unwrap_or(serde_json::Value::Null);
    StructuredSchema::new(T::schema_name(), schema)
}

/// Request a value of type `T` from the model
pub async fn generate_typed<T>(
    llm: &dyn LlmPort,
    messages: &[ChatMessage],
    options: &GenerationOptions,
) -> Result<T, RagError>
where
    T: DeserializeOwned + JsonSchema,
{
    let schema = schema_for::<T>();
    let value = llm.generate_structured(messages, &schema, options).await?;
    serde_json::from_value(value).map_err(|e| {
        RagError::schema_violation(format!("{} does not match schema: {}", schema.name, e))
    })
}

fn fence_pattern() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)```").ok())
        .as_ref()
}

/// Pull a JSON value out of free-form model output.
///
/// Accepts bare JSON, JSON wrapped in a Markdown code fence, or JSON embedded
/// in surrounding prose (first `{`/`[` to the last matching closer).
pub fn extract_json(text: &str) -> Result<serde_json::Value, RagError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(RagError::empty_result("model returned no text"));
    }

    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    if let Some(captures) = fence_pattern().and_then(|re| re.captures(trimmed)) {
        if let Ok(value) = serde_json::from_str(captures[1].trim()) {
            return Ok(value);
        }
    }

    let start = trimmed.find(|c: char| c == '{' || c == '[');
    let end = trimmed.rfind(|c: char| c == '}' || c == ']');
    if let (Some(start), Some(end)) = (start, end) {
        if start < end {
            return serde_json::from_str(&trimmed[start..=end])
                .map_err(|e| RagError::schema_violation(format!("invalid JSON: {}", e)));
        }
    }

    Err(RagError::schema_violation("no JSON value found in model output"))
}
