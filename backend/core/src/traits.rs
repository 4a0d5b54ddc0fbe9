use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

/// A function the model may call by name while it reasons.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name of the tool (e.g., "lookup_address_components").
    fn name(&self) -> &str;

    /// Description for the LLM prompt.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's parameters.
    fn parameters(&self) -> Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: Value) -> Result<Value>;
}

/// Trait for LLM providers used by the extraction agents.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., "openrouter", "ollama").
    fn name(&self) -> &str;

    /// Send a completion request and return the response text.
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse>;

    /// Ask for output constrained to `schema`.
    ///
    /// Providers with native schema enforcement override this. The default
    /// appends the schema to the system prompt and parses the reply.
    async fn complete_structured(
        &self,
        request: &LlmRequest,
        schema: &StructuredSchema,
    ) -> Result<Value> {
        let mut constrained = request.clone();
        constrained.system_prompt = format!(
            "{}\n\nRespond with a single JSON document conforming to this JSON Schema \
             (name: {}). Do not add any text outside the JSON.\n{}",
            request.system_prompt, schema.name, schema.schema
        );
        let response = self.complete(&constrained).await?;
        parse_json_reply(&response.content)
            .with_context(|| format!("{} returned non-JSON structured output", self.name()))
    }
}

/// Trait for OCR services that turn an image into plain text.
#[async_trait]
pub trait OcrProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Extract text from image bytes. An empty string means no text was found.
    async fn extract_text(&self, image: &[u8], file_name: &str) -> Result<OcrOutput>;
}

/// Request to an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Response from an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub provider: String,
    pub model: String,
    pub tokens_used: u64,
    pub latency_ms: u64,
}

/// Named JSON Schema for structured-output calls.
#[derive(Debug, Clone)]
pub struct StructuredSchema {
    pub name: String,
    pub schema: Value,
}

impl StructuredSchema {
    /// Build from a type deriving `JsonSchema`.
    pub fn of<T: schemars::JsonSchema>(name: impl Into<String>) -> Self {
        let schema = schemars::schema_for!(T);
        Self {
            name: name.into(),
            schema: serde_json::to_value(schema).unwrap_or(Value::Null),
        }
    }
}

/// Text plus provider-reported quality signals.
#[derive(Debug, Clone, Default)]
pub struct OcrOutput {
    pub text: String,
    pub total_words: usize,
    pub average_word_confidence: f64,
    pub raw: Value,
}

/// Parse a reply that should be JSON, tolerating a markdown fence or preamble.
fn parse_json_reply(content: &str) -> Result<Value> {
    let trimmed = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }
    let start = trimmed.find('{').context("no JSON object in reply")?;
    let end = trimmed.rfind('}').context("unterminated JSON object in reply")?;
    if end < start {
        anyhow::bail!("unterminated JSON object in reply");
    }
    serde_json::from_str(&trimmed[start..=end]).context("reply is not valid JSON")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContactList;

    #[test]
    fn test_parse_json_reply_with_fence() {
        let value = parse_json_reply("```json\n{\"contacts\": []}\n```").unwrap();
        assert!(value["contacts"].is_array());
    }

    #[test]
    fn test_parse_json_reply_with_preamble() {
        let value = parse_json_reply("Here you go: {\"a\": 1} hope it helps").unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn test_parse_json_reply_rejects_prose() {
        assert!(parse_json_reply("no json here").is_err());
    }

    #[test]
    fn test_structured_schema_from_type() {
        let schema = StructuredSchema::of::<ContactList>("contact_list");
        assert_eq!(schema.name, "contact_list");
        assert!(schema.schema.get("properties").is_some());
    }
}
