use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use juso_core::{LlmProvider, LlmRequest, LlmResponse, StructuredSchema};

type Handler = Arc<dyn Fn(&LlmRequest) -> Result<String> + Send + Sync>;

enum Behavior {
    Fixed(String),
    Scripted(Handler),
    Failing(String),
    Panicking,
}

/// A mock LLM provider for tests and offline runs.
pub struct MockProvider {
    name: String,
    behavior: Behavior,
    structured: Option<Value>,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            behavior: Behavior::Fixed("Mock response".to_string()),
            structured: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.behavior = Behavior::Fixed(response.into());
        self
    }

    /// Compute each reply from the request.
    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&LlmRequest) -> Result<String> + Send + Sync + 'static,
    {
        self.behavior = Behavior::Scripted(Arc::new(handler));
        self
    }

    /// Every call returns an error, as an unreachable endpoint would.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.behavior = Behavior::Failing(message.into());
        self
    }

    /// Every call panics.
    pub fn panicking(mut self) -> Self {
        self.behavior = Behavior::Panicking;
        self
    }

    /// Value returned by `complete_structured` instead of parsing a reply.
    pub fn with_structured(mut self, value: Value) -> Self {
        self.structured = Some(value);
        self
    }

    /// Number of `complete` and `complete_structured` calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn reply(&self, request: &LlmRequest) -> Result<String> {
        match &self.behavior {
            Behavior::Fixed(text) => Ok(text.clone()),
            Behavior::Scripted(handler) => handler(request),
            Behavior::Failing(message) => anyhow::bail!("{}: {}", self.name, message),
            Behavior::Panicking => panic!("{} panicked", self.name),
        }
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let content = self.reply(request)?;
        Ok(LlmResponse {
            content,
            provider: self.name.clone(),
            model: "mock".to_string(),
            tokens_used: 0,
            latency_ms: 0,
        })
    }

    async fn complete_structured(
        &self,
        request: &LlmRequest,
        _schema: &StructuredSchema,
    ) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(value) = &self.structured {
            return Ok(value.clone());
        }
        let content = self.reply(request)?;
        Ok(serde_json::from_str(content.trim())?)
    }
}
