use thiserror::Error;

/// Top-level error type for the extraction runtime.
///
/// Most of these never reach a caller of the pipeline: each stage converts
/// its own failures into degraded values. They exist so stage internals can
/// use `?` and so logs carry a precise cause.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("LLM provider error ({provider}): {message}")]
    LlmError { provider: String, message: String },

    #[error("no JSON payload could be recovered from model output ({0})")]
    MalformedOutput(String),

    #[error("structured output did not match schema: {0}")]
    SchemaMismatch(String),

    #[error("tool not allowed for this agent: {0}")]
    ToolNotAllowed(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
