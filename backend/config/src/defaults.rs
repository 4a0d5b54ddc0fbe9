//! Config defaults: applies default values to a parsed config.

use crate::schema::{JusoConfig, LlmConfig, LoggingConfig, OcrConfig, PipelineConfig};

pub const DEFAULT_PROVIDER: &str = "openrouter";
pub const DEFAULT_MODEL: &str = "anthropic/claude-3.5-sonnet";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MAX_TOKENS: u32 = 8192;
pub const DEFAULT_TEMPERATURE: f32 = 0.1;
pub const DEFAULT_MAX_TOOL_STEPS: usize = 4;

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_MAX_WORKERS: usize = 4;
pub const DEFAULT_LOW_CONFIDENCE_THRESHOLD: f64 = 0.3;

pub const DEFAULT_OCR_ENDPOINT: &str = "https://api.upstage.ai/v1/document-digitization";
pub const DEFAULT_OCR_MODEL: &str = "ocr";
/// 10 MiB.
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: JusoConfig) -> JusoConfig {
    let config = apply_llm_defaults(config);
    let config = apply_pipeline_defaults(config);
    let config = apply_ocr_defaults(config);
    apply_logging_defaults(config)
}

fn apply_llm_defaults(mut config: JusoConfig) -> JusoConfig {
    let llm = config.llm.get_or_insert_with(LlmConfig::default);
    llm.provider.get_or_insert_with(|| DEFAULT_PROVIDER.to_string());
    llm.model.get_or_insert_with(|| DEFAULT_MODEL.to_string());
    llm.timeout_secs.get_or_insert(DEFAULT_TIMEOUT_SECS);
    llm.max_tokens.get_or_insert(DEFAULT_MAX_TOKENS);
    llm.temperature.get_or_insert(DEFAULT_TEMPERATURE);
    llm.max_tool_steps.get_or_insert(DEFAULT_MAX_TOOL_STEPS);
    config
}

fn apply_pipeline_defaults(mut config: JusoConfig) -> JusoConfig {
    let pipeline = config.pipeline.get_or_insert_with(PipelineConfig::default);
    pipeline.batch_size.get_or_insert(DEFAULT_BATCH_SIZE);
    pipeline.max_workers.get_or_insert(DEFAULT_MAX_WORKERS);
    pipeline
        .low_confidence_threshold
        .get_or_insert(DEFAULT_LOW_CONFIDENCE_THRESHOLD);
    pipeline.enforce_validation.get_or_insert(true);
    config
}

fn apply_ocr_defaults(mut config: JusoConfig) -> JusoConfig {
    let ocr = config.ocr.get_or_insert_with(OcrConfig::default);
    ocr.endpoint.get_or_insert_with(|| DEFAULT_OCR_ENDPOINT.to_string());
    ocr.model.get_or_insert_with(|| DEFAULT_OCR_MODEL.to_string());
    ocr.max_image_bytes.get_or_insert(DEFAULT_MAX_IMAGE_BYTES);
    config
}

fn apply_logging_defaults(mut config: JusoConfig) -> JusoConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    logging.level.get_or_insert_with(|| DEFAULT_LOG_LEVEL.to_string());
    logging.json.get_or_insert(false);
    config
}
