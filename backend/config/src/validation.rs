//! Config validation with field paths and user-facing messages.

use crate::schema::JusoConfig;
use thiserror::Error;

/// Providers the CLI knows how to build.
pub const KNOWN_PROVIDERS: [&str; 3] = ["openrouter", "ollama", "mock"];

/// Above this, parallel batches are likely to hit provider rate limits.
pub const MAX_RECOMMENDED_WORKERS: usize = 8;

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// Errors and warnings found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &JusoConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_llm(config, &mut report);
    validate_pipeline(config, &mut report);
    validate_ocr(config, &mut report);
    report
}

fn validate_llm(config: &JusoConfig, report: &mut ValidationReport) {
    let llm = config.llm();
    let provider = llm.provider();
    if !KNOWN_PROVIDERS.contains(&provider) {
        report.error(
            "llm.provider",
            format!("Unknown provider '{provider}'. Use 'openrouter', 'ollama', or 'mock'"),
        );
    }
    if llm.model.as_deref().is_some_and(|m| m.trim().is_empty()) {
        report.error("llm.model", "Model id cannot be empty");
    }
    if provider == "openrouter" && llm.api_key.as_deref().map(str::is_empty).unwrap_or(true) {
        report.warn("llm.apiKey", "OpenRouter without an apiKey; every LLM call will fail");
    }
    if llm.timeout_secs == Some(0) {
        report.error("llm.timeoutSecs", "timeoutSecs must be >= 1");
    }
    if let Some(t) = llm.temperature {
        if !(0.0..=2.0).contains(&t) {
            report.error("llm.temperature", "temperature must be within [0, 2]");
        }
    }
}

fn validate_pipeline(config: &JusoConfig, report: &mut ValidationReport) {
    let pipeline = config.pipeline();
    if pipeline.batch_size() == 0 {
        report.error("pipeline.batchSize", "batchSize must be >= 1");
    }
    match pipeline.max_workers() {
        0 => report.error("pipeline.maxWorkers", "maxWorkers must be >= 1"),
        n if n > MAX_RECOMMENDED_WORKERS => report.warn(
            "pipeline.maxWorkers",
            format!("{n} concurrent LLM calls may exceed provider rate limits"),
        ),
        _ => {}
    }
    let threshold = pipeline.low_confidence_threshold();
    if !(0.0..=1.0).contains(&threshold) {
        report.error(
            "pipeline.lowConfidenceThreshold",
            "lowConfidenceThreshold must be within [0, 1]",
        );
    }
}

fn validate_ocr(config: &JusoConfig, report: &mut ValidationReport) {
    let ocr = config.ocr();
    if ocr.max_image_bytes() == 0 {
        report.error("ocr.maxImageBytes", "maxImageBytes must be > 0");
    }
    if ocr.endpoint().trim().is_empty() {
        report.error("ocr.endpoint", "OCR endpoint cannot be empty");
    }
}
