//! `juso-config`: runtime configuration for the juso extraction pipeline.
//!
//! Provides:
//! - Typed config schema (LLM, pipeline, OCR, logging)
//! - YAML loading from `~/.juso/config.yaml` or `JUSO_CONFIG_DIR`
//! - `${ENV_VAR}` substitution
//! - Config redaction for safe display
//! - Default value application and validation

pub mod defaults;
pub mod env;
pub mod io;
pub mod redact;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{collect_referenced_vars, resolve_env_vars, resolve_env_vars_with, MissingEnvVarError};
pub use io::{config_dir, config_file_path, load_raw_config, parse_config, CONFIG_DIR_ENV};
pub use redact::{collect_redacted_paths, redact};
pub use schema::{JusoConfig, LlmConfig, LoggingConfig, OcrConfig, PipelineConfig};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Load, substitute env vars, apply defaults and validate a config file.
///
/// Warnings are logged; any validation error fails the load.
pub async fn load_and_prepare(path: &Path) -> Result<JusoConfig> {
    let raw = load_raw_config(path).await?;
    let env: HashMap<String, String> = std::env::vars().collect();
    prepare(raw, &env)
}

/// The load pipeline after the file has been read.
pub fn prepare(raw: Value, env: &HashMap<String, String>) -> Result<JusoConfig> {
    let value = resolve_env_vars_with(&raw, env).context("Failed to resolve env vars in config")?;

    let config: JusoConfig =
        serde_json::from_value(value).context("Failed to deserialize config after processing")?;
    let config = apply_all_defaults(config);

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    if let Some(first) = report.errors.first() {
        for error in &report.errors {
            tracing::error!(path = %error.path, message = %error.message, "Config error");
        }
        anyhow::bail!("{first} ({} error(s) in total)", report.errors.len());
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prepare_substitutes_and_defaults() {
        let raw = json!({"llm": {"provider": "openrouter", "apiKey": "${OPENROUTER_API_KEY}"}});
        let env: HashMap<String, String> =
            [("OPENROUTER_API_KEY".to_string(), "sk-or-test".to_string())].into();
        let config = prepare(raw, &env).unwrap();
        assert_eq!(config.llm().api_key.as_deref(), Some("sk-or-test"));
        assert_eq!(config.pipeline.unwrap().batch_size, Some(10));
    }

    #[test]
    fn prepare_rejects_invalid() {
        let raw = json!({"llm": {"provider": "mock"}, "pipeline": {"batchSize": 0}});
        let err = prepare(raw, &HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("pipeline.batchSize"));
    }

    #[test]
    fn prepare_reports_missing_env_var() {
        let raw = json!({"ocr": {"apiKey": "${UPSTAGE_API_KEY}"}});
        let err = prepare(raw, &HashMap::new()).unwrap_err();
        assert!(format!("{err:#}").contains("UPSTAGE_API_KEY"));
    }
}
