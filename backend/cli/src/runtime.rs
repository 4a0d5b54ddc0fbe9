//! Wiring from a loaded [`JusoConfig`] to the pipeline's collaborators.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use juso_agent::{LlmSettings, PipelineSettings};
use juso_config::JusoConfig;
use juso_core::LlmProvider;
use juso_media::UpstageOcr;
use juso_planner::{MockProvider, OllamaProvider, OpenRouterProvider, ProviderRegistry};
use juso_tools::{AddressLookupStore, ReviewPolicy};

pub struct Runtime {
    pub config: JusoConfig,
    pub store: Arc<AddressLookupStore>,
}

impl Runtime {
    pub fn new(config: JusoConfig) -> Self {
        Self {
            config,
            store: AddressLookupStore::embedded(),
        }
    }

    pub fn llm_settings(&self) -> LlmSettings {
        let llm = self.config.llm();
        LlmSettings {
            model: llm.model().to_string(),
            max_tokens: llm.max_tokens(),
            temperature: llm.temperature(),
            timeout: llm.timeout(),
            max_tool_steps: llm.max_tool_steps(),
        }
    }

    pub fn review_policy(&self) -> ReviewPolicy {
        let pipeline = self.config.pipeline();
        ReviewPolicy {
            low_confidence_threshold: pipeline.low_confidence_threshold(),
            enforce_validation: pipeline.enforce_validation(),
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        let pipeline = self.config.pipeline();
        PipelineSettings {
            llm: self.llm_settings(),
            batch_size: pipeline.batch_size(),
            max_workers: pipeline.max_workers(),
            review: self.review_policy(),
        }
    }

    /// The configured LLM provider.
    pub fn provider(&self) -> Result<Arc<dyn LlmProvider>> {
        let llm = self.config.llm();
        let mut registry = ProviderRegistry::new();

        match llm.provider() {
            "openrouter" => {
                let mut provider = OpenRouterProvider::new(llm.api_key.clone().unwrap_or_default())
                    .with_timeout(llm.timeout())?;
                if let Some(url) = &llm.base_url {
                    provider = provider.with_base_url(url);
                }
                registry.register(Arc::new(provider));
            }
            "ollama" => {
                let mut provider = OllamaProvider::new().with_timeout(llm.timeout())?;
                if let Some(url) = &llm.base_url {
                    provider = provider.with_base_url(url);
                }
                registry.register(Arc::new(provider));
            }
            "mock" => registry.register(Arc::new(MockProvider::new("mock"))),
            other => anyhow::bail!("Unknown LLM provider '{other}'"),
        }

        let provider = registry
            .get(llm.provider())
            .with_context(|| format!("Provider '{}' did not register", llm.provider()))?;
        info!(provider = provider.name(), model = llm.model(), "LLM provider ready");
        Ok(provider)
    }

    pub fn ocr(&self) -> Result<UpstageOcr> {
        let ocr = self.config.ocr();
        UpstageOcr::new(ocr.api_key.clone())
            .with_endpoint(ocr.endpoint())
            .with_model(ocr.model())
            .with_timeout(self.config.llm().timeout())
    }

    pub fn max_image_bytes(&self) -> usize {
        usize::try_from(self.config.ocr().max_image_bytes()).unwrap_or(usize::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use juso_config::{LlmConfig, PipelineConfig};

    fn runtime(provider: &str) -> Runtime {
        Runtime::new(JusoConfig {
            llm: Some(LlmConfig {
                provider: Some(provider.into()),
                model: Some("test-model".into()),
                ..Default::default()
            }),
            pipeline: Some(PipelineConfig {
                batch_size: Some(5),
                max_workers: Some(2),
                low_confidence_threshold: Some(0.4),
                enforce_validation: Some(false),
            }),
            ..Default::default()
        })
    }

    #[test]
    fn maps_pipeline_settings() {
        let settings = runtime("mock").pipeline_settings();
        assert_eq!(settings.llm.model, "test-model");
        assert_eq!(settings.batch_size, 5);
        assert_eq!(settings.max_workers, 2);
        assert_eq!(settings.review.low_confidence_threshold, 0.4);
        assert!(!settings.review.enforce_validation);
    }

    #[test]
    fn builds_known_providers() {
        assert_eq!(runtime("mock").provider().unwrap().name(), "mock");
        assert_eq!(runtime("openrouter").provider().unwrap().name(), "openrouter");
        assert_eq!(runtime("ollama").provider().unwrap().name(), "ollama");
    }

    #[test]
    fn rejects_unknown_provider() {
        let err = runtime("bedrock").provider().err().unwrap();
        assert!(err.to_string().contains("bedrock"));
    }
}
