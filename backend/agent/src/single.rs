//! Single-address correction: one address, no splitting or batching.

use std::sync::Arc;

use futures::FutureExt;
use serde::Serialize;
use tracing::{debug, info, warn};

use juso_core::{AddressComponents, LlmProvider, StructuredSchema, ToolRegistry};
use juso_logging::{EventLogger, PipelineEvent, redacted_preview};
use juso_tools::{AddressLookupStore, ReviewPolicy, default_registry};

use crate::agent_config::{AgentConfig, LlmSettings};
use crate::agent_loop::AgentRunner;
use crate::json_repair::parse_with_repair;
use crate::response::corrected_address_from_value;
use crate::strategy::{Attempt, ExtractionMethod, StrategyChain};
use crate::system_prompt::PromptBuilder;

#[derive(Debug, Clone, Serialize)]
pub struct AddressCorrection {
    pub input: String,
    pub address: AddressComponents,
    pub formatted: String,
    pub method: ExtractionMethod,
    pub success: bool,
}

pub struct AddressCorrector {
    runner: AgentRunner,
    store: Arc<AddressLookupStore>,
    review: ReviewPolicy,
}

impl AddressCorrector {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        llm: &LlmSettings,
        store: Arc<AddressLookupStore>,
        review: ReviewPolicy,
    ) -> Self {
        let registry: ToolRegistry = default_registry(store.clone());
        Self {
            runner: AgentRunner::new(provider, AgentConfig::single_address(llm), &registry),
            store,
            review,
        }
    }

    pub async fn correct(&self, text: &str) -> AddressCorrection {
        if text.trim().is_empty() {
            return self.unresolved(text, "empty input");
        }

        let raw = match self.runner.invoke(&PromptBuilder::single_address_prompt(text)).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Address correction call failed");
                return self.unresolved(text, &format!("llm call failed: {e:#}"));
            }
        };
        debug!(reply = %redacted_preview(&raw, 200), "Address correction reply");

        let reply = raw.as_str();
        let runner = &self.runner;
        let resolved = StrategyChain::<AddressComponents>::new()
            .then(ExtractionMethod::JsonParsing, move || {
                async move {
                    let value = parse_with_repair(reply)
                        .into_value()
                        .ok_or_else(|| "reply is not JSON".to_string())?;
                    corrected_address_from_value(&value)
                }
                .boxed()
            })
            .then(ExtractionMethod::StructuredOutput, move || {
                async move {
                    let schema = StructuredSchema::of::<AddressComponents>("address_components");
                    let value = runner
                        .invoke_structured(reply, &schema)
                        .await
                        .map_err(|e| format!("{e:#}"))?;
                    corrected_address_from_value(&value)
                }
                .boxed()
            })
            .resolve_or(AddressComponents::unresolved)
            .await;

        if !resolved.success() {
            return self.unresolved(text, "reply could not be parsed");
        }

        let address = self.review.apply(resolved.value, text, &self.store);
        info!(
            method = %resolved.method,
            human_review = address.human_review,
            "Address corrected"
        );
        AddressCorrection {
            input: text.to_string(),
            formatted: address.to_formatted_address(),
            address,
            method: resolved.method,
            success: true,
        }
    }

    fn unresolved(&self, text: &str, reason: &str) -> AddressCorrection {
        EventLogger::log_event(
            "",
            PipelineEvent::FallbackUsed {
                scope: "single_address".to_string(),
                reason: reason.to_string(),
            },
        );
        AddressCorrection {
            input: text.to_string(),
            address: AddressComponents::unresolved(),
            formatted: String::new(),
            method: ExtractionMethod::Fallback,
            success: false,
        }
    }
}
