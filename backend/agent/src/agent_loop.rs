//! Core agent execution loop.
//!
//! One `invoke` is one logical LLM call: the model may request tools, which are
//! dispatched and fed back, until it answers or the step budget runs out.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, info, warn};

use juso_core::{LlmProvider, LlmRequest, StructuredSchema, ToolRegistry};

use crate::agent_config::AgentConfig;
use crate::system_prompt::PromptBuilder;
use crate::tool_dispatcher::{ToolCallRequest, ToolDispatcher, parse_tool_calls};

const BUDGET_EXHAUSTED_NOTE: &str =
    "Tool budget exhausted. Give your final answer now without any tool_call blocks.";

/// Result of a single agent step.
#[derive(Debug, Clone)]
pub enum StepResult {
    /// Agent produced a final response.
    Response(String),
    /// Agent called one or more tools; we should execute them and loop.
    ToolCalls(String, Vec<ToolCallRequest>),
}

pub struct AgentRunner {
    provider: Arc<dyn LlmProvider>,
    config: AgentConfig,
    dispatcher: ToolDispatcher,
    system_prompt: String,
}

impl AgentRunner {
    pub fn new(provider: Arc<dyn LlmProvider>, config: AgentConfig, registry: &ToolRegistry) -> Self {
        let dispatcher = ToolDispatcher::new(registry, &config.tools);
        let system_prompt = format!(
            "{}{}",
            config.system_prompt,
            PromptBuilder::tool_section(dispatcher.tools())
        );
        Self {
            provider,
            config,
            dispatcher,
            system_prompt,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.dispatcher = self.dispatcher.with_request_id(request_id);
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run the agent until it produces a final response or hits the step limit.
    pub async fn invoke(&self, user_prompt: &str) -> Result<String> {
        let mut transcript = user_prompt.to_string();
        let max_steps = self.config.max_tool_steps;

        for step in 0..=max_steps {
            debug!(role = self.config.role.as_str(), step, "Agent loop step");

            match self.execute_single_step(&transcript).await? {
                StepResult::Response(content) => return Ok(content),
                StepResult::ToolCalls(content, calls) => {
                    if step == max_steps {
                        warn!(
                            role = self.config.role.as_str(),
                            "Max tool steps ({}) reached, using last reply", max_steps
                        );
                        return Ok(content);
                    }

                    info!(role = self.config.role.as_str(), "Agent invoked {} tools", calls.len());
                    let results = self.dispatcher.execute_all(calls).await;

                    transcript.push_str("\n\n<assistant>\n");
                    transcript.push_str(&content);
                    transcript.push_str("\n</assistant>\n");
                    for result in results {
                        transcript.push_str(&format!(
                            "<tool_result name=\"{}\">{}</tool_result>\n",
                            result.name,
                            serde_json::to_string(&result).unwrap_or_else(|e| e.to_string())
                        ));
                    }
                    if step + 1 == max_steps {
                        transcript.push_str(BUDGET_EXHAUSTED_NOTE);
                    }
                }
            }
        }

        // The loop always returns by its last iteration.
        anyhow::bail!("agent loop ended without a reply")
    }

    /// Schema-constrained call restating `seed_text`.
    pub async fn invoke_structured(&self, seed_text: &str, schema: &StructuredSchema) -> Result<Value> {
        let request = self.request(PromptBuilder::restructure_prompt(seed_text));
        tokio::time::timeout(
            self.config.timeout,
            self.provider.complete_structured(&request, schema),
        )
        .await
        .with_context(|| {
            format!(
                "{} structured call timed out after {:?}",
                self.provider.name(),
                self.config.timeout
            )
        })?
    }

    /// Single interaction with the LLM.
    async fn execute_single_step(&self, transcript: &str) -> Result<StepResult> {
        let request = self.request(transcript.to_string());
        let response = tokio::time::timeout(self.config.timeout, self.provider.complete(&request))
            .await
            .with_context(|| {
                format!(
                    "{} call timed out after {:?}",
                    self.provider.name(),
                    self.config.timeout
                )
            })??;

        debug!(
            provider = %response.provider,
            tokens = response.tokens_used,
            latency_ms = response.latency_ms,
            "Provider responded"
        );

        if self.dispatcher.tools().is_empty() {
            return Ok(StepResult::Response(response.content));
        }
        let calls = parse_tool_calls(&response.content);
        if calls.is_empty() {
            Ok(StepResult::Response(response.content))
        } else {
            Ok(StepResult::ToolCalls(response.content, calls))
        }
    }

    fn request(&self, user_prompt: String) -> LlmRequest {
        LlmRequest {
            system_prompt: self.system_prompt.clone(),
            ..self.config.request(user_prompt)
        }
    }
}
