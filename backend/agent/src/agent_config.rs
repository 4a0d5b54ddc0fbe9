//! Immutable agent configurations.
//!
//! Each pipeline role gets a fresh value from a factory; nothing is shared
//! through module state, so tests can swap in a fake provider freely.

use std::collections::BTreeSet;
use std::time::Duration;

use juso_core::{LlmRequest, ToolName};
use juso_tools::ReviewPolicy;

use crate::system_prompt::PromptBuilder;

/// Model parameters shared by every agent in a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
    /// Tool-call rounds allowed before the model must answer.
    pub max_tool_steps: usize,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "anthropic/claude-3.5-sonnet".to_string(),
            max_tokens: 8192,
            temperature: 0.1,
            timeout: Duration::from_secs(120),
            max_tool_steps: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub llm: LlmSettings,
    pub batch_size: usize,
    pub max_workers: usize,
    pub review: ReviewPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            llm: LlmSettings::default(),
            batch_size: 10,
            max_workers: 4,
            review: ReviewPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentRole {
    InitialSplit,
    MultiEntry,
    SingleAddress,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InitialSplit => "initial_split",
            Self::MultiEntry => "multi_entry",
            Self::SingleAddress => "single_address",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub role: AgentRole,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
    pub max_tool_steps: usize,
    pub tools: BTreeSet<ToolName>,
    pub system_prompt: String,
}

impl AgentConfig {
    /// Bulk first pass: no tools, one call.
    pub fn initial_split(llm: &LlmSettings) -> Self {
        Self::build(
            AgentRole::InitialSplit,
            llm,
            BTreeSet::new(),
            PromptBuilder::initial_split_system(),
        )
    }

    /// Per-batch enrichment with every tool available.
    pub fn multi_entry(llm: &LlmSettings) -> Self {
        Self::build(
            AgentRole::MultiEntry,
            llm,
            ToolName::all(),
            PromptBuilder::multi_entry_system(),
        )
    }

    pub fn single_address(llm: &LlmSettings) -> Self {
        let tools = [
            ToolName::ValidateKoreanAddressFormat,
            ToolName::LookupAddressComponents,
        ]
        .into_iter()
        .collect();
        Self::build(
            AgentRole::SingleAddress,
            llm,
            tools,
            PromptBuilder::single_address_system(),
        )
    }

    fn build(
        role: AgentRole,
        llm: &LlmSettings,
        tools: BTreeSet<ToolName>,
        system_prompt: String,
    ) -> Self {
        Self {
            role,
            model: llm.model.clone(),
            max_tokens: llm.max_tokens,
            temperature: llm.temperature,
            timeout: llm.timeout,
            max_tool_steps: llm.max_tool_steps,
            tools,
            system_prompt,
        }
    }

    pub fn request(&self, user_prompt: impl Into<String>) -> LlmRequest {
        LlmRequest {
            model: self.model.clone(),
            system_prompt: self.system_prompt.clone(),
            user_prompt: user_prompt.into(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factories_assign_tool_sets() {
        let llm = LlmSettings::default();
        assert!(AgentConfig::initial_split(&llm).tools.is_empty());
        assert_eq!(AgentConfig::multi_entry(&llm).tools.len(), 3);

        let single = AgentConfig::single_address(&llm);
        assert!(single.tools.contains(&ToolName::LookupAddressComponents));
        assert!(!single.tools.contains(&ToolName::ValidatePhoneNumberFormat));
    }

    #[test]
    fn test_request_carries_model_parameters() {
        let llm = LlmSettings {
            model: "qwen2.5".into(),
            temperature: 0.0,
            ..Default::default()
        };
        let config = AgentConfig::multi_entry(&llm);
        let request = config.request("hello");
        assert_eq!(request.model, "qwen2.5");
        assert_eq!(request.user_prompt, "hello");
        assert_eq!(request.system_prompt, config.system_prompt);
        assert_eq!(request.temperature, 0.0);
    }
}
