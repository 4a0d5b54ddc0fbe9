//! Juso Agent Runner
//!
//! LLM-driven contact extraction: the tool-calling agent loop, prompts,
//! JSON repair, the per-batch worker, the bounded parallel orchestrator and
//! the multi-entry pipeline that ties them together.

pub mod agent_config;
pub mod agent_loop;
pub mod json_repair;
pub mod orchestrator;
pub mod pipeline;
mod response;
pub mod single;
pub mod strategy;
pub mod system_prompt;
pub mod tool_dispatcher;
pub mod worker;

pub use agent_config::{AgentConfig, AgentRole, LlmSettings, PipelineSettings};
pub use agent_loop::{AgentRunner, StepResult};
pub use json_repair::{RepairMethod, RepairOutcome, parse_with_repair, repair_json};
pub use orchestrator::{BatchOrchestrator, DEFAULT_MAX_WORKERS, merge_entries};
pub use pipeline::{MultiEntryPipeline, PipelineStage};
pub use single::{AddressCorrection, AddressCorrector};
pub use strategy::{ExtractionMethod, Resolved, StrategyChain};
pub use system_prompt::PromptBuilder;
pub use tool_dispatcher::{ToolCallRequest, ToolDispatcher, ToolResult};
pub use worker::{BatchOutcome, BatchWorker};
