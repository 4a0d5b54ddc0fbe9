//! Dispatcher for agent tool calls.
//!
//! Routes the model's requested tool invocations to the registry, limited to
//! the tools the agent configuration allows.

use std::collections::BTreeSet;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use juso_core::{Tool, ToolName, ToolRegistry};
use juso_logging::{EventLogger, PipelineEvent};

static TOOL_CALL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<tool_call>\s*(.*?)\s*</tool_call>").unwrap());

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub name: String,
    pub success: bool,
    pub data: Value,
    pub error: Option<String>,
}

impl ToolResult {
    fn failed(name: &str, error: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            success: false,
            data: Value::Null,
            error: Some(error.into()),
        }
    }
}

/// Extract `<tool_call>` blocks. Blocks that are not valid JSON become calls
/// to an empty name so the model gets an error back.
pub fn parse_tool_calls(content: &str) -> Vec<ToolCallRequest> {
    TOOL_CALL_RE
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|body| {
            serde_json::from_str::<ToolCallRequest>(body.as_str()).unwrap_or(ToolCallRequest {
                name: String::new(),
                arguments: Value::Null,
            })
        })
        .collect()
}

pub struct ToolDispatcher {
    tools: Vec<(ToolName, Arc<dyn Tool>)>,
    request_id: String,
}

impl ToolDispatcher {
    pub fn new(registry: &ToolRegistry, allowed: &BTreeSet<ToolName>) -> Self {
        Self {
            tools: registry.subset(allowed),
            request_id: String::new(),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn tools(&self) -> &[(ToolName, Arc<dyn Tool>)] {
        &self.tools
    }

    /// Dispatch a single tool call to the corresponding handler.
    pub async fn execute(&self, call: ToolCallRequest) -> ToolResult {
        let name = match call.name.parse::<ToolName>() {
            Ok(name) => name,
            Err(e) => {
                warn!(tool = %call.name, "Model requested unknown tool");
                return ToolResult::failed(&call.name, e.to_string());
            }
        };

        let Some((_, tool)) = self.tools.iter().find(|(n, _)| *n == name) else {
            warn!(tool = %name, "Model requested a tool outside its allowed set");
            return ToolResult::failed(&call.name, format!("tool not allowed: {name}"));
        };

        EventLogger::log_event(
            &self.request_id,
            PipelineEvent::ToolCall {
                tool_name: name.to_string(),
                arguments_json: call.arguments.to_string(),
            },
        );

        match tool.execute(call.arguments).await {
            Ok(data) => {
                debug!(tool = %name, "Tool executed");
                ToolResult {
                    name: call.name,
                    success: true,
                    data,
                    error: None,
                }
            }
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool failed");
                ToolResult::failed(&call.name, e.to_string())
            }
        }
    }

    /// Execute multiple tool calls concurrently, results in call order.
    pub async fn execute_all(&self, calls: Vec<ToolCallRequest>) -> Vec<ToolResult> {
        futures::future::join_all(calls.into_iter().map(|call| self.execute(call))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use juso_tools::{default_registry, AddressLookupStore};
    use serde_json::json;

    fn dispatcher(allowed: &[ToolName]) -> ToolDispatcher {
        let registry = default_registry(AddressLookupStore::embedded());
        ToolDispatcher::new(&registry, &allowed.iter().copied().collect())
    }

    #[test]
    fn test_parse_tool_calls() {
        let content = r#"Let me check.
<tool_call>{"name": "validate_phone_number_format", "arguments": {"text": "010-1234-5678"}}</tool_call>
<tool_call>not json</tool_call>"#;
        let calls = parse_tool_calls(content);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "validate_phone_number_format");
        assert_eq!(calls[0].arguments["text"], "010-1234-5678");
        assert!(calls[1].name.is_empty());
        assert!(parse_tool_calls("no tools here").is_empty());
    }

    #[tokio::test]
    async fn test_execute_allowed_tool() {
        let dispatcher = dispatcher(&ToolName::ALL);
        let result = dispatcher
            .execute(ToolCallRequest {
                name: "lookup_address_components".into(),
                arguments: json!({"sido": "서울", "sigungu": "강남구", "road_name": "테헤란로"}),
            })
            .await;
        assert!(result.success);
        assert_eq!(result.data["sido"]["standardized"], "서울특별시");
    }

    #[tokio::test]
    async fn test_disallowed_and_unknown_tools_return_errors() {
        let dispatcher = dispatcher(&[ToolName::ValidateKoreanAddressFormat]);
        let results = dispatcher
            .execute_all(vec![
                ToolCallRequest {
                    name: "validate_phone_number_format".into(),
                    arguments: json!({"text": "x"}),
                },
                ToolCallRequest {
                    name: "delete_everything".into(),
                    arguments: Value::Null,
                },
            ])
            .await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.success && r.error.is_some()));
        assert!(results[0].error.as_deref().unwrap().contains("not allowed"));
    }

    #[tokio::test]
    async fn test_tool_error_is_reported() {
        let dispatcher = dispatcher(&ToolName::ALL);
        let result = dispatcher
            .execute(ToolCallRequest {
                name: "validate_phone_number_format".into(),
                arguments: json!({}),
            })
            .await;
        assert!(!result.success);
    }
}
