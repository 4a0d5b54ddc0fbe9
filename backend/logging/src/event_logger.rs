//! Pipeline Event Logger
//!
//! Structured events (stage transitions, batch outcomes, fallbacks, tool calls)
//! emitted through `tracing` under the `pipeline_events` target, so the file
//! layer writes them as NDJSON.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::redact::redact_sensitive_data;

pub const EVENT_TARGET: &str = "pipeline_events";

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    StageStarted {
        stage: String,
    },
    StageCompleted {
        stage: String,
        elapsed_ms: u64,
    },
    BatchCompleted {
        batch_index: usize,
        region: String,
        method: String,
        success: bool,
        entries: usize,
    },
    FallbackUsed {
        scope: String,
        reason: String,
    },
    ToolCall {
        tool_name: String,
        arguments_json: String,
    },
}

#[derive(Debug, Serialize)]
pub struct EventLogEntry {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    pub event: PipelineEvent,
}

pub struct EventLogger;

impl EventLogger {
    /// Logs a pipeline event with free-text fields redacted.
    pub fn log_event(request_id: &str, event: PipelineEvent) {
        let entry = EventLogEntry {
            request_id: request_id.into(),
            timestamp: Utc::now(),
            event: Self::redacted(event),
        };

        let payload = serde_json::to_string(&entry).unwrap_or_else(|e| e.to_string());
        info!(target: EVENT_TARGET, event = %payload, "Pipeline event");
    }

    fn redacted(mut event: PipelineEvent) -> PipelineEvent {
        match &mut event {
            PipelineEvent::FallbackUsed { reason, .. } => {
                *reason = redact_sensitive_data(reason);
            }
            PipelineEvent::ToolCall { arguments_json, .. } => {
                *arguments_json = redact_sensitive_data(arguments_json);
            }
            PipelineEvent::StageStarted { .. }
            | PipelineEvent::StageCompleted { .. }
            | PipelineEvent::BatchCompleted { .. } => {}
        }
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_tag() {
        let value = serde_json::to_value(PipelineEvent::BatchCompleted {
            batch_index: 2,
            region: "서울".into(),
            method: "json_parsing".into(),
            success: true,
            entries: 10,
        })
        .unwrap();
        assert_eq!(value["type"], "batch_completed");
        assert_eq!(value["entries"], 10);
    }

    #[test]
    fn test_fallback_reason_is_redacted() {
        let event = EventLogger::redacted(PipelineEvent::FallbackUsed {
            scope: "batch 1".into(),
            reason: "could not parse 010-1234-5678".into(),
        });
        match event {
            PipelineEvent::FallbackUsed { reason, .. } => {
                assert!(!reason.contains("010-1234-5678"))
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_log_event_without_subscriber() {
        EventLogger::log_event(
            "req-1",
            PipelineEvent::StageStarted {
                stage: "initial_split".into(),
            },
        );
    }
}
