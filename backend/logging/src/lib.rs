//! Telemetry and structured logging components for the juso pipeline.
//!
//! Handles log redaction, JSON output generation, file rotation, and pipeline event logging.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{EVENT_TARGET, EventLogEntry, EventLogger, PipelineEvent};
pub use logger::init_logger;
pub use redact::{redact_sensitive_data, redacted_preview};
