//! Multi-entry pipeline.
//!
//! `START → INITIAL_SPLIT → ZERO_CHECK → GEOGRAPHIC_GROUPING → BATCH_PLANNING
//! → PARALLEL_EXTRACTION → DONE`, strictly forward. Every stage degrades
//! locally; anything that still escapes, including a panic, becomes an empty
//! result. `run` never fails.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::Utc;
use futures::FutureExt;
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use juso_core::{
    ContactEntry, ContactList, LlmProvider, MultiEntryResult, RawContact, StructuredSchema,
    ToolRegistry,
};
use juso_logging::{EventLogger, PipelineEvent, redacted_preview};
use juso_planner::GeographicPlanner;
use juso_tools::{AddressLookupStore, default_registry};

use crate::agent_config::{AgentConfig, PipelineSettings};
use crate::agent_loop::AgentRunner;
use crate::json_repair::parse_with_repair;
use crate::orchestrator::{BatchOrchestrator, merge_entries};
use crate::response::contacts_from_value;
use crate::strategy::{Attempt, ExtractionMethod, StrategyChain};
use crate::system_prompt::PromptBuilder;
use crate::worker::{BatchOutcome, BatchWorker};

/// `initial_split_method` when the LLM could not produce a contact list.
pub const SPLIT_FAILED: &str = "failed";
/// `initial_split_method` for blank input, where no call is made.
pub const SPLIT_SKIPPED: &str = "skipped";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineStage {
    Start,
    InitialSplit,
    ZeroCheck,
    GeographicGrouping,
    BatchPlanning,
    ParallelExtraction,
    Done,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::InitialSplit => "initial_split",
            Self::ZeroCheck => "zero_check",
            Self::GeographicGrouping => "geographic_grouping",
            Self::BatchPlanning => "batch_planning",
            Self::ParallelExtraction => "parallel_extraction",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a run produced before metadata is attached.
#[derive(Debug, Default)]
struct PipelineRun {
    entries: Vec<ContactEntry>,
    initial_split_method: String,
    contacts_found: usize,
    regions: BTreeMap<String, usize>,
    batches: Vec<Value>,
    timings_ms: BTreeMap<&'static str, u64>,
    stage: Option<PipelineStage>,
}

impl PipelineRun {
    fn failed() -> Self {
        Self {
            initial_split_method: SPLIT_FAILED.to_string(),
            ..Self::default()
        }
    }
}

pub struct MultiEntryPipeline {
    provider: Arc<dyn LlmProvider>,
    registry: ToolRegistry,
    store: Arc<AddressLookupStore>,
    settings: PipelineSettings,
}

impl MultiEntryPipeline {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        store: Arc<AddressLookupStore>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            provider,
            registry: default_registry(store.clone()),
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Extract every contact in `text`.
    pub async fn run(&self, text: &str) -> MultiEntryResult {
        self.run_timed(text, None).await
    }

    /// Same as [`run`](Self::run), recording an upstream OCR duration in the metadata.
    pub async fn run_timed(&self, text: &str, ocr_ms: Option<u64>) -> MultiEntryResult {
        let request_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        info!(request_id = %request_id, text_length = text.chars().count(), "Multi-entry extraction started");

        let attempt = AssertUnwindSafe(self.try_run(text, &request_id))
            .catch_unwind()
            .await;
        let mut run = match attempt {
            Ok(Ok(run)) => run,
            Ok(Err(e)) => {
                error!(request_id = %request_id, error = %e, "Pipeline failed, returning empty result");
                self.log_fallback(&request_id, format!("{e:#}"));
                PipelineRun::failed()
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!(request_id = %request_id, reason = %reason, "Pipeline panicked, returning empty result");
                self.log_fallback(&request_id, format!("panic: {reason}"));
                PipelineRun::failed()
            }
        };

        if let Some(ms) = ocr_ms {
            run.timings_ms.insert("ocr", ms);
        }
        run.timings_ms.insert("total", elapsed_ms(started));

        let metadata = json!({
            "request_id": request_id,
            "processed_at": Utc::now().to_rfc3339(),
            "raw_text": text,
            "text_length": text.chars().count(),
            "initial_split_method": run.initial_split_method,
            "contacts_found": run.contacts_found,
            "regions": run.regions,
            "batches": run.batches,
            "last_stage": run.stage.map(|s| s.as_str()),
            "timings_ms": run.timings_ms,
        });

        let result = MultiEntryResult::from_entries(run.entries);
        info!(
            request_id = %request_id,
            entries = result.total_entries,
            elapsed_ms = elapsed_ms(started),
            "Multi-entry extraction finished"
        );
        result.with_metadata(metadata, request_id)
    }

    async fn try_run(&self, text: &str, request_id: &str) -> Result<PipelineRun> {
        let mut run = PipelineRun::default();
        self.enter(&mut run, request_id, PipelineStage::Start);

        // INITIAL_SPLIT
        self.enter(&mut run, request_id, PipelineStage::InitialSplit);
        let clock = Instant::now();
        let (contacts, method) = if text.trim().is_empty() {
            debug!(request_id, "Blank input, skipping initial split");
            (Vec::new(), SPLIT_SKIPPED.to_string())
        } else {
            self.initial_split(text, request_id).await
        };
        self.leave(&mut run, request_id, PipelineStage::InitialSplit, clock);
        run.initial_split_method = method;
        run.contacts_found = contacts.len();

        // ZERO_CHECK
        self.enter(&mut run, request_id, PipelineStage::ZeroCheck);
        if contacts.is_empty() {
            info!(request_id, "No contacts found");
            self.enter(&mut run, request_id, PipelineStage::Done);
            return Ok(run);
        }

        // GEOGRAPHIC_GROUPING and BATCH_PLANNING
        self.enter(&mut run, request_id, PipelineStage::GeographicGrouping);
        let clock = Instant::now();
        let planner = GeographicPlanner::new(self.settings.batch_size);
        for contact in &contacts {
            let region = juso_planner::classify_region(contact.location_text());
            *run.regions.entry(region.to_string()).or_default() += 1;
        }
        self.enter(&mut run, request_id, PipelineStage::BatchPlanning);
        let batches = planner.plan(contacts);
        self.leave(&mut run, request_id, PipelineStage::BatchPlanning, clock);

        // PARALLEL_EXTRACTION
        self.enter(&mut run, request_id, PipelineStage::ParallelExtraction);
        let clock = Instant::now();
        let worker = BatchWorker::new(
            self.provider.clone(),
            AgentConfig::multi_entry(&self.settings.llm),
            &self.registry,
            self.store.clone(),
            self.settings.review,
        )
        .with_request_id(request_id);
        let outcomes = BatchOrchestrator::new(Arc::new(worker), self.settings.max_workers)
            .with_request_id(request_id)
            .run(batches)
            .await;
        self.leave(&mut run, request_id, PipelineStage::ParallelExtraction, clock);

        run.batches = outcomes.iter().map(BatchOutcome::summary).collect();
        run.entries = merge_entries(outcomes);
        if run.entries.len() != run.contacts_found {
            anyhow::bail!(
                "extraction produced {} entries for {} contacts",
                run.entries.len(),
                run.contacts_found
            );
        }

        self.enter(&mut run, request_id, PipelineStage::Done);
        Ok(run)
    }

    /// One bulk call splitting the text into loose contacts.
    async fn initial_split(&self, text: &str, request_id: &str) -> (Vec<RawContact>, String) {
        let runner = AgentRunner::new(
            self.provider.clone(),
            AgentConfig::initial_split(&self.settings.llm),
            &self.registry,
        )
        .with_request_id(request_id);

        let raw = match runner.invoke(&PromptBuilder::initial_split_prompt(text)).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(request_id, error = %e, "Initial split call failed");
                self.log_fallback(request_id, format!("initial split: {e:#}"));
                return (Vec::new(), SPLIT_FAILED.to_string());
            }
        };
        debug!(request_id, reply = %redacted_preview(&raw, 200), "Initial split reply");

        let reply = raw.as_str();
        let runner = &runner;
        let resolved = StrategyChain::<Vec<RawContact>>::new()
            .then(ExtractionMethod::JsonParsing, move || {
                async move { contacts_from_text(reply) }.boxed()
            })
            .then(ExtractionMethod::StructuredOutput, move || {
                async move {
                    let schema = StructuredSchema::of::<ContactList>("contact_list");
                    let value = runner
                        .invoke_structured(reply, &schema)
                        .await
                        .map_err(|e| format!("{e:#}"))?;
                    contacts_from_value(&value)
                }
                .boxed()
            })
            .resolve_or(Vec::new)
            .await;

        if !resolved.success() {
            warn!(request_id, failures = resolved.failures.len(), "Initial split could not be parsed");
            self.log_fallback(request_id, "initial split reply could not be parsed".to_string());
            return (Vec::new(), SPLIT_FAILED.to_string());
        }
        info!(
            request_id,
            method = %resolved.method,
            contacts = resolved.value.len(),
            "Initial split done"
        );
        (resolved.value, resolved.method.as_str().to_string())
    }

    fn enter(&self, run: &mut PipelineRun, request_id: &str, stage: PipelineStage) {
        debug_assert!(run.stage.is_none_or(|previous| previous < stage));
        run.stage = Some(stage);
        EventLogger::log_event(
            request_id,
            PipelineEvent::StageStarted {
                stage: stage.as_str().to_string(),
            },
        );
    }

    fn leave(&self, run: &mut PipelineRun, request_id: &str, stage: PipelineStage, clock: Instant) {
        let elapsed = elapsed_ms(clock);
        let key = match stage {
            PipelineStage::InitialSplit => "initial_split",
            PipelineStage::BatchPlanning => "planning",
            PipelineStage::ParallelExtraction => "extraction",
            other => other.as_str(),
        };
        run.timings_ms.insert(key, elapsed);
        EventLogger::log_event(
            request_id,
            PipelineEvent::StageCompleted {
                stage: stage.as_str().to_string(),
                elapsed_ms: elapsed,
            },
        );
    }

    fn log_fallback(&self, request_id: &str, reason: String) {
        EventLogger::log_event(
            request_id,
            PipelineEvent::FallbackUsed {
                scope: "pipeline".to_string(),
                reason,
            },
        );
    }
}

fn contacts_from_text(raw: &str) -> Attempt<Vec<RawContact>> {
    let value = parse_with_repair(raw)
        .into_value()
        .ok_or_else(|| "initial split reply is not JSON".to_string())?;
    contacts_from_value(&value)
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use juso_planner::MockProvider;
    use juso_core::LlmRequest;

    fn pipeline(provider: Arc<MockProvider>) -> MultiEntryPipeline {
        MultiEntryPipeline::new(
            provider,
            AddressLookupStore::embedded(),
            PipelineSettings::default(),
        )
    }

    fn is_split_call(req: &LlmRequest) -> bool {
        req.user_prompt.starts_with("Split this OCR text")
    }

    /// Initial split listing 7 Seoul and 5 Busan contacts.
    fn split_reply() -> String {
        let mut contacts = Vec::new();
        for i in 0..7 {
            contacts.push(json!({
                "name": format!("서울{i}"),
                "phone_number": "010-1111-2222",
                "address": format!("서울특별시 강남구 테헤란로 {}", 100 + i),
            }));
        }
        for i in 0..5 {
            contacts.push(json!({
                "name": format!("부산{i}"),
                "phone_number": "051-123-4567",
                "address": format!("부산광역시 해운대구 해운대로 {}", 500 + i),
            }));
        }
        format!("Found these contacts:\n{}", Value::Array(contacts))
    }

    fn batch_reply() -> String {
        let entries: Vec<Value> = (0..10)
            .map(|i| json!({"name": format!("이름{i}"), "confidence": {"name": 0.9}}))
            .collect();
        json!({"entries": entries, "total_entries": 10}).to_string()
    }

    #[tokio::test]
    async fn test_blank_input_makes_no_calls() {
        let provider = Arc::new(MockProvider::new("mock"));
        for text in ["", "   \n\t"] {
            let result = pipeline(provider.clone()).run(text).await;
            assert!(result.entries.is_empty());
            assert_eq!(result.total_entries, 0);
            let metadata = result.processing_metadata.unwrap();
            assert_eq!(metadata["initial_split_method"], SPLIT_SKIPPED);
        }
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_always_failing_llm_yields_empty_result() {
        let provider = Arc::new(MockProvider::new("mock").failing("service unavailable"));
        let result = pipeline(provider).run("홍길동 010-1234-5678 서울 강남구").await;
        assert!(result.entries.is_empty());
        assert_eq!(result.total_entries, 0);
        assert!(result.request_id.is_some());
        assert_eq!(
            result.processing_metadata.unwrap()["initial_split_method"],
            SPLIT_FAILED
        );
    }

    #[tokio::test]
    async fn test_panicking_llm_yields_empty_result() {
        let provider = Arc::new(MockProvider::new("mock").panicking());
        let result = pipeline(provider).run("홍길동 010-1234-5678").await;
        assert!(result.entries.is_empty());
        assert_eq!(result.total_entries, 0);
    }

    #[tokio::test]
    async fn test_empty_contact_list_short_circuits() {
        let provider = Arc::new(MockProvider::new("mock").with_response("[]"));
        let result = pipeline(provider.clone()).run("광고 전단지, 연락처 없음").await;
        assert_eq!(result.total_entries, 0);
        assert_eq!(provider.call_count(), 1);
        let metadata = result.processing_metadata.unwrap();
        assert_eq!(metadata["initial_split_method"], "json_parsing");
        assert_eq!(metadata["last_stage"], "done");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_full_run_numbers_every_contact() {
        let provider = Arc::new(MockProvider::new("mock").with_handler(|req| {
            if is_split_call(req) {
                Ok(split_reply())
            } else {
                Ok(batch_reply())
            }
        }));
        let result = pipeline(provider.clone()).run("OCR text with twelve contacts").await;

        assert_eq!(result.total_entries, 12);
        let numbers: Vec<u32> = result.entries.iter().map(|e| e.entry_number).collect();
        assert_eq!(numbers, (1..=12).collect::<Vec<u32>>());

        let metadata = result.processing_metadata.unwrap();
        assert_eq!(metadata["contacts_found"], 12);
        assert_eq!(metadata["regions"]["서울"], 7);
        assert_eq!(metadata["regions"]["부산"], 5);
        assert_eq!(metadata["batches"].as_array().unwrap().len(), 2);
        assert_eq!(metadata["raw_text"], "OCR text with twelve contacts");
        for key in ["initial_split", "planning", "extraction", "total"] {
            assert!(metadata["timings_ms"].get(key).is_some(), "missing timing {key}");
        }
        assert!(metadata["timings_ms"].get("ocr").is_none());
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failed_batch_still_counts_every_contact() {
        let provider = Arc::new(MockProvider::new("mock").with_handler(|req| {
            if is_split_call(req) {
                Ok(split_reply())
            } else if req.user_prompt.starts_with("Batch 2 of") {
                anyhow::bail!("timeout")
            } else {
                Ok(batch_reply())
            }
        }));
        let result = pipeline(provider).run_timed("scanned page", Some(42)).await;

        assert_eq!(result.total_entries, 12);
        let numbers: Vec<u32> = result.entries.iter().map(|e| e.entry_number).collect();
        assert_eq!(numbers, (1..=12).collect::<Vec<u32>>());
        assert!(result.entries[10..].iter().all(ContactEntry::is_fallback));
        assert!(!result.entries[0].is_fallback());

        let metadata = result.processing_metadata.unwrap();
        assert_eq!(metadata["timings_ms"]["ocr"], 42);
        assert_eq!(metadata["batches"][1]["success"], false);
    }

    #[tokio::test]
    async fn test_split_recovered_by_structured_output() {
        let provider = Arc::new(
            MockProvider::new("mock")
                .with_handler(|req| {
                    if is_split_call(req) {
                        Ok("I found one contact: 홍길동.".to_string())
                    } else {
                        Ok(json!({"entries": [{"name": "홍길동"}]}).to_string())
                    }
                })
                .with_structured(json!({"contacts": [{"name": "홍길동", "address": "제주특별자치도 제주시"}]})),
        );
        let result = pipeline(provider).run("홍길동 제주").await;
        assert_eq!(result.total_entries, 1);
        assert_eq!(result.entries[0].name.as_deref(), Some("홍길동"));
        assert_eq!(
            result.processing_metadata.unwrap()["initial_split_method"],
            "structured_output"
        );
    }

    #[test]
    fn test_stages_are_ordered() {
        assert!(PipelineStage::Start < PipelineStage::InitialSplit);
        assert!(PipelineStage::ParallelExtraction < PipelineStage::Done);
        assert_eq!(PipelineStage::BatchPlanning.to_string(), "batch_planning");
    }
}
