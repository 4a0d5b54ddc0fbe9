//! Batch extraction worker.
//!
//! One LLM call per batch, then an ordered strategy chain over the reply:
//! repair-and-parse the `entries` object, else ask for the same answer as
//! schema-constrained output, else synthesize one reviewable placeholder per
//! contact. A worker always returns exactly one entry per input contact.

use std::sync::Arc;

use futures::FutureExt;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use juso_core::{
    Batch, BatchType, ContactEntry, LlmProvider, MultiEntryResult, PhoneType, RawContact,
    StructuredSchema, ToolRegistry,
};
use juso_logging::{EventLogger, PipelineEvent, redacted_preview};
use juso_tools::{AddressLookupStore, ReviewPolicy, canonicalize_phone, classify_phone};

use crate::agent_config::AgentConfig;
use crate::agent_loop::AgentRunner;
use crate::json_repair::parse_with_repair;
use crate::response::entries_from_value;
use crate::strategy::{Attempt, ExtractionMethod, StrategyChain};
use crate::system_prompt::PromptBuilder;

static ENTRIES_KEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""entries"\s*:\s*\["#).unwrap());

/// Result of one batch, numbered and ready to merge.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    /// 1-based position in the plan.
    pub index: usize,
    pub region: String,
    pub batch_type: BatchType,
    pub size: usize,
    pub entry_offset: u32,
    #[serde(skip)]
    pub entries: Vec<ContactEntry>,
    pub method: ExtractionMethod,
    pub success: bool,
}

impl BatchOutcome {
    /// Placeholder entries for every contact of `batch`.
    pub fn fallback(batch: &Batch, index: usize) -> Self {
        Self {
            index,
            region: batch.region.clone(),
            batch_type: batch.batch_type,
            size: batch.len(),
            entry_offset: batch.entry_offset,
            entries: fallback_entries(batch),
            method: ExtractionMethod::Fallback,
            success: false,
        }
    }

    pub fn summary(&self) -> Value {
        serde_json::json!({
            "index": self.index,
            "region": self.region,
            "batch_type": self.batch_type.as_str(),
            "size": self.size,
            "entry_offset": self.entry_offset,
            "method": self.method.as_str(),
            "success": self.success,
        })
    }
}

pub fn fallback_entries(batch: &Batch) -> Vec<ContactEntry> {
    (0..batch.len() as u32)
        .map(|i| ContactEntry::fallback(batch.entry_offset + i))
        .collect()
}

pub struct BatchWorker {
    runner: AgentRunner,
    store: Arc<AddressLookupStore>,
    review: ReviewPolicy,
    request_id: String,
}

impl BatchWorker {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        config: AgentConfig,
        registry: &ToolRegistry,
        store: Arc<AddressLookupStore>,
        review: ReviewPolicy,
    ) -> Self {
        Self {
            runner: AgentRunner::new(provider, config, registry),
            store,
            review,
            request_id: String::new(),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        let request_id = request_id.into();
        self.runner = self.runner.with_request_id(request_id.clone());
        self.request_id = request_id;
        self
    }

    /// Extract `batch`, the `index`-th of `total`. Never fails.
    pub async fn run(&self, batch: &Batch, index: usize, total: usize) -> BatchOutcome {
        info!(
            batch = index,
            total,
            region = %batch.region,
            batch_type = %batch.batch_type,
            size = batch.len(),
            "Processing batch"
        );
        if batch.is_empty() {
            return BatchOutcome {
                success: true,
                ..BatchOutcome::fallback(batch, index)
            };
        }

        let prompt = PromptBuilder::batch_prompt(batch, index, total);
        let raw = match self.runner.invoke(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(batch = index, error = %e, "Batch LLM call failed");
                self.log_fallback(index, format!("llm call failed: {e:#}"));
                return BatchOutcome::fallback(batch, index);
            }
        };
        debug!(batch = index, reply = %redacted_preview(&raw, 200), "Batch reply");

        let reply = raw.as_str();
        let resolved = StrategyChain::<Vec<ContactEntry>>::new()
            .then(ExtractionMethod::JsonParsing, move || {
                async move { entries_from_text(reply) }.boxed()
            })
            .then(ExtractionMethod::StructuredOutput, move || {
                self.structured_entries(reply).boxed()
            })
            .resolve_or(Vec::new)
            .await;

        if !resolved.success() {
            let reasons: Vec<String> = resolved
                .failures
                .iter()
                .map(|(method, reason)| format!("{method}: {reason}"))
                .collect();
            warn!(batch = index, "All extraction strategies failed");
            self.log_fallback(index, reasons.join("; "));
            return BatchOutcome::fallback(batch, index);
        }

        let entries = self.normalize(batch, index, resolved.value);
        info!(
            batch = index,
            method = %resolved.method,
            entries = entries.len(),
            "Batch extracted"
        );
        BatchOutcome {
            index,
            region: batch.region.clone(),
            batch_type: batch.batch_type,
            size: batch.len(),
            entry_offset: batch.entry_offset,
            entries,
            method: resolved.method,
            success: true,
        }
    }

    async fn structured_entries(&self, raw: &str) -> Attempt<Vec<ContactEntry>> {
        let schema = StructuredSchema::of::<MultiEntryResult>("multi_entry_result");
        let value = self
            .runner
            .invoke_structured(raw, &schema)
            .await
            .map_err(|e| format!("{e:#}"))?;
        entries_from_value(&value)
    }

    /// One entry per contact in input order, numbered from the batch offset.
    /// Extra model entries are dropped; missing ones become placeholders.
    fn normalize(&self, batch: &Batch, index: usize, entries: Vec<ContactEntry>) -> Vec<ContactEntry> {
        if entries.len() != batch.len() {
            warn!(
                batch = index,
                expected = batch.len(),
                returned = entries.len(),
                "Model returned a different number of entries"
            );
        }
        let mut entries = entries.into_iter();
        batch
            .contacts
            .iter()
            .zip(batch.entry_offset..)
            .map(|(contact, number)| match entries.next() {
                Some(entry) if !entry.is_fallback() => self.finalize(entry, contact, number),
                _ => ContactEntry::fallback(number),
            })
            .collect()
    }

    fn finalize(&self, mut entry: ContactEntry, contact: &RawContact, number: u32) -> ContactEntry {
        entry.entry_number = number;

        if let Some(canonical) = entry.phone_number.as_deref().and_then(canonicalize_phone) {
            let detected = classify_phone(&canonical);
            if matches!(entry.phone_type, None | Some(PhoneType::Unknown)) {
                entry.phone_type = Some(detected);
            }
            if detected == PhoneType::Cellphone {
                entry.phone_number = Some(canonical);
            }
        } else if entry.phone_number.is_some() && entry.phone_type.is_none() {
            entry.phone_type = Some(PhoneType::Unknown);
        }

        let source = source_text(contact);
        let mut address = self.review.apply(entry.address, &source, &self.store);
        if address.is_empty() && !contact.location_text().trim().is_empty() {
            address.human_review = true;
        }

        let threshold = self.review.low_confidence_threshold;
        entry.human_review = entry.human_review
            || address.human_review
            || entry.confidence.values().any(|score| *score < threshold);
        entry.address = address;
        entry
    }

    fn log_fallback(&self, index: usize, reason: String) {
        EventLogger::log_event(
            &self.request_id,
            PipelineEvent::FallbackUsed {
                scope: format!("batch {index}"),
                reason,
            },
        );
    }
}

/// Entries from the first object in `raw` that holds an `"entries"` array.
///
/// Each `{` before the key is tried as the object start, leftmost first, up to
/// the last `}` of the reply; the key may sit anywhere in the object.
fn entries_from_text(raw: &str) -> Attempt<Vec<ContactEntry>> {
    let key = ENTRIES_KEY_RE
        .find(raw)
        .ok_or_else(|| "no entries array in reply".to_string())?;
    let end = raw
        .rfind('}')
        .filter(|&end| end > key.end())
        .ok_or_else(|| "entries object is not closed".to_string())?;

    let mut last_error = "no object encloses the entries array".to_string();
    for (start, _) in raw[..key.start()].match_indices('{') {
        let Some(value) = parse_with_repair(&raw[start..=end]).into_value() else {
            last_error = "entries object could not be repaired".to_string();
            continue;
        };
        match entries_from_value(&value) {
            Ok(entries) => return Ok(entries),
            Err(reason) => last_error = reason,
        }
    }
    Err(last_error)
}

/// Everything the contact's text said, for the alteration check.
fn source_text(contact: &RawContact) -> String {
    [
        &contact.raw_text,
        &contact.address,
        &contact.phone_number,
        &contact.name,
    ]
    .into_iter()
    .filter_map(|field| field.as_deref())
    .collect::<Vec<_>>()
    .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_config::LlmSettings;
    use juso_planner::MockProvider;
    use juso_tools::default_registry;
    use serde_json::json;

    fn contact(name: &str, address: &str) -> RawContact {
        RawContact {
            name: Some(name.into()),
            phone_number: Some("010 1234 5678".into()),
            address: Some(address.into()),
            raw_text: None,
        }
    }

    fn batch(size: usize, offset: u32) -> Batch {
        Batch {
            region: "서울".into(),
            contacts: (0..size)
                .map(|i| contact(&format!("이름{i}"), "서울 강남구 테헤란로 123"))
                .collect(),
            batch_type: BatchType::LargeRegionFull,
            entry_offset: offset,
        }
    }

    fn entry_json(name: &str) -> Value {
        json!({
            "name": name,
            "phone_number": "01012345678",
            "address": {
                "sido": "서울", "sigungu": "강남구", "road_name": "테헤란로",
                "building_number": "123",
                "confidence": {"sido": 0.8, "sigungu": 0.9, "road_name": 0.9, "building_number": 0.9}
            },
            "confidence": {"name": 0.95, "phone": 0.95, "address": 0.9},
            "entry_number": 7,
            "human_review": false
        })
    }

    fn worker(provider: Arc<MockProvider>) -> BatchWorker {
        let store = AddressLookupStore::embedded();
        BatchWorker::new(
            provider,
            AgentConfig::multi_entry(&LlmSettings::default()),
            &default_registry(store.clone()),
            store,
            ReviewPolicy::default(),
        )
    }

    #[tokio::test]
    async fn test_json_path_renumbers_and_validates() {
        let reply = format!(
            "Here is the result:\n{}\nLet me know if you need more.",
            json!({"entries": [entry_json("김철수"), entry_json("이영희")], "total_entries": 2})
        );
        let provider = Arc::new(MockProvider::new("mock").with_response(reply));
        let outcome = worker(provider.clone()).run(&batch(2, 11), 2, 3).await;

        assert!(outcome.success);
        assert_eq!(outcome.method, ExtractionMethod::JsonParsing);
        assert_eq!(provider.call_count(), 1);
        let numbers: Vec<u32> = outcome.entries.iter().map(|e| e.entry_number).collect();
        assert_eq!(numbers, vec![11, 12]);

        let first = &outcome.entries[0];
        assert_eq!(first.phone_number.as_deref(), Some("010-1234-5678"));
        assert_eq!(first.phone_type, Some(PhoneType::Cellphone));
        assert_eq!(first.address.sido.as_deref(), Some("서울특별시"));
        assert_eq!(first.address.confidence["sido"], 1.0);
        assert!(!first.address.human_review);
        assert!(!first.human_review);
    }

    #[tokio::test]
    async fn test_entries_key_after_other_fields_takes_json_path() {
        let reply = format!(
            "Notes {{checked}}:\n{{\"total_entries\": 2, \"entries\": [{}, {}]}}",
            entry_json("김철수"),
            entry_json("이영희")
        );
        let provider = Arc::new(MockProvider::new("mock").with_response(reply));
        let outcome = worker(provider.clone()).run(&batch(2, 1), 1, 1).await;

        assert_eq!(outcome.method, ExtractionMethod::JsonParsing);
        assert_eq!(provider.call_count(), 1);
        assert_eq!(outcome.entries[1].name.as_deref(), Some("이영희"));
    }

    #[tokio::test]
    async fn test_missing_comma_is_repaired() {
        let reply = r#"{"entries": [{"name":"테스트1"}{"name":"테스트2"}]}"#;
        let provider = Arc::new(MockProvider::new("mock").with_response(reply));
        let outcome = worker(provider).run(&batch(2, 1), 1, 1).await;
        assert_eq!(outcome.method, ExtractionMethod::JsonParsing);
        assert_eq!(outcome.entries[1].name.as_deref(), Some("테스트2"));
        // No address extracted although the contact had one.
        assert!(outcome.entries[0].human_review);
    }

    #[tokio::test]
    async fn test_structured_output_recovers_prose_reply() {
        let provider = Arc::new(
            MockProvider::new("mock")
                .with_response("I could not format this as JSON, sorry.")
                .with_structured(json!({"entries": [entry_json("김철수")]})),
        );
        let outcome = worker(provider.clone()).run(&batch(1, 5), 1, 1).await;
        assert!(outcome.success);
        assert_eq!(outcome.method, ExtractionMethod::StructuredOutput);
        assert_eq!(outcome.entries[0].entry_number, 5);
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_connection_fault_yields_placeholders() {
        let provider = Arc::new(MockProvider::new("mock").failing("connection refused"));
        let outcome = worker(provider.clone()).run(&batch(10, 21), 3, 3).await;

        assert!(!outcome.success);
        assert_eq!(outcome.method, ExtractionMethod::Fallback);
        assert_eq!(outcome.entries.len(), 10);
        assert_eq!(provider.call_count(), 1);
        for (entry, expected) in outcome.entries.iter().zip(21..) {
            assert_eq!(entry.entry_number, expected);
            assert!(entry.human_review);
            assert_eq!(entry.confidence.get("error"), Some(&0.0));
            assert!(entry.address.is_empty());
        }
    }

    #[tokio::test]
    async fn test_unparseable_everything_falls_back() {
        let provider = Arc::new(MockProvider::new("mock").with_response("no json at all"));
        let outcome = worker(provider).run(&batch(3, 1), 1, 1).await;
        assert!(!outcome.success);
        assert_eq!(outcome.entries.len(), 3);
        assert!(outcome.entries.iter().all(ContactEntry::is_fallback));
    }

    #[tokio::test]
    async fn test_entry_count_is_normalized() {
        let too_many = json!({"entries": [entry_json("a"), entry_json("b"), entry_json("c")]});
        let provider = Arc::new(MockProvider::new("mock").with_response(too_many.to_string()));
        let outcome = worker(provider).run(&batch(2, 1), 1, 1).await;
        assert_eq!(outcome.entries.len(), 2);
        assert_eq!(outcome.entries[1].name.as_deref(), Some("b"));

        let too_few = json!({"entries": [entry_json("a")]});
        let provider = Arc::new(MockProvider::new("mock").with_response(too_few.to_string()));
        let outcome = worker(provider).run(&batch(3, 4), 1, 1).await;
        assert!(outcome.success);
        let numbers: Vec<u32> = outcome.entries.iter().map(|e| e.entry_number).collect();
        assert_eq!(numbers, vec![4, 5, 6]);
        assert!(!outcome.entries[0].is_fallback());
        assert!(outcome.entries[1].is_fallback() && outcome.entries[2].is_fallback());
    }

    #[tokio::test]
    async fn test_unpaired_unit_and_low_confidence_flag_review() {
        let mut unpaired = entry_json("a");
        unpaired["address"]["ho"] = json!("303호");
        let mut doubtful = entry_json("b");
        doubtful["confidence"]["name"] = json!(0.2);
        let reply = json!({"entries": [unpaired, doubtful]});
        let provider = Arc::new(MockProvider::new("mock").with_response(reply.to_string()));
        let outcome = worker(provider).run(&batch(2, 1), 1, 1).await;

        assert!(outcome.entries[0].address.human_review);
        assert!(outcome.entries[0].human_review);
        assert!(!outcome.entries[1].address.human_review);
        assert!(outcome.entries[1].human_review);
    }

    #[tokio::test]
    async fn test_unconfirmed_alteration_is_capped() {
        let mut altered = entry_json("a");
        altered["address"]["dong"] = json!("20동");
        altered["address"]["ho"] = json!("101호");
        altered["address"]["confidence"]["dong"] = json!(0.9);
        altered["address"]["confidence"]["ho"] = json!(0.9);
        let provider = Arc::new(
            MockProvider::new("mock").with_response(json!({"entries": [altered]}).to_string()),
        );
        let mut input = batch(1, 1);
        input.contacts[0].address = Some("서울 강남구 테헤란로 123 20이동 101호".into());
        let outcome = worker(provider).run(&input, 1, 1).await;

        let address = &outcome.entries[0].address;
        assert!(address.confidence["dong"] < 0.3);
        assert_eq!(address.confidence["ho"], 0.9);
        assert!(outcome.entries[0].human_review);
    }

    #[test]
    fn test_summary_shape() {
        let outcome = BatchOutcome::fallback(&batch(4, 7), 2);
        let summary = outcome.summary();
        assert_eq!(summary["index"], 2);
        assert_eq!(summary["size"], 4);
        assert_eq!(summary["method"], "fallback");
        assert_eq!(summary["success"], false);
        assert_eq!(outcome.entries.last().unwrap().entry_number, 10);
    }
}
