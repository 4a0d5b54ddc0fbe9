//! Parallel batch orchestrator.
//!
//! Batches run in fixed-width groups: up to `max_workers` spawned tasks at a
//! time, and a group drains completely before the next starts. Entry offsets
//! are fixed before dispatch, so completion order never shows in the output.

use std::sync::Arc;

use tracing::{debug, error, info};

use juso_core::{Batch, ContactEntry};
use juso_logging::{EventLogger, PipelineEvent};
use juso_planner::assign_entry_offsets;

use crate::worker::{BatchOutcome, BatchWorker};

pub const DEFAULT_MAX_WORKERS: usize = 4;

pub struct BatchOrchestrator {
    worker: Arc<BatchWorker>,
    max_workers: usize,
    request_id: String,
}

impl BatchOrchestrator {
    pub fn new(worker: Arc<BatchWorker>, max_workers: usize) -> Self {
        Self {
            worker,
            max_workers: max_workers.max(1),
            request_id: String::new(),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Run every batch and return their outcomes in plan order.
    pub async fn run(&self, mut batches: Vec<Batch>) -> Vec<BatchOutcome> {
        assign_entry_offsets(&mut batches);
        let total = batches.len();
        let planned: Vec<(usize, Batch)> = batches
            .into_iter()
            .enumerate()
            .map(|(i, batch)| (i + 1, batch))
            .collect();

        let mut outcomes = Vec::with_capacity(total);
        for (group_no, group) in planned.chunks(self.max_workers).enumerate() {
            debug!(group = group_no + 1, size = group.len(), "Dispatching batch group");

            let handles: Vec<_> = group
                .iter()
                .map(|(index, batch)| {
                    let worker = Arc::clone(&self.worker);
                    let batch = batch.clone();
                    let index = *index;
                    tokio::spawn(async move { worker.run(&batch, index, total).await })
                })
                .collect();

            let joined = futures::future::join_all(handles).await;
            let mut completed: Vec<BatchOutcome> = joined
                .into_iter()
                .zip(group)
                .map(|(joined, (index, batch))| match joined {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!(batch = index, error = %e, "Batch worker crashed");
                        EventLogger::log_event(
                            &self.request_id,
                            PipelineEvent::FallbackUsed {
                                scope: format!("batch {index}"),
                                reason: format!("worker crashed: {e}"),
                            },
                        );
                        BatchOutcome::fallback(batch, *index)
                    }
                })
                .collect();
            completed.sort_by_key(|outcome| outcome.index);

            for outcome in &completed {
                EventLogger::log_event(
                    &self.request_id,
                    PipelineEvent::BatchCompleted {
                        batch_index: outcome.index,
                        region: outcome.region.clone(),
                        method: outcome.method.as_str().to_string(),
                        success: outcome.success,
                        entries: outcome.entries.len(),
                    },
                );
            }
            outcomes.extend(completed);
        }

        info!(
            batches = total,
            failed = outcomes.iter().filter(|o| !o.success).count(),
            "Batch extraction finished"
        );
        outcomes
    }
}

/// Concatenate entries of outcomes already in plan order.
pub fn merge_entries(outcomes: Vec<BatchOutcome>) -> Vec<ContactEntry> {
    outcomes.into_iter().flat_map(|outcome| outcome.entries).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use juso_core::{BatchType, RawContact};
    use juso_planner::MockProvider;
    use juso_tools::{AddressLookupStore, ReviewPolicy, default_registry};
    use serde_json::json;

    use crate::agent_config::{AgentConfig, LlmSettings};
    use crate::strategy::ExtractionMethod;

    fn batches(sizes: &[usize]) -> Vec<Batch> {
        sizes
            .iter()
            .map(|&size| Batch {
                region: "서울".into(),
                contacts: vec![
                    RawContact {
                        name: Some("홍길동".into()),
                        address: Some("서울 강남구 테헤란로 1".into()),
                        ..Default::default()
                    };
                    size
                ],
                batch_type: BatchType::LargeRegionFull,
                entry_offset: 0,
            })
            .collect()
    }

    /// A reply with `n` plain entries.
    fn reply(n: usize) -> String {
        let entries: Vec<_> = (0..n)
            .map(|i| json!({"name": format!("홍길동{i}"), "confidence": {"name": 0.9}}))
            .collect();
        json!({"entries": entries}).to_string()
    }

    fn batch_number(prompt: &str) -> usize {
        prompt
            .strip_prefix("Batch ")
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|n| n.parse().ok())
            .unwrap_or(0)
    }

    fn orchestrator(provider: Arc<MockProvider>, max_workers: usize) -> BatchOrchestrator {
        let store = AddressLookupStore::embedded();
        let worker = BatchWorker::new(
            provider,
            AgentConfig::multi_entry(&LlmSettings::default()),
            &default_registry(store.clone()),
            store,
            ReviewPolicy::default(),
        );
        BatchOrchestrator::new(Arc::new(worker), max_workers)
    }

    fn numbers(outcomes: &[BatchOutcome]) -> Vec<u32> {
        outcomes
            .iter()
            .flat_map(|o| o.entries.iter().map(|e| e.entry_number))
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_failed_batch_keeps_numbering() {
        let provider = Arc::new(MockProvider::new("mock").with_handler(|req| {
            if batch_number(&req.user_prompt) == 2 {
                anyhow::bail!("connection reset");
            }
            Ok(reply(10))
        }));
        let outcomes = orchestrator(provider, 4).run(batches(&[10, 10, 3])).await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].success && outcomes[2].success);
        assert!(!outcomes[1].success);
        assert_eq!(outcomes[1].entry_offset, 11);
        assert!(outcomes[1].entries.iter().all(ContactEntry::is_fallback));
        assert_eq!(numbers(&outcomes), (1..=23).collect::<Vec<u32>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_out_of_order_completion_keeps_plan_order() {
        let provider = Arc::new(MockProvider::new("mock").with_handler(|req| {
            // Earlier batches finish last.
            let n = batch_number(&req.user_prompt);
            std::thread::sleep(Duration::from_millis(60u64.saturating_sub(n as u64 * 10)));
            Ok(reply(2))
        }));
        let outcomes = orchestrator(provider, 4).run(batches(&[2, 2, 2, 2, 2])).await;

        let indexes: Vec<usize> = outcomes.iter().map(|o| o.index).collect();
        assert_eq!(indexes, vec![1, 2, 3, 4, 5]);
        assert_eq!(numbers(&outcomes), (1..=10).collect::<Vec<u32>>());
        assert!(outcomes.iter().all(|o| o.method == ExtractionMethod::JsonParsing));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrency_is_bounded_per_group() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (current, highest) = (in_flight.clone(), peak.clone());
        let provider = Arc::new(MockProvider::new("mock").with_handler(move |_| {
            let now = current.fetch_add(1, Ordering::SeqCst) + 1;
            highest.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            current.fetch_sub(1, Ordering::SeqCst);
            Ok(reply(1))
        }));
        let outcomes = orchestrator(provider.clone(), 4).run(batches(&[1; 10])).await;

        assert_eq!(outcomes.len(), 10);
        assert_eq!(provider.call_count(), 10);
        assert!(peak.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_worker_panic_becomes_fallback() {
        let provider = Arc::new(MockProvider::new("mock").with_handler(|req| {
            if batch_number(&req.user_prompt) == 1 {
                panic!("worker blew up");
            }
            Ok(reply(5))
        }));
        let outcomes = orchestrator(provider, 4).run(batches(&[5, 5])).await;

        assert!(!outcomes[0].success);
        assert_eq!(outcomes[0].entries.len(), 5);
        assert!(outcomes[0].entries.iter().all(|e| e.human_review));
        assert!(outcomes[1].success);
        assert_eq!(numbers(&outcomes), (1..=10).collect::<Vec<u32>>());

        let merged = merge_entries(outcomes);
        assert_eq!(merged.len(), 10);
    }

    #[tokio::test]
    async fn test_no_batches() {
        let provider = Arc::new(MockProvider::new("mock"));
        assert!(orchestrator(provider.clone(), 4).run(Vec::new()).await.is_empty());
        assert_eq!(provider.call_count(), 0);
    }

    #[test]
    fn test_zero_workers_is_clamped() {
        let provider = Arc::new(MockProvider::new("mock"));
        assert_eq!(orchestrator(provider, 0).max_workers(), 1);
    }
}
