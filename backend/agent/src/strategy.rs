//! Ordered extraction strategies with a first-success-wins reducer.

use std::fmt;

use futures::future::BoxFuture;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    JsonParsing,
    StructuredOutput,
    Fallback,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JsonParsing => "json_parsing",
            Self::StructuredOutput => "structured_output",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one strategy. Failures carry a reason for the log.
pub type Attempt<T> = Result<T, String>;

type Step<'a, T> = Box<dyn FnOnce() -> BoxFuture<'a, Attempt<T>> + Send + 'a>;

/// Winning value, the strategy that produced it, and the reasons earlier ones failed.
#[derive(Debug)]
pub struct Resolved<T> {
    pub value: T,
    pub method: ExtractionMethod,
    pub failures: Vec<(ExtractionMethod, String)>,
}

impl<T> Resolved<T> {
    /// True unless the infallible last resort was used.
    pub fn success(&self) -> bool {
        self.method != ExtractionMethod::Fallback
    }
}

/// Strategies are built lazily, so a later one only runs if all earlier ones failed.
pub struct StrategyChain<'a, T> {
    steps: Vec<(ExtractionMethod, Step<'a, T>)>,
}

impl<'a, T: Send + 'a> StrategyChain<'a, T> {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn then<F>(mut self, method: ExtractionMethod, step: F) -> Self
    where
        F: FnOnce() -> BoxFuture<'a, Attempt<T>> + Send + 'a,
    {
        self.steps.push((method, Box::new(step)));
        self
    }

    /// Run strategies in order; if none succeeds, use `fallback`.
    pub async fn resolve_or<F>(self, fallback: F) -> Resolved<T>
    where
        F: FnOnce() -> T,
    {
        let mut failures = Vec::new();
        for (method, step) in self.steps {
            match step().await {
                Ok(value) => {
                    return Resolved {
                        value,
                        method,
                        failures,
                    };
                }
                Err(reason) => {
                    debug!(method = %method, reason = %reason, "Extraction strategy failed");
                    failures.push((method, reason));
                }
            }
        }
        Resolved {
            value: fallback(),
            method: ExtractionMethod::Fallback,
            failures,
        }
    }
}

impl<'a, T: Send + 'a> Default for StrategyChain<'a, T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_first_success_wins_and_later_steps_do_not_run() {
        let ran = AtomicUsize::new(0);
        let resolved = StrategyChain::<i32>::new()
            .then(ExtractionMethod::JsonParsing, || async { Ok(1) }.boxed())
            .then(ExtractionMethod::StructuredOutput, || {
                ran.fetch_add(1, Ordering::SeqCst);
                async { Ok(2) }.boxed()
            })
            .resolve_or(|| 0)
            .await;
        assert_eq!(resolved.value, 1);
        assert_eq!(resolved.method, ExtractionMethod::JsonParsing);
        assert!(resolved.success());
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_falls_through_to_fallback() {
        let resolved = StrategyChain::<Vec<u32>>::new()
            .then(ExtractionMethod::JsonParsing, || async { Err("bad json".to_string()) }.boxed())
            .then(ExtractionMethod::StructuredOutput, || async { Err("schema".to_string()) }.boxed())
            .resolve_or(|| vec![0u32])
            .await;
        assert_eq!(resolved.method, ExtractionMethod::Fallback);
        assert!(!resolved.success());
        assert_eq!(resolved.failures.len(), 2);
        assert_eq!(resolved.value, vec![0]);
    }

    #[tokio::test]
    async fn test_second_strategy_recovers() {
        let resolved = StrategyChain::<&str>::new()
            .then(ExtractionMethod::JsonParsing, || async { Err("x".to_string()) }.boxed())
            .then(ExtractionMethod::StructuredOutput, || async { Ok("structured") }.boxed())
            .resolve_or(|| "fallback")
            .await;
        assert_eq!(resolved.value, "structured");
        assert_eq!(resolved.failures[0].0, ExtractionMethod::JsonParsing);
    }
}
