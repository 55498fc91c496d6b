//! Durable step wrapping.
//!
//! Running a node and deciding whether/how to retry it are kept as separate
//! concerns: retry policy belongs to whatever invokes a node, not to the
//! node-invocation call site itself. `StepRunner` is the seam the executor
//! calls through; the retry loop and backoff it wraps are unchanged in
//! substance from a direct inline retry.
//!
//! `step` takes a `Fn` returning a boxed future rather than a generic async
//! closure so `StepRunner` stays object-safe — the scheduler picks
//! `DirectRunner` or `DurableRunner` at construction time behind an
//! `Arc<dyn StepRunner>`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::warn;

use nodes::{NodeError, NodeOutcome};

/// Tuning knobs for the retry loop.
#[derive(Debug, Clone)]
pub struct StepConfig {
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_base_delay: Duration::from_millis(100),
        }
    }
}

/// Outcome of a step that exhausted its retries or hit a fatal error —
/// the executor turns this into `NodeExecutionResult::Errored`.
#[derive(Debug, Clone)]
pub struct StepFailure {
    pub message: String,
}

pub type StepFuture<'a> = Pin<Box<dyn Future<Output = Result<NodeOutcome, NodeError>> + Send + 'a>>;

/// Wraps one unit of node work. `name` identifies the step for replay
/// (durable runner) and logging; `f` is called once per attempt.
#[async_trait]
pub trait StepRunner: Send + Sync {
    async fn step<'a>(
        &'a self,
        name: &str,
        f: &'a (dyn Fn() -> StepFuture<'a> + Send + Sync),
    ) -> Result<NodeOutcome, StepFailure>;

    /// Sleep for `ms` milliseconds. On the durable runner, a replayed sleep
    /// whose simulated clock shows it already elapsed returns immediately.
    async fn sleep(&self, ms: u64);
}

/// Calls the node implementation once per attempt with no replay cache —
/// correct for the in-process/dev-mode execution path.
#[derive(Debug, Clone, Default)]
pub struct DirectRunner {
    config: StepConfig,
}

impl DirectRunner {
    pub fn new(config: StepConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl StepRunner for DirectRunner {
    async fn step<'a>(
        &'a self,
        name: &str,
        f: &'a (dyn Fn() -> StepFuture<'a> + Send + Sync),
    ) -> Result<NodeOutcome, StepFailure> {
        run_with_retry(name, &self.config, f).await
    }

    async fn sleep(&self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

/// Replay cache shared across every step in one execution, keyed by step
/// name. A durable host (queue worker resuming a crashed execution) would
/// populate this from a persisted event log before re-running; in-process
/// it simply survives for the lifetime of one `Scheduler::run` call.
pub type ReplayCache = Arc<DashMap<String, serde_json::Value>>;

/// Wraps steps with a replay cache and the retry loop, so a step that
/// already recorded a result on a previous attempt is never re-invoked.
pub struct DurableRunner {
    config: StepConfig,
    cache: ReplayCache,
}

impl DurableRunner {
    pub fn new(config: StepConfig, cache: ReplayCache) -> Self {
        Self { config, cache }
    }
}

#[async_trait]
impl StepRunner for DurableRunner {
    async fn step<'a>(
        &'a self,
        name: &str,
        f: &'a (dyn Fn() -> StepFuture<'a> + Send + Sync),
    ) -> Result<NodeOutcome, StepFailure> {
        if let Some(cached) = self.cache.get(name) {
            if let Ok(outcome) = serde_json::from_value(cached.clone()) {
                return Ok(outcome);
            }
        }

        let outcome = run_with_retry(name, &self.config, f).await?;
        if let Ok(value) = serde_json::to_value(&outcome) {
            self.cache.insert(name.to_string(), value);
        }
        Ok(outcome)
    }

    async fn sleep(&self, ms: u64) {
        let key = format!("sleep:{ms}");
        if self.cache.contains_key(&key) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(ms)).await;
        self.cache.insert(key, serde_json::Value::Bool(true));
    }
}

async fn run_with_retry<'a>(
    name: &str,
    config: &StepConfig,
    f: &(dyn Fn() -> StepFuture<'a> + Send + Sync),
) -> Result<NodeOutcome, StepFailure> {
    let mut attempts = 0u32;

    loop {
        match f().await {
            Ok(outcome) => return Ok(outcome),

            Err(NodeError::Fatal(message)) => {
                return Err(StepFailure { message });
            }

            Err(NodeError::Retryable(message)) => {
                attempts += 1;
                if attempts > config.max_retries {
                    return Err(StepFailure {
                        message: format!("retries exhausted after {attempts} attempts: {message}"),
                    });
                }

                let delay = config.retry_base_delay * 2u32.pow(attempts.saturating_sub(1));
                warn!(
                    step = name,
                    attempt = attempts,
                    max_retries = config.max_retries,
                    ?delay,
                    "retryable step failure, retrying: {message}"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
