//! Agent scheduler & task executor (§4.3).
//!
//! Given the identifier set and mode, dispatches one task per applicable
//! (enabled, dependency-satisfied) adapter in parallel, honouring a bounded
//! concurrency limit and per-task deadlines, and resolving the adapter
//! dependency graph into topological levels so within-level tasks still run
//! concurrently. Mirrors the fan-out/join-at-a-barrier shape the source
//! lineage's orchestration layer uses for its own parallel execution mode,
//! generalized from "one `tokio::spawn` per agent, `join_all` the handles" to
//! "one `tokio::spawn` per adapter, per topological level, bounded by a
//! semaphore".

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::rca::adapter::{AdapterConfig, AdapterContext, AdapterError, AdapterOutput, AdapterRegistry, DataSourceAdapter};
use crate::rca::evidence::Evidence;
use crate::rca::ticket::{Identifiers, Mode};

/// One adapter's outcome for a sweep, after retries and timeout handling have
/// already been applied.
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub adapter_name: String,
    pub evidence: Vec<Evidence>,
    pub raw_payload: Option<serde_json::Value>,
    pub error: Option<String>,
    pub duration: Duration,
}

/// Resolve adapters into topological levels by their declared dependencies
/// (§4.3's "Dependency graph"). Adapters with unmet dependencies (a
/// dependency that is not in `registry` or not enabled) are scheduled in the
/// final level with their dependency simply absent from the context — the
/// adapter contract requires every implementation to tolerate a missing
/// upstream result.
pub fn topological_levels(adapters: &[Arc<dyn DataSourceAdapter>]) -> Vec<Vec<Arc<dyn DataSourceAdapter>>> {
    let by_name: HashMap<&str, &Arc<dyn DataSourceAdapter>> = adapters.iter().map(|a| (a.name(), a)).collect();
    let mut placed: HashSet<String> = HashSet::new();
    let mut levels: Vec<Vec<Arc<dyn DataSourceAdapter>>> = Vec::new();
    let mut remaining: Vec<Arc<dyn DataSourceAdapter>> = adapters.to_vec();

    while !remaining.is_empty() {
        let (ready, not_ready): (Vec<_>, Vec<_>) = remaining.into_iter().partition(|a| {
            a.dependencies().iter().all(|dep| placed.contains(*dep) || !by_name.contains_key(dep))
        });
        if ready.is_empty() {
            // Cyclic or otherwise unresolvable dependency declarations: schedule
            // everything that's left in one final level rather than deadlocking.
            levels.push(not_ready);
            break;
        }
        for a in &ready {
            placed.insert(a.name().to_string());
        }
        levels.push(ready);
        remaining = not_ready;
    }
    levels
}

/// Dispatches one sweep of tasks: resolves dependency levels, runs each level
/// with bounded concurrency, retries `Transient` adapter errors up to the
/// adapter's configured budget, and converts unrecoverable failures into the
/// documented weight-1 negative evidence item.
pub struct Scheduler {
    pub concurrency_limit: usize,
    pub default_task_deadline: Duration,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self { concurrency_limit: 8, default_task_deadline: Duration::from_secs(15) }
    }
}

impl Scheduler {
    pub fn new(concurrency_limit: usize, default_task_deadline: Duration) -> Self {
        Self { concurrency_limit, default_task_deadline }
    }

    /// Run one `collecting` sweep over `registry`'s enabled adapters for the
    /// given `identifiers`/`mode`, returning one [`TaskResult`] per adapter
    /// that was dispatched. A `cancelled` watch value observed mid-sweep
    /// causes remaining levels to be skipped (§5's cancellation propagation).
    pub async fn run_sweep(
        &self,
        registry: &AdapterRegistry,
        investigation_id: &str,
        identifiers: &Identifiers,
        mode: Mode,
        cancelled: &tokio::sync::watch::Receiver<bool>,
    ) -> Vec<TaskResult> {
        let adapters = registry.enabled();
        let levels = topological_levels(&adapters);
        let semaphore = Arc::new(Semaphore::new(self.concurrency_limit.max(1)));
        let mut all_results = Vec::new();
        let mut context = AdapterContext::new(investigation_id.to_string());

        for level in levels {
            if *cancelled.borrow() {
                log::info!("investigation {investigation_id} cancelled before sweep level completed");
                break;
            }
            let mut handles = Vec::new();
            for adapter in level {
                let required = adapter.required_identifiers();
                if !required.iter().all(|slot| identifiers.get(slot).is_some()) {
                    log::debug!(
                        "skipping adapter {} for investigation {investigation_id}: missing required identifiers",
                        adapter.name()
                    );
                    continue;
                }
                let config = registry.config(adapter.name()).cloned().unwrap_or_default();
                let permit = semaphore.clone();
                let identifiers = identifiers.clone();
                let context_snapshot = context.clone();
                let deadline = if config.timeout.is_zero() { self.default_task_deadline } else { config.timeout };

                log::debug!("dispatching adapter {} for investigation {investigation_id}", adapter.name());
                let handle = tokio::spawn(async move {
                    let _permit = permit.acquire_owned().await.expect("semaphore closed");
                    run_task_with_retry(adapter, &context_snapshot, &identifiers, mode, deadline, &config).await
                });
                handles.push(handle);
            }
            for handle in handles {
                match handle.await {
                    Ok(result) => {
                        if let Some(raw) = &result.raw_payload {
                            context.upstream_results.insert(result.adapter_name.clone(), raw.clone());
                        }
                        all_results.push(result);
                    }
                    Err(join_error) => {
                        log::error!("adapter task panicked for investigation {investigation_id}: {join_error}");
                    }
                }
            }
        }

        all_results
    }
}

async fn run_task_with_retry(
    adapter: Arc<dyn DataSourceAdapter>,
    context: &AdapterContext,
    identifiers: &Identifiers,
    mode: Mode,
    deadline: Duration,
    config: &AdapterConfig,
) -> TaskResult {
    let name = adapter.name().to_string();
    let started = std::time::Instant::now();
    let mut last_error: Option<AdapterError> = None;

    for attempt in 0..=config.retry_attempts {
        match adapter.execute(context, identifiers, mode, deadline).await {
            Ok(output) => {
                return TaskResult {
                    adapter_name: name,
                    evidence: output.evidence,
                    raw_payload: output.raw_payload,
                    error: None,
                    duration: started.elapsed(),
                };
            }
            Err(AdapterError::NotFound(msg)) => {
                // Not-found is a normal outcome, not a failure to retry; callers
                // that want "not found" to count as evidence do so from within
                // the adapter's own `execute`, not via a synthesized item here.
                return TaskResult {
                    adapter_name: name,
                    evidence: Vec::new(),
                    raw_payload: None,
                    error: Some(msg),
                    duration: started.elapsed(),
                };
            }
            Err(AdapterError::Auth(msg)) => {
                return TaskResult {
                    adapter_name: name.clone(),
                    evidence: vec![Evidence::new(&name, format!("auth error: {msg}"), false).with_weight(2)],
                    raw_payload: None,
                    error: Some(msg),
                    duration: started.elapsed(),
                };
            }
            Err(AdapterError::Malformed(msg)) => {
                return TaskResult {
                    adapter_name: name.clone(),
                    evidence: vec![Evidence::new(&name, format!("malformed response: {msg}"), false).with_weight(2)],
                    raw_payload: None,
                    error: Some(msg),
                    duration: started.elapsed(),
                };
            }
            Err(AdapterError::Deadline) => {
                return timeout_result(&name, started.elapsed());
            }
            Err(AdapterError::Transient(msg)) => {
                log::warn!("adapter {name} transient error on attempt {attempt}: {msg}");
                last_error = Some(AdapterError::Transient(msg));
                if attempt < config.retry_attempts {
                    tokio::time::sleep(config.backoff.delay_for_attempt(attempt)).await;
                }
            }
        }
    }

    let message = last_error.map(|e| e.to_string()).unwrap_or_else(|| "retry budget exhausted".to_string());
    TaskResult {
        adapter_name: name.clone(),
        evidence: vec![Evidence::new(&name, message.clone(), false).with_weight(1)],
        raw_payload: None,
        error: Some(message),
        duration: started.elapsed(),
    }
}

fn timeout_result(adapter_name: &str, duration: Duration) -> TaskResult {
    TaskResult {
        adapter_name: adapter_name.to_string(),
        evidence: vec![Evidence::new(adapter_name, "timeout", false).with_weight(1)],
        raw_payload: None,
        error: Some("timeout".to_string()),
        duration,
    }
}
