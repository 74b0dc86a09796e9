//! Configuration surface (§6, §10).
//!
//! Plain, `Default`-implementing structs built with fluent `with_*` methods,
//! in the source lineage's `CloudLLMConfig` philosophy: no config-file-format
//! dependency for the engine/scoring/adapter surface, callers construct it
//! however they want. The one departure from that minimal philosophy is
//! [`crate::rca::pattern::PatternLibrary::load_yaml`] and
//! [`crate::rca::decision_tree::DecisionTree::load_yaml`], which exist
//! because §4.7/§4.9 explicitly call for file-loadable declarative data.

use std::time::Duration;

use crate::rca::hypothesis::ScoringConfig;

/// Engine-level configuration (§6's "Engine" option set).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_iterations: u32,
    pub overall_deadline: Duration,
    pub concurrent_tasks_per_investigation: usize,
    pub process_task_cap: usize,
    pub heartbeat_interval: Duration,
    pub event_queue_len: usize,
    pub max_evidence: u64,
    pub raw_payload_cap_bytes: usize,
    pub per_task_deadline: Duration,
    pub cancellation_grace_period: Duration,
    pub collaborative_mode: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            overall_deadline: Duration::from_secs(120),
            concurrent_tasks_per_investigation: 8,
            process_task_cap: 64,
            heartbeat_interval: Duration::from_secs(1),
            event_queue_len: 1024,
            max_evidence: 10_000,
            raw_payload_cap_bytes: 32 * 1024,
            per_task_deadline: Duration::from_secs(15),
            cancellation_grace_period: Duration::from_secs(2),
            collaborative_mode: false,
        }
    }
}

impl EngineConfig {
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_overall_deadline(mut self, deadline: Duration) -> Self {
        self.overall_deadline = deadline;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrent_tasks_per_investigation = concurrency;
        self
    }

    pub fn with_collaborative_mode(mut self, enabled: bool) -> Self {
        self.collaborative_mode = enabled;
        self
    }

    pub fn with_per_task_deadline(mut self, deadline: Duration) -> Self {
        self.per_task_deadline = deadline;
        self
    }
}

/// Top-level configuration bundling engine and scoring settings. Per-adapter
/// configuration (§4.4) lives alongside each adapter in the
/// [`crate::rca::adapter::AdapterRegistry`] rather than here, since it is
/// registered one adapter at a time.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub engine: EngineConfig,
    pub scoring: ScoringConfig,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_scoring(mut self, scoring: ScoringConfig) -> Self {
        self.scoring = scoring;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = EngineConfig::default();
        assert_eq!(config.max_iterations, 5);
        assert_eq!(config.overall_deadline, Duration::from_secs(120));
        assert_eq!(config.concurrent_tasks_per_investigation, 8);
        assert_eq!(config.process_task_cap, 64);
        assert_eq!(config.max_evidence, 10_000);
        assert_eq!(config.raw_payload_cap_bytes, 32 * 1024);
    }

    #[test]
    fn builder_overrides_compose() {
        let config = EngineConfig::default().with_max_iterations(10).with_collaborative_mode(true);
        assert_eq!(config.max_iterations, 10);
        assert!(config.collaborative_mode);
    }
}
