//! Data-source adapter contract (§4.4) and the closed set of built-in adapter
//! names.
//!
//! An adapter is a pluggable component that talks to one external data source
//! and yields evidence. The core specifies only the [`DataSourceAdapter`]
//! trait and the [`AdapterError`] taxonomy the scheduler dispatches on;
//! concrete adapters (including the reference implementations in
//! [`crate::rca::adapters`]) are ordinary trait objects registered with an
//! [`AdapterRegistry`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::rca::evidence::Evidence;
use crate::rca::ticket::{Identifiers, Mode};

/// Closed set of built-in adapter names (§4.4).
pub const TRACKING_API: &str = "tracking-api";
pub const NETWORK_RELATIONSHIP: &str = "network-relationship";
pub const HISTORICAL_WAREHOUSE: &str = "historical-warehouse";
pub const RECENT_LOGS: &str = "recent-logs";
pub const HISTORICAL_LOGS: &str = "historical-logs";
pub const RPA_SCRAPER: &str = "rpa-scraper";
pub const INTERNAL_CONFIG: &str = "internal-config";
pub const CALLBACK_HISTORY: &str = "callback-history";
pub const OCEAN_EVENTS: &str = "ocean-events";
pub const DOCUMENTATION_SEARCH: &str = "documentation-search";
pub const CHAT_HISTORY: &str = "chat-history";
pub const TICKET_SYSTEM: &str = "ticket-system";

/// Authentication method for an adapter's upstream call (§4.4 configuration).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMethod {
    HmacSha1,
    Basic,
    ApiKey,
    Iam,
}

/// Exponential backoff curve for the adapter's retry budget.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Backoff {
    pub base_ms: u64,
    pub max_ms: u64,
}

impl Backoff {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let scaled = self.base_ms.saturating_mul(1u64 << attempt.min(16));
        Duration::from_millis(scaled.min(self.max_ms))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self { base_ms: 200, max_ms: 5_000 }
    }
}

/// Per-adapter configuration record (§4.4, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    pub endpoint: Option<String>,
    pub auth_method: Option<AuthMethod>,
    pub credential_handle: Option<String>,
    pub timeout: Duration,
    pub rate_limit_per_second: Option<u32>,
    pub retry_attempts: u32,
    pub backoff: Backoff,
    pub chunk_days: u32,
    pub enabled: bool,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            auth_method: None,
            credential_handle: None,
            timeout: Duration::from_secs(15),
            rate_limit_per_second: None,
            retry_attempts: 3,
            backoff: Backoff::default(),
            chunk_days: 7,
            enabled: true,
        }
    }
}

impl AdapterConfig {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Error taxonomy exposed to the scheduler (§4.4). The scheduler pattern-matches
/// on this to decide retry behavior, which is why it is a closed enum rather
/// than a generic boxed error.
#[derive(Debug, Clone)]
pub enum AdapterError {
    /// Retry within the adapter's configured budget.
    Transient(String),
    /// Do not retry; surface as configuration evidence.
    Auth(String),
    /// Normal outcome, not a failure: produces positive evidence of absence.
    NotFound(String),
    /// Surface the raw payload for audit; do not retry.
    Malformed(String),
    /// Per-task or overall deadline elapsed.
    Deadline,
}

impl std::fmt::Display for AdapterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdapterError::Transient(msg) => write!(f, "transient adapter error: {msg}"),
            AdapterError::Auth(msg) => write!(f, "adapter auth error: {msg}"),
            AdapterError::NotFound(msg) => write!(f, "not found: {msg}"),
            AdapterError::Malformed(msg) => write!(f, "malformed adapter response: {msg}"),
            AdapterError::Deadline => write!(f, "adapter deadline exceeded"),
        }
    }
}

impl std::error::Error for AdapterError {}

/// Context carried into an adapter call: prior tasks' outputs that this task
/// declared a dependency on (§4.3's "Dependency graph"), plus the
/// investigation id for log correlation.
#[derive(Debug, Clone, Default)]
pub struct AdapterContext {
    pub investigation_id: String,
    pub upstream_results: std::collections::HashMap<String, serde_json::Value>,
}

impl AdapterContext {
    pub fn new(investigation_id: impl Into<String>) -> Self {
        Self { investigation_id: investigation_id.into(), upstream_results: Default::default() }
    }

    pub fn upstream(&self, adapter_name: &str) -> Option<&serde_json::Value> {
        self.upstream_results.get(adapter_name)
    }
}

/// Result of one adapter execution: evidence items plus an optional raw
/// payload (also attached to each evidence item's `raw` field where relevant).
#[derive(Debug, Clone, Default)]
pub struct AdapterOutput {
    pub evidence: Vec<Evidence>,
    pub raw_payload: Option<serde_json::Value>,
}

/// Uniform capability set every data-source adapter implements (§4.4, §6's
/// "Adapter boundary"). All adapters must be safe under cancellation: `execute`
/// is passed a deadline and is expected to honour it rather than run unbounded.
#[async_trait]
pub trait DataSourceAdapter: Send + Sync {
    /// Stable adapter name, one of the closed set of constants above for
    /// built-in adapters, or a caller-chosen name for custom ones.
    fn name(&self) -> &str;

    /// Identifier slots (see [`crate::rca::ticket`]) this adapter needs present
    /// before it can usefully execute. The scheduler skips adapters whose
    /// required identifiers are absent.
    fn required_identifiers(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Names of other adapters whose output this one depends on (§4.3's
    /// dependency graph). The scheduler runs dependencies in an earlier
    /// topological level.
    fn dependencies(&self) -> Vec<&'static str> {
        Vec::new()
    }

    async fn execute(
        &self,
        context: &AdapterContext,
        identifiers: &Identifiers,
        mode: Mode,
        deadline: Duration,
    ) -> Result<AdapterOutput, AdapterError>;
}

/// Registry of adapters by name, used by the scheduler to resolve the
/// dependency graph and dispatch enabled adapters (§4.3, §4.4).
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: std::collections::HashMap<String, std::sync::Arc<dyn DataSourceAdapter>>,
    configs: std::collections::HashMap<String, AdapterConfig>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: std::sync::Arc<dyn DataSourceAdapter>, config: AdapterConfig) {
        let name = adapter.name().to_string();
        self.configs.insert(name.clone(), config);
        self.adapters.insert(name, adapter);
    }

    pub fn get(&self, name: &str) -> Option<std::sync::Arc<dyn DataSourceAdapter>> {
        self.adapters.get(name).cloned()
    }

    pub fn config(&self, name: &str) -> Option<&AdapterConfig> {
        self.configs.get(name)
    }

    /// Enabled adapters, in registration order is not guaranteed; the
    /// scheduler imposes topological order over this set.
    pub fn enabled(&self) -> Vec<std::sync::Arc<dyn DataSourceAdapter>> {
        self.adapters
            .values()
            .filter(|a| self.configs.get(a.name()).map(|c| c.enabled).unwrap_or(true))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubAdapter;

    #[async_trait]
    impl DataSourceAdapter for StubAdapter {
        fn name(&self) -> &str {
            "stub"
        }

        async fn execute(
            &self,
            _context: &AdapterContext,
            _identifiers: &Identifiers,
            _mode: Mode,
            _deadline: Duration,
        ) -> Result<AdapterOutput, AdapterError> {
            Ok(AdapterOutput::default())
        }
    }

    #[test]
    fn disabled_adapter_excluded_from_enabled_list() {
        let mut registry = AdapterRegistry::new();
        registry.register(std::sync::Arc::new(StubAdapter), AdapterConfig::default().disabled());
        assert!(registry.enabled().is_empty());
        assert!(registry.get("stub").is_some());
    }

    #[test]
    fn backoff_caps_at_max_ms() {
        let backoff = Backoff { base_ms: 100, max_ms: 1000 };
        assert_eq!(backoff.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(backoff.delay_for_attempt(10), Duration::from_millis(1000));
    }
}
