//! Append-only, source-attributed evidence log.
//!
//! [`EvidenceStore`] is the single place investigation state accumulates facts.
//! Items are never mutated or removed once appended (§3's append-only invariant);
//! the only thing that changes over an investigation's lifetime is which
//! hypotheses an item's weight is currently counted toward, and that is computed
//! by the hypothesis engine reading the store, not by editing items in place.
//!
//! # Example
//!
//! ```rust
//! use shipment_rca::rca::evidence::{Evidence, EvidenceStore};
//!
//! let mut store = EvidenceStore::new();
//! let id = store.append(Evidence::new("tracking-api", "no data for tracking id", true)
//!     .with_weight(10)
//!     .with_source_confidence(1.0));
//! assert_eq!(store.len(), 1);
//! assert!(store.get(id).is_some());
//!
//! // Re-appending the identical finding is coalesced, not duplicated.
//! let id2 = store.append(Evidence::new("tracking-api", "no data for tracking id", true)
//!     .with_weight(10)
//!     .with_source_confidence(1.0));
//! assert_eq!(id, id2);
//! assert_eq!(store.len(), 1);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Stable identifier for one evidence item. Assigned once, in append order;
/// never reused even if the item turns out to be a duplicate (a duplicate
/// append returns the id of the existing item instead of minting a new one).
pub type EvidenceId = u64;

/// A single, immutable, source-attributed finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub source: String,
    pub finding: String,
    pub supports: bool,
    pub weight: u8,
    pub source_confidence: f64,
    pub raw: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
    pub hypothesis_id: Option<String>,
    pub agent_id: Option<String>,
}

impl Evidence {
    /// `weight` defaults to 5 (supporting); `source_confidence` defaults to 1.0.
    /// Both are commonly overridden with the builder methods below.
    pub fn new(source: impl Into<String>, finding: impl Into<String>, supports: bool) -> Self {
        Self {
            source: source.into(),
            finding: finding.into(),
            supports,
            weight: 5,
            source_confidence: 1.0,
            raw: None,
            timestamp: Utc::now(),
            hypothesis_id: None,
            agent_id: None,
        }
    }

    pub fn with_weight(mut self, weight: u8) -> Self {
        self.weight = weight.clamp(1, 10);
        self
    }

    pub fn with_source_confidence(mut self, confidence: f64) -> Self {
        self.source_confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = Some(raw);
        self
    }

    pub fn with_hypothesis(mut self, hypothesis_id: impl Into<String>) -> Self {
        self.hypothesis_id = Some(hypothesis_id.into());
        self
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    /// Dedup key: (source, finding-hash, supports, weight, hypothesis-binding), as
    /// specified for the evidence store's structural de-duplication (§4.5) and the
    /// scheduler's idempotent-retry guarantee (§4.3).
    fn dedup_key(&self) -> DedupKey {
        let mut hasher = Sha256::new();
        hasher.update(self.finding.as_bytes());
        let finding_hash = format!("{:x}", hasher.finalize());
        DedupKey {
            source: self.source.clone(),
            finding_hash,
            supports: self.supports,
            weight: self.weight,
            hypothesis_id: self.hypothesis_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DedupKey {
    source: String,
    finding_hash: String,
    supports: bool,
    weight: u8,
    hypothesis_id: Option<String>,
}

/// A stored evidence item plus its append-order sequence number.
///
/// The sequence number is distinct from `timestamp`: it is the tiebreaker used
/// when two items share a wall-clock timestamp (§5's ordering guarantees), and
/// it is monotonically assigned under the store's single writer lock regardless
/// of which concurrent agent produced the item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvidence {
    pub id: EvidenceId,
    pub sequence: u64,
    #[serde(flatten)]
    pub evidence: Evidence,
}

/// Append-only evidence log for one investigation, with secondary indices for
/// the lookups the hypothesis engine and event encoder need: by source, and
/// by hypothesis binding.
#[derive(Debug, Default)]
pub struct EvidenceStore {
    items: Vec<StoredEvidence>,
    by_dedup_key: HashMap<DedupKey, EvidenceId>,
    by_source: HashMap<String, Vec<EvidenceId>>,
    by_hypothesis: HashMap<String, Vec<EvidenceId>>,
    next_id: EvidenceId,
    next_sequence: u64,
    dropped_over_cap: u64,
}

impl EvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item, returning its id. If an item with the same dedup key is
    /// already present, returns the existing id without appending (structural
    /// de-duplication — §4.5, and the de-dup idempotence property of §8).
    ///
    /// `max_evidence` (default 10 000, §5) bounds the store: once reached,
    /// further distinct items are dropped and [`EvidenceStore::dropped_over_cap`]
    /// is incremented instead of panicking or silently growing unbounded.
    pub fn append(&mut self, evidence: Evidence) -> EvidenceId {
        self.append_capped(evidence, u64::MAX)
    }

    pub fn append_capped(&mut self, evidence: Evidence, max_evidence: u64) -> EvidenceId {
        let key = evidence.dedup_key();
        if let Some(&existing) = self.by_dedup_key.get(&key) {
            return existing;
        }
        if self.items.len() as u64 >= max_evidence {
            self.dropped_over_cap += 1;
            log::warn!(
                "evidence store at cap ({max_evidence}); dropping item from source={}",
                evidence.source
            );
            // Return a sentinel id (0 is never issued to a real item since ids start at 1).
            return 0;
        }

        let id = self.next_id + 1;
        self.next_id = id;
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        self.by_source.entry(evidence.source.clone()).or_default().push(id);
        if let Some(h) = &evidence.hypothesis_id {
            self.by_hypothesis.entry(h.clone()).or_default().push(id);
        }
        self.by_dedup_key.insert(key, id);
        log::debug!("evidence #{id} appended: source={} supports={} weight={}", evidence.source, evidence.supports, evidence.weight);
        self.items.push(StoredEvidence { id, sequence, evidence });
        id
    }

    pub fn get(&self, id: EvidenceId) -> Option<&StoredEvidence> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn dropped_over_cap(&self) -> u64 {
        self.dropped_over_cap
    }

    /// All items, in append order — the order the event stream emitted them in.
    pub fn iter(&self) -> impl Iterator<Item = &StoredEvidence> {
        self.items.iter()
    }

    pub fn by_source(&self, source: &str) -> Vec<&StoredEvidence> {
        self.by_source
            .get(source)
            .into_iter()
            .flatten()
            .filter_map(|id| self.get(*id))
            .collect()
    }

    pub fn by_hypothesis(&self, hypothesis_id: &str) -> Vec<&StoredEvidence> {
        self.by_hypothesis
            .get(hypothesis_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.get(*id))
            .collect()
    }

    /// Items within `[from, to]` inclusive, by wall-clock timestamp.
    pub fn by_time_window(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<&StoredEvidence> {
        self.items
            .iter()
            .filter(|i| i.evidence.timestamp >= from && i.evidence.timestamp <= to)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_assigns_increasing_ids_and_sequence() {
        let mut store = EvidenceStore::new();
        let a = store.append(Evidence::new("tracking-api", "finding a", true));
        let b = store.append(Evidence::new("tracking-api", "finding b", true));
        assert!(b > a);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn duplicate_append_is_coalesced() {
        let mut store = EvidenceStore::new();
        let a = store.append(
            Evidence::new("network-relationship", "no active relationship", true).with_weight(10),
        );
        let b = store.append(
            Evidence::new("network-relationship", "no active relationship", true).with_weight(10),
        );
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn distinct_weight_is_not_coalesced() {
        let mut store = EvidenceStore::new();
        let a = store.append(Evidence::new("tracking-api", "timeout", false).with_weight(1));
        let b = store.append(Evidence::new("tracking-api", "timeout", false).with_weight(3));
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn cap_drops_items_past_max() {
        let mut store = EvidenceStore::new();
        let id1 = store.append_capped(Evidence::new("a", "one", true), 1);
        let id2 = store.append_capped(Evidence::new("a", "two", true), 1);
        assert_ne!(id1, 0);
        assert_eq!(id2, 0);
        assert_eq!(store.dropped_over_cap(), 1);
    }

    #[test]
    fn by_source_and_by_hypothesis_indices() {
        let mut store = EvidenceStore::new();
        store.append(
            Evidence::new("tracking-api", "one", true)
                .with_hypothesis("h1"),
        );
        store.append(
            Evidence::new("network-relationship", "two", true)
                .with_hypothesis("h1"),
        );
        assert_eq!(store.by_source("tracking-api").len(), 1);
        assert_eq!(store.by_hypothesis("h1").len(), 2);
    }
}
