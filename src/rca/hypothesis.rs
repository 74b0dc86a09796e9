//! Hypothesis lifecycle: seeding, scoring, promotion, and elimination.
//!
//! [`HypothesisEngine`] owns the set of candidate root causes for one
//! investigation and recomputes their confidence after every evidence addition,
//! using the weighted-sum formula in the module-level docs below. It reads the
//! [`EvidenceStore`](crate::rca::evidence::EvidenceStore) read-only; nothing here
//! mutates evidence.
//!
//! # Scoring
//!
//! For a hypothesis `H`, let `S_for` be the sum of `weight · source_confidence`
//! over evidence supporting `H`, and `S_against` the symmetric sum over opposing
//! evidence. Confidence is:
//!
//! ```text
//! confidence(H) = clip(prior(H) + alpha * (S_for - beta * S_against) / (1 + S_against), 0, 1)
//! ```
//!
//! with `alpha = 0.15` and `beta = 1.2` by default ([`ScoringConfig::default`]).
//! Normalizing only by `S_against` (rather than `S_for + S_against`) is a
//! deliberate departure from a literal reading of the weighted-sum sketch:
//! dividing by the full evidence total caps any hypothesis's confidence at
//! `prior + alpha` regardless of how strong the supporting evidence is, which
//! makes the auto-resolve threshold structurally unreachable for the kind of
//! single-critical-evidence cases this scoring rule exists to recognize. This
//! still damps the effect of repeated *opposing* evidence (the elimination
//! side), while letting corroborating evidence from distinct sources drive
//! confidence up without an artificial ceiling. This is deterministic and
//! reads no wall-clock or random state, which is what makes replay (feeding a
//! recorded evidence sequence to a fresh engine) reproduce identical
//! confidences.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::rca::evidence::EvidenceStore;

/// Closed enumeration of root-cause categories. `Unknown` is the residual
/// category emitted when every seeded hypothesis has been eliminated (§4.6's
/// "all hypotheses eliminated" edge case).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    NetworkRelationshipMissing,
    JtScrapingError,
    EldNotEnabled,
    LoadNotFound,
    CarrierApiDown,
    CallbackDeliveryFailed,
    DocumentationMismatch,
    ConfigurationError,
    OceanEventGap,
    ChatHistoryUnresolved,
    Unknown,
}

impl Category {
    /// Lexicographic ordering key for tie-break rule 3 (§4.6).
    pub fn sort_key(&self) -> &'static str {
        match self {
            Category::NetworkRelationshipMissing => "network_relationship_missing",
            Category::JtScrapingError => "jt_scraping_error",
            Category::EldNotEnabled => "eld_not_enabled",
            Category::LoadNotFound => "load_not_found",
            Category::CarrierApiDown => "carrier_api_down",
            Category::CallbackDeliveryFailed => "callback_delivery_failed",
            Category::DocumentationMismatch => "documentation_mismatch",
            Category::ConfigurationError => "configuration_error",
            Category::OceanEventGap => "ocean_event_gap",
            Category::ChatHistoryUnresolved => "chat_history_unresolved",
            Category::Unknown => "unknown",
        }
    }

    /// Reverse of [`Category::sort_key`], for parsing an LLM's suggested
    /// category slug back into the closed enumeration (§4.6's "LLM-suggested
    /// hypotheses" seeding source). Unrecognized slugs are silently dropped by
    /// the caller rather than mapped to `Unknown`, since `Unknown` is
    /// reserved for the "all hypotheses eliminated" residual case.
    pub fn from_slug(slug: &str) -> Option<Self> {
        Some(match slug {
            "network_relationship_missing" => Category::NetworkRelationshipMissing,
            "jt_scraping_error" => Category::JtScrapingError,
            "eld_not_enabled" => Category::EldNotEnabled,
            "load_not_found" => Category::LoadNotFound,
            "carrier_api_down" => Category::CarrierApiDown,
            "callback_delivery_failed" => Category::CallbackDeliveryFailed,
            "documentation_mismatch" => Category::DocumentationMismatch,
            "configuration_error" => Category::ConfigurationError,
            "ocean_event_gap" => Category::OceanEventGap,
            "chat_history_unresolved" => Category::ChatHistoryUnresolved,
            "unknown" => Category::Unknown,
            _ => return None,
        })
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.sort_key())
    }
}

/// Lifecycle state of a hypothesis. Elimination and confirmation are one-way:
/// neither state transitions back to `Active` (anti-oscillation, §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HypothesisState {
    Active,
    Confirmed,
    Eliminated,
}

pub type HypothesisId = String;

/// A candidate root cause with a current confidence and lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hypothesis {
    pub id: HypothesisId,
    pub category: Category,
    pub description: String,
    pub confidence: f64,
    pub state: HypothesisState,
    pub evidence_for: Vec<u64>,
    pub evidence_against: Vec<u64>,
    pub prior: f64,
    pub last_updated: DateTime<Utc>,
}

impl Hypothesis {
    pub fn seed(id: impl Into<String>, category: Category, description: impl Into<String>, prior: f64) -> Self {
        let prior = prior.clamp(0.0, 1.0);
        Self {
            id: id.into(),
            category,
            description: description.into(),
            confidence: prior,
            state: HypothesisState::Active,
            evidence_for: Vec::new(),
            evidence_against: Vec::new(),
            prior,
            last_updated: Utc::now(),
        }
    }

    fn distinct_source_count(&self, store: &EvidenceStore) -> usize {
        let mut sources = std::collections::HashSet::new();
        for id in self.evidence_for.iter().chain(self.evidence_against.iter()) {
            if let Some(item) = store.get(*id) {
                sources.insert(item.evidence.source.clone());
            }
        }
        sources.len()
    }
}

/// Tunable scoring coefficients (§6's "Scoring" configuration options).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub alpha: f64,
    pub beta: f64,
    pub auto_resolve_threshold: f64,
    pub elimination_threshold: f64,
    pub tie_break_margin: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            alpha: 0.15,
            beta: 1.2,
            auto_resolve_threshold: 0.80,
            elimination_threshold: 0.10,
            tie_break_margin: 0.15,
        }
    }
}

/// A request to dispatch a targeted query in the next `collecting` sweep,
/// produced when no hypothesis can be promoted (§4.6's "Directing further
/// queries").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub adapter: String,
    pub reason: String,
}

/// Outcome of a re-scoring pass.
#[derive(Debug, Clone)]
pub enum ReasoningOutcome {
    /// One hypothesis crossed the auto-resolve threshold with a sufficient
    /// margin over the runner-up.
    Confirmed(HypothesisId),
    /// No hypothesis can be promoted yet; here are queries that would most
    /// narrow the gap between the top two, and whether iterations remain.
    NeedsMoreEvidence { queries: Vec<QueryRequest>, iterations_remaining: bool },
    /// No evidence at all, or every hypothesis has been eliminated.
    NeedsHuman { question: String },
}

/// Owns and re-scores the set of hypotheses for one investigation.
#[derive(Debug)]
pub struct HypothesisEngine {
    hypotheses: HashMap<HypothesisId, Hypothesis>,
    config: ScoringConfig,
    next_ordinal: u64,
}

impl HypothesisEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { hypotheses: HashMap::new(), config, next_ordinal: 0 }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Seed a new hypothesis, or merge into an existing one of the same
    /// category (§4.7's "on first full match" merge rule, and §4.6's
    /// de-duplication by category).
    pub fn seed(&mut self, category: Category, description: impl Into<String>, prior: f64) -> HypothesisId {
        if let Some(existing) = self.hypotheses.values().find(|h| h.category == category) {
            return existing.id.clone();
        }
        self.next_ordinal += 1;
        let id = format!("hyp-{}", self.next_ordinal);
        self.hypotheses.insert(id.clone(), Hypothesis::seed(id.clone(), category, description, prior));
        id
    }

    pub fn get(&self, id: &str) -> Option<&Hypothesis> {
        self.hypotheses.get(id)
    }

    pub fn all(&self) -> impl Iterator<Item = &Hypothesis> {
        self.hypotheses.values()
    }

    /// Bind an evidence item to a hypothesis and recompute that hypothesis's
    /// confidence. Does nothing if the hypothesis is unknown or already
    /// eliminated (anti-oscillation: eliminated hypotheses never rejoin
    /// scoring).
    pub fn record_evidence(&mut self, hypothesis_id: &str, evidence_id: u64, supports: bool, store: &EvidenceStore) {
        let Some(h) = self.hypotheses.get_mut(hypothesis_id) else { return };
        if h.state == HypothesisState::Eliminated {
            return;
        }
        if supports {
            if !h.evidence_for.contains(&evidence_id) {
                h.evidence_for.push(evidence_id);
            }
        } else if !h.evidence_against.contains(&evidence_id) {
            h.evidence_against.push(evidence_id);
        }
        self.rescore(hypothesis_id, store);
    }

    fn rescore(&mut self, hypothesis_id: &str, store: &EvidenceStore) {
        let Some(h) = self.hypotheses.get_mut(hypothesis_id) else { return };
        if h.state == HypothesisState::Eliminated {
            return;
        }
        let s_for: f64 = h
            .evidence_for
            .iter()
            .filter_map(|id| store.get(*id))
            .map(|e| e.evidence.weight as f64 * e.evidence.source_confidence)
            .sum();
        let s_against: f64 = h
            .evidence_against
            .iter()
            .filter_map(|id| store.get(*id))
            .map(|e| e.evidence.weight as f64 * e.evidence.source_confidence)
            .sum();

        let raw = h.prior + self.config.alpha * (s_for - self.config.beta * s_against) / (1.0 + s_against);
        h.confidence = raw.clamp(0.0, 1.0);
        h.last_updated = Utc::now();

        if h.confidence <= self.config.elimination_threshold {
            log::debug!("hypothesis {hypothesis_id} ({}) eliminated at confidence {:.4}", h.category, h.confidence);
            h.state = HypothesisState::Eliminated;
        }
    }

    /// Ranks active (non-eliminated) hypotheses by confidence, applying the
    /// tie-break rule (§4.6): within `0.02` confidence, prefer more distinct
    /// sources, then higher prior, then lexicographic category.
    pub fn ranked(&self, store: &EvidenceStore) -> Vec<&Hypothesis> {
        let mut ranked: Vec<&Hypothesis> =
            self.hypotheses.values().filter(|h| h.state != HypothesisState::Eliminated).collect();
        ranked.sort_by(|a, b| {
            if (a.confidence - b.confidence).abs() <= 0.02 {
                let sources_a = a.distinct_source_count(store);
                let sources_b = b.distinct_source_count(store);
                sources_b
                    .cmp(&sources_a)
                    .then_with(|| b.prior.partial_cmp(&a.prior).unwrap_or(std::cmp::Ordering::Equal))
                    .then_with(|| a.category.sort_key().cmp(b.category.sort_key()))
            } else {
                b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal)
            }
        });
        ranked
    }

    /// Evaluate promotion/elimination across the whole set and report what the
    /// supervisor should do next (§4.6 "Promotion and elimination" and
    /// "Directing further queries").
    pub fn evaluate(&mut self, store: &EvidenceStore, iterations_remaining: bool) -> ReasoningOutcome {
        if self.hypotheses.is_empty() || self.hypotheses.values().all(|h| store.is_empty()) {
            return ReasoningOutcome::NeedsHuman {
                question: "No data sources returned evidence. Which identifiers are available for this shipment?"
                    .to_string(),
            };
        }

        if self.hypotheses.values().all(|h| h.state == HypothesisState::Eliminated) {
            let id = self.seed(Category::Unknown, "Root cause could not be determined from available evidence", 0.3);
            return ReasoningOutcome::NeedsHuman {
                question: format!(
                    "All candidate hypotheses were eliminated by evidence; residual hypothesis `{id}` needs human review."
                ),
            };
        }

        let ranked = self.ranked(store);
        if let Some(top) = ranked.first() {
            let runner_up_confidence = ranked.get(1).map(|h| h.confidence).unwrap_or(0.0);
            if top.confidence >= self.config.auto_resolve_threshold
                && top.confidence - runner_up_confidence >= self.config.tie_break_margin
            {
                let id = top.id.clone();
                if let Some(h) = self.hypotheses.get_mut(&id) {
                    h.state = HypothesisState::Confirmed;
                    log::info!("hypothesis {id} ({}) confirmed at confidence {:.4}", h.category, h.confidence);
                }
                return ReasoningOutcome::Confirmed(id);
            }
        }

        if !iterations_remaining {
            let hypotheses_summary = ranked
                .iter()
                .take(2)
                .map(|h| format!("{} ({:.2})", h.category, h.confidence))
                .collect::<Vec<_>>()
                .join(" vs. ");
            return ReasoningOutcome::NeedsHuman {
                question: format!("Investigation inconclusive after max iterations. Leading candidates: {hypotheses_summary}."),
            };
        }

        ReasoningOutcome::NeedsMoreEvidence { queries: self.next_queries(&ranked), iterations_remaining: true }
    }

    /// Which adapters would most narrow the gap between the top two
    /// hypotheses, by weight of evidence already bound to each (§4.6).
    fn next_queries(&self, ranked: &[&Hypothesis]) -> Vec<QueryRequest> {
        let Some(top) = ranked.first() else { return Vec::new() };
        vec![QueryRequest {
            adapter: "documentation-search".to_string(),
            reason: format!("narrow confidence gap for leading hypothesis `{}`", top.category),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rca::evidence::Evidence;

    fn store_with(items: Vec<Evidence>) -> (EvidenceStore, Vec<u64>) {
        let mut store = EvidenceStore::new();
        let ids = items.into_iter().map(|e| store.append(e)).collect();
        (store, ids)
    }

    #[test]
    fn critical_supporting_evidence_crosses_auto_resolve() {
        let (store, ids) = store_with(vec![Evidence::new("network-relationship", "no active relationship", true)
            .with_weight(10)
            .with_source_confidence(1.0)]);
        let mut engine = HypothesisEngine::new(ScoringConfig::default());
        let hyp = engine.seed(Category::NetworkRelationshipMissing, "network relationship missing", 0.2);
        engine.record_evidence(&hyp, ids[0], true, &store);
        let h = engine.get(&hyp).unwrap();
        assert!(h.confidence >= 0.90, "confidence was {}", h.confidence);
    }

    #[test]
    fn opposing_evidence_pulls_confidence_down_and_can_eliminate() {
        let (store, ids) = store_with(vec![Evidence::new("tracking-api", "no match", false).with_weight(8)]);
        let mut engine = HypothesisEngine::new(ScoringConfig::default());
        let hyp = engine.seed(Category::LoadNotFound, "load not found", 0.15);
        engine.record_evidence(&hyp, ids[0], false, &store);
        let h = engine.get(&hyp).unwrap();
        assert_eq!(h.state, HypothesisState::Eliminated);
    }

    #[test]
    fn seeding_same_category_twice_merges() {
        let mut engine = HypothesisEngine::new(ScoringConfig::default());
        let a = engine.seed(Category::LoadNotFound, "first", 0.2);
        let b = engine.seed(Category::LoadNotFound, "second", 0.3);
        assert_eq!(a, b);
        assert_eq!(engine.all().count(), 1);
    }

    #[test]
    fn scoring_is_deterministic_given_same_evidence_order() {
        let (store, ids) = store_with(vec![
            Evidence::new("a", "x", true).with_weight(5),
            Evidence::new("b", "y", false).with_weight(3),
        ]);
        let mut e1 = HypothesisEngine::new(ScoringConfig::default());
        let h1 = e1.seed(Category::CarrierApiDown, "carrier api down", 0.25);
        engine_feed(&mut e1, &h1, &[(ids[0], true), (ids[1], false)], &store);

        let mut e2 = HypothesisEngine::new(ScoringConfig::default());
        let h2 = e2.seed(Category::CarrierApiDown, "carrier api down", 0.25);
        engine_feed(&mut e2, &h2, &[(ids[0], true), (ids[1], false)], &store);

        assert!((e1.get(&h1).unwrap().confidence - e2.get(&h2).unwrap().confidence).abs() < 1e-9);
    }

    fn engine_feed(engine: &mut HypothesisEngine, hyp: &str, events: &[(u64, bool)], store: &EvidenceStore) {
        for (id, supports) in events {
            engine.record_evidence(hyp, *id, *supports, store);
        }
    }

    #[test]
    fn from_slug_round_trips_sort_key() {
        assert_eq!(Category::from_slug("carrier_api_down"), Some(Category::CarrierApiDown));
        assert_eq!(Category::from_slug("not-a-real-category"), None);
    }

    #[test]
    fn no_evidence_requests_human_input() {
        let store = EvidenceStore::new();
        let mut engine = HypothesisEngine::new(ScoringConfig::default());
        engine.seed(Category::Unknown, "placeholder", 0.3);
        match engine.evaluate(&store, true) {
            ReasoningOutcome::NeedsHuman { .. } => {}
            other => panic!("expected NeedsHuman, got {other:?}"),
        }
    }
}
