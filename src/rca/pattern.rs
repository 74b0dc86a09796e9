//! Declarative domain pattern library (§4.7).
//!
//! A [`Pattern`] is data, not code: id, category, a conjunction of symptom
//! predicates over evidence fields, a required-evidence list with weights, a
//! resolution template, and a prior. The built-in library embeds a
//! representative set of patterns directly in Rust; operators who want to
//! swap the library without a rebuild load an equivalent YAML document with
//! [`PatternLibrary::load_yaml`], using the same `serde_yaml` tooling as the
//! decision-tree evaluator (§4.9).
//!
//! # Example
//!
//! ```rust
//! use shipment_rca::rca::evidence::{Evidence, EvidenceStore};
//! use shipment_rca::rca::pattern::PatternLibrary;
//!
//! let library = PatternLibrary::built_in();
//! let mut store = EvidenceStore::new();
//! store.append(Evidence::new("network-relationship", "no active relationship found", true).with_weight(10));
//!
//! let matches = library.matches(&store);
//! assert!(matches.iter().any(|p| p.category == shipment_rca::rca::hypothesis::Category::NetworkRelationshipMissing));
//! ```

use serde::{Deserialize, Serialize};

use crate::rca::evidence::EvidenceStore;
use crate::rca::hypothesis::Category;

/// A conjunctive predicate over evidence fields: "evidence from `source` whose
/// `finding` contains `finding_contains`". All non-`None` fields in a
/// [`SymptomPredicate`] must match for the predicate to match an evidence item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymptomPredicate {
    pub source: Option<String>,
    pub finding_contains: Option<String>,
    pub supports: Option<bool>,
}

impl SymptomPredicate {
    pub fn new() -> Self {
        Self { source: None, finding_contains: None, supports: None }
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn finding_contains(mut self, needle: impl Into<String>) -> Self {
        self.finding_contains = Some(needle.into());
        self
    }

    pub fn supports(mut self, supports: bool) -> Self {
        self.supports = Some(supports);
        self
    }

    /// Crate-visible alias used by the supervisor to bind already-stored
    /// evidence items to a newly-matched pattern's hypothesis.
    pub(crate) fn matches_evidence(&self, source: &str, finding: &str, supports: bool) -> bool {
        self.matches_item(source, finding, supports)
    }

    fn matches_item(&self, source: &str, finding: &str, supports: bool) -> bool {
        if let Some(want) = &self.source {
            if want != source {
                return false;
            }
        }
        if let Some(needle) = &self.finding_contains {
            if !finding.to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }
        if let Some(want) = self.supports {
            if want != supports {
                return false;
            }
        }
        true
    }
}

impl Default for SymptomPredicate {
    fn default() -> Self {
        Self::new()
    }
}

/// One weighted piece of evidence a pattern expects, used to pre-weight the
/// hypothesis it instantiates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequiredEvidence {
    pub description: String,
    pub weight: u8,
}

/// A declarative domain pattern (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub id: String,
    pub category: Category,
    pub symptoms: Vec<SymptomPredicate>,
    pub required_evidence: Vec<RequiredEvidence>,
    pub resolution_template: String,
    pub prior: f64,
}

/// Registry of [`Pattern`]s, queried on every evidence addition.
#[derive(Debug, Clone, Default)]
pub struct PatternLibrary {
    patterns: Vec<Pattern>,
}

impl PatternLibrary {
    pub fn new(patterns: Vec<Pattern>) -> Self {
        Self { patterns }
    }

    /// Parse a library from a YAML document with the same field set as
    /// [`Pattern`] (§4.7's "Loading" paragraph).
    pub fn load_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        let patterns: Vec<Pattern> = serde_yaml::from_str(yaml)?;
        Ok(Self { patterns })
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    /// Patterns whose symptom predicates are all satisfied by at least one
    /// evidence item each in `store` (conjunctive match, §4.7).
    pub fn matches(&self, store: &EvidenceStore) -> Vec<&Pattern> {
        self.patterns
            .iter()
            .filter(|pattern| {
                pattern.symptoms.iter().all(|predicate| {
                    store
                        .iter()
                        .any(|item| predicate.matches_item(&item.evidence.source, &item.evidence.finding, item.evidence.supports))
                })
            })
            .collect()
    }

    /// The built-in domain pattern set covering the category enumeration in
    /// §3/§4.6/GLOSSARY. A production deployment is expected to replace this
    /// with [`PatternLibrary::load_yaml`] pointed at an operator-maintained
    /// document.
    pub fn built_in() -> Self {
        Self::new(vec![
            Pattern {
                id: "network-relationship-missing".to_string(),
                category: Category::NetworkRelationshipMissing,
                symptoms: vec![SymptomPredicate::new().source("network-relationship").supports(true)],
                required_evidence: vec![RequiredEvidence {
                    description: "no active relationship between shipper and carrier".to_string(),
                    weight: 10,
                }],
                resolution_template: "Create or activate the network relationship between the shipper and carrier."
                    .to_string(),
                prior: 0.25,
            },
            Pattern {
                id: "load-not-found".to_string(),
                category: Category::LoadNotFound,
                symptoms: vec![SymptomPredicate::new().source("tracking-api").supports(true)],
                required_evidence: vec![RequiredEvidence {
                    description: "tracking id has no corresponding load".to_string(),
                    weight: 10,
                }],
                resolution_template: "Confirm the tracking id with the shipper; re-submit once corrected.".to_string(),
                prior: 0.25,
            },
            Pattern {
                id: "carrier-api-down".to_string(),
                category: Category::CarrierApiDown,
                symptoms: vec![SymptomPredicate::new().finding_contains("timeout").supports(false)],
                required_evidence: vec![RequiredEvidence {
                    description: "adapter call to carrier API timed out".to_string(),
                    weight: 1,
                }],
                resolution_template: "Check carrier API health; retry once availability is restored.".to_string(),
                prior: 0.15,
            },
            Pattern {
                id: "eld-not-enabled".to_string(),
                category: Category::EldNotEnabled,
                symptoms: vec![SymptomPredicate::new().source("internal-config").finding_contains("eld").supports(true)],
                required_evidence: vec![RequiredEvidence {
                    description: "ELD integration disabled for this carrier".to_string(),
                    weight: 8,
                }],
                resolution_template: "Enable ELD integration for the carrier in internal configuration.".to_string(),
                prior: 0.2,
            },
            Pattern {
                id: "callback-delivery-failed".to_string(),
                category: Category::CallbackDeliveryFailed,
                symptoms: vec![SymptomPredicate::new().source("callback-history").finding_contains("failed").supports(true)],
                required_evidence: vec![RequiredEvidence {
                    description: "webhook callback delivery attempts failed".to_string(),
                    weight: 8,
                }],
                resolution_template: "Verify the callback endpoint is reachable and re-trigger delivery.".to_string(),
                prior: 0.2,
            },
        ])
    }
}

/// On every evidence addition, instantiate a hypothesis for each newly-fully-matched
/// pattern (unless one of the same category already exists, in which case the
/// caller merges supporting evidence instead — §4.7's "Selection").
pub fn newly_matching<'a>(library: &'a PatternLibrary, store: &EvidenceStore, already_seeded: &[Category]) -> Vec<&'a Pattern> {
    library.matches(store).into_iter().filter(|p| !already_seeded.contains(&p.category)).collect()
}
