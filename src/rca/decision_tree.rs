//! Optional YAML-driven decision-tree evaluator (§4.9).
//!
//! For modes with a highly deterministic investigation protocol (e.g. the
//! ocean mode's documented flowchart), a [`DecisionTree`] executes alongside
//! the generative hypothesis loop. Each [`DecisionNode`] names an adapter
//! action and a set of predicate-guarded transitions; reaching a
//! [`Transition::Conclude`] node emits a pre-weighted evidence item bound to
//! the matching category. The two systems are reconciled at the hypothesis
//! engine by treating tree conclusions as ordinary (if high-weight) evidence
//! — they never short-circuit LLM-suggested hypotheses.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::rca::evidence::EvidenceStore;
use crate::rca::hypothesis::Category;

/// A predicate over accumulated evidence, evaluated against the current
/// [`EvidenceStore`] at a decision node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Predicate {
    pub source: Option<String>,
    pub finding_contains: Option<String>,
}

impl Predicate {
    fn matches(&self, store: &EvidenceStore) -> bool {
        store.iter().any(|item| {
            let source_ok = self.source.as_deref().map(|s| s == item.evidence.source).unwrap_or(true);
            let finding_ok = self
                .finding_contains
                .as_deref()
                .map(|needle| item.evidence.finding.to_lowercase().contains(&needle.to_lowercase()))
                .unwrap_or(true);
            source_ok && finding_ok
        })
    }
}

/// Where a node's evaluation leads: another node, or a conclusion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Transition {
    Next { node: String },
    Conclude { category: Category, description: String, weight: u8 },
}

/// One node in the tree: an action (invoke this adapter) plus a list of
/// predicate-guarded transitions, evaluated in order; the first matching
/// predicate wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionNode {
    pub id: String,
    pub action_adapter: String,
    pub decisions: Vec<(Predicate, Transition)>,
    pub default: Option<Transition>,
}

/// A declarative decision tree: a map of node id to [`DecisionNode`], plus
/// the id of the entry node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub entry: String,
    pub nodes: HashMap<String, DecisionNode>,
}

/// The outcome of walking a tree to completion, or the adapter it next wants
/// invoked if it cannot yet conclude from the evidence on hand.
#[derive(Clone)]
pub enum TreeOutcome {
    Conclusion { category: Category, description: String, weight: u8 },
    NeedsAction { adapter: String },
    Exhausted,
}

impl DecisionTree {
    pub fn load_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Walk the tree from its entry node against the evidence on hand. Stops
    /// and reports `NeedsAction` the first time a node's adapter has not yet
    /// produced evidence the node's predicates can evaluate against,
    /// mirroring the scheduler dispatching `action_adapter` before resuming
    /// evaluation of that node.
    pub fn evaluate(&self, store: &EvidenceStore) -> TreeOutcome {
        let mut current_id = self.entry.clone();
        let mut visited = std::collections::HashSet::new();

        loop {
            if !visited.insert(current_id.clone()) {
                return TreeOutcome::Exhausted;
            }
            let Some(node) = self.nodes.get(&current_id) else { return TreeOutcome::Exhausted };

            if store.by_source(&node.action_adapter).is_empty() {
                return TreeOutcome::NeedsAction { adapter: node.action_adapter.clone() };
            }

            let matched = node.decisions.iter().find(|(predicate, _)| predicate.matches(store));
            let transition = matched.map(|(_, t)| t).or(node.default.as_ref());

            match transition {
                Some(Transition::Next { node: next }) => current_id = next.clone(),
                Some(Transition::Conclude { category, description, weight }) => {
                    return TreeOutcome::Conclusion {
                        category: *category,
                        description: description.clone(),
                        weight: *weight,
                    }
                }
                None => return TreeOutcome::Exhausted,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rca::evidence::Evidence;

    fn sample_tree() -> DecisionTree {
        let mut nodes = HashMap::new();
        nodes.insert(
            "check-relationship".to_string(),
            DecisionNode {
                id: "check-relationship".to_string(),
                action_adapter: "network-relationship".to_string(),
                decisions: vec![(
                    Predicate { source: Some("network-relationship".to_string()), finding_contains: Some("missing".to_string()) },
                    Transition::Conclude {
                        category: Category::NetworkRelationshipMissing,
                        description: "ocean flowchart: relationship missing".to_string(),
                        weight: 9,
                    },
                )],
                default: Some(Transition::Conclude {
                    category: Category::Unknown,
                    description: "ocean flowchart: inconclusive".to_string(),
                    weight: 3,
                }),
            },
        );
        DecisionTree { entry: "check-relationship".to_string(), nodes }
    }

    #[test]
    fn needs_action_before_adapter_has_evidence() {
        let tree = sample_tree();
        let store = EvidenceStore::new();
        match tree.evaluate(&store) {
            TreeOutcome::NeedsAction { adapter } => assert_eq!(adapter, "network-relationship"),
            other => panic!("expected NeedsAction, got {other:?}"),
        }
    }

    #[test]
    fn concludes_once_matching_evidence_present() {
        let tree = sample_tree();
        let mut store = EvidenceStore::new();
        store.append(Evidence::new("network-relationship", "relationship missing", true));
        match tree.evaluate(&store) {
            TreeOutcome::Conclusion { category, .. } => assert_eq!(category, Category::NetworkRelationshipMissing),
            other => panic!("expected Conclusion, got {other:?}"),
        }
    }

    #[test]
    fn falls_back_to_default_transition() {
        let tree = sample_tree();
        let mut store = EvidenceStore::new();
        store.append(Evidence::new("network-relationship", "all good here", false));
        match tree.evaluate(&store) {
            TreeOutcome::Conclusion { category, .. } => assert_eq!(category, Category::Unknown),
            other => panic!("expected Conclusion, got {other:?}"),
        }
    }

    impl std::fmt::Debug for TreeOutcome {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                TreeOutcome::Conclusion { category, .. } => write!(f, "Conclusion({category})"),
                TreeOutcome::NeedsAction { adapter } => write!(f, "NeedsAction({adapter})"),
                TreeOutcome::Exhausted => write!(f, "Exhausted"),
            }
        }
    }

    #[test]
    fn yaml_round_trip() {
        let tree = sample_tree();
        let yaml = serde_yaml::to_string(&tree).unwrap();
        let reloaded = DecisionTree::load_yaml(&yaml).unwrap();
        assert_eq!(reloaded.entry, tree.entry);
    }
}
