//! Typed event bus and wire encoder (§4.8, §6).
//!
//! Every state change in an investigation is a variant of [`Event`], delivered
//! in total order to all subscribers of that investigation's
//! [`tokio::sync::broadcast`] channel. [`encode`] renders an event to the
//! newline-framed wire format of §6; a subscriber that wants the typed enum
//! (an in-process [`EventHandler`], mirroring the source lineage's
//! `AgentEvent`/`EventHandler` observability pattern) and a subscriber that
//! wants wire bytes (e.g. an HTTP streaming handler) are both views over the
//! same broadcast channel.
//!
//! # Example
//!
//! ```rust
//! use shipment_rca::rca::event::{Event, RecommendedAction, encode};
//!
//! let event = Event::RootCause {
//!     investigation_id: "inv-1".to_string(),
//!     category: "network_relationship_missing".to_string(),
//!     description: "no active relationship between shipper and carrier".to_string(),
//!     confidence: 0.93,
//!     recommended_actions: vec![RecommendedAction {
//!         priority: "high".to_string(),
//!         category: "network_relationship_missing".to_string(),
//!         description: "activate the network relationship".to_string(),
//!     }],
//! };
//! let wire = encode(&event);
//! assert!(wire.starts_with("root_cause\t"));
//! assert!(wire.ends_with('\n'));
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recommended action attached to a `root_cause` event (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendedAction {
    pub priority: String,
    pub category: String,
    pub description: String,
}

/// Summary of one hypothesis, as embedded in a `needs_human` event's context
/// (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HypothesisSummary {
    pub id: String,
    pub category: String,
    pub confidence: f64,
}

/// The complete event taxonomy (§4.8). Every state change — agent started,
/// query executed, evidence added, hypothesis updated, heartbeat, root cause
/// found, human input required, complete — is one of these variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Event {
    Started {
        investigation_id: String,
    },
    AgentStarted {
        investigation_id: String,
        adapter: String,
    },
    AgentFinished {
        investigation_id: String,
        adapter: String,
    },
    QueryExecuted {
        investigation_id: String,
        source: String,
        query_fingerprint: String,
        duration_ms: u64,
        result_count: Option<u32>,
        error: Option<String>,
        raw: Option<serde_json::Value>,
    },
    EvidenceAdded {
        investigation_id: String,
        evidence_id: u64,
        source: String,
        finding: String,
        supports: bool,
        weight: u8,
        source_confidence: f64,
        hypothesis_id: Option<String>,
        ts: DateTime<Utc>,
    },
    HypothesisAdded {
        investigation_id: String,
        hypothesis_id: String,
        category: String,
        description: String,
    },
    HypothesisUpdated {
        investigation_id: String,
        hypothesis_id: String,
        category: String,
        description: String,
        confidence: f64,
        state: String,
        evidence_for: Vec<u64>,
        evidence_against: Vec<u64>,
    },
    HypothesisEliminated {
        investigation_id: String,
        hypothesis_id: String,
        category: String,
    },
    /// Collaborative mode only (§4.8): an explicit choice to dispatch a
    /// targeted query.
    Decision {
        investigation_id: String,
        adapter: String,
        reason: String,
    },
    /// Collaborative mode only (§4.8): a short message from one agent about
    /// observations/proposals/agreements/disagreements. Never read by the
    /// hypothesis engine (§9's open-question decision).
    Discussion {
        investigation_id: String,
        agent_id: String,
        message_type: String,
        message: String,
    },
    Heartbeat {
        investigation_id: String,
        progress: f64,
        current_activity: String,
        agents_running: Vec<String>,
        data_sources_queried: u32,
        data_sources_total: u32,
    },
    RootCause {
        investigation_id: String,
        category: String,
        description: String,
        confidence: f64,
        recommended_actions: Vec<RecommendedAction>,
    },
    NeedsHuman {
        investigation_id: String,
        question: String,
        hypotheses: Vec<HypothesisSummary>,
        missing_identifiers: Vec<String>,
    },
    Complete {
        investigation_id: String,
        status: String,
        duration_ms: u64,
    },
}

impl Event {
    /// The `<kind>` label used in the wire encoding (§6).
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Started { .. } => "started",
            Event::AgentStarted { .. } => "agent_started",
            Event::AgentFinished { .. } => "agent_finished",
            Event::QueryExecuted { .. } => "query_executed",
            Event::EvidenceAdded { .. } => "evidence_added",
            Event::HypothesisAdded { .. } => "hypothesis_added",
            Event::HypothesisUpdated { .. } => "hypothesis_updated",
            Event::HypothesisEliminated { .. } => "hypothesis_eliminated",
            Event::Decision { .. } => "decision",
            Event::Discussion { .. } => "discussion",
            Event::Heartbeat { .. } => "heartbeat",
            Event::RootCause { .. } => "root_cause",
            Event::NeedsHuman { .. } => "needs_human",
            Event::Complete { .. } => "complete",
        }
    }

    pub fn investigation_id(&self) -> &str {
        match self {
            Event::Started { investigation_id }
            | Event::AgentStarted { investigation_id, .. }
            | Event::AgentFinished { investigation_id, .. }
            | Event::QueryExecuted { investigation_id, .. }
            | Event::EvidenceAdded { investigation_id, .. }
            | Event::HypothesisAdded { investigation_id, .. }
            | Event::HypothesisUpdated { investigation_id, .. }
            | Event::HypothesisEliminated { investigation_id, .. }
            | Event::Decision { investigation_id, .. }
            | Event::Discussion { investigation_id, .. }
            | Event::Heartbeat { investigation_id, .. }
            | Event::RootCause { investigation_id, .. }
            | Event::NeedsHuman { investigation_id, .. }
            | Event::Complete { investigation_id, .. } => investigation_id,
        }
    }
}

/// Round a confidence value to at most 4 significant digits, per §4.6's
/// "Numeric semantics" and the `confidence:float(≤4sig)` wire shapes in §6.
pub fn round_confidence(value: f64) -> f64 {
    if value == 0.0 {
        return 0.0;
    }
    let magnitude = value.abs().log10().floor();
    let factor = 10f64.powf(3.0 - magnitude);
    (value * factor).round() / factor
}

/// Body shape for each event kind, matching §6's documented JSON objects
/// exactly. Serializing through this intermediate (rather than the internal
/// `Event` enum directly) keeps the wire contract stable even if internal
/// field layout changes.
fn body(event: &Event) -> serde_json::Value {
    use serde_json::json;
    match event {
        Event::Started { investigation_id } => json!({ "investigation_id": investigation_id }),
        Event::AgentStarted { investigation_id, adapter } => {
            json!({ "investigation_id": investigation_id, "adapter": adapter })
        }
        Event::AgentFinished { investigation_id, adapter } => {
            json!({ "investigation_id": investigation_id, "adapter": adapter })
        }
        Event::QueryExecuted { investigation_id, source, query_fingerprint, duration_ms, result_count, error, raw } => {
            json!({
                "investigation_id": investigation_id,
                "source": source,
                "query_fingerprint": query_fingerprint,
                "duration_ms": duration_ms,
                "result_count": result_count,
                "error": error,
                "raw": cap_raw(raw.as_ref()),
            })
        }
        Event::EvidenceAdded {
            investigation_id,
            evidence_id,
            source,
            finding,
            supports,
            weight,
            source_confidence,
            hypothesis_id,
            ts,
        } => json!({
            "investigation_id": investigation_id,
            "evidence_id": evidence_id,
            "source": source,
            "finding": finding,
            "supports": supports,
            "weight": weight,
            "source_confidence": source_confidence,
            "hypothesis_id": hypothesis_id,
            "ts": ts.to_rfc3339(),
        }),
        Event::HypothesisAdded { investigation_id, hypothesis_id, category, description } => json!({
            "investigation_id": investigation_id,
            "hypothesis_id": hypothesis_id,
            "category": category,
            "description": description,
        }),
        Event::HypothesisUpdated {
            investigation_id,
            hypothesis_id,
            category,
            description,
            confidence,
            state,
            evidence_for,
            evidence_against,
        } => json!({
            "investigation_id": investigation_id,
            "hypothesis_id": hypothesis_id,
            "category": category,
            "description": description,
            "confidence": round_confidence(*confidence),
            "state": state,
            "evidence_for": evidence_for,
            "evidence_against": evidence_against,
        }),
        Event::HypothesisEliminated { investigation_id, hypothesis_id, category } => json!({
            "investigation_id": investigation_id,
            "hypothesis_id": hypothesis_id,
            "category": category,
        }),
        Event::Decision { investigation_id, adapter, reason } => json!({
            "investigation_id": investigation_id,
            "adapter": adapter,
            "reason": reason,
        }),
        Event::Discussion { investigation_id, agent_id, message_type, message } => json!({
            "investigation_id": investigation_id,
            "agent_id": agent_id,
            "message_type": message_type,
            "message": message,
        }),
        Event::Heartbeat { investigation_id, progress, current_activity, agents_running, data_sources_queried, data_sources_total } => json!({
            "investigation_id": investigation_id,
            "progress": progress,
            "current_activity": current_activity,
            "agents_running": agents_running,
            "data_sources_queried": data_sources_queried,
            "data_sources_total": data_sources_total,
        }),
        Event::RootCause { investigation_id, category, description, confidence, recommended_actions } => json!({
            "investigation_id": investigation_id,
            "category": category,
            "description": description,
            "confidence": round_confidence(*confidence),
            "recommended_actions": recommended_actions,
        }),
        Event::NeedsHuman { investigation_id, question, hypotheses, missing_identifiers } => json!({
            "investigation_id": investigation_id,
            "question": question,
            "context": {
                "hypotheses": hypotheses,
                "missing_identifiers": missing_identifiers,
            },
        }),
        Event::Complete { investigation_id, status, duration_ms } => json!({
            "investigation_id": investigation_id,
            "status": status,
            "duration_ms": duration_ms,
        }),
    }
}

/// Raw payloads are capped at 32 KiB (default; see
/// [`crate::rca::config::EngineConfig::raw_payload_cap_bytes`]); larger
/// payloads are truncated with an indicator (§6).
const DEFAULT_RAW_PAYLOAD_CAP_BYTES: usize = 32 * 1024;

fn cap_raw(raw: Option<&serde_json::Value>) -> Option<serde_json::Value> {
    cap_raw_at(raw, DEFAULT_RAW_PAYLOAD_CAP_BYTES)
}

fn cap_raw_at(raw: Option<&serde_json::Value>, cap_bytes: usize) -> Option<serde_json::Value> {
    let raw = raw?;
    let rendered = serde_json::to_string(raw).unwrap_or_default();
    if rendered.len() <= cap_bytes {
        return Some(raw.clone());
    }
    Some(serde_json::json!({
        "truncated": true,
        "original_bytes": rendered.len(),
        "preview": rendered.chars().take(cap_bytes.min(rendered.len())).collect::<String>(),
    }))
}

/// Encode one event to the newline-framed wire format of §6:
/// `<kind>\t<json>\n`.
pub fn encode(event: &Event) -> String {
    format!("{}\t{}\n", event.kind(), serde_json::to_string(&body(event)).unwrap_or_default())
}

/// In-process observability callback, mirroring the source lineage's
/// `EventHandler` trait: default no-op bodies so implementers only override
/// the events they care about.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn on_event(&self, _event: &Event) {}
}

/// No-op handler, used where an [`EventHandler`] is required but the caller
/// has nothing to observe with.
pub struct NoopEventHandler;

#[async_trait]
impl EventHandler for NoopEventHandler {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_produces_tab_separated_kind_and_json() {
        let event = Event::Complete { investigation_id: "inv-1".to_string(), status: "success".to_string(), duration_ms: 42 };
        let wire = encode(&event);
        assert_eq!(wire, "complete\t{\"duration_ms\":42,\"investigation_id\":\"inv-1\",\"status\":\"success\"}\n");
    }

    #[test]
    fn round_confidence_keeps_four_significant_digits() {
        assert_eq!(round_confidence(0.123456), 0.1235);
        assert_eq!(round_confidence(0.9), 0.9);
    }

    #[test]
    fn raw_payload_over_cap_is_truncated_with_indicator() {
        let huge = serde_json::json!({ "data": "x".repeat(100) });
        let capped = cap_raw_at(Some(&huge), 32).unwrap();
        assert_eq!(capped["truncated"], serde_json::json!(true));
    }

    #[test]
    fn raw_payload_within_cap_is_untouched() {
        let small = serde_json::json!({ "ok": true });
        let capped = cap_raw_at(Some(&small), 1024).unwrap();
        assert_eq!(capped, small);
    }

    #[tokio::test]
    async fn noop_handler_accepts_any_event_without_panicking() {
        let handler = NoopEventHandler;
        handler.on_event(&Event::Started { investigation_id: "inv-1".to_string() }).await;
    }
}
