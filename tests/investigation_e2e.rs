//! End-to-end investigation scenarios, mirroring §8's concrete end-to-end
//! scenarios against the real [`Supervisor`] driving the built-in reference
//! adapters. These exercise the whole pipeline — identifier extraction,
//! scheduling, evidence accumulation, hypothesis scoring, and the event
//! stream — rather than any single module in isolation.

use std::sync::Arc;
use std::time::Duration;

use shipment_rca::rca::adapter::{AdapterConfig, AdapterRegistry};
use shipment_rca::rca::adapters::{
    CallbackHistoryAdapter, HistoricalLogsAdapter, NetworkRelationshipAdapter, TrackingApiAdapter,
};
use shipment_rca::rca::config::{Config, EngineConfig};
use shipment_rca::rca::event::Event;
use shipment_rca::rca::llm::NullLlmClassifier;
use shipment_rca::rca::pattern::PatternLibrary;
use shipment_rca::rca::ticket::Ticket;
use shipment_rca::Supervisor;

async fn next_of_kind(rx: &mut tokio::sync::broadcast::Receiver<Event>, kind: &str) -> Event {
    loop {
        let event = rx.recv().await.expect("event stream ended before the expected event");
        if event.kind() == kind {
            return event;
        }
    }
}

fn supervisor_with(adapters: AdapterRegistry, engine: EngineConfig) -> Supervisor {
    let config = Config::new().with_engine(engine);
    Supervisor::new(config, adapters, PatternLibrary::built_in(), Arc::new(NullLlmClassifier))
}

/// Scenario 1 (§8): a load with no active shipper/carrier relationship
/// converges on `network_relationship_missing` at high confidence.
#[tokio::test]
async fn network_relationship_missing_resolves_root_cause() {
    let mut adapters = AdapterRegistry::new();
    adapters.register(Arc::new(NetworkRelationshipAdapter), AdapterConfig::default());
    adapters.register(Arc::new(TrackingApiAdapter), AdapterConfig::default());

    let supervisor = supervisor_with(adapters, EngineConfig::default().with_overall_deadline(Duration::from_secs(5)));

    let ticket = Ticket::new("Load U110123982 not tracking; shipper ABC Corp; carrier XYZ Logistics")
        .with_identifier("load_number", "U110123982")
        .with_identifier("shipper_id", "ABC Corp")
        .with_identifier("carrier_id", "XYZ Logistics");

    let (_id, mut rx) = supervisor.start(ticket).await;

    let event = next_of_kind(&mut rx, "root_cause").await;
    match event {
        Event::RootCause { category, confidence, recommended_actions, .. } => {
            assert_eq!(category, "network_relationship_missing");
            assert!(confidence >= 0.90, "confidence {confidence} below 0.90");
            assert!(recommended_actions
                .iter()
                .any(|a| a.description.to_lowercase().contains("create") || a.description.to_lowercase().contains("activate")));
        }
        other => panic!("expected root_cause, got {other:?}"),
    }

    let complete = next_of_kind(&mut rx, "complete").await;
    assert!(matches!(complete, Event::Complete { status, .. } if status == "success"));
}

/// Scenario 1 (§8), extraction-only variant: the same ticket but with no
/// identifiers supplied up front, relying entirely on the free-text
/// identifier extractor (§4.2) to pull `shipper_id`/`carrier_id` out of
/// "shipper ABC Corp; carrier XYZ Logistics" before the adapters ever run.
#[tokio::test]
async fn network_relationship_missing_resolves_from_free_text_alone() {
    let mut adapters = AdapterRegistry::new();
    adapters.register(Arc::new(NetworkRelationshipAdapter), AdapterConfig::default());
    adapters.register(Arc::new(TrackingApiAdapter), AdapterConfig::default());

    let supervisor = supervisor_with(adapters, EngineConfig::default().with_overall_deadline(Duration::from_secs(5)));

    let ticket = Ticket::new("Load U110123982 not tracking; shipper ABC Corp; carrier XYZ Logistics");
    let (_id, mut rx) = supervisor.start(ticket).await;

    let event = next_of_kind(&mut rx, "root_cause").await;
    match event {
        Event::RootCause { category, confidence, .. } => {
            assert_eq!(category, "network_relationship_missing");
            assert!(confidence >= 0.90, "confidence {confidence} below 0.90");
        }
        other => panic!("expected root_cause, got {other:?}"),
    }
}

/// Scenario 2 (§8): an unresolvable tracking id resolves `load_not_found`.
#[tokio::test]
async fn load_not_found_resolves_root_cause() {
    let mut adapters = AdapterRegistry::new();
    adapters.register(Arc::new(TrackingApiAdapter), AdapterConfig::default());

    let supervisor = supervisor_with(adapters, EngineConfig::default().with_overall_deadline(Duration::from_secs(5)));

    let ticket = Ticket::new("Tracking ID 999999999999 has no data");
    let (_id, mut rx) = supervisor.start(ticket).await;

    let event = next_of_kind(&mut rx, "root_cause").await;
    match event {
        Event::RootCause { category, confidence, .. } => {
            assert_eq!(category, "load_not_found");
            assert!(confidence >= 0.92, "confidence {confidence} below 0.92");
        }
        other => panic!("expected root_cause, got {other:?}"),
    }
}

/// Scenario 4 (§8): a 10ms per-task deadline against the slow
/// `historical-logs` fixture produces a timeout `query_executed` and a
/// weight-1 negative evidence item, with no hypothesis crossing threshold.
#[tokio::test]
async fn adapter_timeout_yields_weak_negative_evidence_and_needs_human() {
    let mut adapters = AdapterRegistry::new();
    adapters.register(Arc::new(HistoricalLogsAdapter), AdapterConfig::default());

    let engine = EngineConfig::default()
        .with_per_task_deadline(Duration::from_millis(10))
        .with_max_iterations(1)
        .with_overall_deadline(Duration::from_secs(5));
    let supervisor = supervisor_with(adapters, engine);

    let ticket = Ticket::new("Container MSCU1234567 status unclear").with_identifier("container_number", "MSCU1234567");
    let (_id, mut rx) = supervisor.start(ticket).await;

    // The adapter races its own deadline internally (per the adapter boundary's
    // cancellation-safety requirement) and surfaces `AdapterError::Deadline` to
    // the scheduler, which turns it into both a `query_executed` error and a
    // weight-1 negative evidence item (§7: the two must appear together).
    let query = next_of_kind(&mut rx, "query_executed").await;
    assert!(matches!(&query, Event::QueryExecuted { source, error: Some(e), .. } if source == "historical-logs" && e == "timeout"));

    let evidence = next_of_kind(&mut rx, "evidence_added").await;
    match evidence {
        Event::EvidenceAdded { source, supports, weight, finding, .. } => {
            assert_eq!(source, "historical-logs");
            assert!(!supports);
            assert_eq!(weight, 1);
            assert_eq!(finding, "timeout");
        }
        other => panic!("expected evidence_added, got {other:?}"),
    }

    let terminal = next_of_kind(&mut rx, "needs_human").await;
    assert!(matches!(terminal, Event::NeedsHuman { .. }));
}

/// Scenario 5 (§8): cancelling right after submission yields
/// `complete{status:"cancelled"}` with no root_cause or needs_human first.
#[tokio::test]
async fn cancellation_short_circuits_to_cancelled_complete() {
    let mut adapters = AdapterRegistry::new();
    adapters.register(Arc::new(CallbackHistoryAdapter), AdapterConfig::default());

    let supervisor = supervisor_with(adapters, EngineConfig::default().with_overall_deadline(Duration::from_secs(5)));

    let ticket = Ticket::new("Callback not firing for load 123456789012").with_identifier("tracking_id", "123456789012");
    let (investigation_id, mut rx) = supervisor.start(ticket).await;

    supervisor.cancel(&investigation_id, "operator requested cancellation").unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let event = tokio::time::timeout_at(deadline, rx.recv())
            .await
            .expect("no complete event within the 2s grace period")
            .expect("event stream ended unexpectedly");
        match event {
            Event::RootCause { .. } | Event::NeedsHuman { .. } => {
                panic!("cancellation must not be preceded by a root_cause or needs_human event")
            }
            Event::Complete { status, .. } => {
                assert_eq!(status, "cancelled");
                break;
            }
            _ => continue,
        }
    }
}

/// Scenario 3 (§8): an inconclusive tracking id (9 digits, below the
/// confident-not-found threshold of 12) produces only a weakly opposing
/// `tracking-api` finding that never seeds a confident hypothesis, so the
/// investigation asks a human rather than guessing. No answer is ever
/// supplied (mirroring the no-identifiers scenario's teardown); cancelling
/// lets the task terminate promptly instead of waiting on a human forever.
#[tokio::test]
async fn ambiguous_ticket_asks_for_human_input() {
    let mut adapters = AdapterRegistry::new();
    adapters.register(Arc::new(TrackingApiAdapter), AdapterConfig::default());

    let engine = EngineConfig::default().with_max_iterations(2).with_overall_deadline(Duration::from_secs(5));
    let supervisor = supervisor_with(adapters, engine);

    let ticket = Ticket::new("Something wrong with load 614258134").with_identifier("tracking_id", "614258134");
    let (id, mut rx) = supervisor.start(ticket).await;

    let terminal = next_of_kind(&mut rx, "needs_human").await;
    assert!(matches!(terminal, Event::NeedsHuman { .. }));

    supervisor.cancel(&id, "test teardown").unwrap();
    let complete = next_of_kind(&mut rx, "complete").await;
    assert!(matches!(complete, Event::Complete { status, .. } if status == "cancelled"));
}

/// `Cancel` on an investigation id that was never started fails with
/// `unknown-investigation` (§4.1's error conditions).
#[test]
fn cancel_unknown_investigation_is_an_error() {
    let supervisor = supervisor_with(AdapterRegistry::new(), EngineConfig::default());
    let err = supervisor.cancel("inv-does-not-exist", "test").unwrap_err();
    assert!(err.to_string().contains("inv-does-not-exist"));
}
