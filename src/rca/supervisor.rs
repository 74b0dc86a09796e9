//! Investigation supervisor (§4.1): the phase state machine that drives one
//! investigation from intake through to a terminal event, wiring together
//! every other module in this crate.
//!
//! Each call to [`Supervisor::start`] spawns one task that owns its
//! [`crate::rca::evidence::EvidenceStore`] and
//! [`crate::rca::hypothesis::HypothesisEngine`] exclusively — no other task
//! touches them — and emits a total order of [`Event`]s on a
//! [`tokio::sync::broadcast`] channel, mirroring the source lineage's
//! `orchestration` module's one-task-per-run shape but generalized from a
//! single request/response round into a multi-phase loop. [`Cancel`] and
//! [`Provide-human-input`](Supervisor::provide_human_input) reach the running
//! task through a lightweight [`crate::rca::registry::InvestigationHandle`]
//! rather than shared mutable investigation state.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::{broadcast, oneshot, watch};
use uuid::Uuid;

use crate::rca::adapter::AdapterRegistry;
use crate::rca::config::Config;
use crate::rca::decision_tree::{DecisionTree, TreeOutcome};
use crate::rca::error::SupervisorError;
use crate::rca::evidence::{Evidence, EvidenceId, EvidenceStore};
use crate::rca::event::{Event, EventHandler, HypothesisSummary, NoopEventHandler, RecommendedAction};
use crate::rca::hypothesis::{Category, HypothesisEngine, HypothesisId, HypothesisState, ReasoningOutcome};
use crate::rca::identifier;
use crate::rca::llm::LlmClassifier;
use crate::rca::pattern::{newly_matching, PatternLibrary};
use crate::rca::registry::{InvestigationHandle, Registry};
use crate::rca::scheduler::Scheduler;
use crate::rca::ticket::{
    Identifiers, Mode, Ticket, AWB, BILL_OF_LADING, CARRIER_ID, CONTAINER_NUMBER, LOAD_NUMBER, SHIPPER_ID, TRACKING_ID,
};

/// Investigation lifecycle phase (§4.1). `Reasoning` is the only phase with a
/// permitted backward transition, back to `Collecting`, bounded by
/// `max_iterations`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Intake,
    Collecting,
    Reasoning,
    Synthesizing,
    NeedsHuman,
    Complete,
    Failed,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Intake => "intake",
            Phase::Collecting => "collecting",
            Phase::Reasoning => "reasoning",
            Phase::Synthesizing => "synthesizing",
            Phase::NeedsHuman => "needs_human",
            Phase::Complete => "complete",
            Phase::Failed => "failed",
        }
    }
}

/// Shared, reusable wiring for every investigation this supervisor runs.
/// Adapters, patterns, and an optional decision tree are configured once at
/// construction; `start` only varies per-ticket.
pub struct Supervisor {
    config: Config,
    adapters: Arc<AdapterRegistry>,
    patterns: Arc<PatternLibrary>,
    decision_tree: Option<Arc<DecisionTree>>,
    llm: Arc<dyn LlmClassifier>,
    event_handler: Arc<dyn EventHandler>,
    registry: Arc<Registry>,
}

impl Supervisor {
    pub fn new(config: Config, adapters: AdapterRegistry, patterns: PatternLibrary, llm: Arc<dyn LlmClassifier>) -> Self {
        Self {
            config,
            adapters: Arc::new(adapters),
            patterns: Arc::new(patterns),
            decision_tree: None,
            llm,
            event_handler: Arc::new(NoopEventHandler),
            registry: Arc::new(Registry::new()),
        }
    }

    pub fn with_decision_tree(mut self, tree: DecisionTree) -> Self {
        self.decision_tree = Some(Arc::new(tree));
        self
    }

    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = handler;
        self
    }

    /// `Start` (§4.1): begin a new investigation, returning its id immediately
    /// and a receiver for its event stream. The investigation runs on its own
    /// task and outlives this call.
    pub async fn start(&self, ticket: Ticket) -> (String, broadcast::Receiver<Event>) {
        let investigation_id = format!("inv-{}", Uuid::new_v4());
        let (tx, rx) = broadcast::channel(self.config.engine.event_queue_len.max(1));
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let phase = Arc::new(Mutex::new(Phase::Intake));
        let handle = Arc::new(InvestigationHandle {
            cancel_tx,
            phase: phase.clone(),
            human_input_tx: Mutex::new(None),
        });
        self.registry.insert(investigation_id.clone(), handle.clone());

        let driver = InvestigationDriver {
            id: investigation_id.clone(),
            config: self.config.clone(),
            adapters: self.adapters.clone(),
            patterns: self.patterns.clone(),
            decision_tree: self.decision_tree.clone(),
            llm: self.llm.clone(),
            event_handler: self.event_handler.clone(),
            tx,
            cancel_rx,
            phase,
            handle,
            registry: self.registry.clone(),
        };

        tokio::spawn(driver.run(ticket));

        (investigation_id, rx)
    }

    /// `Cancel` (§4.1): request cancellation. Idempotent; cancelling an
    /// already-terminal investigation is a no-op once it has left the
    /// registry, and returns `UnknownInvestigation` at that point.
    pub fn cancel(&self, investigation_id: &str, reason: impl Into<String>) -> Result<(), SupervisorError> {
        let handle = self
            .registry
            .get(investigation_id)
            .ok_or_else(|| SupervisorError::UnknownInvestigation(investigation_id.to_string()))?;
        log::info!("cancelling investigation {investigation_id}: {}", reason.into());
        let _ = handle.cancel_tx.send(true);
        Ok(())
    }

    /// `Provide-human-input` (§4.1): only valid while the investigation is in
    /// `needs_human` with a question outstanding; resumes the driver, which
    /// re-enters `reasoning`.
    pub fn provide_human_input(&self, investigation_id: &str, answer: impl Into<String>) -> Result<(), SupervisorError> {
        let handle = self
            .registry
            .get(investigation_id)
            .ok_or_else(|| SupervisorError::UnknownInvestigation(investigation_id.to_string()))?;

        let current = *handle.phase.lock().expect("phase lock poisoned");
        if current != Phase::NeedsHuman {
            return Err(SupervisorError::InvalidPhase {
                investigation_id: investigation_id.to_string(),
                expected: Phase::NeedsHuman.label().to_string(),
                actual: current.label().to_string(),
            });
        }

        let mut slot = handle.human_input_tx.lock().expect("human input lock poisoned");
        match slot.take() {
            Some(sender) => {
                let _ = sender.send(answer.into());
                Ok(())
            }
            None => Err(SupervisorError::InvalidPhase {
                investigation_id: investigation_id.to_string(),
                expected: "needs_human with a question outstanding".to_string(),
                actual: "no pending question".to_string(),
            }),
        }
    }
}

/// The actual per-investigation state machine. Built fresh by
/// [`Supervisor::start`] and consumed by its `run` future; every field here is
/// either owned exclusively by this task or an `Arc` to read-only shared
/// configuration.
struct InvestigationDriver {
    id: String,
    config: Config,
    adapters: Arc<AdapterRegistry>,
    patterns: Arc<PatternLibrary>,
    decision_tree: Option<Arc<DecisionTree>>,
    llm: Arc<dyn LlmClassifier>,
    event_handler: Arc<dyn EventHandler>,
    tx: broadcast::Sender<Event>,
    cancel_rx: watch::Receiver<bool>,
    phase: Arc<Mutex<Phase>>,
    handle: Arc<InvestigationHandle>,
    registry: Arc<Registry>,
}

/// Terminal status for the closing `complete` event.
enum Outcome {
    Success,
    NeedsHumanExhausted,
    Cancelled,
    Failed,
}

/// Which commonly-useful identifier slots (plus `mode`, which lives outside
/// the [`Identifiers`] map) are still absent, for the `needs_human` event's
/// `missing_identifiers` field (§4.6's "no evidence" edge case and §6's
/// `needs_human` body).
fn missing_identifiers(identifiers: &Identifiers, mode: Mode) -> Vec<String> {
    let mut missing: Vec<String> = identifiers
        .missing(&[TRACKING_ID, LOAD_NUMBER, CONTAINER_NUMBER, AWB, BILL_OF_LADING, SHIPPER_ID, CARRIER_ID])
        .into_iter()
        .map(str::to_string)
        .collect();
    if mode == Mode::Unknown {
        missing.push("mode".to_string());
    }
    missing
}

/// K in §4.6's "up to K (default 5) additional hypotheses".
const LLM_HYPOTHESIS_LIMIT: usize = 5;

/// Builds the prompt for the LLM-suggested-hypothesis seeding source (§4.6).
/// The core imposes no specific prompt text (Non-goal 2, per `llm.rs`); this
/// is one caller's choice of wording and of a `category|description|prior`
/// response format, asked for explicitly so `parse_llm_hypotheses` has
/// something line-oriented to parse.
fn llm_hypothesis_prompt(store: &EvidenceStore) -> String {
    let mut lines = vec![
        "Given the following evidence, suggest additional root-cause hypotheses not already implied by it.".to_string(),
        "Respond with one hypothesis per line as `category|description|prior`, prior a number between 0.10 and 0.35."
            .to_string(),
        "Evidence:".to_string(),
    ];
    for item in store.iter() {
        lines.push(format!(
            "- source={} supports={} weight={} finding={}",
            item.evidence.source, item.evidence.supports, item.evidence.weight, item.evidence.finding
        ));
    }
    lines.join("\n")
}

/// Parses the `category|description|prior` lines a response to
/// [`llm_hypothesis_prompt`] is expected to contain, clamping `prior` into
/// [0.10, 0.35] per §4.6 and capping at [`LLM_HYPOTHESIS_LIMIT`] suggestions.
/// Lines that don't fit the shape (including the whole response, if the
/// configured LLM ignores the requested format) are skipped rather than
/// erroring — this source is additive, never load-bearing.
fn parse_llm_hypotheses(response: &str) -> Vec<(Category, String, f64)> {
    response
        .lines()
        .filter_map(|line| {
            let mut fields = line.splitn(3, '|');
            let category = Category::from_slug(fields.next()?.trim())?;
            let description = fields.next()?.trim();
            if description.is_empty() {
                return None;
            }
            let prior: f64 = fields.next()?.trim().parse().ok()?;
            Some((category, description.to_string(), prior.clamp(0.10, 0.35)))
        })
        .take(LLM_HYPOTHESIS_LIMIT)
        .collect()
}

impl Outcome {
    fn label(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::NeedsHumanExhausted => "needs_human",
            Outcome::Cancelled => "cancelled",
            Outcome::Failed => "failed",
        }
    }
}

impl InvestigationDriver {
    async fn emit(&self, event: Event) {
        self.event_handler.on_event(&event).await;
        let _ = self.tx.send(event);
    }

    fn set_phase(&self, phase: Phase) {
        log::info!("investigation {} entering phase {}", self.id, phase.label());
        *self.phase.lock().expect("phase lock poisoned") = phase;
    }

    fn cancelled(&self) -> bool {
        *self.cancel_rx.borrow()
    }

    /// Wait for either a human answer or cancellation, having already
    /// registered an outstanding question via `phase = NeedsHuman`.
    async fn await_human_input(&self) -> Option<String> {
        if self.cancelled() {
            return None;
        }
        let (tx, rx) = oneshot::channel();
        *self.handle.human_input_tx.lock().expect("human input lock poisoned") = Some(tx);
        let mut cancel_rx = self.cancel_rx.clone();
        tokio::select! {
            answer = rx => answer.ok(),
            _ = cancel_rx.changed() => None,
        }
    }

    async fn run(self, ticket: Ticket) {
        let started = Instant::now();
        let iteration_counter = Arc::new(AtomicU32::new(0));
        let total_adapters = self.adapters.enabled().len() as u32;

        self.emit(Event::Started { investigation_id: self.id.clone() }).await;

        let heartbeat = {
            let tx = self.tx.clone();
            let id = self.id.clone();
            let interval = self.config.engine.heartbeat_interval;
            let max_iterations = self.config.engine.max_iterations.max(1) as f64;
            let iteration_counter = iteration_counter.clone();
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(interval).await;
                    let progress = (iteration_counter.load(Ordering::Relaxed) as f64 / max_iterations).min(1.0);
                    let _ = tx.send(Event::Heartbeat {
                        investigation_id: id.clone(),
                        progress,
                        current_activity: "investigating".to_string(),
                        agents_running: Vec::new(),
                        data_sources_queried: 0,
                        data_sources_total: total_adapters,
                    });
                }
            })
        };

        let deadline = tokio::time::sleep(self.config.engine.overall_deadline);
        tokio::pin!(deadline);
        let body = self.drive(ticket, iteration_counter);
        tokio::pin!(body);

        let outcome = tokio::select! {
            _ = &mut deadline => Outcome::Failed,
            outcome = &mut body => outcome,
        };

        heartbeat.abort();
        if matches!(outcome, Outcome::Failed) {
            log::error!("investigation {} failed (overall deadline or unrecoverable error)", self.id);
        } else {
            log::info!("investigation {} terminated with outcome {}", self.id, outcome.label());
        }
        self.set_phase(match outcome {
            Outcome::Success => Phase::Complete,
            Outcome::NeedsHumanExhausted => Phase::Complete,
            Outcome::Cancelled => Phase::Complete,
            Outcome::Failed => Phase::Failed,
        });
        self.emit(Event::Complete {
            investigation_id: self.id.clone(),
            status: outcome.label().to_string(),
            duration_ms: started.elapsed().as_millis() as u64,
        })
        .await;
        self.registry.remove(&self.id);
    }

    /// Runs intake through reasoning to a natural conclusion. Does not itself
    /// emit the closing `complete` event — `run` does that once, regardless
    /// of which path this returns through.
    async fn drive(&self, ticket: Ticket, iteration_counter: Arc<AtomicU32>) -> Outcome {
        self.set_phase(Phase::Intake);

        let mut extraction = identifier::extract(&ticket.description, ticket.seed_identifiers(), ticket.mode_hint, self.llm.as_ref()).await;

        if extraction.is_err() {
            self.set_phase(Phase::NeedsHuman);
            self.emit(Event::NeedsHuman {
                investigation_id: self.id.clone(),
                question: "Could not identify a trackable shipment from the ticket text. What tracking id, load number, or container number applies?".to_string(),
                hypotheses: Vec::new(),
                missing_identifiers: vec!["tracking_id".to_string(), "load_number".to_string(), "container_number".to_string()],
            })
            .await;

            match self.await_human_input().await {
                None => return Outcome::Cancelled,
                Some(answer) => {
                    let merged_text = format!("{} {}", ticket.description, answer);
                    extraction = identifier::extract(&merged_text, ticket.seed_identifiers(), ticket.mode_hint, self.llm.as_ref()).await;
                    if extraction.is_err() {
                        return Outcome::NeedsHumanExhausted;
                    }
                }
            }
        }

        let extraction = extraction.expect("checked above");
        let identifiers = extraction.identifiers;
        let mode = extraction.mode;

        let mut evidence_store = EvidenceStore::new();
        let mut hypothesis_engine = HypothesisEngine::new(self.config.scoring);
        let scheduler = Scheduler::new(
            self.config.engine.concurrent_tasks_per_investigation,
            self.config.engine.per_task_deadline,
        );
        let mut seeded_categories: Vec<Category> = Vec::new();
        let mut bound_evidence: std::collections::HashSet<EvidenceId> = std::collections::HashSet::new();
        let mut eliminated_announced: std::collections::HashSet<HypothesisId> = std::collections::HashSet::new();

        loop {
            if self.cancelled() {
                return Outcome::Cancelled;
            }

            self.set_phase(Phase::Collecting);
            self.run_collecting_sweep(&scheduler, &identifiers, mode, &mut evidence_store).await;

            if self.cancelled() {
                return Outcome::Cancelled;
            }

            self.reconcile_decision_tree(&mut evidence_store, &mut hypothesis_engine, &mut bound_evidence).await;
            self.seed_and_bind_patterns(&evidence_store, &mut hypothesis_engine, &mut seeded_categories, &mut bound_evidence)
                .await;
            self.seed_llm_suggestions(&evidence_store, &mut hypothesis_engine, &mut seeded_categories).await;
            self.announce_updates(&hypothesis_engine, &mut eliminated_announced).await;

            self.set_phase(Phase::Reasoning);
            let iteration = iteration_counter.fetch_add(1, Ordering::Relaxed) + 1;
            let iterations_remaining = iteration < self.config.engine.max_iterations;

            match hypothesis_engine.evaluate(&evidence_store, iterations_remaining) {
                ReasoningOutcome::Confirmed(hyp_id) => {
                    self.announce_updates(&hypothesis_engine, &mut eliminated_announced).await;
                    self.synthesize(&hypothesis_engine, &hyp_id).await;
                    return Outcome::Success;
                }
                ReasoningOutcome::NeedsMoreEvidence { queries, .. } => {
                    if self.config.engine.collaborative_mode {
                        for q in &queries {
                            self.emit(Event::Decision { investigation_id: self.id.clone(), adapter: q.adapter.clone(), reason: q.reason.clone() }).await;
                        }
                    }
                    continue;
                }
                ReasoningOutcome::NeedsHuman { question } => {
                    let ranked = hypothesis_engine.ranked(&evidence_store);
                    let hypotheses = ranked
                        .iter()
                        .take(3)
                        .map(|h| HypothesisSummary { id: h.id.clone(), category: h.category.to_string(), confidence: h.confidence })
                        .collect();
                    self.set_phase(Phase::NeedsHuman);
                    self.emit(Event::NeedsHuman {
                        investigation_id: self.id.clone(),
                        question,
                        hypotheses,
                        missing_identifiers: missing_identifiers(&identifiers, mode),
                    })
                    .await;

                    match self.await_human_input().await {
                        None => return Outcome::Cancelled,
                        Some(answer) => {
                            if let Some(top) = hypothesis_engine.ranked(&evidence_store).first().map(|h| h.id.clone()) {
                                let evidence_id = evidence_store.append_capped(
                                    Evidence::new("human-input", answer, true).with_weight(6).with_hypothesis(top.clone()),
                                    self.config.engine.max_evidence,
                                );
                                if evidence_id != 0 {
                                    self.emit_evidence_added(&evidence_store, evidence_id).await;
                                    hypothesis_engine.record_evidence(&top, evidence_id, true, &evidence_store);
                                }
                            }
                            self.set_phase(Phase::Reasoning);
                            self.announce_updates(&hypothesis_engine, &mut eliminated_announced).await;
                            match hypothesis_engine.evaluate(&evidence_store, false) {
                                ReasoningOutcome::Confirmed(hyp_id) => {
                                    self.synthesize(&hypothesis_engine, &hyp_id).await;
                                    return Outcome::Success;
                                }
                                _ => return Outcome::NeedsHumanExhausted,
                            }
                        }
                    }
                }
            }
        }
    }

    async fn run_collecting_sweep(&self, scheduler: &Scheduler, identifiers: &Identifiers, mode: Mode, store: &mut EvidenceStore) {
        let runnable: Vec<_> = self
            .adapters
            .enabled()
            .into_iter()
            .filter(|a| a.required_identifiers().iter().all(|slot| identifiers.get(slot).is_some()))
            .collect();
        for adapter in &runnable {
            self.emit(Event::AgentStarted { investigation_id: self.id.clone(), adapter: adapter.name().to_string() }).await;
        }

        let results = scheduler.run_sweep(&self.adapters, &self.id, identifiers, mode, &self.cancel_rx).await;

        for result in results {
            self.emit(Event::AgentFinished { investigation_id: self.id.clone(), adapter: result.adapter_name.clone() }).await;
            self.emit(Event::QueryExecuted {
                investigation_id: self.id.clone(),
                source: result.adapter_name.clone(),
                query_fingerprint: result.adapter_name.clone(),
                duration_ms: result.duration.as_millis() as u64,
                result_count: Some(result.evidence.len() as u32),
                error: result.error.clone(),
                raw: result.raw_payload.clone(),
            })
            .await;

            for evidence in result.evidence {
                let id = store.append_capped(evidence, self.config.engine.max_evidence);
                if id != 0 {
                    self.emit_evidence_added(store, id).await;
                }
            }
        }
    }

    async fn emit_evidence_added(&self, store: &EvidenceStore, id: EvidenceId) {
        let Some(item) = store.get(id) else { return };
        self.emit(Event::EvidenceAdded {
            investigation_id: self.id.clone(),
            evidence_id: item.id,
            source: item.evidence.source.clone(),
            finding: item.evidence.finding.clone(),
            supports: item.evidence.supports,
            weight: item.evidence.weight,
            source_confidence: item.evidence.source_confidence,
            hypothesis_id: item.evidence.hypothesis_id.clone(),
            ts: item.evidence.timestamp,
        })
        .await;
    }

    async fn reconcile_decision_tree(
        &self,
        store: &mut EvidenceStore,
        engine: &mut HypothesisEngine,
        bound: &mut std::collections::HashSet<EvidenceId>,
    ) {
        let Some(tree) = &self.decision_tree else { return };
        if let TreeOutcome::Conclusion { category, description, weight } = tree.evaluate(store) {
            let is_new = engine.all().all(|h| h.category != category);
            let hyp_id = engine.seed(category, description.clone(), 0.3);
            if is_new {
                self.emit(Event::HypothesisAdded {
                    investigation_id: self.id.clone(),
                    hypothesis_id: hyp_id.clone(),
                    category: category.to_string(),
                    description: description.clone(),
                })
                .await;
            }
            let evidence_id = store.append_capped(
                Evidence::new("decision-tree", description, true).with_weight(weight).with_hypothesis(hyp_id.clone()),
                self.config.engine.max_evidence,
            );
            if evidence_id != 0 && bound.insert(evidence_id) {
                self.emit_evidence_added(store, evidence_id).await;
                engine.record_evidence(&hyp_id, evidence_id, true, store);
            }
        }
    }

    async fn seed_and_bind_patterns(
        &self,
        store: &EvidenceStore,
        engine: &mut HypothesisEngine,
        seeded: &mut Vec<Category>,
        bound: &mut std::collections::HashSet<EvidenceId>,
    ) {
        let matches: Vec<_> = newly_matching(&self.patterns, store, seeded.as_slice()).into_iter().cloned().collect();
        for pattern in matches {
            let hyp_id = engine.seed(pattern.category, pattern.resolution_template.clone(), pattern.prior);
            seeded.push(pattern.category);
            self.emit(Event::HypothesisAdded {
                investigation_id: self.id.clone(),
                hypothesis_id: hyp_id.clone(),
                category: pattern.category.to_string(),
                description: pattern.resolution_template.clone(),
            })
            .await;

            for item in store.iter() {
                if bound.contains(&item.id) {
                    continue;
                }
                let item_matches = pattern.symptoms.iter().any(|predicate| {
                    predicate
                        .matches_evidence(&item.evidence.source, &item.evidence.finding, item.evidence.supports)
                });
                if item_matches {
                    // A matched symptom is, by definition, diagnostic of the
                    // category it just seeded — bind it as supporting that
                    // hypothesis regardless of the item's own `supports` flag,
                    // which records the adapter's polarity on its own claim
                    // (e.g. a timeout is "weak negative" in general) and is not
                    // itself a verdict on this specific hypothesis.
                    engine.record_evidence(&hyp_id, item.id, true, store);
                    bound.insert(item.id);
                }
            }
        }
    }

    /// Second hypothesis-seeding source (§4.6): an LLM call over the
    /// accumulated evidence proposes up to [`LLM_HYPOTHESIS_LIMIT`] additional
    /// hypotheses. Not on the control-flow hot path — an `Err` or
    /// unparseable response is a silent no-op, matching the identifier
    /// extractor's own degrade-to-fallback contract for this same trait.
    async fn seed_llm_suggestions(&self, store: &EvidenceStore, engine: &mut HypothesisEngine, seeded: &mut Vec<Category>) {
        if store.is_empty() {
            return;
        }
        let Ok(response) = self.llm.complete(&llm_hypothesis_prompt(store)).await else { return };

        for (category, description, prior) in parse_llm_hypotheses(&response) {
            if seeded.contains(&category) {
                continue;
            }
            let hyp_id = engine.seed(category, description.clone(), prior);
            seeded.push(category);
            self.emit(Event::HypothesisAdded {
                investigation_id: self.id.clone(),
                hypothesis_id: hyp_id,
                category: category.to_string(),
                description,
            })
            .await;
        }
    }

    async fn announce_updates(&self, engine: &HypothesisEngine, eliminated_announced: &mut std::collections::HashSet<HypothesisId>) {
        for h in engine.all() {
            if h.state == HypothesisState::Eliminated {
                if eliminated_announced.insert(h.id.clone()) {
                    self.emit(Event::HypothesisEliminated {
                        investigation_id: self.id.clone(),
                        hypothesis_id: h.id.clone(),
                        category: h.category.to_string(),
                    })
                    .await;
                }
                continue;
            }
            self.emit(Event::HypothesisUpdated {
                investigation_id: self.id.clone(),
                hypothesis_id: h.id.clone(),
                category: h.category.to_string(),
                description: h.description.clone(),
                confidence: h.confidence,
                state: match h.state {
                    HypothesisState::Active => "active",
                    HypothesisState::Confirmed => "confirmed",
                    HypothesisState::Eliminated => "eliminated",
                }
                .to_string(),
                evidence_for: h.evidence_for.clone(),
                evidence_against: h.evidence_against.clone(),
            })
            .await;
        }
    }

    async fn synthesize(&self, engine: &HypothesisEngine, hyp_id: &str) {
        self.set_phase(Phase::Synthesizing);
        let Some(h) = engine.get(hyp_id) else { return };
        let resolution = self
            .patterns
            .patterns()
            .iter()
            .find(|p| p.category == h.category)
            .map(|p| p.resolution_template.clone())
            .unwrap_or_else(|| h.description.clone());

        self.emit(Event::RootCause {
            investigation_id: self.id.clone(),
            category: h.category.to_string(),
            description: h.description.clone(),
            confidence: h.confidence,
            recommended_actions: vec![RecommendedAction {
                priority: "high".to_string(),
                category: h.category.to_string(),
                description: resolution,
            }],
        })
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rca::adapter::{AdapterConfig, AdapterContext, AdapterError, AdapterOutput, DataSourceAdapter};
    use crate::rca::llm::NullLlmClassifier;
    use std::time::Duration;

    struct NetworkRelationshipMissingAdapter;

    #[async_trait]
    impl DataSourceAdapter for NetworkRelationshipMissingAdapter {
        fn name(&self) -> &str {
            "network-relationship"
        }

        async fn execute(
            &self,
            _context: &AdapterContext,
            _identifiers: &Identifiers,
            _mode: Mode,
            _deadline: Duration,
        ) -> Result<AdapterOutput, AdapterError> {
            Ok(AdapterOutput {
                evidence: vec![Evidence::new("network-relationship", "no active relationship missing between shipper and carrier", true)
                    .with_weight(10)
                    .with_source_confidence(1.0)],
                raw_payload: None,
            })
        }
    }

    fn test_config() -> Config {
        Config::new().with_engine(
            crate::rca::config::EngineConfig::default()
                .with_overall_deadline(Duration::from_secs(5))
                .with_max_iterations(3),
        )
    }

    #[tokio::test]
    async fn confirmed_hypothesis_emits_root_cause_and_success() {
        let mut adapters = AdapterRegistry::new();
        adapters.register(Arc::new(NetworkRelationshipMissingAdapter), AdapterConfig::default());
        let supervisor = Supervisor::new(test_config(), adapters, PatternLibrary::built_in(), Arc::new(NullLlmClassifier));

        let ticket = Ticket::new("Shipment ABC123456 stuck, shipper says no relationship on file");
        let (_id, mut rx) = supervisor.start(ticket).await;

        let mut saw_root_cause = false;
        let mut saw_complete_success = false;
        while let Ok(event) = rx.recv().await {
            match &event {
                Event::RootCause { category, .. } => {
                    assert_eq!(category, "network_relationship_missing");
                    saw_root_cause = true;
                }
                Event::Complete { status, .. } => {
                    saw_complete_success = status == "success";
                    break;
                }
                _ => {}
            }
        }
        assert!(saw_root_cause);
        assert!(saw_complete_success);
    }

    #[tokio::test]
    async fn ticket_with_no_identifiers_asks_for_human_input() {
        let adapters = AdapterRegistry::new();
        let supervisor = Supervisor::new(test_config(), adapters, PatternLibrary::built_in(), Arc::new(NullLlmClassifier));
        let ticket = Ticket::new("Something seems off today");
        let (id, mut rx) = supervisor.start(ticket).await;

        let mut asked = false;
        while let Ok(event) = rx.recv().await {
            if let Event::NeedsHuman { .. } = event {
                asked = true;
                break;
            }
        }
        assert!(asked);
        // No answer is ever supplied; cancel to let the task terminate promptly.
        supervisor.cancel(&id, "test teardown").unwrap();
    }

    #[tokio::test]
    async fn cancel_unknown_investigation_errors() {
        let adapters = AdapterRegistry::new();
        let supervisor = Supervisor::new(test_config(), adapters, PatternLibrary::built_in(), Arc::new(NullLlmClassifier));
        let err = supervisor.cancel("inv-does-not-exist", "test").unwrap_err();
        assert!(matches!(err, SupervisorError::UnknownInvestigation(_)));
    }

    #[tokio::test]
    async fn cancellation_surfaces_as_cancelled_complete_event() {
        let adapters = AdapterRegistry::new();
        let supervisor = Supervisor::new(test_config(), adapters, PatternLibrary::built_in(), Arc::new(NullLlmClassifier));
        let ticket = Ticket::new("Something seems off today");
        let (id, mut rx) = supervisor.start(ticket).await;

        // Wait for the needs_human event from the no-identifiers path, then cancel.
        loop {
            match rx.recv().await {
                Ok(Event::NeedsHuman { .. }) => break,
                Ok(_) => continue,
                Err(_) => return,
            }
        }
        supervisor.cancel(&id, "user changed their mind").unwrap();

        let mut saw_cancelled = false;
        while let Ok(event) = rx.recv().await {
            if let Event::Complete { status, .. } = event {
                saw_cancelled = status == "cancelled";
                break;
            }
        }
        assert!(saw_cancelled);
    }

    #[test]
    fn parses_well_formed_suggestion_lines_and_clamps_prior() {
        let response = "carrier_api_down|carrier API intermittently unreachable|0.9\nnot_a_category|ignored|0.2\neld_not_enabled|ELD toggle left off|0.05";
        let suggestions = parse_llm_hypotheses(response);
        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0], (Category::CarrierApiDown, "carrier API intermittently unreachable".to_string(), 0.35));
        assert_eq!(suggestions[1], (Category::EldNotEnabled, "ELD toggle left off".to_string(), 0.10));
    }

    #[test]
    fn parse_caps_at_llm_hypothesis_limit() {
        let response = (0..10).map(|i| format!("unknown|suggestion {i}|0.2")).collect::<Vec<_>>().join("\n");
        assert_eq!(parse_llm_hypotheses(&response).len(), LLM_HYPOTHESIS_LIMIT);
    }

    struct FixedResponseLlm(String);

    #[async_trait]
    impl LlmClassifier for FixedResponseLlm {
        async fn complete(&self, _prompt: &str) -> crate::rca::llm::LlmResult<String> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn seed_llm_suggestions_adds_a_new_hypothesis_and_skips_already_seeded_categories() {
        let llm = FixedResponseLlm("carrier_api_down|carrier API flaky|0.2\nload_not_found|duplicate category|0.2".to_string());
        let supervisor = Supervisor::new(test_config(), AdapterRegistry::new(), PatternLibrary::built_in(), Arc::new(llm));
        let driver = InvestigationDriver {
            id: "inv-test".to_string(),
            config: supervisor.config.clone(),
            adapters: supervisor.adapters.clone(),
            patterns: supervisor.patterns.clone(),
            decision_tree: supervisor.decision_tree.clone(),
            llm: supervisor.llm.clone(),
            event_handler: supervisor.event_handler.clone(),
            tx: broadcast::channel(16).0,
            cancel_rx: watch::channel(false).1,
            phase: Arc::new(Mutex::new(Phase::Reasoning)),
            handle: Arc::new(InvestigationHandle { cancel_tx: watch::channel(false).0, phase: Arc::new(Mutex::new(Phase::Reasoning)), human_input_tx: Mutex::new(None) }),
            registry: supervisor.registry.clone(),
        };

        let mut store = EvidenceStore::new();
        store.append(Evidence::new("tracking-api", "some finding", true));
        let mut engine = HypothesisEngine::new(crate::rca::hypothesis::ScoringConfig::default());
        let mut seeded = vec![Category::LoadNotFound];

        driver.seed_llm_suggestions(&store, &mut engine, &mut seeded).await;

        assert!(engine.all().any(|h| h.category == Category::CarrierApiDown));
        assert!(engine.all().all(|h| h.category != Category::LoadNotFound), "already-seeded category must not be re-added");
        assert_eq!(seeded.len(), 2);
    }
}
