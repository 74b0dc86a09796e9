//! Process-wide investigation registry.
//!
//! The supervisor exclusively owns each investigation's object (§3's
//! "Ownership & lifecycle"); the one process-global mutable structure is this
//! lookup table from investigation id to a lightweight control handle, guarded
//! by a single lock, per §9's re-architecture note ("no process-global mutable
//! structures except the investigations registry"). The handle carries only
//! what `Cancel`/`Provide-human-input` need to reach a running investigation —
//! the cancellation signal, the current phase, and a slot for an in-flight
//! human-input request — never the investigation's evidence or hypotheses,
//! which stay local to the task driving it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{oneshot, watch};

use crate::rca::supervisor::Phase;

pub(crate) struct InvestigationHandle {
    pub cancel_tx: watch::Sender<bool>,
    pub phase: Arc<Mutex<Phase>>,
    pub human_input_tx: Mutex<Option<oneshot::Sender<String>>>,
}

#[derive(Default)]
pub(crate) struct Registry {
    handles: Mutex<HashMap<String, Arc<InvestigationHandle>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: String, handle: Arc<InvestigationHandle>) {
        self.handles.lock().expect("registry lock poisoned").insert(id, handle);
    }

    pub fn get(&self, id: &str) -> Option<Arc<InvestigationHandle>> {
        self.handles.lock().expect("registry lock poisoned").get(id).cloned()
    }

    pub fn remove(&self, id: &str) {
        self.handles.lock().expect("registry lock poisoned").remove(id);
    }
}
