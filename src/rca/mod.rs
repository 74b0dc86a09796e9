//! Multi-agent root-cause-analysis engine for shipment-tracking support
//! tickets (see `SPEC_FULL.md` at the workspace root for the full design).
//!
//! Module layout mirrors the component breakdown: intake and identifier
//! extraction ([`identifier`], [`ticket`]), parallel data collection
//! ([`adapter`], [`adapters`], [`scheduler`]), evidence accumulation
//! ([`evidence`]), hypothesis scoring ([`hypothesis`], [`pattern`]), the
//! optional deterministic overlay ([`decision_tree`]), the streaming event
//! protocol ([`event`]), and the supervisor that wires all of the above into
//! one investigation lifecycle ([`supervisor`]).

pub mod adapter;
pub mod adapters;
pub mod config;
pub mod decision_tree;
pub mod error;
pub mod event;
pub mod evidence;
#[cfg(feature = "http-server")]
pub mod http;
pub mod hypothesis;
pub mod identifier;
pub mod llm;
pub mod pattern;
pub(crate) mod registry;
pub mod scheduler;
pub mod supervisor;
pub mod ticket;

pub use error::SupervisorError;
pub use event::Event;
pub use supervisor::{Phase, Supervisor};
pub use ticket::Ticket;
