//! Multi-agent root-cause-analysis engine for shipment-tracking support
//! tickets. See `SPEC_FULL.md` for the full design; [`rca`] is the entire
//! crate surface.

pub mod rca;

pub use rca::{Event, Phase, Supervisor, SupervisorError, Ticket};
