//! Ticket intake and identifier normalization.
//!
//! A [`Ticket`] is the immutable input to an investigation: free text plus whatever
//! identifiers the submitter already knows. [`Identifiers`] starts as a partial map
//! supplied with the ticket and is filled in during the `intake` phase by the
//! identifier extractor (see [`crate::rca::identifier`]); it is frozen once the
//! investigation enters `collecting`.
//!
//! # Example
//!
//! ```rust
//! use shipment_rca::rca::ticket::{Ticket, Mode};
//!
//! let ticket = Ticket::new("Load U110123982 not tracking; shipper ABC Corp")
//!     .with_identifier("load_number", "U110123982")
//!     .with_mode_hint(Mode::Ocean);
//!
//! assert_eq!(ticket.identifiers.get("load_number"), Some("U110123982"));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Transport mode a ticket concerns. `Unknown` means the mode could not be
/// inferred during intake, not that the caller explicitly asked for "unknown".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Ocean,
    Rail,
    Air,
    Otr,
    Yard,
    Unknown,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Unknown
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Mode::Ocean => "ocean",
            Mode::Rail => "rail",
            Mode::Air => "air",
            Mode::Otr => "otr",
            Mode::Yard => "yard",
            Mode::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Provenance of an identifier value: who or what supplied it.
///
/// Recorded on the first evidence item an identifier is used in, per the
/// extractor's "never guess silently" contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    User,
    Llm,
    Regex,
}

/// A semantic identifier slot. Unknown values are absent from [`Identifiers`],
/// never stored as empty strings.
pub const TRACKING_ID: &str = "tracking_id";
pub const LOAD_NUMBER: &str = "load_number";
pub const CONTAINER_NUMBER: &str = "container_number";
pub const BOOKING_NUMBER: &str = "booking_number";
pub const BILL_OF_LADING: &str = "bill_of_lading";
pub const CARRIER_ID: &str = "carrier_id";
pub const SHIPPER_ID: &str = "shipper_id";
pub const AWB: &str = "awb";
pub const PRO_NUMBER: &str = "pro_number";
pub const RAIL_CAR: &str = "rail_car";

/// Mutable-during-intake, frozen-thereafter map of identifier slot name to value.
///
/// Backed by a plain `HashMap<String, String>` rather than a fixed struct because
/// the slot set is open-ended across transport modes (§3 of the design notes lists
/// `awb`, `pro_number`, `rail_car`, … as "mode-specific extensions"); callers that
/// want a typed accessor for a known slot use the `get`/`set` helpers with the slot
/// constants above.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifiers {
    values: HashMap<String, String>,
    #[serde(default)]
    provenance: HashMap<String, Provenance>,
}

impl Identifiers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch an identifier value. Absent slots return `None`, never `Some("")`.
    pub fn get(&self, slot: &str) -> Option<&str> {
        self.values.get(slot).map(String::as_str)
    }

    /// Set an identifier value with its provenance. Overwrites any prior value
    /// for the same slot along with its recorded provenance.
    pub fn set(&mut self, slot: impl Into<String>, value: impl Into<String>, origin: Provenance) {
        let slot = slot.into();
        self.values.insert(slot.clone(), value.into());
        self.provenance.insert(slot, origin);
    }

    pub fn provenance_of(&self, slot: &str) -> Option<Provenance> {
        self.provenance.get(slot).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Slot names this identifier set is missing, out of the slots named.
    pub fn missing<'a>(&self, slots: &[&'a str]) -> Vec<&'a str> {
        slots.iter().filter(|s| !self.values.contains_key(**s)).copied().collect()
    }
}

/// Immutable input to an investigation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub description: String,
    #[serde(default)]
    pub identifiers: Identifiers,
    pub mode_hint: Option<Mode>,
    pub shipper_hint: Option<String>,
    pub carrier_hint: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

impl Ticket {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            identifiers: Identifiers::new(),
            mode_hint: None,
            shipper_hint: None,
            carrier_hint: None,
            submitted_at: Utc::now(),
        }
    }

    pub fn with_identifier(mut self, slot: impl Into<String>, value: impl Into<String>) -> Self {
        self.identifiers.set(slot, value, Provenance::User);
        self
    }

    pub fn with_mode_hint(mut self, mode: Mode) -> Self {
        self.mode_hint = Some(mode);
        self
    }

    pub fn with_shipper_hint(mut self, shipper: impl Into<String>) -> Self {
        self.shipper_hint = Some(shipper.into());
        self
    }

    pub fn with_carrier_hint(mut self, carrier: impl Into<String>) -> Self {
        self.carrier_hint = Some(carrier.into());
        self
    }

    /// Identifiers to seed extraction with: `identifiers` plus `shipper_hint`/
    /// `carrier_hint` folded in as user-provenance `shipper_id`/`carrier_id`
    /// slots when those aren't already present, so a caller who names the
    /// shipper/carrier out of band doesn't have to also repeat it as a bare
    /// identifier.
    pub fn seed_identifiers(&self) -> Identifiers {
        let mut identifiers = self.identifiers.clone();
        if identifiers.get(SHIPPER_ID).is_none() {
            if let Some(shipper) = &self.shipper_hint {
                identifiers.set(SHIPPER_ID, shipper.clone(), Provenance::User);
            }
        }
        if identifiers.get(CARRIER_ID).is_none() {
            if let Some(carrier) = &self.carrier_hint {
                identifiers.set(CARRIER_ID, carrier.clone(), Provenance::User);
            }
        }
        identifiers
    }
}
