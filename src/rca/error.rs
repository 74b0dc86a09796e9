//! Crate-level error taxonomy for the supervisor's public operations (§4.1,
//! §7, §10). A small closed set of variants with hand-written `Display`
//! impls, in the style of the source lineage's `OrchestrationError`/
//! `ToolError` enums, rather than a single stringly-typed error.

/// Errors returned by [`crate::rca::supervisor::Supervisor`]'s public
/// operations (`Start`, `Cancel`, `Provide-human-input`). These are
/// out-of-band failures of the *call itself* (bad investigation id, wrong
/// phase) — they are distinct from in-band investigation failures, which are
/// always surfaced as a `complete{status:"failed"}` event on the stream per
/// §7's propagation policy, never returned here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorError {
    UnknownInvestigation(String),
    InvalidPhase { investigation_id: String, expected: String, actual: String },
    DeadlineExceeded(String),
}

impl std::fmt::Display for SupervisorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SupervisorError::UnknownInvestigation(id) => write!(f, "unknown investigation: {id}"),
            SupervisorError::InvalidPhase { investigation_id, expected, actual } => write!(
                f,
                "invalid phase for investigation {investigation_id}: expected {expected}, was {actual}"
            ),
            SupervisorError::DeadlineExceeded(id) => write!(f, "overall deadline exceeded for investigation {id}"),
        }
    }
}

impl std::error::Error for SupervisorError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_name_the_investigation() {
        let err = SupervisorError::UnknownInvestigation("inv-404".to_string());
        assert!(err.to_string().contains("inv-404"));
    }
}
