//! Optional thin HTTP front end (§6's "Optional HTTP surface"), gated behind
//! the `http-server` feature.
//!
//! Because the core is a library, this module exists purely as a runnable
//! demonstration of the external interface in §6 — one route accepts a
//! ticket submission and streams the newline-framed wire format (see
//! [`crate::rca::event::encode`]) back as a chunked response. It performs no
//! authentication, rate-limiting, or tenancy (Non-goal 4) and is not a
//! hardened service, mirroring the source lineage's own `AxumHttpAdapter`
//! (`mcp_http_adapter.rs`): a small, feature-gated `axum::Router` wired
//! directly against the crate's own async API, with no framework of its own.
//!
//! # Example
//!
//! ```rust,no_run
//! use shipment_rca::rca::adapter::AdapterRegistry;
//! use shipment_rca::rca::config::Config;
//! use shipment_rca::rca::http::{serve, HttpServerConfig};
//! use shipment_rca::rca::llm::NullLlmClassifier;
//! use shipment_rca::rca::pattern::PatternLibrary;
//! use shipment_rca::Supervisor;
//! use std::sync::Arc;
//!
//! # async {
//! let supervisor = Arc::new(Supervisor::new(
//!     Config::default(),
//!     AdapterRegistry::new(),
//!     PatternLibrary::built_in(),
//!     Arc::new(NullLlmClassifier),
//! ));
//! serve(supervisor, HttpServerConfig::default()).await.unwrap();
//! # };
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::rca::event::encode;
use crate::rca::ticket::{Mode, Ticket};
use crate::rca::supervisor::Supervisor;

/// Bind address for [`serve`]. Defaults to loopback-only, since this surface
/// has no authentication of its own (Non-goal 4).
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub addr: SocketAddr,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self { addr: SocketAddr::from(([127, 0, 0, 1], 7878)) }
    }
}

/// JSON body accepted by `POST /investigations` (§6's "Submission").
#[derive(Debug, Deserialize)]
struct SubmitTicket {
    description: String,
    #[serde(default)]
    identifiers: std::collections::HashMap<String, String>,
    #[serde(default)]
    mode_hint: Option<Mode>,
}

fn ticket_from_submission(body: SubmitTicket) -> Ticket {
    let mut ticket = Ticket::new(body.description);
    for (slot, value) in body.identifiers {
        ticket = ticket.with_identifier(slot, value);
    }
    if let Some(mode) = body.mode_hint {
        ticket = ticket.with_mode_hint(mode);
    }
    ticket
}

/// Build the router. Exposed separately from [`serve`] so callers can mount
/// it into a larger `axum` app instead of taking over the listener.
pub fn router(supervisor: Arc<Supervisor>) -> Router {
    Router::new().route(
        "/investigations",
        post(move |Json(body): Json<SubmitTicket>| {
            let supervisor = supervisor.clone();
            async move {
                let ticket = ticket_from_submission(body);
                let (investigation_id, rx) = supervisor.start(ticket).await;

                let stream = BroadcastStream::new(rx).filter_map(|item| match item {
                    Ok(event) => Some(Ok::<_, std::io::Error>(encode(&event))),
                    // A lagged subscriber has skipped events; the stream format has
                    // no room for a gap marker, so drop the tick silently rather
                    // than fabricate one (the queue-length cap in §5 exists
                    // precisely so this stays rare).
                    Err(_) => None,
                });

                let body = Body::from_stream(stream);
                Response::builder()
                    .status(StatusCode::OK)
                    .header("content-type", "application/x-ndjson")
                    .header("x-investigation-id", investigation_id)
                    .body(body)
                    .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
            }
        }),
    )
}

/// Start the HTTP front end and block until the listener is closed.
pub async fn serve(supervisor: Arc<Supervisor>, config: HttpServerConfig) -> std::io::Result<()> {
    let app = router(supervisor);
    let listener = TcpListener::bind(config.addr).await?;
    log::info!("rca http surface listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_without_identifiers_or_mode_hint_builds_bare_ticket() {
        let body = SubmitTicket { description: "stuck shipment".to_string(), identifiers: Default::default(), mode_hint: None };
        let ticket = ticket_from_submission(body);
        assert_eq!(ticket.description, "stuck shipment");
        assert!(ticket.identifiers.is_empty());
        assert!(ticket.mode_hint.is_none());
    }

    #[test]
    fn submission_identifiers_carry_user_provenance() {
        let mut identifiers = std::collections::HashMap::new();
        identifiers.insert("load_number".to_string(), "U110123982".to_string());
        let body = SubmitTicket { description: "stuck shipment".to_string(), identifiers, mode_hint: Some(Mode::Ocean) };
        let ticket = ticket_from_submission(body);
        assert_eq!(ticket.identifiers.get("load_number"), Some("U110123982"));
        assert_eq!(ticket.identifiers.provenance_of("load_number"), Some(crate::rca::ticket::Provenance::User));
        assert_eq!(ticket.mode_hint, Some(Mode::Ocean));
    }
}
