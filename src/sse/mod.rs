//! Server-sent-events layer: identity extraction and the event stream.
//!
//! The endpoint at `/api/v1/events/stream` keeps one long-lived
//! `text/event-stream` response open per client. Each frame is a single
//! `data: <JSON>\n\n` record.

pub mod handler;
pub mod identity;

use axum::Router;
use axum::routing::get;

use crate::app_state::AppState;

/// SSE routes, nested under `/api/v1` by the caller.
pub fn routes() -> Router<AppState> {
    Router::new().route("/events/stream", get(handler::stream_handler))
}
