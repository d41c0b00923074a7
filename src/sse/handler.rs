//! Axum SSE stream handler.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use futures_util::{Stream, StreamExt};

use super::identity::AssertedIdentity;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, GatewayError};

/// `GET /events/stream` — Open the caller's event stream.
///
/// The first frame is always `{"type":"connected","identity":...}`.
/// Dropping the connection closes the session and marks the identity
/// offline.
///
/// # Errors
///
/// Returns [`GatewayError::Unauthenticated`] when the identity header is
/// missing or blank.
#[utoipa::path(
    get,
    path = "/api/v1/events/stream",
    tag = "Events",
    summary = "Open event stream",
    description = "Long-lived server-sent-events stream. Requires the identity header set by the auth layer.",
    responses(
        (status = 200, description = "Event stream", content_type = "text/event-stream", body = String),
        (status = 401, description = "No authenticated identity", body = ErrorResponse),
    )
)]
pub async fn stream_handler(
    State(state): State<AppState>,
    AssertedIdentity(identity): AssertedIdentity,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, GatewayError> {
    let connection = state.presence_service.connect(identity)?;
    tracing::debug!(
        identity = %connection.identity(),
        connection_id = %connection.connection_id(),
        "event stream opened"
    );

    let stream = connection
        .into_frames()
        .map(|frame| Ok(SseEvent::default().data(frame.json())));

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(state.sse_keep_alive)))
}
