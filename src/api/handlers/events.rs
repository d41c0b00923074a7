//! Event publishing handler.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::PublishEventRequest;
use crate::app_state::AppState;
use crate::domain::{Event, PublishReport};
use crate::error::{ErrorResponse, GatewayError};

/// `POST /events` — Publish an application event.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for a malformed or reserved
/// event, or [`GatewayError::NotConnected`] when `to` names an identity
/// without an open stream.
#[utoipa::path(
    post,
    path = "/api/v1/events",
    tag = "Events",
    summary = "Publish an event",
    description = "Broadcasts the event to every open stream, or delivers it to the `to` identity only. The built-in kinds `connected` and `presence-changed` are reserved.",
    request_body = PublishEventRequest,
    responses(
        (status = 202, description = "Event accepted for delivery", body = PublishReport),
        (status = 400, description = "Invalid event", body = ErrorResponse),
        (status = 404, description = "Target identity not connected", body = ErrorResponse),
    )
)]
pub async fn publish_event(
    State(state): State<AppState>,
    Json(req): Json<PublishEventRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let event = Event::from_json(req.event)?;

    let report = match req.to {
        Some(identity) => {
            state.presence_service.send_to(&identity, &event)?;
            PublishReport {
                attempted: 1,
                delivered: 1,
                failed: 0,
            }
        }
        None => state.presence_service.publish(&event),
    };

    tracing::debug!(event_type = event.kind(), delivered = report.delivered, "event accepted");
    Ok((axum::http::StatusCode::ACCEPTED, Json(report)))
}

/// Event routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/events", post(publish_event))
}
