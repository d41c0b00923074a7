//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Resource endpoints are mounted under `/api/v1`; `/health` sits at the
//! root.

pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI document covering every REST and SSE endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "presence-gateway"),
    paths(
        handlers::system::health_handler,
        handlers::presence::list_presence,
        handlers::presence::get_presence,
        handlers::presence::close_session,
        handlers::events::publish_event,
        crate::sse::handler::stream_handler,
    ),
    components(schemas(
        dto::PresenceListResponse,
        dto::PresenceResponse,
        dto::PublishEventRequest,
        handlers::system::HealthResponse,
        crate::domain::PublishReport,
        crate::domain::PresenceStatus,
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
    )),
    tags(
        (name = "System", description = "Health"),
        (name = "Presence", description = "Who is online"),
        (name = "Events", description = "Event publishing and streaming"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
}
