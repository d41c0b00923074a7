//! Presence handlers: list, get, forced close.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get};
use axum::{Json, Router};

use crate::api::dto::{PresenceListResponse, PresenceResponse};
use crate::app_state::AppState;
use crate::domain::Identity;
use crate::error::{ErrorResponse, GatewayError};

/// `GET /presence` — List connected identities.
#[utoipa::path(
    get,
    path = "/api/v1/presence",
    tag = "Presence",
    summary = "List connected identities",
    description = "Returns every identity with an open event stream on this node.",
    responses(
        (status = 200, description = "Connected identities", body = PresenceListResponse),
    )
)]
pub async fn list_presence(State(state): State<AppState>) -> impl IntoResponse {
    let identities = state.presence_service.connected_identities();
    Json(PresenceListResponse {
        count: identities.len(),
        identities,
    })
}

/// `GET /presence/{identity}` — Presence of one identity.
///
/// # Errors
///
/// Returns [`GatewayError::PresenceNotFound`] if the identity is unknown,
/// or [`GatewayError::PresenceStore`] if the store lookup fails.
#[utoipa::path(
    get,
    path = "/api/v1/presence/{identity}",
    tag = "Presence",
    summary = "Get presence",
    description = "Combines the live connection state with the stored online/offline record.",
    params(
        ("identity" = String, Path, description = "Subscriber identity"),
    ),
    responses(
        (status = 200, description = "Presence of the identity", body = PresenceResponse),
        (status = 400, description = "Blank identity", body = ErrorResponse),
        (status = 404, description = "Identity unknown", body = ErrorResponse),
    )
)]
pub async fn get_presence(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let identity = Identity::new(identity)?;
    let view = state.presence_service.presence(&identity).await?;
    Ok(Json(PresenceResponse::from(view)))
}

/// `DELETE /sessions/{identity}` — Close the identity's event stream.
///
/// # Errors
///
/// Returns [`GatewayError::NotConnected`] if the identity has no open
/// stream.
#[utoipa::path(
    delete,
    path = "/api/v1/sessions/{identity}",
    tag = "Presence",
    summary = "Close a session",
    description = "Closes the identity's event stream. The identity is marked offline and peers are notified.",
    params(
        ("identity" = String, Path, description = "Subscriber identity"),
    ),
    responses(
        (status = 204, description = "Close requested"),
        (status = 404, description = "Identity not connected", body = ErrorResponse),
    )
)]
pub async fn close_session(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let identity = Identity::new(identity)?;
    state.presence_service.disconnect(&identity)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Presence routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/presence", get(list_presence))
        .route("/presence/{identity}", get(get_presence))
        .route("/sessions/{identity}", delete(close_session))
}
