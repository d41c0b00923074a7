//! Shared application state injected into all Axum handlers.

use std::time::Duration;

use crate::service::PresenceService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Presence service for sessions and event delivery.
    pub presence_service: PresenceService,
    /// Lowercase name of the header carrying the authenticated identity.
    pub identity_header: String,
    /// Interval between SSE keep-alive comments.
    pub sse_keep_alive: Duration,
}
