//! # presence-gateway
//!
//! Real-time presence and event-broadcast gateway for a property-management
//! platform.
//!
//! Every signed-in landlord or tenant holds one server-sent-events stream.
//! The gateway tracks who is reachable, mirrors online/offline state into a
//! presence store, and fans out JSON events to every open stream.
//! Authentication happens upstream; the gateway trusts the identity header
//! it is handed.
//!
//! ## Architecture
//!
//! ```text
//! Clients (SSE, HTTP)
//!     │
//!     ├── SSE Handler (sse/)
//!     ├── REST Handlers (api/)
//!     │
//!     ├── PresenceService (service/)
//!     │
//!     ├── SubscriptionSession (domain/)   one task per stream
//!     ├── BroadcastBus (domain/)
//!     ├── ConnectionRegistry (domain/)
//!     │
//!     └── PresenceStore: in-memory or PostgreSQL (persistence/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
pub mod sse;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use app_state::AppState;

/// Builds the full application router: REST, SSE and health endpoints.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(api::build_router())
        .nest("/api/v1", sse::routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
