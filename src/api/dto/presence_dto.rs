//! Presence DTOs for the listing and single-identity endpoints.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{Identity, PresenceStatus};
use crate::service::PresenceView;

/// Response body for `GET /presence`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PresenceListResponse {
    /// Identities with an open connection, sorted.
    pub identities: Vec<Identity>,
    /// Number of open connections.
    pub count: usize,
}

/// Response body for `GET /presence/{identity}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PresenceResponse {
    /// Identity queried.
    pub identity: Identity,
    /// Whether the identity has an open connection on this node.
    pub connected: bool,
    /// Stored status; `online` while connected even if the store lags.
    pub status: PresenceStatus,
    /// Last stored status change, if the store knows the identity.
    pub last_seen: Option<DateTime<Utc>>,
}

impl From<PresenceView> for PresenceResponse {
    fn from(view: PresenceView) -> Self {
        let stored_online = view.record.as_ref().is_some_and(|r| r.online);
        Self {
            identity: view.identity,
            connected: view.connected,
            status: PresenceStatus::from_online(view.connected || stored_online),
            last_seen: view.record.map(|r| r.last_seen),
        }
    }
}
