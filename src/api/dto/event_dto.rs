//! Event publishing DTOs.

use serde::Deserialize;
use utoipa::ToSchema;

use crate::domain::Identity;

/// Request body for `POST /events`.
///
/// ```json
/// { "to": "42", "event": { "type": "new-message", "batch": "b-7" } }
/// ```
#[derive(Debug, Deserialize, ToSchema)]
pub struct PublishEventRequest {
    /// Deliver to this identity only. Broadcast to everyone when absent.
    #[serde(default)]
    pub to: Option<Identity>,
    /// Flat event object; its `type` field names the event kind.
    #[schema(value_type = Object)]
    pub event: serde_json::Value,
}
