//! Database models for stored presence.

use chrono::{DateTime, Utc};

use crate::domain::{Identity, PresenceRecord};
use crate::error::GatewayError;

/// A row of the `user_presence` table.
#[derive(Debug, Clone)]
pub struct PresenceRow {
    /// Identity key.
    pub identity: String,
    /// Online flag.
    pub online: bool,
    /// Timestamp of the last change.
    pub last_seen: DateTime<Utc>,
}

impl From<(String, bool, DateTime<Utc>)> for PresenceRow {
    fn from((identity, online, last_seen): (String, bool, DateTime<Utc>)) -> Self {
        Self {
            identity,
            online,
            last_seen,
        }
    }
}

impl TryFrom<PresenceRow> for PresenceRecord {
    type Error = GatewayError;

    fn try_from(row: PresenceRow) -> Result<Self, Self::Error> {
        Ok(Self {
            identity: Identity::new(row.identity)?,
            online: row.online,
            last_seen: row.last_seen,
        })
    }
}
