//! Durable online/offline state, owned outside the presence core.
//!
//! The core only ever calls [`PresenceStore::set_online`] and
//! [`PresenceStore::set_offline`]; both may fail independently of the
//! connection registry. [`InMemoryPresenceStore`] backs tests and
//! deployments without a database; the PostgreSQL implementation lives in
//! [`crate::persistence`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use utoipa::ToSchema;

use super::Identity;

/// Stored presence of one identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PresenceRecord {
    /// Identity the record belongs to.
    pub identity: Identity,
    /// Whether the identity is marked online.
    pub online: bool,
    /// When the record last changed.
    pub last_seen: DateTime<Utc>,
}

/// Failure reported by a presence store.
#[derive(Debug, thiserror::Error)]
pub enum PresenceStoreError {
    /// The backing database rejected the operation.
    #[error("database error: {0}")]
    Database(String),

    /// The store is not reachable.
    #[error("presence store unavailable: {0}")]
    Unavailable(String),
}

/// Durable presence state collaborator.
#[async_trait]
pub trait PresenceStore: Send + Sync + std::fmt::Debug {
    /// Marks `identity` online.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceStoreError`] if the update could not be stored.
    async fn set_online(&self, identity: &Identity) -> Result<(), PresenceStoreError>;

    /// Marks `identity` offline.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceStoreError`] if the update could not be stored.
    async fn set_offline(&self, identity: &Identity) -> Result<(), PresenceStoreError>;

    /// Fetches the stored presence of `identity`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceStoreError`] if the lookup failed.
    async fn get(&self, identity: &Identity) -> Result<Option<PresenceRecord>, PresenceStoreError>;
}

/// Process-local presence store.
#[derive(Debug, Default)]
pub struct InMemoryPresenceStore {
    records: DashMap<Identity, PresenceRecord>,
}

impl InMemoryPresenceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self, identity: &Identity, online: bool) {
        self.records.insert(
            identity.clone(),
            PresenceRecord {
                identity: identity.clone(),
                online,
                last_seen: Utc::now(),
            },
        );
    }
}

#[async_trait]
impl PresenceStore for InMemoryPresenceStore {
    async fn set_online(&self, identity: &Identity) -> Result<(), PresenceStoreError> {
        self.set(identity, true);
        Ok(())
    }

    async fn set_offline(&self, identity: &Identity) -> Result<(), PresenceStoreError> {
        self.set(identity, false);
        Ok(())
    }

    async fn get(&self, identity: &Identity) -> Result<Option<PresenceRecord>, PresenceStoreError> {
        Ok(self.records.get(identity).map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tracks_online_then_offline() {
        let store = InMemoryPresenceStore::new();
        let Ok(id) = Identity::new("42") else {
            panic!("valid identity");
        };

        let Ok(None) = store.get(&id).await else {
            panic!("expected no record");
        };

        assert!(store.set_online(&id).await.is_ok());
        let Ok(Some(record)) = store.get(&id).await else {
            panic!("expected record");
        };
        assert!(record.online);

        assert!(store.set_offline(&id).await.is_ok());
        let Ok(Some(record)) = store.get(&id).await else {
            panic!("expected record");
        };
        assert!(!record.online);
        assert_eq!(record.identity, id);
    }
}
