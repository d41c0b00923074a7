//! PostgreSQL implementation of the presence store.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::models::PresenceRow;
use crate::config::GatewayConfig;
use crate::domain::{Identity, PresenceRecord, PresenceStore, PresenceStoreError};

/// PostgreSQL-backed presence store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresPresenceStore {
    pool: PgPool,
}

impl PostgresPresenceStore {
    /// Creates a new store with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects using the database settings in `config` and applies the
    /// bundled migrations.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceStoreError::Unavailable`] if the database cannot be
    /// reached, or [`PresenceStoreError::Database`] if a migration fails.
    pub async fn connect(config: &GatewayConfig) -> Result<Self, PresenceStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await
            .map_err(|e| PresenceStoreError::Unavailable(e.to_string()))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| PresenceStoreError::Database(e.to_string()))?;

        tracing::info!("presence store connected");
        Ok(Self::new(pool))
    }

    /// Upserts the online flag of an identity.
    async fn set(&self, identity: &Identity, online: bool) -> Result<(), PresenceStoreError> {
        sqlx::query(
            "INSERT INTO user_presence (identity, online, last_seen) VALUES ($1, $2, NOW()) \
             ON CONFLICT (identity) \
             DO UPDATE SET online = EXCLUDED.online, last_seen = EXCLUDED.last_seen",
        )
        .bind(identity.as_str())
        .bind(online)
        .execute(&self.pool)
        .await
        .map_err(|e| PresenceStoreError::Database(e.to_string()))?;

        Ok(())
    }

    /// Marks every identity offline.
    ///
    /// Run at startup: no channel survives a restart, so any `online` row
    /// left by a previous process is stale.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceStoreError::Database`] on database failure.
    pub async fn reset_all_offline(&self) -> Result<u64, PresenceStoreError> {
        let result = sqlx::query(
            "UPDATE user_presence SET online = FALSE, last_seen = NOW() WHERE online",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| PresenceStoreError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl PresenceStore for PostgresPresenceStore {
    async fn set_online(&self, identity: &Identity) -> Result<(), PresenceStoreError> {
        self.set(identity, true).await
    }

    async fn set_offline(&self, identity: &Identity) -> Result<(), PresenceStoreError> {
        self.set(identity, false).await
    }

    async fn get(&self, identity: &Identity) -> Result<Option<PresenceRecord>, PresenceStoreError> {
        let row = sqlx::query_as::<_, (String, bool, DateTime<Utc>)>(
            "SELECT identity, online, last_seen FROM user_presence WHERE identity = $1",
        )
        .bind(identity.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PresenceStoreError::Database(e.to_string()))?;

        row.map(PresenceRow::from)
            .map(PresenceRecord::try_from)
            .transpose()
            .map_err(|e| PresenceStoreError::Database(e.to_string()))
    }
}
