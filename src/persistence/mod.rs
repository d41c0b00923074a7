//! Persistence layer: PostgreSQL-backed presence store.
//!
//! [`postgres::PostgresPresenceStore`] implements the
//! [`crate::domain::PresenceStore`] collaborator with `sqlx::PgPool`,
//! keeping one row per identity in the `user_presence` table.

pub mod models;
pub mod postgres;

pub use postgres::PostgresPresenceStore;
