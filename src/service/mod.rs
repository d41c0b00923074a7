//! Service layer: business logic orchestration.
//!
//! [`PresenceService`] opens subscription sessions, drives their
//! lifecycle tasks, and routes events through the
//! [`super::domain::BroadcastBus`].

pub mod presence_service;

pub use presence_service::{Connection, PresenceService, PresenceView};
