//! Domain layer: the presence and broadcast core.
//!
//! This module contains subscriber identity, events and their wire frames,
//! channels with their termination signals, the connection registry, the
//! broadcast bus, the presence store collaborator, failure reporting, and
//! the per-connection subscription session.

pub mod broadcast_bus;
pub mod channel;
pub mod connection_registry;
pub mod event;
pub mod failure;
pub mod identity;
pub mod presence_store;
pub mod session;

pub use broadcast_bus::{BroadcastBus, PublishReport};
pub use channel::{
    Channel, ChannelClosed, ChannelReceiver, CloseReason, DisconnectGuard, TerminationSignal,
    Terminator,
};
pub use connection_registry::ConnectionRegistry;
pub use event::{Event, Frame, PresenceStatus};
pub use failure::{Failure, FailureReporter, PresenceOperation, TracingReporter};
pub use identity::{ConnectionId, Identity};
pub use presence_store::{InMemoryPresenceStore, PresenceRecord, PresenceStore, PresenceStoreError};
pub use session::{SessionState, SubscriptionSession};
