//! Presence service: opens sessions, runs their lifecycle, routes events.

use std::sync::Arc;
use std::time::Duration;

use futures_util::Stream;
use tokio::sync::watch;

use crate::domain::{
    BroadcastBus, ChannelReceiver, CloseReason, ConnectionId, ConnectionRegistry, DisconnectGuard,
    Event, FailureReporter, Frame, Identity, PresenceRecord, PresenceStore, PublishReport,
    SubscriptionSession,
};
use crate::error::GatewayError;

/// Live connection handed to the transport layer.
///
/// Dropping it (or the stream made from it) closes the session with
/// [`CloseReason::ClientDisconnected`].
#[derive(Debug)]
pub struct Connection {
    identity: Identity,
    connection_id: ConnectionId,
    receiver: ChannelReceiver,
    guard: DisconnectGuard,
}

impl Connection {
    /// Identity owning the connection.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// ID of the underlying channel.
    #[must_use]
    pub const fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Receives the next frame; `None` once the session has closed.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.receiver.recv().await
    }

    /// Turns the connection into a stream of frames that ends when the
    /// session closes.
    pub fn into_frames(self) -> impl Stream<Item = Frame> + Send + 'static {
        let Self {
            receiver, guard, ..
        } = self;
        futures_util::stream::unfold((receiver, guard), |(mut receiver, guard)| async move {
            receiver
                .recv()
                .await
                .map(|frame| (frame, (receiver, guard)))
        })
    }
}

/// Stored and live presence of one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceView {
    /// Identity queried.
    pub identity: Identity,
    /// Whether a channel is currently registered.
    pub connected: bool,
    /// Stored record, if any.
    pub record: Option<PresenceRecord>,
}

/// Orchestration layer for presence and event delivery.
///
/// Owns the [`BroadcastBus`] (and through it the shared
/// [`ConnectionRegistry`]), the [`PresenceStore`] collaborator and the
/// server shutdown signal every session task listens to.
#[derive(Debug, Clone)]
pub struct PresenceService {
    bus: BroadcastBus,
    store: Arc<dyn PresenceStore>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl PresenceService {
    /// Creates a new `PresenceService`.
    #[must_use]
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        store: Arc<dyn PresenceStore>,
        reporter: Arc<dyn FailureReporter>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            bus: BroadcastBus::new(registry, reporter),
            store,
            shutdown: Arc::new(shutdown),
        }
    }

    /// Returns a reference to the inner [`BroadcastBus`].
    #[must_use]
    pub fn bus(&self) -> &BroadcastBus {
        &self.bus
    }

    /// Returns a reference to the shared [`ConnectionRegistry`].
    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        self.bus.registry()
    }

    /// Opens a session for an authenticated identity and spawns its
    /// lifecycle task.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unauthenticated`] if `identity` is `None`,
    /// before anything is allocated.
    pub fn connect(&self, identity: Option<Identity>) -> Result<Connection, GatewayError> {
        let (session, receiver) =
            SubscriptionSession::open(identity, self.bus.clone(), Arc::clone(&self.store))?;

        let connection = Connection {
            identity: session.identity().clone(),
            connection_id: session.connection_id(),
            receiver,
            guard: DisconnectGuard::new(session.terminator().clone()),
        };

        tracing::debug!(
            identity = %connection.identity,
            connection_id = %connection.connection_id,
            "opening session"
        );
        tokio::spawn(session.run(self.shutdown.subscribe()));
        Ok(connection)
    }

    /// Broadcasts `event` to every connected identity.
    pub fn publish(&self, event: &Event) -> PublishReport {
        self.bus.publish(event)
    }

    /// Delivers `event` to one identity.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotConnected`] if the identity has no open
    /// channel or the write failed.
    pub fn send_to(&self, identity: &Identity, event: &Event) -> Result<(), GatewayError> {
        if self.bus.send_to(identity, event) {
            Ok(())
        } else {
            Err(GatewayError::NotConnected(identity.clone()))
        }
    }

    /// Asks the session of `identity` to close.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotConnected`] if the identity has no open
    /// channel.
    pub fn disconnect(&self, identity: &Identity) -> Result<(), GatewayError> {
        let channel = self
            .registry()
            .get(identity)
            .ok_or_else(|| GatewayError::NotConnected(identity.clone()))?;
        channel.close(CloseReason::Explicit);
        tracing::info!(
            %identity,
            connection_id = %channel.connection_id(),
            "explicit close requested"
        );
        Ok(())
    }

    /// Combines live registry state with the stored presence record.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PresenceNotFound`] if the identity is neither
    /// connected nor known to the store, or [`GatewayError::PresenceStore`]
    /// if the lookup failed.
    pub async fn presence(&self, identity: &Identity) -> Result<PresenceView, GatewayError> {
        let connected = self.registry().contains(identity);
        let record = self.store.get(identity).await?;
        if !connected && record.is_none() {
            return Err(GatewayError::PresenceNotFound(identity.clone()));
        }
        Ok(PresenceView {
            identity: identity.clone(),
            connected,
            record,
        })
    }

    /// Returns the currently connected identities, sorted.
    #[must_use]
    pub fn connected_identities(&self) -> Vec<Identity> {
        self.registry().identities()
    }

    /// Returns the number of open connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.registry().size()
    }

    /// Signals every session to close with [`CloseReason::ServerShutdown`].
    pub fn begin_shutdown(&self) {
        self.shutdown.send_replace(true);
        tracing::info!(connections = self.connection_count(), "shutting down sessions");
    }

    /// Signals shutdown and waits up to `grace` for the registry to drain.
    ///
    /// Returns `true` if every session closed in time.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.begin_shutdown();
        let drained = tokio::time::timeout(grace, async {
            while !self.registry().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .is_ok();
        if !drained {
            tracing::warn!(
                remaining = self.connection_count(),
                "sessions still open after shutdown grace period"
            );
        }
        drained
    }
}
