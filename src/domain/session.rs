//! Per-connection lifecycle: `Connecting → Active → Closed`.
//!
//! A [`SubscriptionSession`] owns one [`Channel`]. Activation registers the
//! channel, confirms it to the client and announces the identity online.
//! Closing unregisters it, marks the identity offline and announces that.
//! Close runs at most once, whatever triggers it first: client disconnect,
//! server shutdown, an explicit close, or replacement by a newer
//! connection.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::watch;

use super::failure::PresenceOperation;
use super::{
    BroadcastBus, Channel, ChannelReceiver, CloseReason, ConnectionId, Event, Failure, Frame,
    Identity, PresenceStore, PresenceStoreError, TerminationSignal, Terminator,
};
use crate::error::GatewayError;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Channel allocated, not yet registered.
    Connecting,
    /// Registered and announced online.
    Active,
    /// Terminal.
    Closed,
}

/// One connected client.
#[derive(Debug)]
pub struct SubscriptionSession {
    channel: Channel,
    signal: TerminationSignal,
    bus: BroadcastBus,
    store: Arc<dyn PresenceStore>,
    state: Mutex<SessionState>,
}

impl SubscriptionSession {
    /// Allocates a session for an authenticated identity.
    ///
    /// Returns the session in `Connecting` state and the receiver its
    /// frames arrive on.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unauthenticated`] if no identity was supplied.
    /// Nothing is allocated or registered in that case.
    pub fn open(
        identity: Option<Identity>,
        bus: BroadcastBus,
        store: Arc<dyn PresenceStore>,
    ) -> Result<(Self, ChannelReceiver), GatewayError> {
        let identity = identity.ok_or(GatewayError::Unauthenticated)?;
        let (channel, receiver, signal) = Channel::open(identity);
        let session = Self {
            channel,
            signal,
            bus,
            store,
            state: Mutex::new(SessionState::Connecting),
        };
        Ok((session, receiver))
    }

    /// Identity owning the session.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        self.channel.identity()
    }

    /// ID of the session's channel.
    #[must_use]
    pub const fn connection_id(&self) -> ConnectionId {
        self.channel.connection_id()
    }

    /// Terminator that closes this session when fired.
    #[must_use]
    pub fn terminator(&self) -> &Terminator {
        self.channel.terminator()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves from `Connecting` to `Active`. No-op in any other state.
    ///
    /// Queues the `connected` frame, registers the channel (closing any
    /// channel it replaces), marks the identity online and broadcasts the
    /// transition. A presence store failure is reported and does not stop
    /// the registration or the broadcast.
    pub async fn activate(&self) {
        if !self.transition(SessionState::Connecting, SessionState::Active) {
            return;
        }
        let identity = self.identity().clone();

        // queued before registering so no broadcast can overtake it
        self.send_own(&Event::connected(identity.clone()));

        if let Some(previous) = self.bus.registry().register(self.channel.clone())
            && previous.connection_id() != self.connection_id()
        {
            tracing::info!(
                %identity,
                replaced = %previous.connection_id(),
                "closing superseded connection"
            );
            previous.close(CloseReason::Superseded);
        }

        if let Err(err) = self.store.set_online(&identity).await {
            self.report_store_failure(&identity, PresenceOperation::SetOnline, &err);
        }

        let _ = self.bus.publish(&Event::presence_changed(identity.clone(), true));
        tracing::info!(%identity, connection_id = %self.connection_id(), "session active");
    }

    /// Moves to `Closed`. Returns `false` if the session was already closed.
    ///
    /// Unregisters the channel, marks the identity offline and broadcasts
    /// the transition. A session that never became active only changes
    /// state. A session whose identity is now served by a newer connection
    /// leaves presence to that connection.
    pub async fn close(&self, reason: CloseReason) -> bool {
        let previous = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let previous = *state;
            *state = SessionState::Closed;
            previous
        };
        if previous == SessionState::Closed {
            return false;
        }
        self.channel.close(reason);

        if previous == SessionState::Connecting {
            tracing::debug!(
                identity = %self.identity(),
                %reason,
                "session closed before activation"
            );
            return true;
        }

        let identity = self.identity().clone();
        let registry = self.bus.registry();
        let removed = registry.unregister_connection(&identity, self.connection_id());
        // a replaced entry belongs to the newer connection, which owns presence
        if !removed || registry.contains(&identity) {
            tracing::info!(
                %identity,
                %reason,
                "session closed, identity served by newer connection"
            );
            return true;
        }

        if let Err(err) = self.store.set_offline(&identity).await {
            self.report_store_failure(&identity, PresenceOperation::SetOffline, &err);
        }

        // a reconnect may have registered and gone online while the store call ran
        if registry.contains(&identity) {
            if let Err(err) = self.store.set_online(&identity).await {
                self.report_store_failure(&identity, PresenceOperation::SetOnline, &err);
            }
            tracing::info!(
                %identity,
                %reason,
                "session closed, identity reconnected during close"
            );
            return true;
        }

        let _ = self.bus.publish(&Event::presence_changed(identity.clone(), false));
        tracing::info!(%identity, connection_id = %self.connection_id(), %reason, "session closed");
        true
    }

    /// Drives the whole lifecycle: activates, waits for the first
    /// termination signal or server shutdown, then closes.
    ///
    /// Returns the reason the session closed with.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> CloseReason {
        self.activate().await;

        let reason = tokio::select! {
            reason = self.signal.fired() => reason,
            () = shutdown_requested(&mut shutdown) => CloseReason::ServerShutdown,
        };

        self.close(reason).await;
        reason
    }

    fn transition(&self, from: SessionState, to: SessionState) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != from {
            return false;
        }
        *state = to;
        true
    }

    fn report_store_failure(
        &self,
        identity: &Identity,
        operation: PresenceOperation,
        err: &PresenceStoreError,
    ) {
        self.bus.reporter().report(&Failure::PresenceStore {
            identity: identity.clone(),
            operation,
            message: err.to_string(),
        });
    }

    fn send_own(&self, event: &Event) {
        let sent = Frame::from_event(event)
            .map_err(|err| err.to_string())
            .and_then(|frame| self.channel.send(frame).map_err(|err| err.to_string()));
        if sent.is_err() {
            self.bus.reporter().report(&Failure::Delivery {
                identity: self.identity().clone(),
                connection_id: self.connection_id(),
                event_type: event.kind().to_string(),
            });
        }
    }
}

/// Resolves once `shutdown` flips to `true`; never resolves if its sender
/// is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
