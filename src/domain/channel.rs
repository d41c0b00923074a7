//! Server-owned delivery pipes and their termination signals.
//!
//! A [`Channel`] pairs the sending half of an unbounded mpsc queue of
//! [`Frame`]s with the [`Terminator`] of the session that owns it. The
//! session keeps the receiving half and turns it into the SSE response
//! stream.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, watch};

use super::{ConnectionId, Frame, Identity};

/// Why a session left the `Active` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// The client dropped the connection.
    ClientDisconnected,
    /// The server is shutting down.
    ServerShutdown,
    /// Closed through the API.
    Explicit,
    /// A newer connection for the same identity replaced this one.
    Superseded,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ClientDisconnected => "client_disconnected",
            Self::ServerShutdown => "server_shutdown",
            Self::Explicit => "explicit",
            Self::Superseded => "superseded",
        };
        f.write_str(s)
    }
}

/// Sending side of a session's termination signal.
///
/// Cloneable; every clone fires the same signal. Only the first
/// [`Terminator::signal`] call takes effect.
#[derive(Debug, Clone)]
pub struct Terminator(Arc<watch::Sender<Option<CloseReason>>>);

/// Receiving side of a session's termination signal.
#[derive(Debug)]
pub struct TerminationSignal(watch::Receiver<Option<CloseReason>>);

impl Terminator {
    /// Creates a linked terminator and signal pair.
    #[must_use]
    pub fn pair() -> (Self, TerminationSignal) {
        let (tx, rx) = watch::channel(None);
        (Self(Arc::new(tx)), TerminationSignal(rx))
    }

    /// Fires the signal with `reason`.
    ///
    /// Returns `false` if the signal had already fired; the first reason is
    /// kept.
    pub fn signal(&self, reason: CloseReason) -> bool {
        self.0.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        })
    }

    /// Returns the reason the signal fired with, if it has.
    #[must_use]
    pub fn reason(&self) -> Option<CloseReason> {
        *self.0.borrow()
    }
}

impl TerminationSignal {
    /// Waits until the signal fires and returns the winning reason.
    ///
    /// If every [`Terminator`] is dropped without firing, the client is
    /// considered gone.
    pub async fn fired(&mut self) -> CloseReason {
        match self.0.wait_for(Option::is_some).await {
            Ok(reason) => (*reason).unwrap_or(CloseReason::ClientDisconnected),
            Err(_) => CloseReason::ClientDisconnected,
        }
    }
}

/// Fires [`CloseReason::ClientDisconnected`] when dropped.
///
/// Owned by the SSE response stream, so dropping the stream (client gone,
/// connection reset) terminates the session.
#[derive(Debug)]
pub struct DisconnectGuard(Terminator);

impl DisconnectGuard {
    /// Wraps a terminator.
    #[must_use]
    pub fn new(terminator: Terminator) -> Self {
        Self(terminator)
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        self.0.signal(CloseReason::ClientDisconnected);
    }
}

/// Write to a channel whose client side is gone.
#[derive(Debug, thiserror::Error)]
#[error("channel {connection_id} for {identity} is closed")]
pub struct ChannelClosed {
    /// Identity owning the channel.
    pub identity: Identity,
    /// Connection the write targeted.
    pub connection_id: ConnectionId,
}

/// Receiving half of a channel, drained by the SSE stream.
pub type ChannelReceiver = mpsc::UnboundedReceiver<Frame>;

/// One-way delivery pipe to a single connected client.
#[derive(Debug, Clone)]
pub struct Channel {
    identity: Identity,
    connection_id: ConnectionId,
    sender: mpsc::UnboundedSender<Frame>,
    terminator: Terminator,
}

impl Channel {
    /// Opens a fresh channel for `identity`.
    ///
    /// Returns the channel, the receiver its frames arrive on, and the
    /// termination signal of the owning session.
    #[must_use]
    pub fn open(identity: Identity) -> (Self, ChannelReceiver, TerminationSignal) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (terminator, signal) = Terminator::pair();
        let channel = Self {
            identity,
            connection_id: ConnectionId::new(),
            sender,
            terminator,
        };
        (channel, receiver, signal)
    }

    /// Identity owning the channel.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Unique ID of this channel.
    #[must_use]
    pub const fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Terminator of the owning session.
    #[must_use]
    pub fn terminator(&self) -> &Terminator {
        &self.terminator
    }

    /// Queues a frame for the client. Never blocks.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelClosed`] if the receiving half has been dropped.
    pub fn send(&self, frame: Frame) -> Result<(), ChannelClosed> {
        self.sender.send(frame).map_err(|_| ChannelClosed {
            identity: self.identity.clone(),
            connection_id: self.connection_id,
        })
    }

    /// Asks the owning session to close. Returns `false` if it was already
    /// closing.
    pub fn close(&self, reason: CloseReason) -> bool {
        self.terminator.signal(reason)
    }

    /// Returns `true` once the receiving half is gone.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::Event;

    fn open(raw: &str) -> (Channel, ChannelReceiver, TerminationSignal) {
        let Ok(identity) = Identity::new(raw) else {
            panic!("valid identity");
        };
        Channel::open(identity)
    }

    fn frame() -> Frame {
        let Ok(event) = Event::custom("ping", serde_json::Map::new()) else {
            panic!("valid event");
        };
        let Ok(frame) = Frame::from_event(&event) else {
            panic!("encodable");
        };
        frame
    }

    #[tokio::test]
    async fn frames_reach_receiver() {
        let (channel, mut rx, _signal) = open("42");
        assert!(channel.send(frame()).is_ok());
        let Some(received) = rx.recv().await else {
            panic!("expected frame");
        };
        assert_eq!(received.json(), r#"{"type":"ping"}"#);
    }

    #[test]
    fn send_fails_after_receiver_dropped() {
        let (channel, rx, _signal) = open("42");
        drop(rx);
        assert!(channel.is_closed());
        assert!(channel.send(frame()).is_err());
    }

    #[tokio::test]
    async fn first_close_reason_wins() {
        let (channel, _rx, mut signal) = open("42");
        assert!(channel.close(CloseReason::Explicit));
        assert!(!channel.close(CloseReason::ServerShutdown));
        assert_eq!(signal.fired().await, CloseReason::Explicit);
        assert_eq!(channel.terminator().reason(), Some(CloseReason::Explicit));
    }

    #[tokio::test]
    async fn dropping_guard_signals_disconnect() {
        let (channel, _rx, mut signal) = open("42");
        let guard = DisconnectGuard::new(channel.terminator().clone());
        drop(guard);
        assert_eq!(signal.fired().await, CloseReason::ClientDisconnected);
    }

    #[tokio::test]
    async fn dropped_terminators_count_as_disconnect() {
        let (channel, rx, mut signal) = open("42");
        drop(channel);
        drop(rx);
        assert_eq!(signal.fired().await, CloseReason::ClientDisconnected);
    }
}
