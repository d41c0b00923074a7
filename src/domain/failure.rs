//! Structured reporting of non-fatal delivery and presence failures.
//!
//! Nothing in the presence core is fatal: a broken channel or a failing
//! presence store degrades to "this notification was not delivered". Such
//! failures are handed to a [`FailureReporter`] so they stay observable.

use std::fmt;

use super::{ConnectionId, Identity};

/// Presence store operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceOperation {
    /// `set_online`.
    SetOnline,
    /// `set_offline`.
    SetOffline,
}

impl fmt::Display for PresenceOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetOnline => f.write_str("set_online"),
            Self::SetOffline => f.write_str("set_offline"),
        }
    }
}

/// A failure that was absorbed instead of propagated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// A write to one registered channel failed.
    Delivery {
        /// Identity owning the channel.
        identity: Identity,
        /// Connection that rejected the write.
        connection_id: ConnectionId,
        /// Kind of the event that was not delivered.
        event_type: String,
    },

    /// The presence store rejected an update.
    PresenceStore {
        /// Identity being updated.
        identity: Identity,
        /// Operation that failed.
        operation: PresenceOperation,
        /// Error message from the store.
        message: String,
    },

    /// An event could not be serialized into a frame.
    Encode {
        /// Kind of the event.
        event_type: String,
        /// Serializer error message.
        message: String,
    },
}

/// Sink for absorbed failures.
pub trait FailureReporter: Send + Sync + fmt::Debug {
    /// Records one failure. Must not block.
    fn report(&self, failure: &Failure);
}

/// Reports failures as structured `tracing` warnings.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl FailureReporter for TracingReporter {
    fn report(&self, failure: &Failure) {
        match failure {
            Failure::Delivery {
                identity,
                connection_id,
                event_type,
            } => {
                tracing::warn!(%identity, %connection_id, event_type, "event delivery failed");
            }
            Failure::PresenceStore {
                identity,
                operation,
                message,
            } => {
                tracing::warn!(
                    %identity,
                    %operation,
                    error = %message,
                    "presence store update failed"
                );
            }
            Failure::Encode {
                event_type,
                message,
            } => {
                tracing::error!(event_type, error = %message, "event encoding failed");
            }
        }
    }
}

/// Reporter that keeps every failure in memory, for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingReporter {
    failures: std::sync::Mutex<Vec<Failure>>,
}

#[cfg(test)]
impl RecordingReporter {
    pub(crate) fn failures(&self) -> Vec<Failure> {
        self.failures
            .lock()
            .map(|failures| failures.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
impl FailureReporter for RecordingReporter {
    fn report(&self, failure: &Failure) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.push(failure.clone());
        }
    }
}
