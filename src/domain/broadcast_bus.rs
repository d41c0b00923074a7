//! Fan-out of events to every registered channel.
//!
//! [`BroadcastBus`] encodes an event once, snapshots the
//! [`ConnectionRegistry`], and writes the frame to each channel
//! independently. Delivery is best-effort: no acknowledgement, no retry,
//! no ordering across channels, nothing kept for absent subscribers.

use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;

use super::{ConnectionRegistry, Event, Failure, FailureReporter, Frame, Identity};

/// Outcome of one publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct PublishReport {
    /// Channels a write was attempted on.
    pub attempted: usize,
    /// Writes that were queued.
    pub delivered: usize,
    /// Writes that failed and were reported.
    pub failed: usize,
}

/// Delivers events to the channels in a shared [`ConnectionRegistry`].
#[derive(Debug, Clone)]
pub struct BroadcastBus {
    registry: Arc<ConnectionRegistry>,
    reporter: Arc<dyn FailureReporter>,
}

impl BroadcastBus {
    /// Creates a bus over `registry` reporting failures to `reporter`.
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>, reporter: Arc<dyn FailureReporter>) -> Self {
        Self { registry, reporter }
    }

    /// Returns the registry this bus delivers to.
    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Returns the failure reporter.
    #[must_use]
    pub fn reporter(&self) -> &Arc<dyn FailureReporter> {
        &self.reporter
    }

    /// Delivers `event` to every channel registered at the moment of the
    /// call.
    ///
    /// Each write is attempted independently. A failed write is reported
    /// and skipped; it never aborts the remaining writes, never reaches the
    /// caller, and never removes the registry entry.
    pub fn publish(&self, event: &Event) -> PublishReport {
        let Some(frame) = self.encode(event) else {
            return PublishReport::default();
        };

        let mut report = PublishReport::default();
        self.registry.for_each(|channel| {
            report.attempted += 1;
            match channel.send(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    report.failed += 1;
                    self.reporter.report(&Failure::Delivery {
                        identity: err.identity,
                        connection_id: err.connection_id,
                        event_type: event.kind().to_string(),
                    });
                }
            }
        });

        tracing::debug!(
            event_type = event.kind(),
            attempted = report.attempted,
            delivered = report.delivered,
            failed = report.failed,
            "event published"
        );
        report
    }

    /// Delivers `event` to the channel registered for `identity` only.
    ///
    /// Returns `true` if the frame was queued.
    pub fn send_to(&self, identity: &Identity, event: &Event) -> bool {
        let Some(channel) = self.registry.get(identity) else {
            return false;
        };
        let Some(frame) = self.encode(event) else {
            return false;
        };
        match channel.send(frame) {
            Ok(()) => true,
            Err(err) => {
                self.reporter.report(&Failure::Delivery {
                    identity: err.identity,
                    connection_id: err.connection_id,
                    event_type: event.kind().to_string(),
                });
                false
            }
        }
    }

    fn encode(&self, event: &Event) -> Option<Frame> {
        match Frame::from_event(event) {
            Ok(frame) => Some(frame),
            Err(err) => {
                self.reporter.report(&Failure::Encode {
                    event_type: event.kind().to_string(),
                    message: err.to_string(),
                });
                None
            }
        }
    }
}
