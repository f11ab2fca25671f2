//! Destinations for parsed notifications.

use std::sync::mpsc::{Sender, SyncSender};

use thiserror::Error;

use crate::events::Event;

/// The consumer side of an event sink has gone away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("event sink closed")]
pub struct SinkClosed;

/// Receives notifications from a [`MgmtClient`](super::MgmtClient).
///
/// The client is the only producer. `deliver` may block: a blocking sink
/// stalls notification delivery but never command replies. The sink is
/// dropped, and so closed, once the connection ends.
pub trait EventSink: Send + 'static {
    /// Hands one event to the consumer.
    ///
    /// # Errors
    ///
    /// Returns [`SinkClosed`] when no consumer remains.
    fn deliver(&self, event: Event) -> Result<(), SinkClosed>;
}

impl EventSink for Sender<Event> {
    fn deliver(&self, event: Event) -> Result<(), SinkClosed> {
        self.send(event).map_err(|_| SinkClosed)
    }
}

/// Blocks while the channel is full.
impl EventSink for SyncSender<Event> {
    fn deliver(&self, event: Event) -> Result<(), SinkClosed> {
        self.send(event).map_err(|_| SinkClosed)
    }
}
