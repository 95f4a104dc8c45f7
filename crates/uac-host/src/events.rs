//! Event types and the bounded dispatch queue
//!
//! Bus events arrive in the host stack's callback context, which must never
//! block, so they are forwarded into a bounded queue with `try_send` and a
//! full queue drops the event with a warning. The application drains the
//! queue either by calling `UacHost::handle_events` itself or by letting
//! the driver spawn a background pump thread.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, SyncSender, TrySendError, sync_channel};

use tracing::warn;

use crate::backend::ClientEvent;

/// Driver-level event delivered through the installed driver callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverEvent {
    /// A connected device exposes a receive (device to host) stream
    RxConnected {
        address: u8,
        interface: u8,
        vid: u16,
        pid: u16,
    },
    /// A connected device exposes a transmit (host to device) stream
    TxConnected {
        address: u8,
        interface: u8,
        vid: u16,
        pid: u16,
    },
}

/// Per-stream event delivered through the callback given at open time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEvent {
    /// Received audio crossed the ring threshold and is ready to read
    RxDone,
    /// A transmit transfer drained the ring; more data can be written
    TxDone,
    /// A transfer completed with an error status
    TransferError,
    /// The device left the bus; the stream must be closed
    Disconnected,
}

/// Callback invoked for driver-level events
pub type DriverCallback = Arc<dyn Fn(DriverEvent) + Send + Sync>;

/// Callback invoked for stream-level events; runs in transfer-completion
/// context and must not block
pub type StreamCallback = Arc<dyn Fn(StreamEvent) + Send + Sync>;

/// Internal message consumed by the event pump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PumpEvent {
    Bus(ClientEvent),
    Shutdown,
}

pub(crate) fn event_queue(capacity: usize) -> (EventSender, Receiver<PumpEvent>) {
    let (tx, rx) = sync_channel(capacity);
    (EventSender { tx }, rx)
}

/// Non-blocking producer half of the pump queue
#[derive(Clone)]
pub(crate) struct EventSender {
    tx: SyncSender<PumpEvent>,
}

impl EventSender {
    /// Enqueue without blocking; a full queue drops the event
    pub(crate) fn send(&self, event: PumpEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(?event, "event queue full, dropping event");
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_full_queue_drops_instead_of_blocking() {
        let (tx, rx) = event_queue(1);
        tx.send(PumpEvent::Shutdown);
        // Queue is full now; this must return without blocking
        tx.send(PumpEvent::Bus(ClientEvent::DeviceGone { address: 1 }));
        assert_eq!(
            rx.recv_timeout(Duration::from_millis(10)).unwrap(),
            PumpEvent::Shutdown
        );
        assert!(rx.recv_timeout(Duration::from_millis(10)).is_err());
    }
}
