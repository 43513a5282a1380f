//! GatewayHandle - Public API for the gateway actor
//!
//! Fire-and-forget methods for the input paths (MIDI callback, OSC
//! receive task), plus an async snapshot query.

use rosc::OscMessage;
use tokio::sync::{mpsc, oneshot};

use super::commands::GatewayEvent;
use super::types::GatewaySnapshot;

/// Cloneable sender side of the gateway event channel
#[derive(Clone, Debug)]
pub struct GatewayHandle {
    event_tx: mpsc::UnboundedSender<GatewayEvent>,
}

impl GatewayHandle {
    pub fn new(event_tx: mpsc::UnboundedSender<GatewayEvent>) -> Self {
        Self { event_tx }
    }

    /// Create a handle together with the receiver the actor will own
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<GatewayEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    // =========================================================================
    // Input paths (fire-and-forget)
    // =========================================================================

    /// Forward raw bytes received from the pedal board
    ///
    /// Called from the midir callback thread.
    pub fn midi(&self, bytes: &[u8]) -> bool {
        self.send(GatewayEvent::Midi(bytes.to_vec()))
    }

    /// Forward one inbound OSC message
    ///
    /// Returns false once the actor is gone, so receive loops can stop.
    pub fn osc(&self, msg: OscMessage) -> bool {
        self.send(GatewayEvent::Osc(msg))
    }

    pub fn shutdown(&self) {
        let _ = self.event_tx.send(GatewayEvent::Shutdown);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Copy of the current gateway state, None if the actor stopped
    pub async fn snapshot(&self) -> Option<GatewaySnapshot> {
        let (response, rx) = oneshot::channel();
        if !self.send(GatewayEvent::Snapshot { response }) {
            return None;
        }
        rx.await.ok()
    }

    pub fn is_closed(&self) -> bool {
        self.event_tx.is_closed()
    }

    fn send(&self, event: GatewayEvent) -> bool {
        self.event_tx.send(event).is_ok()
    }
}
