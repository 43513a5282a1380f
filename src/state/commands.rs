//! Events processed by the gateway actor
//!
//! MIDI callbacks and the OSC receive task feed one channel next to the
//! tick timer, so the gateway state is only ever touched from the actor task.

use rosc::OscMessage;
use tokio::sync::oneshot;

use super::types::GatewaySnapshot;

/// Inputs of the gateway actor
#[derive(Debug)]
pub enum GatewayEvent {
    /// Raw bytes from the pedal board input
    Midi(Vec<u8>),

    /// One decoded OSC message (bundles arrive flattened)
    Osc(OscMessage),

    /// Copy of the current state
    Snapshot {
        response: oneshot::Sender<GatewaySnapshot>,
    },

    /// Stop the actor loop
    Shutdown,
}

impl GatewayEvent {
    /// Short name for trace logs
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayEvent::Midi(_) => "midi",
            GatewayEvent::Osc(_) => "osc",
            GatewayEvent::Snapshot { .. } => "snapshot",
            GatewayEvent::Shutdown => "shutdown",
        }
    }
}
