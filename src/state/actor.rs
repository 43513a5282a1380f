//! GatewayActor - single-owner run loop for the gateway
//!
//! The tick timer, MIDI callbacks and the OSC receive task all feed one
//! event channel. The actor drains it on a single task, so the gateway
//! needs no locks.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace};

use super::commands::GatewayEvent;
use crate::gateway::Gateway;
use crate::transport::Transport;

pub struct GatewayActor<T: Transport> {
    gateway: Gateway<T>,
    event_rx: mpsc::UnboundedReceiver<GatewayEvent>,
    tick: Duration,
}

impl<T: Transport> GatewayActor<T> {
    pub fn new(
        gateway: Gateway<T>,
        event_rx: mpsc::UnboundedReceiver<GatewayEvent>,
        tick: Duration,
    ) -> Self {
        Self {
            gateway,
            event_rx,
            tick,
        }
    }

    /// Run until shutdown, then release everything
    ///
    /// The tick fires on its own cadence regardless of message traffic;
    /// the first one runs immediately.
    pub async fn run(mut self) -> Gateway<T> {
        info!("Gateway actor started (tick {:?})", self.tick);
        self.gateway.start();

        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = ticker.tick() => self.gateway.tick(),
                event = self.event_rx.recv() => {
                    let Some(event) = event else {
                        debug!("All gateway handles dropped");
                        break;
                    };
                    if !self.handle_event(event) {
                        break;
                    }
                }
            }
        }

        self.gateway.stop();
        info!("Gateway actor stopped");
        self.gateway
    }

    /// Returns false when the loop should stop
    fn handle_event(&mut self, event: GatewayEvent) -> bool {
        trace!("event: {}", event.kind());
        match event {
            GatewayEvent::Midi(data) => self.gateway.handle_midi(&data),
            GatewayEvent::Osc(msg) => self.gateway.handle_osc(&msg),
            GatewayEvent::Snapshot { response } => {
                let _ = response.send(self.gateway.snapshot());
            }
            GatewayEvent::Shutdown => return false,
        }
        true
    }
}
