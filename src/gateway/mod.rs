//! Gateway - session and state synchronisation between pedals and engine
//!
//! The gateway owns all mutable state: the engine session, the loop
//! collection, the LED pool, the pedal mode and the remote LED display.
//! It is driven by the actor in [`crate::state`], one event at a time.
//!
//! - `session`: connection lifecycle, handshake, heartbeat, resync
//! - `loops`: loop state to LED rendering
//! - `pedals`: pedal press/release routing
//! - `mirror`: LED surface and the remote LED display

mod loops;
mod mirror;
mod pedals;
mod session;


pub use loops::{render, Rendering};
pub use mirror::RemoteLedSubscriber;
pub use pedals::Pedal;

use anyhow::Result;
use rosc::OscMessage;
use tracing::{debug, trace, warn};

use crate::config::AppConfig;
use crate::error::GatewayError;
use crate::midi::MidiMessage;
use crate::osc::{self, Inbound};
use crate::state::{GatewaySnapshot, Led, Loop, PedalMode, Session, LED_COUNT};
use crate::transport::Transport;

/// Controller-side state engine
pub struct Gateway<T: Transport> {
    pub(crate) config: AppConfig,
    /// Resolved base note of the pedal layout
    pub(crate) base_note: u8,
    pub(crate) session: Session,
    pub(crate) loops: Vec<Loop>,
    pub(crate) leds: [Led; LED_COUNT],
    pub(crate) mode: PedalMode,
    pub(crate) selected_loop: i32,
    pub(crate) mirror: Option<RemoteLedSubscriber>,
    pub(crate) transport: T,
}

impl<T: Transport> Gateway<T> {
    pub fn new(config: AppConfig, transport: T) -> Result<Self> {
        config.validate()?;
        let base_note = config.midi.base_note()?;
        let session = Session {
            led_send_port: config.osc.led_send_port,
            ..Session::default()
        };

        Ok(Self {
            config,
            base_note,
            session,
            loops: Vec::new(),
            leds: std::array::from_fn(Led::new),
            mode: PedalMode::default(),
            selected_loop: 0,
            mirror: None,
            transport,
        })
    }

    /// One-time startup work before the first tick
    pub fn start(&mut self) {
        if let Some(port) = self.config.osc.led_send_port {
            self.register_mirror("127.0.0.1", port);
        }
    }

    /// Dispatch one inbound OSC message
    pub fn handle_osc(&mut self, msg: &OscMessage) {
        if Inbound::is_chatty(&msg.addr) {
            trace!("OSC <- {}", osc::describe(msg));
        } else {
            debug!("OSC <- {}", osc::describe(msg));
        }

        let inbound = match Inbound::decode(msg) {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!("Dropped OSC message: {}", e);
                return;
            }
        };

        match inbound {
            Inbound::PingAck(info) => self.on_pingack(info),
            Inbound::Heartbeat(info) => self.on_heartbeat(info),
            Inbound::Ctrl(update) => self.on_ctrl(update),
            Inbound::Discovery(target) => self.answer_discovery(&target),
            Inbound::LedDump(target) => self.dump_leds(&target),
            Inbound::DisplayRequest(target) => self.push_display_once(&target),
            Inbound::MirrorRegister { host, port } => self.register_mirror(&host, port),
            Inbound::MirrorUnregister { host, port } => {
                debug!("LED display {}:{} unregistering", host, port);
                self.unregister_mirror();
            }
        }
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> GatewaySnapshot {
        GatewaySnapshot {
            session: self.session.clone(),
            loops: self.loops.clone(),
            leds: self.leds.to_vec(),
            mode: self.mode,
            selected_loop: self.selected_loop,
            mirror: self.mirror.as_ref().map(|m| (m.host.clone(), m.port)),
        }
    }

    /// URL the engine replies to
    pub(crate) fn reply_url(&self) -> String {
        osc::reply_url(
            self.session
                .receive_port
                .unwrap_or(self.config.osc.receive_port),
        )
    }

    pub(crate) fn send_engine(&mut self, msg: OscMessage) {
        let addr = msg.addr.clone();
        if let Err(e) = self.transport.send_engine(msg) {
            report_send_failure(&format!("{} to engine", addr), &e);
        }
    }

    pub(crate) fn send_virtual(&mut self, msg: MidiMessage) {
        debug!("MIDI -> {}", msg.describe(self.config.midi.octave_middle_c));
        if let Err(e) = self.transport.send_virtual(&msg) {
            report_send_failure("MIDI", &e);
        }
    }

    pub(crate) fn send_controller_cc(&mut self, cc: u8, value: i32) {
        let msg = MidiMessage::control_change(self.config.midi.channel, cc, value);
        if let Err(e) = self.transport.send_controller(&msg) {
            report_send_failure(&format!("controller CC {}", cc), &e);
        }
    }
}

/// Log a dropped send, at debug when the next tick heals it
fn report_send_failure(what: &str, err: &GatewayError) {
    if err.is_retryable() {
        debug!("Failed to send {}: {}", what, err);
    } else {
        warn!("Failed to send {}: {}", what, err);
    }
}
