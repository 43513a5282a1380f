//! Transport seam between the gateway state machine and the outside world
//!
//! The gateway only talks to sockets and MIDI ports through [`Transport`],
//! so the whole state machine runs against a recording double in tests.

use rosc::OscMessage;

use crate::error::GatewayResult;
use crate::midi::MidiMessage;
use crate::osc::OscLink;
use crate::pedal::PedalBoard;

/// Everything the gateway needs from sockets and MIDI ports
pub trait Transport {
    /// Bind the UDP port the engine replies to
    fn bind_receiver(&mut self, port: u16) -> GatewayResult<()>;

    /// Open the sending socket towards the engine
    fn connect_engine(&mut self, host: &str, port: u16) -> GatewayResult<()>;

    /// Drop both engine sockets
    fn release_engine(&mut self);

    fn send_engine(&mut self, msg: OscMessage) -> GatewayResult<()>;

    /// Open the socket towards a remote LED display
    fn connect_mirror(&mut self, host: &str, port: u16) -> GatewayResult<()>;

    fn disconnect_mirror(&mut self);

    fn send_mirror(&mut self, msg: OscMessage) -> GatewayResult<()>;

    /// Send a single message through a throwaway socket
    fn send_once(&mut self, host: &str, port: u16, msg: OscMessage) -> GatewayResult<()>;

    /// Note traffic towards the looper's virtual MIDI input
    fn send_virtual(&mut self, msg: &MidiMessage) -> GatewayResult<()>;

    /// LED and display CCs towards the pedal board
    fn send_controller(&mut self, msg: &MidiMessage) -> GatewayResult<()>;

    /// Re-check MIDI devices; called once per tick
    fn poll_devices(&mut self) {}
}

/// Real sockets and MIDI ports
pub struct LiveTransport {
    osc: OscLink,
    pedals: PedalBoard,
}

impl LiveTransport {
    pub fn new(osc: OscLink, pedals: PedalBoard) -> Self {
        Self { osc, pedals }
    }
}

impl Transport for LiveTransport {
    fn bind_receiver(&mut self, port: u16) -> GatewayResult<()> {
        self.osc.bind_receiver(port)
    }

    fn connect_engine(&mut self, host: &str, port: u16) -> GatewayResult<()> {
        self.osc.connect_engine(host, port)
    }

    fn release_engine(&mut self) {
        self.osc.release_engine();
    }

    fn send_engine(&mut self, msg: OscMessage) -> GatewayResult<()> {
        self.osc.send_engine(msg)
    }

    fn connect_mirror(&mut self, host: &str, port: u16) -> GatewayResult<()> {
        self.osc.connect_mirror(host, port)
    }

    fn disconnect_mirror(&mut self) {
        self.osc.disconnect_mirror();
    }

    fn send_mirror(&mut self, msg: OscMessage) -> GatewayResult<()> {
        self.osc.send_mirror(msg)
    }

    fn send_once(&mut self, host: &str, port: u16, msg: OscMessage) -> GatewayResult<()> {
        self.osc.send_once(host, port, msg)
    }

    fn send_virtual(&mut self, msg: &MidiMessage) -> GatewayResult<()> {
        self.pedals.send_virtual(msg)
    }

    fn send_controller(&mut self, msg: &MidiMessage) -> GatewayResult<()> {
        self.pedals.send_controller(msg)
    }

    fn poll_devices(&mut self) {
        self.pedals.poll();
    }
}
