//! Pedal board MIDI driver
//!
//! Owns the pedal board input, the virtual output the looper listens to,
//! and the optional controller output carrying LED and display CCs.
//! Devices are supervised once per tick: a vanished input is dropped and
//! re-acquired when it comes back.

use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use tracing::{debug, info, warn};

use crate::config::MidiConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::midi::{format_hex, MidiMessage};
use crate::state::GatewayHandle;

const CLIENT_NAME: &str = "Looper-GW";

/// MIDI side of the live transport
pub struct PedalBoard {
    handle: GatewayHandle,

    /// Input port pattern (exact name or substring)
    input_pattern: Option<String>,
    /// Full name of the connected input
    input_name: Option<String>,
    input_conn: Option<MidiInputConnection<()>>,

    virtual_name: String,
    virtual_out: Option<MidiOutputConnection>,
    virtual_failed: bool,

    controller_pattern: Option<String>,
    controller_out: Option<MidiOutputConnection>,
}

impl PedalBoard {
    pub fn new(config: &MidiConfig, handle: GatewayHandle) -> Self {
        Self {
            handle,
            input_pattern: config.input_port.clone(),
            input_name: None,
            input_conn: None,
            virtual_name: config.virtual_output.clone(),
            virtual_out: None,
            virtual_failed: false,
            controller_pattern: config.controller_output.clone(),
            controller_out: None,
        }
    }

    /// Supervise devices: drop vanished ports, (re)acquire missing ones
    pub fn poll(&mut self) {
        let inputs = discovery::input_port_names();

        if let Some(name) = self.input_name.clone() {
            if !inputs.contains(&name) {
                warn!("MIDI input port \"{}\" got disconnected, waiting.", name);
                self.input_name = None;
                self.input_conn = None;
            }
        } else if let Some(pattern) = self.input_pattern.clone() {
            match self.connect_input(&pattern) {
                Ok(name) => info!("Connected to MIDI input port \"{}\".", name),
                Err(e) => debug!("{}", e),
            }
        }

        if self.virtual_out.is_none() && !self.virtual_failed {
            match create_virtual_output(&self.virtual_name) {
                Ok(conn) => {
                    info!("Created virtual MIDI output port \"{}\"", self.virtual_name);
                    self.virtual_out = Some(conn);
                }
                Err(e) => {
                    warn!("{}", e);
                    self.virtual_failed = true;
                }
            }
        }

        if self.controller_out.is_none() {
            if let Some(pattern) = self.controller_pattern.clone() {
                match connect_output(&pattern) {
                    Ok((conn, name)) => {
                        info!("Connected to MIDI controller output \"{}\".", name);
                        self.controller_out = Some(conn);
                    }
                    Err(e) => debug!("{}", e),
                }
            }
        }
    }

    fn connect_input(&mut self, pattern: &str) -> GatewayResult<String> {
        let mut midi_in = MidiInput::new(&format!("{}-Input", CLIENT_NAME))
            .map_err(|e| GatewayError::Device(format!("Failed to create MIDI input: {}", e)))?;
        midi_in.ignore(Ignore::None);

        let (port, name) = discovery::find_input_port(&midi_in, pattern).ok_or_else(|| {
            GatewayError::Device(format!("Couldn't find MIDI input port \"{}\", waiting.", pattern))
        })?;

        let handle = self.handle.clone();
        let conn = midi_in
            .connect(
                &port,
                CLIENT_NAME,
                move |_timestamp, data, _| {
                    let _ = handle.midi(data);
                },
                (),
            )
            .map_err(|e| GatewayError::Device(format!("Failed to connect to {}: {}", name, e)))?;

        self.input_conn = Some(conn);
        self.input_name = Some(name.clone());
        Ok(name)
    }

    /// Send to the looper's virtual input
    pub fn send_virtual(&mut self, message: &MidiMessage) -> GatewayResult<()> {
        let conn = self
            .virtual_out
            .as_mut()
            .ok_or_else(|| GatewayError::Device("virtual output not available".into()))?;
        send(conn, message)
    }

    /// Send an LED or display CC
    ///
    /// Without a configured controller output the CC is printed to stdout
    /// as `cc <number> <value>`, for a companion script to forward.
    pub fn send_controller(&mut self, message: &MidiMessage) -> GatewayResult<()> {
        match (&mut self.controller_out, &self.controller_pattern) {
            (Some(conn), _) => send(conn, message),
            (None, Some(pattern)) => Err(GatewayError::Device(format!(
                "controller output \"{}\" not connected",
                pattern
            ))),
            (None, None) => {
                if let MidiMessage::ControlChange { cc, value, .. } = message {
                    println!("cc {} {}", cc, value);
                }
                Ok(())
            }
        }
    }

    /// Silence everything downstream of the virtual output
    pub fn send_panic(&mut self) -> GatewayResult<()> {
        for channel in 1..=16u8 {
            for cc in [64, 120, 123] {
                self.send_virtual(&MidiMessage::control_change(channel, cc, 0))?;
            }
            for note in 0..=127 {
                self.send_virtual(&MidiMessage::note_off(channel, note))?;
            }
        }
        Ok(())
    }
}

fn send(conn: &mut MidiOutputConnection, message: &MidiMessage) -> GatewayResult<()> {
    let data = message.encode();
    conn.send(&data)
        .map_err(|e| GatewayError::Device(format!("Failed to send MIDI message: {}", e)))?;
    debug!("Sent: {} | {}", format_hex(&data), message);
    Ok(())
}

fn connect_output(pattern: &str) -> GatewayResult<(MidiOutputConnection, String)> {
    let midi_out = MidiOutput::new(&format!("{}-Output", CLIENT_NAME))
        .map_err(|e| GatewayError::Device(format!("Failed to create MIDI output: {}", e)))?;
    let (port, name) = discovery::find_output_port(&midi_out, pattern).ok_or_else(|| {
        GatewayError::Device(format!("Couldn't find MIDI output port \"{}\", waiting.", pattern))
    })?;
    let conn = midi_out
        .connect(&port, CLIENT_NAME)
        .map_err(|e| GatewayError::Device(format!("Failed to connect to {}: {}", name, e)))?;
    Ok((conn, name))
}

#[cfg(unix)]
fn create_virtual_output(name: &str) -> GatewayResult<MidiOutputConnection> {
    use midir::os::unix::VirtualOutput;

    let midi_out = MidiOutput::new(CLIENT_NAME)
        .map_err(|e| GatewayError::Device(format!("Failed to create MIDI output: {}", e)))?;
    midi_out.create_virtual(name).map_err(|e| {
        GatewayError::Device(format!(
            "Couldn't create virtual MIDI output port \"{}\": {}",
            name, e
        ))
    })
}

#[cfg(not(unix))]
fn create_virtual_output(_name: &str) -> GatewayResult<MidiOutputConnection> {
    Err(GatewayError::Device(
        "Virtual MIDI output ports are not supported on Windows".into(),
    ))
}

/// MIDI port discovery
pub mod discovery {
    use colored::Colorize;
    use midir::{MidiInput, MidiInputPort, MidiOutput, MidiOutputPort};
    use tracing::debug;

    /// Pick a port: exact name first, then case-insensitive substring
    pub fn match_port<'a>(names: &'a [String], pattern: &str) -> Option<usize> {
        if let Some(i) = names.iter().position(|n| n == pattern) {
            return Some(i);
        }
        let pattern = pattern.to_lowercase();
        names.iter().position(|n| n.to_lowercase().contains(&pattern))
    }

    pub fn find_input_port(midi_in: &MidiInput, pattern: &str) -> Option<(MidiInputPort, String)> {
        let ports = midi_in.ports();
        let names: Vec<String> = ports
            .iter()
            .map(|p| midi_in.port_name(p).unwrap_or_default())
            .collect();
        let i = match_port(&names, pattern)?;
        debug!("Found port '{}' matching pattern '{}'", names[i], pattern);
        Some((ports[i].clone(), names[i].clone()))
    }

    pub fn find_output_port(midi_out: &MidiOutput, pattern: &str) -> Option<(MidiOutputPort, String)> {
        let ports = midi_out.ports();
        let names: Vec<String> = ports
            .iter()
            .map(|p| midi_out.port_name(p).unwrap_or_default())
            .collect();
        let i = match_port(&names, pattern)?;
        debug!("Found port '{}' matching pattern '{}'", names[i], pattern);
        Some((ports[i].clone(), names[i].clone()))
    }

    pub fn input_port_names() -> Vec<String> {
        match MidiInput::new("Looper-GW-Scanner") {
            Ok(midi_in) => midi_in
                .ports()
                .iter()
                .filter_map(|p| midi_in.port_name(p).ok())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn output_port_names() -> Vec<String> {
        match MidiOutput::new("Looper-GW-Scanner") {
            Ok(midi_out) => midi_out
                .ports()
                .iter()
                .filter_map(|p| midi_out.port_name(p).ok())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Print available ports
    pub fn print_ports() {
        println!("{}", "MIDI Input devices:".bold());
        for name in input_port_names() {
            println!("  {}", name);
        }
        println!("{}", "MIDI Output devices:".bold());
        for name in output_port_names() {
            println!("  {}", name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::discovery::match_port;

    #[test]
    fn test_exact_name_wins_over_substring() {
        let names = vec!["FCB1010 MIDI 1".to_string(), "FCB1010".to_string()];
        assert_eq!(match_port(&names, "FCB1010"), Some(1));
    }

    #[test]
    fn test_substring_match_ignores_case() {
        let names = vec!["Midi Through".to_string(), "UM-ONE:UM-ONE MIDI 1".to_string()];
        assert_eq!(match_port(&names, "um-one"), Some(1));
        assert_eq!(match_port(&names, "nanoKEY"), None);
    }
}
