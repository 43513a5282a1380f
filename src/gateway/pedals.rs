//! Pedal press/release routing

use tracing::debug;

use crate::midi::{format_hex, MidiMessage};
use crate::state::{LedRole, LOOP_LED_COUNT};
use crate::transport::Transport;

/// Logical pedal decoded from a press/release value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pedal {
    /// Loop-select pedal 0-3
    Loop(u8),
    Record,
    Multiply,
    Insert,
    Replace,
    Substitute,
    Undo,
    Up,
    Down,
    /// Value outside the layout, used as a note offset verbatim
    Other(u8),
}

impl Pedal {
    /// Decode the value of a press/release CC
    ///
    /// The board numbers its pedals 1-10 with pedal 10 sending 0.
    pub fn from_controller_value(value: u8) -> Self {
        let slot = match value {
            1..=9 => value - 1,
            0 => 9,
            other => other,
        };
        match slot {
            s if (s as usize) < LOOP_LED_COUNT => Pedal::Loop(s),
            4 => Pedal::Record,
            5 => Pedal::Multiply,
            6 => Pedal::Insert,
            7 => Pedal::Replace,
            8 => Pedal::Substitute,
            9 => Pedal::Undo,
            10 => Pedal::Up,
            11 => Pedal::Down,
            other => Pedal::Other(other),
        }
    }

    /// Slot number, which is also the note offset from the base note
    pub fn slot(self) -> u8 {
        match self {
            Pedal::Loop(i) => i,
            Pedal::Record => 4,
            Pedal::Multiply => 5,
            Pedal::Insert => 6,
            Pedal::Replace => 7,
            Pedal::Substitute => 8,
            Pedal::Undo => 9,
            Pedal::Up => 10,
            Pedal::Down => 11,
            Pedal::Other(v) => v,
        }
    }
}

impl<T: Transport> super::Gateway<T> {
    /// Route raw bytes from the pedal board
    pub fn handle_midi(&mut self, data: &[u8]) {
        let Some(message) = MidiMessage::parse(data) else {
            debug!("Unparseable MIDI: {}", format_hex(data));
            return;
        };
        debug!("MIDI <- {}", message.describe(self.config.midi.octave_middle_c));

        if let MidiMessage::ControlChange { cc, value, .. } = message {
            if cc == self.config.pedals.press_cc {
                self.pedal_pressed(Pedal::from_controller_value(value));
                return;
            }
            if cc == self.config.pedals.release_cc {
                self.pedal_released(Pedal::from_controller_value(value));
                return;
            }
        }

        self.send_virtual(message);
    }

    pub fn pedal_pressed(&mut self, pedal: Pedal) {
        debug!("Pedal {:?} pressed", pedal);
        match pedal {
            Pedal::Loop(i) => {
                let note = self.loop_note(i);
                self.send_note(true, note);
            }
            Pedal::Record => {
                self.mode.toggle();
                if self.mode.is_shifted() {
                    self.led_on(LedRole::Record);
                } else {
                    self.led_off(LedRole::Record);
                }
                self.update_loops();
            }
            Pedal::Undo => {
                self.led_on(LedRole::Undo);
                let note = self.slot_note(pedal);
                self.send_note(true, note);
            }
            _ => {
                let note = self.slot_note(pedal);
                self.send_note(true, note);
            }
        }
    }

    pub fn pedal_released(&mut self, pedal: Pedal) {
        debug!("Pedal {:?} released", pedal);
        match pedal {
            Pedal::Loop(i) => {
                let note = self.loop_note(i);
                self.send_note(false, note);
            }
            Pedal::Record => {}
            Pedal::Undo => {
                self.led_off(LedRole::Undo);
                let note = self.slot_note(pedal);
                self.send_note(false, note);
                self.update_loops();
            }
            _ => {
                let note = self.slot_note(pedal);
                self.send_note(false, note);
            }
        }
    }

    fn loop_note(&self, i: u8) -> i32 {
        self.base_note as i32 + self.mode.offset() + i as i32
    }

    fn slot_note(&self, pedal: Pedal) -> i32 {
        self.base_note as i32 + pedal.slot() as i32
    }

    fn send_note(&mut self, on: bool, note: i32) {
        let channel = self.config.midi.channel;
        let msg = if on {
            MidiMessage::note_on(channel, note)
        } else {
            MidiMessage::note_off(channel, note)
        };
        self.send_virtual(msg);
    }
}
