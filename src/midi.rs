//! MIDI utilities and message types
//!
//! Parsing and encoding of the channel messages the pedal board produces,
//! plus the human-readable rendering used for MIDI logging.

use std::fmt;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// MIDI message types
///
/// Channels are 0-15 on the wire; `Display` shows them 1-16.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOff { channel: u8, note: u8, velocity: u8 },
    NoteOn { channel: u8, note: u8, velocity: u8 },
    PolyPressure { channel: u8, note: u8, pressure: u8 },
    ControlChange { channel: u8, cc: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
    ChannelPressure { channel: u8, pressure: u8 },
    /// 14-bit value, 8192 is centre
    PitchBend { channel: u8, value: u16 },
    /// System and realtime messages, kept verbatim for passthrough
    System(Vec<u8>),
}

impl MidiMessage {
    /// Parse a MIDI message from raw bytes
    pub fn parse(data: &[u8]) -> Option<Self> {
        let (&status, rest) = data.split_first()?;

        // Running status is not produced by midir callbacks
        if status < 0x80 {
            return None;
        }
        if status >= 0xF0 {
            return Some(MidiMessage::System(data.to_vec()));
        }

        let channel = status & 0x0F;
        let d1 = rest.first().map(|b| b & 0x7F);
        let d2 = rest.get(1).map(|b| b & 0x7F);

        match status & 0xF0 {
            0x80 => Some(MidiMessage::NoteOff {
                channel,
                note: d1?,
                velocity: d2?,
            }),
            0x90 => {
                let (note, velocity) = (d1?, d2?);
                // Note On with velocity 0 is a Note Off
                if velocity == 0 {
                    Some(MidiMessage::NoteOff { channel, note, velocity })
                } else {
                    Some(MidiMessage::NoteOn { channel, note, velocity })
                }
            }
            0xA0 => Some(MidiMessage::PolyPressure {
                channel,
                note: d1?,
                pressure: d2?,
            }),
            0xB0 => Some(MidiMessage::ControlChange {
                channel,
                cc: d1?,
                value: d2?,
            }),
            0xC0 => Some(MidiMessage::ProgramChange { channel, program: d1? }),
            0xD0 => Some(MidiMessage::ChannelPressure { channel, pressure: d1? }),
            0xE0 => {
                let (lsb, msb) = (d1? as u16, d2? as u16);
                Some(MidiMessage::PitchBend {
                    channel,
                    value: (msb << 7) | lsb,
                })
            }
            _ => None,
        }
    }

    /// Encode the message to MIDI bytes
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                vec![0x80 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                vec![0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::PolyPressure { channel, note, pressure } => {
                vec![0xA0 | (channel & 0x0F), note & 0x7F, pressure & 0x7F]
            }
            MidiMessage::ControlChange { channel, cc, value } => {
                vec![0xB0 | (channel & 0x0F), cc & 0x7F, value & 0x7F]
            }
            MidiMessage::ProgramChange { channel, program } => {
                vec![0xC0 | (channel & 0x0F), program & 0x7F]
            }
            MidiMessage::ChannelPressure { channel, pressure } => {
                vec![0xD0 | (channel & 0x0F), pressure & 0x7F]
            }
            MidiMessage::PitchBend { channel, value } => {
                let lsb = (value & 0x7F) as u8;
                let msb = ((value >> 7) & 0x7F) as u8;
                vec![0xE0 | (channel & 0x0F), lsb, msb]
            }
            MidiMessage::System(ref data) => data.clone(),
        }
    }

    /// Note On at full velocity on a 1-16 channel
    pub fn note_on(channel: u8, note: i32) -> Self {
        MidiMessage::NoteOn {
            channel: wire_channel(channel),
            note: clamp_7bit(note),
            velocity: 127,
        }
    }

    /// Note Off with zero release velocity on a 1-16 channel
    pub fn note_off(channel: u8, note: i32) -> Self {
        MidiMessage::NoteOff {
            channel: wire_channel(channel),
            note: clamp_7bit(note),
            velocity: 0,
        }
    }

    /// Control Change on a 1-16 channel
    pub fn control_change(channel: u8, cc: u8, value: i32) -> Self {
        MidiMessage::ControlChange {
            channel: wire_channel(channel),
            cc: cc & 0x7F,
            value: clamp_7bit(value),
        }
    }

    /// Get the channel for channel messages (0-15), None for system messages
    pub fn channel(&self) -> Option<u8> {
        match *self {
            MidiMessage::NoteOff { channel, .. }
            | MidiMessage::NoteOn { channel, .. }
            | MidiMessage::PolyPressure { channel, .. }
            | MidiMessage::ControlChange { channel, .. }
            | MidiMessage::ProgramChange { channel, .. }
            | MidiMessage::ChannelPressure { channel, .. }
            | MidiMessage::PitchBend { channel, .. } => Some(channel),
            MidiMessage::System(_) => None,
        }
    }

    /// Log line in the classic receivemidi layout, using note names
    pub fn describe(&self, octave_middle_c: i32) -> String {
        match *self {
            MidiMessage::NoteOn { channel, note, velocity } => format!(
                "channel {:>2}   note-on         {:>4} {:>3}",
                channel + 1,
                note_name(note, octave_middle_c),
                velocity
            ),
            MidiMessage::NoteOff { channel, note, velocity } => format!(
                "channel {:>2}   note-off        {:>4} {:>3}",
                channel + 1,
                note_name(note, octave_middle_c),
                velocity
            ),
            MidiMessage::PolyPressure { channel, note, pressure } => format!(
                "channel {:>2}   poly-pressure   {:>4} {:>3}",
                channel + 1,
                note_name(note, octave_middle_c),
                pressure
            ),
            MidiMessage::ControlChange { channel, cc, value } => {
                format!("channel {:>2}   control-change   {:>3} {:>3}", channel + 1, cc, value)
            }
            MidiMessage::ProgramChange { channel, program } => {
                format!("channel {:>2}   program-change   {:>7}", channel + 1, program)
            }
            MidiMessage::ChannelPressure { channel, pressure } => {
                format!("channel {:>2}   channel-pressure {:>7}", channel + 1, pressure)
            }
            MidiMessage::PitchBend { channel, value } => {
                format!("channel {:>2}   pitch-bend       {:>7}", channel + 1, value)
            }
            MidiMessage::System(ref data) => describe_system(data),
        }
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe(3))
    }
}

fn describe_system(data: &[u8]) -> String {
    match data {
        [0xF8] => "midi-clock".to_string(),
        [0xFA] => "start".to_string(),
        [0xFB] => "continue".to_string(),
        [0xFC] => "stop".to_string(),
        [0xFE] => "active-sensing".to_string(),
        [0xFF] => "reset".to_string(),
        [0xF6] => "tune-request".to_string(),
        [0xF3, song, ..] => format!("song-select {:>3}", song),
        [0xF2, lsb, msb, ..] => {
            let position = ((*msb as u16 & 0x7F) << 7) | (*lsb as u16 & 0x7F);
            format!("song-position {:>5}", position)
        }
        [0xF1, value, ..] => format!("time-code {:>2} {}", value >> 4, value & 0x0F),
        [0xF0, body @ ..] => {
            let payload = body.strip_suffix(&[0xF7]).unwrap_or(body);
            format!("system-exclusive hex {} dec", format_hex(payload))
        }
        other => format!("system {}", format_hex(other)),
    }
}

fn wire_channel(channel: u8) -> u8 {
    channel.clamp(1, 16) - 1
}

fn clamp_7bit(value: i32) -> u8 {
    value.clamp(0, 0x7F) as u8
}

/// Note name with octave, e.g. 64 -> "E3" when middle C is C3
pub fn note_name(note: u8, octave_middle_c: i32) -> String {
    let octave = (note / 12) as i32 + (octave_middle_c - 5);
    format!("{}{}", NOTE_NAMES[(note % 12) as usize], octave)
}

/// Parse a note given as a number ("64") or a name ("E3", "C#4", "Bb2")
pub fn parse_note(value: &str, octave_middle_c: i32) -> Option<u8> {
    let value = value.trim();
    if let Ok(n) = value.parse::<i32>() {
        return Some(clamp_7bit(n));
    }

    let upper = value.to_uppercase();
    let mut chars = upper.chars();
    let mut note: i32 = match chars.next()? {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' | 'H' => 11,
        _ => return None,
    };

    let rest = chars.as_str();
    let octave_str = if let Some(r) = rest.strip_prefix('#') {
        note += 1;
        r
    } else if let Some(r) = rest.strip_prefix('B') {
        note -= 1;
        r
    } else {
        rest
    };

    let octave: i32 = octave_str.parse().ok()?;
    Some(clamp_7bit(note + (octave + 5 - octave_middle_c) * 12))
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_change_parsing() {
        let msg = MidiMessage::parse(&[0xB0, 104, 3]).unwrap();
        assert_eq!(
            msg,
            MidiMessage::ControlChange {
                channel: 0,
                cc: 104,
                value: 3,
            }
        );
    }

    #[test]
    fn test_note_on_velocity_zero() {
        let msg = MidiMessage::parse(&[0x90, 60, 0]).unwrap();
        assert_eq!(
            msg,
            MidiMessage::NoteOff {
                channel: 0,
                note: 60,
                velocity: 0,
            }
        );
    }

    #[test]
    fn test_truncated_message_is_rejected() {
        assert_eq!(MidiMessage::parse(&[0xB0, 104]), None);
        assert_eq!(MidiMessage::parse(&[]), None);
        assert_eq!(MidiMessage::parse(&[0x40, 1, 2]), None);
    }

    #[test]
    fn test_system_messages_kept_verbatim() {
        let msg = MidiMessage::parse(&[0xF8]).unwrap();
        assert_eq!(msg.encode(), vec![0xF8]);
        assert_eq!(msg.channel(), None);
        assert_eq!(msg.describe(3), "midi-clock");
    }

    #[test]
    fn test_builders_use_one_based_channels() {
        assert_eq!(MidiMessage::note_on(1, 84).encode(), vec![0x90, 84, 127]);
        assert_eq!(MidiMessage::note_off(16, 64).encode(), vec![0x8F, 64, 0]);
        assert_eq!(MidiMessage::control_change(2, 106, 3).encode(), vec![0xB1, 106, 3]);
        assert_eq!(MidiMessage::note_on(1, 200).encode(), vec![0x90, 127, 127]);
    }

    #[test]
    fn test_note_names() {
        assert_eq!(note_name(60, 3), "C3");
        assert_eq!(note_name(64, 3), "E3");
        assert_eq!(note_name(61, 4), "C#4");
    }

    #[test]
    fn test_parse_note() {
        assert_eq!(parse_note("64", 3), Some(64));
        assert_eq!(parse_note("E3", 3), Some(64));
        assert_eq!(parse_note("c#3", 3), Some(61));
        assert_eq!(parse_note("Bb2", 3), Some(58));
        assert_eq!(parse_note("C4", 4), Some(60));
        assert_eq!(parse_note("X1", 3), None);
        assert_eq!(parse_note("E", 3), None);
    }

    #[test]
    fn test_describe_note_on() {
        let line = MidiMessage::note_on(1, 64).describe(3);
        assert_eq!(line, "channel  1   note-on           E3 127");
    }
}
