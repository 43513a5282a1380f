//! Gateway state type definitions
//!
//! Loops, LEDs, the session record and the pedal mode flag. All of it is
//! owned by the gateway actor; nothing here is shared across threads.

use std::fmt;

/// Number of LEDs on the pedal board
pub const LED_COUNT: usize = 10;

/// Loops that own an LED (one per loop-select pedal)
pub const LOOP_LED_COUNT: usize = 4;

/// Note offset applied to loop-select pedals while RECORD mode is latched
pub const MODE_SHIFT: i32 = 20;

/// Loop index the engine uses for global properties in `/ctrl`
pub const GLOBAL_LOOP_INDEX: i32 = -2;

/// Loop state as reported by the engine
///
/// Wire values are the engine's ordinals. Values the engine may add later
/// are kept verbatim in `Other` and render dark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopState {
    Unknown,
    Off,
    WaitStart,
    Recording,
    WaitStop,
    Playing,
    Overdubbing,
    Multiplying,
    Inserting,
    Replacing,
    Delay,
    Muted,
    Scratching,
    OneShot,
    Substitute,
    Paused,
    Other(i32),
}

impl LoopState {
    pub fn from_wire(value: i32) -> Self {
        match value {
            -1 => LoopState::Unknown,
            0 => LoopState::Off,
            1 => LoopState::WaitStart,
            2 => LoopState::Recording,
            3 => LoopState::WaitStop,
            4 => LoopState::Playing,
            5 => LoopState::Overdubbing,
            6 => LoopState::Multiplying,
            7 => LoopState::Inserting,
            8 => LoopState::Replacing,
            9 => LoopState::Delay,
            10 => LoopState::Muted,
            11 => LoopState::Scratching,
            12 => LoopState::OneShot,
            13 => LoopState::Substitute,
            14 => LoopState::Paused,
            other => LoopState::Other(other),
        }
    }

    /// `/ctrl` carries states as floats; the fraction is dropped
    pub fn from_ctrl_value(value: f32) -> Self {
        Self::from_wire(value as i32)
    }

    pub fn to_wire(self) -> i32 {
        match self {
            LoopState::Unknown => -1,
            LoopState::Off => 0,
            LoopState::WaitStart => 1,
            LoopState::Recording => 2,
            LoopState::WaitStop => 3,
            LoopState::Playing => 4,
            LoopState::Overdubbing => 5,
            LoopState::Multiplying => 6,
            LoopState::Inserting => 7,
            LoopState::Replacing => 8,
            LoopState::Delay => 9,
            LoopState::Muted => 10,
            LoopState::Scratching => 11,
            LoopState::OneShot => 12,
            LoopState::Substitute => 13,
            LoopState::Paused => 14,
            LoopState::Other(v) => v,
        }
    }

    /// Shared indicator lit while a loop is in this state
    pub fn modal_indicator(self) -> Option<ModalIndicator> {
        match self {
            LoopState::Inserting => Some(ModalIndicator::Insert),
            LoopState::Replacing => Some(ModalIndicator::Replace),
            LoopState::Substitute => Some(ModalIndicator::Substitute),
            LoopState::Multiplying => Some(ModalIndicator::Multiply),
            _ => None,
        }
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopState::Other(v) => write!(f, "Other({})", v),
            state => write!(f, "{:?}", state),
        }
    }
}

/// How an LED is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlinkMode {
    #[default]
    Dark,
    Solid,
    Blink,
    FastBlink,
}

impl BlinkMode {
    /// Ordinal sent as `ledState` in `/led`
    pub fn wire_state(self) -> i32 {
        match self {
            BlinkMode::Dark => 0,
            BlinkMode::Solid => 1,
            BlinkMode::Blink => 2,
            BlinkMode::FastBlink => 3,
        }
    }

    /// Timer period sent as `timerMode` in `/led` (0 = steady)
    pub fn timer_mode(self) -> i32 {
        match self {
            BlinkMode::Dark | BlinkMode::Solid => 0,
            BlinkMode::FastBlink => 1,
            BlinkMode::Blink => 3,
        }
    }
}

/// One hardware LED slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Led {
    pub index: usize,
    pub on: bool,
    pub blink: BlinkMode,
}

impl Led {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            on: false,
            blink: BlinkMode::Dark,
        }
    }
}

/// Role an LED slot plays on the board
///
/// LED slots coincide with pedal slots, so this table is also the
/// pedal layout. Remapping hardware means editing `slot` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedRole {
    Loop(usize),
    Record,
    Multiply,
    Insert,
    Replace,
    Substitute,
    Undo,
}

impl LedRole {
    /// LED slot for this role, None for loops without a pedal
    pub fn slot(self) -> Option<usize> {
        match self {
            LedRole::Loop(i) if i < LOOP_LED_COUNT => Some(i),
            LedRole::Loop(_) => None,
            LedRole::Record => Some(4),
            LedRole::Multiply => Some(5),
            LedRole::Insert => Some(6),
            LedRole::Replace => Some(7),
            LedRole::Substitute => Some(8),
            LedRole::Undo => Some(9),
        }
    }
}

/// Shared LED asserted by any loop in a modal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModalIndicator {
    Insert,
    Replace,
    Substitute,
    Multiply,
}

impl ModalIndicator {
    pub fn role(self) -> LedRole {
        match self {
            ModalIndicator::Insert => LedRole::Insert,
            ModalIndicator::Replace => LedRole::Replace,
            ModalIndicator::Substitute => LedRole::Substitute,
            ModalIndicator::Multiply => LedRole::Multiply,
        }
    }
}

/// One engine loop as mirrored locally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Loop {
    pub index: usize,
    pub state: LoopState,
    /// LED slot showing this loop, if it has one
    pub led: Option<usize>,
}

impl Loop {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            state: LoopState::Off,
            led: LedRole::Loop(index).slot(),
        }
    }
}

/// Mode offset toggled by the RECORD pedal (0 or 20)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PedalMode(i32);

impl PedalMode {
    pub fn offset(self) -> i32 {
        self.0
    }

    pub fn is_shifted(self) -> bool {
        self.0 != 0
    }

    pub fn toggle(&mut self) {
        self.0 = if self.0 > 0 { 0 } else { MODE_SHIFT };
    }
}

/// Transport-level phase of the engine session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Disconnected,
    /// One socket up, the other still failing
    Connecting,
    Connected,
}

/// The one logical session with the engine
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Session {
    pub engine_id: Option<i32>,
    pub host_url: String,
    pub version: String,
    pub loop_count: usize,
    pub heartbeat: i32,
    /// Receive port currently bound, None while disconnected
    pub receive_port: Option<u16>,
    /// Engine port currently connected, None while disconnected
    pub send_port: Option<u16>,
    pub led_send_port: Option<u16>,
    pub phase: SessionPhase,
    /// Set once a pingack has described the engine
    pub handshake_complete: bool,
}

impl Session {
    pub fn is_connected(&self) -> bool {
        self.receive_port.is_some() && self.send_port.is_some()
    }
}

/// Engine identity and topology carried by `/pingack` and `/heartbeat`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInfo {
    pub host_url: String,
    pub version: String,
    pub loop_count: i32,
    pub engine_id: i32,
}

/// Read-only copy of the gateway state, for queries and tests
#[derive(Debug, Clone, PartialEq)]
pub struct GatewaySnapshot {
    pub session: Session,
    pub loops: Vec<Loop>,
    pub leds: Vec<Led>,
    pub mode: PedalMode,
    pub selected_loop: i32,
    pub mirror: Option<(String, u16)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_state_wire_values() {
        for value in -1..=14 {
            assert_eq!(LoopState::from_wire(value).to_wire(), value);
        }
        assert_eq!(LoopState::from_wire(20), LoopState::Other(20));
        assert_eq!(LoopState::from_ctrl_value(4.0), LoopState::Playing);
        assert_eq!(LoopState::from_ctrl_value(13.0), LoopState::Substitute);
    }

    #[test]
    fn test_led_role_table() {
        assert_eq!(LedRole::Loop(0).slot(), Some(0));
        assert_eq!(LedRole::Loop(3).slot(), Some(3));
        assert_eq!(LedRole::Loop(4).slot(), None);
        assert_eq!(LedRole::Record.slot(), Some(4));
        assert_eq!(LedRole::Undo.slot(), Some(9));
        assert_eq!(ModalIndicator::Insert.role().slot(), Some(6));
    }

    #[test]
    fn test_pedal_mode_toggles_between_zero_and_twenty() {
        let mut mode = PedalMode::default();
        assert_eq!(mode.offset(), 0);
        mode.toggle();
        assert_eq!(mode.offset(), 20);
        assert!(mode.is_shifted());
        mode.toggle();
        assert_eq!(mode.offset(), 0);
    }

    #[test]
    fn test_blink_wire_encoding() {
        assert_eq!(BlinkMode::Solid.wire_state(), 1);
        assert_eq!(BlinkMode::FastBlink.timer_mode(), 1);
        assert_eq!(BlinkMode::Blink.timer_mode(), 3);
        assert_eq!(BlinkMode::Dark.timer_mode(), 0);
    }
}
