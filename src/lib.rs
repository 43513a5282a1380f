//! Looper GW - pedal board to looping engine gateway
//!
//! Bridges a MIDI foot controller and a SooperLooper-style OSC engine:
//! pedal presses become notes for the looper, engine state comes back as
//! pedal LEDs, a two-digit display and an optional remote LED display.

pub mod config;
pub mod error;
pub mod gateway;
pub mod midi;
pub mod osc;
pub mod pedal;
pub mod state;
pub mod transport;
