//! LED surface, two-digit display and the remote LED display
//!
//! Every LED write goes through `set_led`, which updates the pool, drives
//! the pedal board and forwards to the remote display when one is active.

use tracing::{debug, info, warn};

use crate::osc::{self, ReplyTarget};
use crate::state::{BlinkMode, LedRole, LED_COUNT};
use crate::transport::Transport;

/// Address of LED pushes to the remote display
const LED_PATH: &str = "/led";

/// The single remote LED display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLedSubscriber {
    pub host: String,
    pub port: u16,
}

/// Controller value addressing one LED slot (slot 9 wraps to 0)
pub(crate) fn controller_led_number(slot: usize) -> i32 {
    ((slot + 1) % LED_COUNT) as i32
}

/// Tens and ones digits for the two-digit display
pub(crate) fn display_digits(value: i32) -> (i32, i32) {
    let value = value.clamp(0, 99);
    (value / 10, value % 10)
}

impl<T: Transport> super::Gateway<T> {
    pub(crate) fn led_on(&mut self, role: LedRole) {
        self.set_led(role, BlinkMode::Solid);
    }

    pub(crate) fn led_off(&mut self, role: LedRole) {
        self.set_led(role, BlinkMode::Dark);
    }

    /// Write one LED; roles without a slot are ignored
    pub(crate) fn set_led(&mut self, role: LedRole, blink: BlinkMode) {
        let Some(slot) = role.slot() else { return };
        let on = blink != BlinkMode::Dark;

        let led = &mut self.leds[slot];
        led.on = on;
        led.blink = blink;
        let led = *led;

        let cc = if on {
            self.config.pedals.led_on_cc
        } else {
            self.config.pedals.led_off_cc
        };
        self.send_controller_cc(cc, controller_led_number(slot));

        if self.mirror.is_some() {
            let msg = osc::led(LED_PATH, &led);
            if let Err(e) = self.transport.send_mirror(msg) {
                warn!("Failed to forward LED {} to display: {}", slot, e);
            }
        }
    }

    /// Update the selected loop and drive both displays
    pub(crate) fn show_selected_loop(&mut self, selected: i32) {
        self.selected_loop = selected;

        let (tens, ones) = display_digits(selected);
        let (tens_cc, ones_cc) = (
            self.config.pedals.display_tens_cc,
            self.config.pedals.display_ones_cc,
        );
        self.send_controller_cc(tens_cc, tens);
        self.send_controller_cc(ones_cc, ones);

        if self.mirror.is_some() {
            if let Err(e) = self.transport.send_mirror(osc::display(selected)) {
                warn!("Failed to forward display to LED display: {}", e);
            }
        }
    }

    /// Start forwarding to a remote display, replacing any previous one
    pub fn register_mirror(&mut self, host: &str, port: u16) {
        if let Some(current) = &self.mirror {
            if current.host == host && current.port == port {
                debug!("LED display {}:{} already registered", host, port);
                return;
            }
            info!(
                "Replacing LED display {}:{} with {}:{}",
                current.host, current.port, host, port
            );
            self.unregister_mirror();
        }

        match self.transport.connect_mirror(host, port) {
            Ok(()) => {
                info!("Forwarding LEDs to {}:{}", host, port);
                self.mirror = Some(RemoteLedSubscriber {
                    host: host.to_string(),
                    port,
                });
            }
            Err(e) => warn!("Failed to connect LED display: {}", e),
        }
    }

    pub fn unregister_mirror(&mut self) {
        if let Some(old) = self.mirror.take() {
            info!("Stopped forwarding LEDs to {}:{}", old.host, old.port);
            self.transport.disconnect_mirror();
        }
    }

    /// Push every LED once to a requester
    pub(crate) fn dump_leds(&mut self, target: &ReplyTarget) {
        for led in self.leds {
            let msg = osc::led(&target.addr, &led);
            if let Err(e) = self.transport.send_once(&target.host, target.port, msg) {
                warn!("Failed to send LED dump: {}", e);
                return;
            }
        }
    }

    /// Push the selected loop once to a requester
    pub(crate) fn push_display_once(&mut self, target: &ReplyTarget) {
        let msg = osc::display(self.selected_loop);
        if let Err(e) = self.transport.send_once(&target.host, target.port, msg) {
            warn!("Failed to send display: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_led_numbers() {
        assert_eq!(controller_led_number(0), 1);
        assert_eq!(controller_led_number(8), 9);
        assert_eq!(controller_led_number(9), 0);
    }

    #[test]
    fn test_display_digits_are_clamped() {
        assert_eq!(display_digits(7), (0, 7));
        assert_eq!(display_digits(42), (4, 2));
        assert_eq!(display_digits(-1), (0, 0));
        assert_eq!(display_digits(250), (9, 9));
    }
}
