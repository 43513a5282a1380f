//! Loop state machine: engine state to LED rendering

use tracing::{debug, warn};

use crate::config::ModalIndicatorPolicy;
use crate::osc::{CtrlUpdate, SELECTED_LOOP_PROPERTY, STATE_PROPERTY};
use crate::state::{
    BlinkMode, LedRole, LoopState, ModalIndicator, PedalMode, GLOBAL_LOOP_INDEX,
};
use crate::transport::Transport;

/// How one loop state shows up on the board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rendering {
    pub blink: BlinkMode,
    pub indicator: Option<ModalIndicator>,
}

/// Rendering of a loop state under the given pedal mode
pub fn render(state: LoopState, mode: PedalMode) -> Rendering {
    let blink = match state {
        LoopState::Unknown | LoopState::Off => BlinkMode::Dark,
        LoopState::WaitStart | LoopState::WaitStop => BlinkMode::FastBlink,
        LoopState::Recording
        | LoopState::Overdubbing
        | LoopState::Delay
        | LoopState::Scratching
        | LoopState::OneShot => BlinkMode::Solid,
        LoopState::Inserting
        | LoopState::Replacing
        | LoopState::Substitute
        | LoopState::Multiplying => BlinkMode::FastBlink,
        // Playing loops blink while the pedals are shifted
        LoopState::Playing if mode.is_shifted() => BlinkMode::Blink,
        LoopState::Playing => BlinkMode::Solid,
        LoopState::Muted | LoopState::Paused => BlinkMode::Blink,
        LoopState::Other(_) => BlinkMode::Dark,
    };
    Rendering {
        blink,
        indicator: state.modal_indicator(),
    }
}

impl<T: Transport> super::Gateway<T> {
    pub(crate) fn on_ctrl(&mut self, update: CtrlUpdate) {
        self.reset_heartbeat();

        if update.loop_index == GLOBAL_LOOP_INDEX {
            if update.property == SELECTED_LOOP_PROPERTY {
                self.show_selected_loop(update.value as i32);
            } else {
                debug!("Ignoring global property {}", update.property);
            }
            return;
        }

        if update.loop_index < 0 {
            debug!("Ignoring ctrl for loop {}", update.loop_index);
            return;
        }
        if update.property != STATE_PROPERTY {
            debug!(
                "Ignoring property {} of loop {}",
                update.property, update.loop_index
            );
            return;
        }

        let index = update.loop_index as usize;
        if index >= self.loops.len() {
            warn!(
                "Dropped state for loop {}: engine reported {} loops",
                index,
                self.loops.len()
            );
            return;
        }
        self.set_loop_state(index, LoopState::from_ctrl_value(update.value));
    }

    /// Apply a state to one loop and redraw its LEDs
    ///
    /// The loop LED is rewritten even when the state is unchanged.
    pub fn set_loop_state(&mut self, index: usize, state: LoopState) {
        let Some(previous) = self.loops.get(index).map(|lp| lp.state) else {
            return;
        };
        let rendering = render(state, self.mode);

        self.set_led(LedRole::Loop(index), rendering.blink);
        if let Some(indicator) = rendering.indicator {
            self.led_on(indicator.role());
        }

        if state != previous {
            debug!("Loop {}: {} -> {}", index, previous, state);
            if let Some(indicator) = previous.modal_indicator() {
                if self.modal_indicator_released(indicator, index) {
                    self.led_off(indicator.role());
                }
            }
        }

        self.loops[index].state = state;
    }

    /// Redraw every loop with its current state
    pub fn update_loops(&mut self) {
        for index in 0..self.loops.len() {
            let state = self.loops[index].state;
            self.set_loop_state(index, state);
        }
    }

    /// Whether a modal indicator goes dark when `leaving` exits its state
    pub(crate) fn modal_indicator_released(&self, indicator: ModalIndicator, leaving: usize) -> bool {
        match self.config.session.modal_indicator_policy {
            ModalIndicatorPolicy::ClearOnExit => true,
            ModalIndicatorPolicy::RefCounted => !self
                .loops
                .iter()
                .any(|lp| lp.index != leaving && lp.state.modal_indicator() == Some(indicator)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shifted() -> PedalMode {
        let mut mode = PedalMode::default();
        mode.toggle();
        mode
    }

    #[test]
    fn test_render_table() {
        let plain = PedalMode::default();
        let cases = [
            (LoopState::Unknown, BlinkMode::Dark, None),
            (LoopState::Off, BlinkMode::Dark, None),
            (LoopState::WaitStart, BlinkMode::FastBlink, None),
            (LoopState::WaitStop, BlinkMode::FastBlink, None),
            (LoopState::Recording, BlinkMode::Solid, None),
            (LoopState::Overdubbing, BlinkMode::Solid, None),
            (LoopState::Delay, BlinkMode::Solid, None),
            (LoopState::Scratching, BlinkMode::Solid, None),
            (LoopState::OneShot, BlinkMode::Solid, None),
            (LoopState::Inserting, BlinkMode::FastBlink, Some(ModalIndicator::Insert)),
            (LoopState::Replacing, BlinkMode::FastBlink, Some(ModalIndicator::Replace)),
            (LoopState::Substitute, BlinkMode::FastBlink, Some(ModalIndicator::Substitute)),
            (LoopState::Multiplying, BlinkMode::FastBlink, Some(ModalIndicator::Multiply)),
            (LoopState::Playing, BlinkMode::Solid, None),
            (LoopState::Muted, BlinkMode::Blink, None),
            (LoopState::Paused, BlinkMode::Blink, None),
            (LoopState::Other(42), BlinkMode::Dark, None),
        ];
        for (state, blink, indicator) in cases {
            assert_eq!(render(state, plain), Rendering { blink, indicator }, "{}", state);
        }
    }

    #[test]
    fn test_playing_blinks_when_shifted() {
        assert_eq!(render(LoopState::Playing, shifted()).blink, BlinkMode::Blink);
        assert_eq!(render(LoopState::Recording, shifted()).blink, BlinkMode::Solid);
    }
}
