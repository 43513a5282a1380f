//! Gateway state and the actor that owns it
//!
//! State types live in `types`; the gateway actor serialises every input
//! (tick, MIDI, OSC) through one channel so the state has a single owner.

mod actor;
mod actor_handle;
mod commands;
mod types;

pub use actor::GatewayActor;
pub use actor_handle::GatewayHandle;
pub use commands::GatewayEvent;
pub use types::{
    BlinkMode, EngineInfo, GatewaySnapshot, Led, LedRole, Loop, LoopState, ModalIndicator,
    PedalMode, Session, SessionPhase, GLOBAL_LOOP_INDEX, LED_COUNT, LOOP_LED_COUNT, MODE_SHIFT,
};
