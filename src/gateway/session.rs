//! Engine session lifecycle: connect, handshake, heartbeat, resync

use tracing::{debug, info, warn};

use crate::osc::{self, ReplyTarget, HEARTBEAT_PATH, PINGACK_PATH};
use crate::state::{EngineInfo, LedRole, Loop, SessionPhase, LED_COUNT, LOOP_LED_COUNT};
use crate::transport::Transport;

impl<T: Transport> super::Gateway<T> {
    /// Periodic tick: device supervision, connection polling, liveness
    pub fn tick(&mut self) {
        self.transport.poll_devices();

        if !self.session.is_connected() {
            self.try_connect();
            return;
        }

        let heartbeat = self.session.heartbeat;
        if heartbeat == 0 {
            let probe = osc::ping(&self.reply_url(), HEARTBEAT_PATH);
            self.send_engine(probe);
        }
        if heartbeat < self.config.session.heartbeat_loss {
            self.lose_session();
            return;
        }
        self.session.heartbeat -= 1;
    }

    /// Bind/connect whichever socket is missing; ping once both are up
    fn try_connect(&mut self) -> bool {
        if self.session.send_port.is_none() {
            let host = self.config.osc.engine_host.clone();
            let port = self.config.osc.send_port;
            match self.transport.connect_engine(&host, port) {
                Ok(()) => {
                    info!("Connected to OSC send port {}:{}", host, port);
                    self.session.send_port = Some(port);
                }
                Err(e) => warn!("{}", e),
            }
        }

        if self.session.receive_port.is_none() {
            let port = self.config.osc.receive_port;
            match self.transport.bind_receiver(port) {
                Ok(()) => {
                    info!("Listening for OSC on port {}", port);
                    self.session.receive_port = Some(port);
                }
                Err(e) => warn!("{}", e),
            }
        }

        if !self.session.is_connected() {
            // One socket up, the other retried next tick
            let partial = self.session.send_port.is_some() || self.session.receive_port.is_some();
            self.session.phase = if partial {
                SessionPhase::Connecting
            } else {
                SessionPhase::Disconnected
            };
            return false;
        }

        self.session.phase = SessionPhase::Connected;
        self.session.heartbeat = self.config.session.heartbeat_reset;
        let ping = osc::ping(&self.reply_url(), PINGACK_PATH);
        self.send_engine(ping);
        true
    }

    /// Drop engine subscriptions and release every socket
    pub fn stop(&mut self) {
        if self.session.is_connected() && self.session.handshake_complete {
            for index in 0..self.loops.len() {
                self.subscribe_loop(index, false);
            }
            self.subscribe_global(false);
        }
        self.unregister_mirror();
        self.transport.release_engine();
        self.session.receive_port = None;
        self.session.send_port = None;
        self.session.phase = SessionPhase::Disconnected;
    }

    fn lose_session(&mut self) {
        warn!("No heartbeat from engine, reconnecting");
        self.transport.release_engine();
        self.session.receive_port = None;
        self.session.send_port = None;
        self.session.phase = SessionPhase::Disconnected;
        self.session.handshake_complete = false;
    }

    pub(crate) fn reset_heartbeat(&mut self) {
        self.session.heartbeat = self.config.session.heartbeat_reset;
    }

    /// Handshake reply: adopt the engine's description and resubscribe everything
    pub(crate) fn on_pingack(&mut self, engine: EngineInfo) {
        info!(
            "Engine {} (version {}, id {}) has {} loops",
            engine.host_url, engine.version, engine.engine_id, engine.loop_count
        );
        self.adopt_engine(&engine);
        self.rebuild_loops(engine.loop_count as usize);
        self.session.handshake_complete = true;
        self.reset_heartbeat();
        self.update_loops();
    }

    pub(crate) fn on_heartbeat(&mut self, engine: EngineInfo) {
        self.reset_heartbeat();
        let count = engine.loop_count as usize;

        if self.session.engine_id != Some(engine.engine_id) {
            info!(
                "Engine identity changed ({:?} -> {}), resynchronising {} loops",
                self.session.engine_id, engine.engine_id, count
            );
            self.adopt_engine(&engine);
            self.rebuild_loops(count);
            self.update_loops();
            return;
        }

        self.session.host_url = engine.host_url;
        self.session.version = engine.version;

        if count > self.loops.len() {
            info!("Engine grew from {} to {} loops", self.loops.len(), count);
            self.grow_loops(count);
            self.update_loops();
        } else if count < self.loops.len() {
            info!("Engine shrank from {} to {} loops", self.loops.len(), count);
            self.shrink_loops(count);
        }
    }

    fn adopt_engine(&mut self, engine: &EngineInfo) {
        self.session.host_url = engine.host_url.clone();
        self.session.version = engine.version.clone();
        self.session.engine_id = Some(engine.engine_id);
    }

    /// Replace the loop collection with `count` fresh loops, all subscribed
    fn rebuild_loops(&mut self, count: usize) {
        // Indicators asserted by the old loops have no owner anymore
        for lp in std::mem::take(&mut self.loops) {
            if let Some(indicator) = lp.state.modal_indicator() {
                self.led_off(indicator.role());
            }
        }
        self.session.loop_count = 0;
        self.grow_loops(count);
        // Loop pedals without a loop go dark
        for index in count..LOOP_LED_COUNT {
            self.led_off(LedRole::Loop(index));
        }
        self.subscribe_global(true);
    }

    /// Append loops up to `count`, subscribing only the new ones
    fn grow_loops(&mut self, count: usize) {
        for index in self.loops.len()..count {
            self.loops.push(Loop::new(index));
            self.subscribe_loop(index, true);
            let get = osc::loop_get_state(index, &self.reply_url());
            self.send_engine(get);
        }
        self.session.loop_count = self.loops.len();
    }

    /// Drop loops beyond `count`, unsubscribing them and clearing their LEDs
    fn shrink_loops(&mut self, count: usize) {
        while self.loops.len() > count {
            let Some(lp) = self.loops.pop() else { break };
            self.subscribe_loop(lp.index, false);
            if lp.led.is_some() {
                self.led_off(LedRole::Loop(lp.index));
            }
            if let Some(indicator) = lp.state.modal_indicator() {
                if self.modal_indicator_released(indicator, lp.index) {
                    self.led_off(indicator.role());
                }
            }
        }
        self.session.loop_count = self.loops.len();
    }

    fn subscribe_loop(&mut self, index: usize, register: bool) {
        let msg = osc::loop_auto_update(
            index,
            register,
            self.config.session.auto_update_ms,
            &self.reply_url(),
        );
        self.send_engine(msg);
    }

    fn subscribe_global(&mut self, register: bool) {
        let msg = osc::global_update(register, &self.reply_url());
        self.send_engine(msg);
    }

    /// Answer a third-party discovery ping without touching the session
    pub(crate) fn answer_discovery(&mut self, target: &ReplyTarget) {
        debug!("Discovery ping from {}:{}", target.host, target.port);
        let reply = osc::discovery_reply(
            &target.addr,
            &self.reply_url(),
            env!("CARGO_PKG_VERSION"),
            LED_COUNT,
            std::process::id(),
        );
        if let Err(e) = self.transport.send_once(&target.host, target.port, reply) {
            warn!("Failed to answer discovery ping: {}", e);
        }
    }
}
