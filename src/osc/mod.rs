//! OSC protocol spoken with the looping engine and with remote displays
//!
//! Inbound packets are decoded into typed [`Inbound`] messages; anything
//! with the wrong arity or argument types is a protocol error and never
//! reaches the gateway state. Outbound messages are built by the helpers
//! at the bottom of this file.

pub mod link;

use rosc::{OscMessage, OscPacket, OscType};

use crate::error::{GatewayError, GatewayResult};
use crate::state::{EngineInfo, Led};

pub use link::OscLink;

/// Address the engine replies to for handshake pings
pub const PINGACK_PATH: &str = "/pingack";
/// Address the engine replies to for liveness probes
pub const HEARTBEAT_PATH: &str = "/heartbeat";
/// Address the engine sends control updates to
pub const CTRL_PATH: &str = "/ctrl";

const DISCOVERY_PATH: &str = "/loop4r/ping";
const LED_DUMP_PATH: &str = "/loop4r/leds";
const DISPLAY_REQUEST_PATH: &str = "/loop4r/display";
const MIRROR_REGISTER_PATH: &str = "/loop4r/register_auto_update";
const MIRROR_UNREGISTER_PATH: &str = "/loop4r/unregister_auto_update";

/// Largest loop count accepted from the engine
pub const MAX_LOOP_COUNT: i32 = 128;

/// Global property tracked on the engine
pub const SELECTED_LOOP_PROPERTY: &str = "selected_loop_num";
/// Per-loop property tracked on the engine
pub const STATE_PROPERTY: &str = "state";

/// A `/ctrl` update from the engine
#[derive(Debug, Clone, PartialEq)]
pub struct CtrlUpdate {
    /// Loop index, or -2 for a global property
    pub loop_index: i32,
    pub property: String,
    pub value: f32,
}

/// Where a one-shot reply should go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTarget {
    pub host: String,
    pub port: u16,
    pub addr: String,
}

/// Decoded inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    PingAck(EngineInfo),
    Heartbeat(EngineInfo),
    Ctrl(CtrlUpdate),
    /// Third-party discovery ping
    Discovery(ReplyTarget),
    /// One-shot dump of every LED
    LedDump(ReplyTarget),
    /// One-shot push of the selected loop
    DisplayRequest(ReplyTarget),
    MirrorRegister { host: String, port: u16 },
    MirrorUnregister { host: String, port: u16 },
}

impl Inbound {
    /// Decode a message, routing by address prefix
    pub fn decode(msg: &OscMessage) -> GatewayResult<Self> {
        let addr = msg.addr.as_str();
        let args = Args::new(addr, &msg.args);

        if addr.starts_with(PINGACK_PATH) {
            Ok(Inbound::PingAck(args.engine_info()?))
        } else if addr.starts_with(CTRL_PATH) {
            Ok(Inbound::Ctrl(args.ctrl()?))
        } else if addr.starts_with(HEARTBEAT_PATH) {
            Ok(Inbound::Heartbeat(args.engine_info()?))
        } else if addr.starts_with(DISCOVERY_PATH) {
            Ok(Inbound::Discovery(args.reply_target()?))
        } else if addr.starts_with(LED_DUMP_PATH) {
            Ok(Inbound::LedDump(args.reply_target()?))
        } else if addr.starts_with(DISPLAY_REQUEST_PATH) {
            Ok(Inbound::DisplayRequest(args.reply_target()?))
        } else if addr.starts_with(MIRROR_REGISTER_PATH) {
            let (host, port) = args.host_port()?;
            Ok(Inbound::MirrorRegister { host, port })
        } else if addr.starts_with(MIRROR_UNREGISTER_PATH) {
            let (host, port) = args.host_port()?;
            Ok(Inbound::MirrorUnregister { host, port })
        } else {
            Err(GatewayError::protocol(addr, "unexpected address"))
        }
    }

    /// Chatty traffic that is only logged at trace level
    pub fn is_chatty(addr: &str) -> bool {
        addr.starts_with(HEARTBEAT_PATH) || addr.starts_with(DISCOVERY_PATH)
    }
}

/// Positional argument reader that turns mismatches into protocol errors
struct Args<'a> {
    addr: &'a str,
    args: &'a [OscType],
}

impl<'a> Args<'a> {
    fn new(addr: &'a str, args: &'a [OscType]) -> Self {
        Self { addr, args }
    }

    fn arity(&self, expected: usize) -> GatewayResult<()> {
        if self.args.len() < expected {
            return Err(GatewayError::protocol(
                self.addr,
                format!("expected {} arguments, got {}", expected, self.args.len()),
            ));
        }
        Ok(())
    }

    fn exact_arity(&self, expected: usize) -> GatewayResult<()> {
        self.arity(expected)?;
        if self.args.len() > expected {
            return Err(GatewayError::protocol(
                self.addr,
                format!("expected {} arguments, got {}", expected, self.args.len()),
            ));
        }
        Ok(())
    }

    fn string(&self, i: usize) -> GatewayResult<String> {
        match self.args.get(i) {
            Some(OscType::String(s)) => Ok(s.clone()),
            other => Err(self.type_error(i, "string", other)),
        }
    }

    fn int(&self, i: usize) -> GatewayResult<i32> {
        match self.args.get(i) {
            Some(OscType::Int(v)) => Ok(*v),
            other => Err(self.type_error(i, "int32", other)),
        }
    }

    fn float(&self, i: usize) -> GatewayResult<f32> {
        match self.args.get(i) {
            Some(OscType::Float(v)) => Ok(*v),
            other => Err(self.type_error(i, "float32", other)),
        }
    }

    fn port(&self, i: usize) -> GatewayResult<u16> {
        let raw = self.int(i)?;
        u16::try_from(raw)
            .ok()
            .filter(|p| *p > 0)
            .ok_or_else(|| GatewayError::protocol(self.addr, format!("invalid port {}", raw)))
    }

    fn type_error(&self, i: usize, expected: &str, got: Option<&OscType>) -> GatewayError {
        GatewayError::protocol(
            self.addr,
            format!("argument {} should be {}, got {:?}", i, expected, got),
        )
    }

    fn engine_info(&self) -> GatewayResult<EngineInfo> {
        self.exact_arity(4)?;
        let loop_count = self.int(2)?;
        if !(0..=MAX_LOOP_COUNT).contains(&loop_count) {
            return Err(GatewayError::protocol(
                self.addr,
                format!("loop count {} outside 0..={}", loop_count, MAX_LOOP_COUNT),
            ));
        }
        Ok(EngineInfo {
            host_url: self.string(0)?,
            version: self.string(1)?,
            loop_count,
            engine_id: self.int(3)?,
        })
    }

    fn ctrl(&self) -> GatewayResult<CtrlUpdate> {
        self.exact_arity(3)?;
        Ok(CtrlUpdate {
            loop_index: self.int(0)?,
            property: self.string(1)?,
            value: self.float(2)?,
        })
    }

    fn reply_target(&self) -> GatewayResult<ReplyTarget> {
        self.exact_arity(3)?;
        Ok(ReplyTarget {
            host: self.string(0)?,
            port: self.port(1)?,
            addr: self.string(2)?,
        })
    }

    fn host_port(&self) -> GatewayResult<(String, u16)> {
        // Displays may append a reply path; only host and port matter here
        self.arity(2)?;
        Ok((self.string(0)?, self.port(1)?))
    }
}

/// Flatten a packet into its messages, bundles included
pub fn flatten(packet: OscPacket) -> Vec<OscMessage> {
    match packet {
        OscPacket::Message(msg) => vec![msg],
        OscPacket::Bundle(bundle) => bundle.content.into_iter().flat_map(flatten).collect(),
    }
}

/// One-line rendering of a message for debug logs
pub fn describe(msg: &OscMessage) -> String {
    let args = msg
        .args
        .iter()
        .map(|arg| match arg {
            OscType::Int(v) => format!("int32 {}", v),
            OscType::Float(v) => format!("float32 {}", v),
            OscType::String(s) => format!("string {:?}", s),
            OscType::Blob(b) => format!("blob {}", String::from_utf8_lossy(b)),
            other => format!("{:?}", other),
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("{} [{}]", msg.addr, args)
}

/// URL the engine should reply to
pub fn reply_url(receive_port: u16) -> String {
    format!("osc.udp://localhost:{}/", receive_port)
}

fn message(addr: impl Into<String>, args: Vec<OscType>) -> OscMessage {
    OscMessage {
        addr: addr.into(),
        args,
    }
}

/// `/ping` asking the engine to describe itself at `return_path`
pub fn ping(reply_url: &str, return_path: &str) -> OscMessage {
    message(
        "/ping",
        vec![
            OscType::String(reply_url.to_string()),
            OscType::String(return_path.to_string()),
        ],
    )
}

/// Subscribe to (or drop) automatic state updates of one loop
pub fn loop_auto_update(loop_index: usize, register: bool, poll_ms: i32, reply_url: &str) -> OscMessage {
    let verb = if register {
        "register_auto_update"
    } else {
        "unregister_auto_update"
    };
    message(
        format!("/sl/{}/{}", loop_index, verb),
        vec![
            OscType::String(STATE_PROPERTY.to_string()),
            OscType::Int(poll_ms),
            OscType::String(reply_url.to_string()),
            OscType::String(CTRL_PATH.to_string()),
        ],
    )
}

/// Ask for the current state of one loop
pub fn loop_get_state(loop_index: usize, reply_url: &str) -> OscMessage {
    message(
        format!("/sl/{}/get", loop_index),
        vec![
            OscType::String(STATE_PROPERTY.to_string()),
            OscType::String(reply_url.to_string()),
            OscType::String(CTRL_PATH.to_string()),
        ],
    )
}

/// Subscribe to (or drop) updates of the selected loop
pub fn global_update(register: bool, reply_url: &str) -> OscMessage {
    let addr = if register {
        "/register_update"
    } else {
        "/unregister_update"
    };
    message(
        addr,
        vec![
            OscType::String(SELECTED_LOOP_PROPERTY.to_string()),
            OscType::String(reply_url.to_string()),
            OscType::String(CTRL_PATH.to_string()),
        ],
    )
}

/// Answer to a discovery ping
pub fn discovery_reply(
    addr: &str,
    reply_url: &str,
    version: &str,
    led_count: usize,
    process_id: u32,
) -> OscMessage {
    message(
        addr,
        vec![
            OscType::String(reply_url.to_string()),
            OscType::String(version.to_string()),
            OscType::Int(led_count as i32),
            OscType::Int(process_id as i32),
        ],
    )
}

/// LED state push
pub fn led(addr: &str, led: &Led) -> OscMessage {
    message(
        addr,
        vec![
            OscType::Int(led.index as i32),
            OscType::Int(led.on as i32),
            OscType::Int(led.blink.timer_mode()),
            OscType::Int(led.blink.wire_state()),
        ],
    )
}

/// Selected loop push
pub fn display(selected_loop: i32) -> OscMessage {
    message("/display", vec![OscType::Int(selected_loop)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::BlinkMode;

    fn msg(addr: &str, args: Vec<OscType>) -> OscMessage {
        OscMessage {
            addr: addr.to_string(),
            args,
        }
    }

    #[test]
    fn test_decode_pingack() {
        let m = msg(
            "/pingack",
            vec![
                OscType::String("osc.udp://eng/".into()),
                OscType::String("1.0".into()),
                OscType::Int(4),
                OscType::Int(7),
            ],
        );
        assert_eq!(
            Inbound::decode(&m).unwrap(),
            Inbound::PingAck(EngineInfo {
                host_url: "osc.udp://eng/".into(),
                version: "1.0".into(),
                loop_count: 4,
                engine_id: 7,
            })
        );
    }

    #[test]
    fn test_decode_heartbeat_wrong_type() {
        let m = msg(
            "/heartbeat",
            vec![
                OscType::String("eng".into()),
                OscType::String("1.0".into()),
                OscType::Float(4.0),
                OscType::Int(7),
            ],
        );
        let err = Inbound::decode(&m).unwrap_err();
        assert!(matches!(err, GatewayError::Protocol { .. }));
    }

    #[test]
    fn test_decode_rejects_loop_count_out_of_range() {
        for count in [-1, MAX_LOOP_COUNT + 1, i32::MAX] {
            let m = msg(
                "/heartbeat",
                vec![
                    OscType::String("eng".into()),
                    OscType::String("1.0".into()),
                    OscType::Int(count),
                    OscType::Int(7),
                ],
            );
            let err = Inbound::decode(&m).unwrap_err();
            assert!(matches!(err, GatewayError::Protocol { .. }));
        }

        let m = msg(
            "/pingack",
            vec![
                OscType::String("eng".into()),
                OscType::String("1.0".into()),
                OscType::Int(MAX_LOOP_COUNT),
                OscType::Int(7),
            ],
        );
        assert!(Inbound::decode(&m).is_ok());
    }

    #[test]
    fn test_decode_heartbeat_wrong_arity() {
        let m = msg("/heartbeat", vec![OscType::String("eng".into())]);
        assert!(Inbound::decode(&m).is_err());
    }

    #[test]
    fn test_decode_ctrl() {
        let m = msg(
            "/ctrl",
            vec![
                OscType::Int(-2),
                OscType::String("selected_loop_num".into()),
                OscType::Float(3.0),
            ],
        );
        assert_eq!(
            Inbound::decode(&m).unwrap(),
            Inbound::Ctrl(CtrlUpdate {
                loop_index: -2,
                property: "selected_loop_num".into(),
                value: 3.0,
            })
        );
    }

    #[test]
    fn test_decode_mirror_register_ignores_trailing_path() {
        let m = msg(
            "/loop4r/register_auto_update",
            vec![
                OscType::String("10.0.0.2".into()),
                OscType::Int(9001),
                OscType::String("/led".into()),
            ],
        );
        assert_eq!(
            Inbound::decode(&m).unwrap(),
            Inbound::MirrorRegister {
                host: "10.0.0.2".into(),
                port: 9001,
            }
        );
    }

    #[test]
    fn test_decode_rejects_bad_port() {
        let m = msg(
            "/loop4r/ping",
            vec![
                OscType::String("h".into()),
                OscType::Int(70000),
                OscType::String("/pong".into()),
            ],
        );
        assert!(Inbound::decode(&m).is_err());
    }

    #[test]
    fn test_decode_unknown_address() {
        assert!(Inbound::decode(&msg("/sl/0/state", vec![])).is_err());
    }

    #[test]
    fn test_led_message_layout() {
        let led_state = Led {
            index: 2,
            on: true,
            blink: BlinkMode::FastBlink,
        };
        let m = led("/led", &led_state);
        assert_eq!(
            m.args,
            vec![
                OscType::Int(2),
                OscType::Int(1),
                OscType::Int(1),
                OscType::Int(3)
            ]
        );
    }

    #[test]
    fn test_subscription_messages() {
        let url = reply_url(9000);
        assert_eq!(url, "osc.udp://localhost:9000/");

        let m = loop_auto_update(2, true, 100, &url);
        assert_eq!(m.addr, "/sl/2/register_auto_update");
        assert_eq!(m.args[0], OscType::String("state".into()));
        assert_eq!(m.args[1], OscType::Int(100));
        assert_eq!(m.args[3], OscType::String("/ctrl".into()));

        assert_eq!(global_update(false, &url).addr, "/unregister_update");
        assert_eq!(loop_get_state(0, &url).addr, "/sl/0/get");
    }

    #[test]
    fn test_flatten_bundle() {
        let packet = OscPacket::Bundle(rosc::OscBundle {
            timetag: rosc::OscTime::from((0, 1)),
            content: vec![
                OscPacket::Message(msg("/a", vec![])),
                OscPacket::Message(msg("/b", vec![])),
            ],
        });
        let addrs: Vec<_> = flatten(packet).into_iter().map(|m| m.addr).collect();
        assert_eq!(addrs, vec!["/a", "/b"]);
    }
}
