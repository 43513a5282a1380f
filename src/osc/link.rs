//! UDP sockets towards the engine and the remote LED display

use std::net::UdpSocket;

use rosc::{decoder, encoder, OscMessage, OscPacket};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::{describe, flatten};
use crate::error::{GatewayError, GatewayResult};
use crate::state::GatewayHandle;

/// OSC sockets owned by the live transport
///
/// Sending sockets are plain std sockets (sends never block on UDP).
/// The receive socket is handed to a tokio task that decodes packets
/// and forwards every message to the gateway actor.
pub struct OscLink {
    handle: GatewayHandle,
    engine: Option<UdpSocket>,
    receiver: Option<JoinHandle<()>>,
    mirror: Option<UdpSocket>,
}

impl OscLink {
    pub fn new(handle: GatewayHandle) -> Self {
        Self {
            handle,
            engine: None,
            receiver: None,
            mirror: None,
        }
    }

    /// Bind the receive port and start forwarding inbound messages
    pub fn bind_receiver(&mut self, port: u16) -> GatewayResult<()> {
        let target = format!("udp receive port {}", port);
        let std_socket = UdpSocket::bind(("0.0.0.0", port))
            .map_err(|e| GatewayError::connection(&target, e))?;
        std_socket
            .set_nonblocking(true)
            .map_err(|e| GatewayError::connection(&target, e))?;
        let socket = tokio::net::UdpSocket::from_std(std_socket)
            .map_err(|e| GatewayError::connection(&target, e))?;

        if let Some(old) = self.receiver.take() {
            old.abort();
        }
        self.receiver = Some(tokio::spawn(receive_loop(socket, self.handle.clone())));
        debug!("OSC receiver listening on port {}", port);
        Ok(())
    }

    pub fn connect_engine(&mut self, host: &str, port: u16) -> GatewayResult<()> {
        self.engine = Some(connect(host, port)?);
        Ok(())
    }

    pub fn release_engine(&mut self) {
        self.engine = None;
        if let Some(receiver) = self.receiver.take() {
            receiver.abort();
        }
    }

    pub fn send_engine(&mut self, msg: OscMessage) -> GatewayResult<()> {
        send(self.engine.as_ref(), "engine", msg)
    }

    pub fn connect_mirror(&mut self, host: &str, port: u16) -> GatewayResult<()> {
        self.mirror = Some(connect(host, port)?);
        Ok(())
    }

    pub fn disconnect_mirror(&mut self) {
        self.mirror = None;
    }

    pub fn send_mirror(&mut self, msg: OscMessage) -> GatewayResult<()> {
        send(self.mirror.as_ref(), "LED display", msg)
    }

    /// Send one message from an ephemeral socket
    pub fn send_once(&mut self, host: &str, port: u16, msg: OscMessage) -> GatewayResult<()> {
        let target = format!("{}:{}", host, port);
        let socket = UdpSocket::bind("0.0.0.0:0").map_err(|e| GatewayError::connection(&target, e))?;
        let buf = encoder::encode(&OscPacket::Message(msg))?;
        socket
            .send_to(&buf, (host, port))
            .map_err(|e| GatewayError::connection(&target, e))?;
        Ok(())
    }
}

impl Drop for OscLink {
    fn drop(&mut self) {
        self.release_engine();
    }
}

fn connect(host: &str, port: u16) -> GatewayResult<UdpSocket> {
    let target = format!("{}:{}", host, port);
    let socket = UdpSocket::bind("0.0.0.0:0").map_err(|e| GatewayError::connection(&target, e))?;
    socket
        .connect((host, port))
        .map_err(|e| GatewayError::connection(&target, e))?;
    Ok(socket)
}

fn send(socket: Option<&UdpSocket>, name: &str, msg: OscMessage) -> GatewayResult<()> {
    let Some(socket) = socket else {
        return Err(GatewayError::connection(
            name,
            std::io::Error::new(std::io::ErrorKind::NotConnected, "socket not connected"),
        ));
    };
    trace!("OSC -> {}: {}", name, describe(&msg));
    let buf = encoder::encode(&OscPacket::Message(msg))?;
    socket
        .send(&buf)
        .map_err(|e| GatewayError::connection(name, e))?;
    Ok(())
}

async fn receive_loop(socket: tokio::net::UdpSocket, handle: GatewayHandle) {
    let mut buf = vec![0u8; decoder::MTU];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((size, from)) => match decoder::decode_udp(&buf[..size]) {
                Ok((_, packet)) => {
                    for msg in flatten(packet) {
                        if !handle.osc(msg) {
                            return;
                        }
                    }
                }
                Err(e) => warn!("Dropped {} byte OSC packet from {}: {}", size, from, e),
            },
            Err(e) => {
                // ICMP errors from earlier sends surface here on some platforms
                debug!("OSC receive error: {}", e);
                if handle.is_closed() {
                    return;
                }
            }
        }
    }
}
