//! Gateway error taxonomy
//!
//! None of these are fatal: the tick loop logs them and carries on.

use thiserror::Error;

/// Errors raised at the transport seam and while decoding engine traffic
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Socket bind/connect or send failure. Retried on the next tick.
    #[error("connection to {target} failed: {source}")]
    Connection {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// Malformed inbound message. Dropped without touching state.
    #[error("malformed {address} message: {reason}")]
    Protocol { address: String, reason: String },

    /// Expected MIDI device missing or gone.
    #[error("MIDI device error: {0}")]
    Device(String),

    /// OSC packet could not be encoded.
    #[error("OSC encode failed: {0}")]
    Encode(#[from] rosc::OscError),
}

impl GatewayError {
    pub fn connection(target: impl Into<String>, source: std::io::Error) -> Self {
        Self::Connection {
            target: target.into(),
            source,
        }
    }

    pub fn protocol(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Protocol {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// True for failures the next tick is expected to heal
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Device(_))
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_errors_are_not_retryable() {
        let err = GatewayError::protocol("/ctrl", "missing loop index");
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "malformed /ctrl message: missing loop index");
    }

    #[test]
    fn test_connection_errors_are_retryable() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "busy");
        let err = GatewayError::connection("udp 9000", io);
        assert!(err.is_retryable());
        assert!(err.to_string().starts_with("connection to udp 9000 failed"));
    }
}
