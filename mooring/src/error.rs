//! Transport-facing error types.
//!
//! [`TransportError`] is what a channel helper returns when an operation
//! fails; [`ChannelErrorKind`] is the channel-agnostic classification carried
//! by `error` notifications so observers can react without knowing the
//! transport.

use thiserror::Error;

use crate::codec::CodecError;

/// Result alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors reported by channel helper operations.
///
/// The channel treats any of these as fatal to the connection; a helper that
/// can recover internally should do so without surfacing an error.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Establishing the connection failed.
    #[error("connect failed: {reason}")]
    Connect {
        /// Transport-specific description.
        reason: String,
    },

    /// Transmitting a message failed.
    #[error("send failed: {reason}")]
    Send {
        /// Transport-specific description.
        reason: String,
    },

    /// An underlying I/O operation failed.
    #[error("transport i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding or decoding a message failed.
    #[error("transport codec error: {0}")]
    Codec(#[from] CodecError),
}

impl TransportError {
    /// Raw OS error code when one is available, for `error` notifications.
    pub fn os_code(&self) -> Option<i32> {
        match self {
            TransportError::Io(err) => err.raw_os_error(),
            _ => None,
        }
    }
}

/// Channel-agnostic classification of a surfaced failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelErrorKind {
    /// Unclassified failure.
    Unknown,
    /// Connection establishment failed.
    Connect,
    /// Outbound transmission failed.
    Send,
    /// Inbound reception failed.
    Receive,
    /// Outbound serialization failed.
    Encode,
    /// Inbound deserialization failed.
    Decode,
    /// Keep-alive exchange failed or went unanswered too long.
    Heartbeat,
}

impl std::fmt::Display for ChannelErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ChannelErrorKind::Unknown => "unknown",
            ChannelErrorKind::Connect => "connect",
            ChannelErrorKind::Send => "send",
            ChannelErrorKind::Receive => "receive",
            ChannelErrorKind::Encode => "encode",
            ChannelErrorKind::Decode => "decode",
            ChannelErrorKind::Heartbeat => "heartbeat",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::Connect {
            reason: "refused".to_string(),
        };
        assert_eq!(err.to_string(), "connect failed: refused");

        let err = TransportError::Send {
            reason: "broken pipe".to_string(),
        };
        assert_eq!(err.to_string(), "send failed: broken pipe");
    }

    #[test]
    fn test_os_code_from_io_error() {
        let io = std::io::Error::from_raw_os_error(104);
        let err = TransportError::from(io);
        assert_eq!(err.os_code(), Some(104));

        let err = TransportError::Send {
            reason: "x".to_string(),
        };
        assert_eq!(err.os_code(), None);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ChannelErrorKind::Heartbeat.to_string(), "heartbeat");
        assert_eq!(ChannelErrorKind::Connect.to_string(), "connect");
    }
}
