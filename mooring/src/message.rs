//! Message classification for correlation.
//!
//! The session layer never inspects payload bytes. Everything it needs from a
//! decoded message is a correlation id, a kind tag, and (on responses) an
//! application error code. The [`Envelope`] trait is that surface; concrete
//! message types live with the host application and its codec.

use serde::{Deserialize, Serialize};

/// Role a message plays on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// Outbound call expecting a correlated [`MessageKind::Response`].
    Request,
    /// Reply to an earlier request, matched by unique id.
    Response,
    /// Server-initiated message with no pending entry to match.
    Push,
}

/// Minimal surface a decoded message must expose to the session layer.
///
/// The unique id is chosen by the sender and echoed by the responder; it must
/// be unique among concurrently outstanding requests on one channel. Messages
/// are cloned into futures and notifications, so implementors should be cheap
/// to clone (or wrap large payloads in `Arc`).
pub trait Envelope: Clone + Send + Sync + 'static {
    /// Correlation id matching replies to outstanding requests.
    fn unique_id(&self) -> u64;

    /// Which role this message plays.
    fn kind(&self) -> MessageKind;

    /// Application-level error code carried by responses. Zero means
    /// success; any other value triggers the error-code notification after
    /// the reply has been delivered.
    fn error_code(&self) -> i32 {
        0
    }
}
