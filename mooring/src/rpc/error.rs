//! Failure values delivered through call futures.

use std::time::Duration;

use thiserror::Error;

/// Errors a call can fail with.
///
/// Cloneable because one logical call may hand its future to several
/// awaiters; every clone observes the same terminal value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// The requested correlator timeout was below the floor.
    #[error("rpc timeout {requested:?} is below the {minimum:?} minimum")]
    TimeoutTooShort {
        /// Timeout the caller asked for.
        requested: Duration,
        /// Smallest accepted timeout.
        minimum: Duration,
    },

    /// No reply arrived within the configured timeout.
    #[error("call timed out after {timeout:?}")]
    TimedOut {
        /// Timeout the pending entry was created with.
        timeout: Duration,
    },

    /// The correlator was disposed while the call was pending.
    #[error("correlator disposed while call was pending")]
    Disposed,

    /// The transport rejected the outbound request.
    #[error("request could not be sent: {reason}")]
    SendFailed {
        /// Transport-specific description.
        reason: String,
    },
}
