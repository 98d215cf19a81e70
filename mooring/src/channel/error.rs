//! Channel operation errors.

use thiserror::Error;

use crate::error::TransportError;
use crate::rpc::RpcError;

use super::core::ChannelState;

/// Result alias for channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Errors returned by channel operations.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The operation requires an established connection.
    #[error("channel '{name}' is not connected")]
    NotConnected {
        /// Channel name.
        name: String,
    },

    /// Connect was issued while a connection is already up or in progress.
    #[error("channel '{name}' is already {state}")]
    AlreadyActive {
        /// Channel name.
        name: String,
        /// State the channel was in.
        state: ChannelState,
    },

    /// The transport helper rejected the operation.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The RPC layer rejected the configuration.
    #[error(transparent)]
    Rpc(#[from] RpcError),
}
