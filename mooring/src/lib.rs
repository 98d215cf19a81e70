//! # Mooring
//!
//! Tick-driven network session layer: channel lifecycle, heartbeat-based
//! liveness detection, and RPC request/response correlation with timeout
//! eviction.
//!
//! This crate provides:
//! - **NetworkChannel**: One persistent connection as a reusable state
//!   machine, driven by a host update loop
//! - **RpcCorrelator**: Pending-call table matching replies to requests by
//!   correlation id, with a timeout sweep
//! - **HeartbeatTracker**: Pure keep-alive counters, testable without a
//!   connection
//! - **NetworkManager**: Name-keyed channel registry relaying per-channel
//!   notifications to one observer surface
//!
//! Transport and wire format stay outside: a [`ChannelHelper`] supplies
//! connect/send/close over whatever medium the host uses, and a
//! [`MessageCodec`] turns messages into bytes and back. The core only
//! requires that decoded messages expose a correlation id and a
//! request/response/push tag through [`Envelope`].
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use mooring::NetworkManager;
//!
//! let manager = NetworkManager::new();
//! let channel = manager.create_network_channel("login", helper, Duration::from_secs(5))?;
//! channel.connect("127.0.0.1:7777", None)?;
//!
//! // Host tick loop.
//! loop {
//!     manager.update(frame_elapsed, frame_real_elapsed);
//! }
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

// =============================================================================
// Modules
// =============================================================================

/// Persistent connection with liveness probing and correlated calls.
pub mod channel;

/// Message encoding and decoding.
pub mod codec;

/// Transport-facing error types.
pub mod error;

/// Guarded subscriber lists.
pub mod event;

/// Keep-alive counters.
pub mod heartbeat;

/// Name-keyed channel registry.
pub mod manager;

/// Message envelope contract.
pub mod message;

/// RPC request/response correlation.
pub mod rpc;

// =============================================================================
// Public API Re-exports
// =============================================================================

// Message and codec exports
pub use codec::{CodecError, CodecResult, JsonCodec, MessageCodec};
pub use message::{Envelope, MessageKind};

// Error exports
pub use error::{ChannelErrorKind, TransportError, TransportResult};

// Event exports
pub use event::{CallbackId, EventSlot};

// Heartbeat exports
pub use heartbeat::HeartbeatTracker;

// RPC exports
pub use rpc::{
    CallCompletedEvent, CallFailedEvent, CallStartedEvent, MIN_RPC_TIMEOUT, ResponseErrorCodeEvent,
    ResponseFuture, RpcCorrelator, RpcError, RpcEvents, RpcResult,
};

// Channel exports
pub use channel::{
    ChannelConfig, ChannelError, ChannelEvents, ChannelHelper, ChannelResult, ChannelSink,
    ChannelState, ClosedEvent, ConnectedEvent, ErrorEvent, MessageEvent, MissHeartbeatEvent,
    NetworkChannel, UserData,
};

// Manager exports
pub use manager::{
    ManagerError, ManagerResult, NetworkClosedEvent, NetworkConnectedEvent, NetworkErrorEvent,
    NetworkEvents, NetworkManager, NetworkMissHeartbeatEvent,
};
