//! Persistent connection with liveness probing and correlated calls.
//!
//! # Overview
//!
//! A [`NetworkChannel`] wraps one transport connection supplied by a
//! [`ChannelHelper`] and layers three concerns on top of it:
//!
//! - lifecycle notifications (`connected`, `closed`, `error`) through
//!   [`ChannelEvents`]
//! - heartbeat probing and miss accounting driven by the host tick
//! - request/response correlation through an embedded
//!   [`RpcCorrelator`](crate::rpc::RpcCorrelator)
//!
//! # Architecture
//!
//! ```text
//!  host tick ──► NetworkChannel::update ──┬─► heartbeat aging / probes
//!                                         ├─► RPC timeout sweep
//!                                         └─► inbound message pump
//!
//!  I/O thread ──► ChannelSink ──► state transitions, reply resolution
//! ```
//!
//! The helper owns the socket; the channel owns everything above it. The
//! two meet at [`ChannelSink`], a generation-stamped handle that keeps
//! callbacks from a torn-down connection out of the current one.

/// Core channel implementation and connection state machine
pub mod core;

/// Configuration for heartbeat cadence and RPC timeouts
pub mod config;

/// Error types specific to channel operations
pub mod error;

/// Notification payloads and the per-channel event hub
pub mod events;

/// Transport adapter trait implemented by hosts
pub mod helper;

/// Generation-stamped handle helpers report through
pub mod sink;

// Re-export main types
pub use config::ChannelConfig;
pub use core::{ChannelState, NetworkChannel};
pub use error::{ChannelError, ChannelResult};
pub use events::{
    ChannelEvents, ClosedEvent, ConnectedEvent, ErrorEvent, MessageEvent, MissHeartbeatEvent,
    UserData,
};
pub use helper::ChannelHelper;
pub use sink::ChannelSink;
