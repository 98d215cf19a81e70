//! RPC request/response correlation.
//!
//! One [`RpcCorrelator`] per channel tracks every outstanding call. A call
//! registers a pending entry and hands out a [`ResponseFuture`]; the entry
//! terminates by exactly one of three paths:
//!
//! 1. A matching reply arrives ([`RpcCorrelator::try_reply`])
//! 2. The timeout sweep evicts it ([`RpcCorrelator::update`])
//! 3. The correlator is disposed ([`RpcCorrelator::dispose`])
//!
//! Lifecycle notifications hang off [`RpcEvents`]; they follow the guarded
//! callback-list rules in [`crate::event`].

/// Pending-call table and timeout sweep
pub mod correlator;

/// Failure values delivered through futures
pub mod error;

/// Call lifecycle notifications
pub mod events;

/// Awaitable result handle
pub mod future;

// Re-export main types
pub use correlator::{MIN_RPC_TIMEOUT, RpcCorrelator};
pub use error::RpcError;
pub use events::{
    CallCompletedEvent, CallFailedEvent, CallStartedEvent, ResponseErrorCodeEvent, RpcEvents,
};
pub use future::{ResponseFuture, RpcResult};
