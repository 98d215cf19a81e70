//! Call lifecycle notifications.
//!
//! Four slots cover the life of a pending entry: `started` when it is
//! registered, `completed` when a reply lands, `failed` when the timeout
//! sweep or a send failure evicts it, and `error_code` after a completed
//! reply that carries a non-zero application code. Slots follow the
//! [`EventSlot`] rules: registration order, removal by id, panic-guarded.

use crate::event::EventSlot;

use super::error::RpcError;

/// A new pending entry was registered for an outbound request.
#[derive(Debug, Clone)]
pub struct CallStartedEvent<M> {
    /// The outbound request.
    pub request: M,
}

/// A reply was matched and delivered to its future.
#[derive(Debug, Clone)]
pub struct CallCompletedEvent<M> {
    /// The delivered response.
    pub response: M,
}

/// A pending call failed without a reply.
#[derive(Debug, Clone)]
pub struct CallFailedEvent<M> {
    /// The request the entry was created for.
    pub request: M,
    /// Why the call failed.
    pub error: RpcError,
}

/// A delivered response carried a non-zero application error code.
#[derive(Debug, Clone)]
pub struct ResponseErrorCodeEvent<M> {
    /// The delivered response.
    pub response: M,
    /// The non-zero code it carried.
    pub code: i32,
}

/// Subscription surface for the call lifecycle notifications.
pub struct RpcEvents<M> {
    /// A pending entry was registered.
    pub started: EventSlot<CallStartedEvent<M>>,
    /// A reply was delivered to its future.
    pub completed: EventSlot<CallCompletedEvent<M>>,
    /// A pending call failed by timeout or send error.
    pub failed: EventSlot<CallFailedEvent<M>>,
    /// A delivered response carried a non-zero error code.
    pub error_code: EventSlot<ResponseErrorCodeEvent<M>>,
}

impl<M> RpcEvents<M> {
    pub(crate) fn new() -> Self {
        Self {
            started: EventSlot::new("rpc-start"),
            completed: EventSlot::new("rpc-end"),
            failed: EventSlot::new("rpc-error"),
            error_code: EventSlot::new("rpc-error-code"),
        }
    }

    pub(crate) fn clear(&self) {
        self.started.clear();
        self.completed.clear();
        self.failed.clear();
        self.error_code.clear();
    }
}
