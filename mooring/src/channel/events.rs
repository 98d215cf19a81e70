//! Channel lifecycle notifications.

use std::any::Any;
use std::sync::Arc;

use crate::error::ChannelErrorKind;
use crate::event::EventSlot;

/// Opaque application data attached to a connection attempt and carried by
/// the `connected` notification.
pub type UserData = Arc<dyn Any + Send + Sync>;

/// A connection was established.
#[derive(Clone)]
pub struct ConnectedEvent {
    /// Data passed to `connect`, if any.
    pub user_data: Option<UserData>,
}

/// An established connection ended.
#[derive(Debug, Clone, Copy)]
pub struct ClosedEvent;

/// A heartbeat interval passed without any inbound traffic.
#[derive(Debug, Clone, Copy)]
pub struct MissHeartbeatEvent {
    /// Consecutive intervals already missed when this one fired.
    pub missed: u32,
}

/// A transport or protocol failure was observed.
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    /// Channel-agnostic classification.
    pub kind: ChannelErrorKind,
    /// Raw transport code when one exists, such as an OS errno.
    pub transport_code: Option<i32>,
    /// Human-readable detail.
    pub detail: String,
}

/// A non-response message arrived (server push or unsolicited request),
/// delivered from the update pump.
#[derive(Debug, Clone)]
pub struct MessageEvent<M> {
    /// The decoded message.
    pub message: M,
}

/// Subscription surface for one channel's notifications.
pub struct ChannelEvents<M> {
    /// The transport reported an established connection.
    pub connected: EventSlot<ConnectedEvent>,
    /// The connection ended, for any reason.
    pub closed: EventSlot<ClosedEvent>,
    /// A heartbeat interval passed silent after at least one earlier miss.
    pub miss_heartbeat: EventSlot<MissHeartbeatEvent>,
    /// A classified transport or protocol failure.
    pub error: EventSlot<ErrorEvent>,
    /// Inbound non-response traffic.
    pub message: EventSlot<MessageEvent<M>>,
}

impl<M> ChannelEvents<M> {
    pub(crate) fn new() -> Self {
        Self {
            connected: EventSlot::new("connected"),
            closed: EventSlot::new("closed"),
            miss_heartbeat: EventSlot::new("miss-heartbeat"),
            error: EventSlot::new("error"),
            message: EventSlot::new("message"),
        }
    }

    pub(crate) fn clear(&self) {
        self.connected.clear();
        self.closed.clear();
        self.miss_heartbeat.clear();
        self.error.clear();
        self.message.clear();
    }
}
