//! Transport-to-channel ingress.

use std::sync::Arc;

use crate::error::ChannelErrorKind;
use crate::message::Envelope;

use super::core::ChannelShared;

/// Handle a helper uses to report connection events and deliver decoded
/// messages back into its channel.
///
/// The helper's I/O side may live on any thread. A delivered response
/// resolves its pending call directly on the calling thread; every
/// subscriber notification, like requests and pushes, is queued and
/// surfaced by the channel's next update. No sink method calls back into
/// the helper or runs subscriber code, so a helper may report through the
/// sink from inside its own [`ChannelHelper`](super::helper::ChannelHelper)
/// methods. Each sink is stamped with the generation of the connection
/// attempt that created it; calls from a superseded connection are
/// dropped, so a lingering I/O thread cannot disturb a newer connection.
pub struct ChannelSink<M> {
    shared: Arc<ChannelShared<M>>,
    generation: u64,
}

impl<M> Clone for ChannelSink<M> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            generation: self.generation,
        }
    }
}

impl<M: Envelope> ChannelSink<M> {
    pub(crate) fn new(shared: Arc<ChannelShared<M>>, generation: u64) -> Self {
        Self { shared, generation }
    }

    /// Reports that the connection attempt succeeded. The channel moves to
    /// connected and fires the `connected` notification.
    pub fn connected(&self) {
        self.shared.sink_connected(self.generation);
    }

    /// Delivers one decoded inbound message. Any delivery counts as a beat
    /// for heartbeat purposes. A response resolves its pending call before
    /// this returns; its `completed` notification waits for the next
    /// update.
    pub fn deliver(&self, message: M) {
        self.shared.sink_deliver(self.generation, message);
    }

    /// Reports a fatal transport failure. The channel fires `error` and
    /// transitions to disconnected.
    pub fn error(
        &self,
        kind: ChannelErrorKind,
        transport_code: Option<i32>,
        detail: impl Into<String>,
    ) {
        self.shared
            .sink_error(self.generation, kind, transport_code, detail.into());
    }

    /// Reports that the transport closed the connection.
    pub fn closed(&self) {
        self.shared.sink_closed(self.generation);
    }

    /// Generation stamp of the connection attempt that created this sink.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
