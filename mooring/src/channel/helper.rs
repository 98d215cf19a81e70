//! Transport seam.

use crate::error::TransportResult;
use crate::message::Envelope;

use super::sink::ChannelSink;

/// Connection and wire implementation behind one channel.
///
/// The session layer is transport-agnostic: any transport that can carry
/// whole decoded messages works, from TCP to an in-process loopback.
/// Helpers own encoding and decoding (commonly via
/// [`crate::codec::MessageCodec`]) and report inbound traffic and
/// connection events through the [`ChannelSink`] handed to
/// [`ChannelHelper::connect`].
///
/// # Contract
///
/// All four methods are invoked from the channel under its helper lock and
/// must not block; long I/O belongs on the helper's own threads or tasks.
/// Reporting through the [`ChannelSink`] from inside any of them is safe;
/// the sink never reenters the helper or runs subscriber code.
/// An `Err` return is treated as fatal to the connection; recoverable
/// hiccups are the helper's own business and should not surface here. A
/// helper that reports `closed` or `error` through the sink has already
/// released its connection; the channel will not call [`ChannelHelper::close`]
/// back for those.
pub trait ChannelHelper: Send + 'static {
    /// Decoded message type this transport carries.
    type Message: Envelope;

    /// Establishes (or begins establishing) a connection to `address`,
    /// keeping `sink` for inbound delivery and connection events. Confirm
    /// success through [`ChannelSink::connected`], synchronously or from an
    /// I/O thread.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the attempt cannot even begin; the
    /// channel reverts to disconnected.
    fn connect(&mut self, address: &str, sink: ChannelSink<Self::Message>) -> TransportResult<()>;

    /// Encodes and transmits one message.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the connection is beyond recovery.
    fn send(&mut self, message: &Self::Message) -> TransportResult<()>;

    /// Transmits a keep-alive probe. Invoked on heartbeat interval
    /// crossings.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the connection is beyond recovery.
    fn send_keep_alive(&mut self) -> TransportResult<()>;

    /// Releases the connection. Must be idempotent. Sink callbacks issued
    /// after this point belong to a dead generation and are dropped.
    fn close(&mut self);
}
