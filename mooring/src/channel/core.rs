//! Connection state machine.
//!
//! # Connection Lifecycle
//!
//! ```text
//! ┌────────────┐  connect   ┌────────────┐  sink confirm   ┌───────────┐
//! │Disconnected├───────────►│ Connecting ├────────────────►│ Connected │
//! └────────────┘            └────────────┘                 └─────┬─────┘
//!       ▲                                                        │
//!       │        close / transport error / heartbeat loss        │
//!       └────────────────────────────────────────────────────────┘
//! ```
//!
//! The instance is reusable: after a close it can connect again. Every
//! attempt bumps a generation counter and hands the helper a freshly stamped
//! [`ChannelSink`]; sink calls stamped with an older generation are dropped.
//!
//! # Update cycle
//!
//! Each tick, [`NetworkChannel::update`] (a) ages the heartbeat on real
//! elapsed time, probing on interval crossings and closing past the miss
//! limit, (b) drives the RPC timeout sweep on logical elapsed time, and (c)
//! drains the inbound queue, delivering messages and lifecycle notifications
//! to subscribers.
//!
//! # Threading
//!
//! Sink calls from I/O threads mutate connection state immediately (so
//! `state` and `send` observe the truth without waiting for a tick) and
//! resolve response futures in place, but everything a subscriber hears
//! arrives through the queue, on the thread driving `update` and under no
//! channel lock. A helper may therefore deliver a reply from inside its
//! own `send`, and a subscriber may reenter the channel from any
//! notification. Failures inside update surface as `error` notifications,
//! never panics, so one channel cannot unwind a loop driving many.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::ChannelErrorKind;
use crate::heartbeat::HeartbeatTracker;
use crate::message::{Envelope, MessageKind};
use crate::rpc::{ResponseFuture, RpcCorrelator, RpcError, RpcEvents};

use super::config::ChannelConfig;
use super::error::{ChannelError, ChannelResult};
use super::events::{
    ChannelEvents, ClosedEvent, ConnectedEvent, ErrorEvent, MessageEvent, MissHeartbeatEvent,
    UserData,
};
use super::helper::ChannelHelper;
use super::sink::ChannelSink;

/// Connection state of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// No connection and none in progress.
    Disconnected,
    /// Connect was issued; waiting for the transport to confirm.
    Connecting,
    /// Transport is up; traffic and heartbeats flow.
    Connected,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelState::Disconnected => "disconnected",
            ChannelState::Connecting => "connecting",
            ChannelState::Connected => "connected",
        };
        write!(f, "{}", name)
    }
}

struct StatusInner {
    state: ChannelState,
    heartbeat: HeartbeatTracker,
    user_data: Option<UserData>,
}

/// Queued work for the update pump. State already changed when one of
/// these is enqueued; the pump only tells subscribers about it.
enum Inbound<M> {
    Connected {
        user_data: Option<UserData>,
    },
    Message(M),
    CallCompleted(M),
    MissHeartbeat {
        missed: u32,
    },
    Error {
        kind: ChannelErrorKind,
        transport_code: Option<i32>,
        detail: String,
    },
    Closed,
}

/// State shared between the channel and the sinks it hands to helpers.
pub(crate) struct ChannelShared<M> {
    name: String,
    config: ChannelConfig,
    status: Mutex<StatusInner>,
    generation: AtomicU64,
    rpc: RpcCorrelator<M>,
    events: ChannelEvents<M>,
    inbound_tx: mpsc::UnboundedSender<Inbound<M>>,
    inbound_rx: Mutex<mpsc::UnboundedReceiver<Inbound<M>>>,
}

impl<M: Envelope> ChannelShared<M> {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) == generation
    }

    /// State part of a close. Returns `Some(was_connected)` when a
    /// transition happened, `None` when already disconnected. Caller holds
    /// the status lock.
    fn close_locked(&self, status: &mut StatusInner) -> Option<bool> {
        if status.state == ChannelState::Disconnected {
            return None;
        }
        let was_connected = status.state == ChannelState::Connected;
        status.state = ChannelState::Disconnected;
        status.user_data = None;
        self.generation.fetch_add(1, Ordering::AcqRel);
        Some(was_connected)
    }

    fn transition_disconnected(&self) -> Option<bool> {
        let mut status = self.status.lock();
        self.close_locked(&mut status)
    }

    fn enqueue(&self, item: Inbound<M>) {
        if self.inbound_tx.send(item).is_err() {
            tracing::debug!(channel = %self.name, "inbound queue closed; dropping event");
        }
    }

    fn enqueue_error(
        &self,
        kind: ChannelErrorKind,
        transport_code: Option<i32>,
        detail: String,
    ) {
        tracing::warn!(channel = %self.name, kind = %kind, detail = %detail, "channel error");
        self.enqueue(Inbound::Error {
            kind,
            transport_code,
            detail,
        });
    }

    pub(crate) fn sink_connected(&self, generation: u64) {
        let user_data = {
            let mut status = self.status.lock();
            if !self.is_current(generation) {
                tracing::debug!(
                    channel = %self.name,
                    generation,
                    "ignoring connect confirmation from stale connection"
                );
                return;
            }
            if status.state != ChannelState::Connecting {
                tracing::debug!(
                    channel = %self.name,
                    state = %status.state,
                    "ignoring connect confirmation"
                );
                return;
            }
            status.state = ChannelState::Connected;
            status.heartbeat.reset(true);
            status.user_data.clone()
        };
        tracing::info!(channel = %self.name, "connected");
        self.enqueue(Inbound::Connected { user_data });
    }

    pub(crate) fn sink_deliver(&self, generation: u64, message: M) {
        {
            let mut status = self.status.lock();
            if !self.is_current(generation) {
                tracing::debug!(
                    channel = %self.name,
                    generation,
                    "dropping message from stale connection"
                );
                return;
            }
            status
                .heartbeat
                .reset(self.config.reset_heartbeat_elapsed_on_beat);
        }

        if message.kind() == MessageKind::Response {
            // Replies resolve on the delivering thread. Their notifications
            // ride the queue: this thread may sit inside the helper's own
            // `send`, under the helper lock.
            let unique_id = message.unique_id();
            match self.rpc.settle_reply(message) {
                Some(response) => self.enqueue(Inbound::CallCompleted(response)),
                None => {
                    tracing::debug!(
                        channel = %self.name,
                        unique_id,
                        "response matched no pending call"
                    );
                }
            }
        } else {
            self.enqueue(Inbound::Message(message));
        }
    }

    pub(crate) fn sink_error(
        &self,
        generation: u64,
        kind: ChannelErrorKind,
        transport_code: Option<i32>,
        detail: String,
    ) {
        let was_connected = {
            let mut status = self.status.lock();
            if !self.is_current(generation) {
                tracing::debug!(
                    channel = %self.name,
                    generation,
                    "ignoring error from stale connection"
                );
                return;
            }
            self.close_locked(&mut status)
        };
        self.enqueue_error(kind, transport_code, detail);
        if was_connected == Some(true) {
            tracing::info!(channel = %self.name, "closed by transport error");
            self.enqueue(Inbound::Closed);
        }
    }

    pub(crate) fn sink_closed(&self, generation: u64) {
        let was_connected = {
            let mut status = self.status.lock();
            if !self.is_current(generation) {
                tracing::debug!(
                    channel = %self.name,
                    generation,
                    "ignoring close from stale connection"
                );
                return;
            }
            self.close_locked(&mut status)
        };
        if was_connected == Some(true) {
            tracing::info!(channel = %self.name, "closed by transport");
            self.enqueue(Inbound::Closed);
        }
    }
}

/// One logical persistent connection, driven by a host tick loop.
///
/// The channel owns the transport helper, the heartbeat counters, and the
/// RPC correlator for its connection. All methods take `&self`; the channel
/// is freely shared behind `Arc`.
pub struct NetworkChannel<H: ChannelHelper> {
    shared: Arc<ChannelShared<H::Message>>,
    helper: Mutex<H>,
}

impl<H: ChannelHelper> NetworkChannel<H> {
    /// Creates a channel in the disconnected state.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::TimeoutTooShort`] (wrapped) when the configured
    /// RPC timeout is below the floor.
    pub fn new(name: impl Into<String>, helper: H, config: ChannelConfig) -> ChannelResult<Self> {
        let name = name.into();
        let rpc = RpcCorrelator::new(config.rpc_timeout)?;
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Ok(Self {
            shared: Arc::new(ChannelShared {
                name,
                config,
                status: Mutex::new(StatusInner {
                    state: ChannelState::Disconnected,
                    heartbeat: HeartbeatTracker::new(),
                    user_data: None,
                }),
                generation: AtomicU64::new(0),
                rpc,
                events: ChannelEvents::new(),
                inbound_tx,
                inbound_rx: Mutex::new(inbound_rx),
            }),
            helper: Mutex::new(helper),
        })
    }

    /// Channel name, unique within its manager.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Current connection state.
    pub fn state(&self) -> ChannelState {
        self.shared.status.lock().state
    }

    /// Whether the connection is established.
    pub fn is_connected(&self) -> bool {
        self.state() == ChannelState::Connected
    }

    /// Configuration the channel was built with.
    pub fn config(&self) -> &ChannelConfig {
        &self.shared.config
    }

    /// Application data attached to the live connection attempt, if any.
    pub fn user_data(&self) -> Option<UserData> {
        self.shared.status.lock().user_data.clone()
    }

    /// Channel lifecycle notification slots.
    pub fn events(&self) -> &ChannelEvents<H::Message> {
        &self.shared.events
    }

    /// Call lifecycle notification slots of the channel's correlator.
    ///
    /// `started` and `failed` fire on whichever thread registers or evicts
    /// the call, outside every channel lock. `completed` and `error_code`
    /// fire from [`Self::update`], after the reply has already resolved its
    /// future, so handlers may reenter the channel even when the helper
    /// delivered the reply from inside `send`.
    pub fn rpc_events(&self) -> &RpcEvents<H::Message> {
        self.shared.rpc.events()
    }

    /// Number of calls currently awaiting a reply.
    pub fn pending_rpc_count(&self) -> usize {
        self.shared.rpc.pending_count()
    }

    /// Begins connecting to `address`, attaching optional application data
    /// that the `connected` notification will carry.
    ///
    /// The helper may confirm synchronously (the channel is connected when
    /// this returns) or later from an I/O thread; either way the
    /// `connected` notification is delivered by the next [`Self::update`].
    ///
    /// # Errors
    ///
    /// [`ChannelError::AlreadyActive`] when a connection is up or in
    /// progress; [`ChannelError::Transport`] when the helper rejects the
    /// attempt, in which case an `error` notification is queued and the
    /// channel is disconnected again.
    pub fn connect(&self, address: &str, user_data: Option<UserData>) -> ChannelResult<()> {
        let generation = {
            let mut status = self.shared.status.lock();
            match status.state {
                ChannelState::Disconnected => {}
                state => {
                    return Err(ChannelError::AlreadyActive {
                        name: self.shared.name.clone(),
                        state,
                    });
                }
            }
            status.state = ChannelState::Connecting;
            status.user_data = user_data;
            status.heartbeat.reset(true);
            self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1
        };

        let sink = ChannelSink::new(Arc::clone(&self.shared), generation);
        tracing::debug!(channel = %self.shared.name, address, "connecting");
        let attempt = self.helper.lock().connect(address, sink);
        if let Err(err) = attempt {
            {
                let mut status = self.shared.status.lock();
                status.state = ChannelState::Disconnected;
                status.user_data = None;
                // Invalidate the sink handed to the failed attempt.
                self.shared.generation.fetch_add(1, Ordering::AcqRel);
            }
            self.shared
                .enqueue_error(ChannelErrorKind::Connect, err.os_code(), err.to_string());
            return Err(ChannelError::Transport(err));
        }
        Ok(())
    }

    /// Sends a message that expects no correlated response.
    ///
    /// # Errors
    ///
    /// [`ChannelError::NotConnected`] without a connection;
    /// [`ChannelError::Transport`] when the helper rejects the send, in
    /// which case the channel closes.
    pub fn send(&self, message: H::Message) -> ChannelResult<()> {
        if !self.is_connected() {
            return Err(ChannelError::NotConnected {
                name: self.shared.name.clone(),
            });
        }
        let sent = self.helper.lock().send(&message);
        if let Err(err) = sent {
            self.shared
                .enqueue_error(ChannelErrorKind::Send, err.os_code(), err.to_string());
            self.close();
            return Err(ChannelError::Transport(err));
        }
        Ok(())
    }

    /// Registers and sends an RPC request, returning the future for its
    /// reply.
    ///
    /// Re-issuing an id that is still pending returns the existing future
    /// without sending again. When the transport rejects the send, the
    /// returned future is already failed with [`RpcError::SendFailed`], the
    /// correlator's `failed` notification has fired, an `error`
    /// notification is queued, and the channel closes.
    ///
    /// # Errors
    ///
    /// [`ChannelError::NotConnected`] when no connection is up and the id is
    /// not already pending.
    pub fn call(&self, request: H::Message) -> ChannelResult<ResponseFuture<H::Message>> {
        let unique_id = request.unique_id();
        if let Some(existing) = self.shared.rpc.pending_future(unique_id) {
            return Ok(existing);
        }
        if !self.is_connected() {
            return Err(ChannelError::NotConnected {
                name: self.shared.name.clone(),
            });
        }

        let future = self.shared.rpc.call(request.clone());
        let sent = self.helper.lock().send(&request);
        if let Err(err) = sent {
            self.shared.rpc.fail(
                unique_id,
                RpcError::SendFailed {
                    reason: err.to_string(),
                },
            );
            self.shared
                .enqueue_error(ChannelErrorKind::Send, err.os_code(), err.to_string());
            self.close();
        }
        Ok(future)
    }

    /// Per-tick driver.
    ///
    /// Ages the heartbeat on `real_elapsed`, sweeps RPC timeouts on
    /// `elapsed`, then drains the inbound queue, delivering messages,
    /// reply completions, and lifecycle notifications. Heartbeats run only
    /// while connected; the sweep and the drain run regardless, so pending
    /// calls still terminate and queued notifications still land after a
    /// disconnect.
    pub fn update(&self, elapsed: Duration, real_elapsed: Duration) {
        self.update_heartbeat(real_elapsed);
        self.shared.rpc.update(elapsed);
        self.pump_inbound();
    }

    /// Closes the connection if one is up or in progress. A `closed`
    /// notification is queued when an established connection ended.
    /// Idempotent.
    pub fn close(&self) {
        let Some(was_connected) = self.shared.transition_disconnected() else {
            return;
        };
        self.helper.lock().close();
        if was_connected {
            tracing::info!(channel = %self.shared.name, "closed");
            self.shared.enqueue(Inbound::Closed);
        }
    }

    /// Terminal teardown: closes the connection, flushes queued
    /// notifications (so a final `closed` still lands), disposes the
    /// correlator, failing every pending future, and drops all
    /// subscriptions. Idempotent. The channel is spent afterwards; open a
    /// fresh one to reconnect.
    pub fn shutdown(&self) {
        self.close();
        self.pump_inbound();
        self.shared.rpc.dispose();
        self.shared.rpc.events().clear();
        self.shared.events.clear();
        tracing::debug!(channel = %self.shared.name, "shut down");
    }

    fn update_heartbeat(&self, real_elapsed: Duration) {
        let interval = self.shared.config.heartbeat_interval;
        if interval == Duration::ZERO {
            return;
        }

        enum Beat {
            Idle,
            Probe { missed_before: u32 },
            Lost { missed: u32 },
        }

        let beat = {
            let mut status = self.shared.status.lock();
            if status.state != ChannelState::Connected {
                Beat::Idle
            } else if status.heartbeat.advance(real_elapsed) >= interval {
                let missed_before = status.heartbeat.record_miss();
                if missed_before >= self.shared.config.max_missed_heartbeats {
                    Beat::Lost {
                        missed: missed_before,
                    }
                } else {
                    Beat::Probe { missed_before }
                }
            } else {
                Beat::Idle
            }
        };

        match beat {
            Beat::Idle => {}
            Beat::Probe { missed_before } => {
                let sent = self.helper.lock().send_keep_alive();
                if let Err(err) = sent {
                    self.shared.enqueue_error(
                        ChannelErrorKind::Heartbeat,
                        err.os_code(),
                        format!("keep-alive send failed: {err}"),
                    );
                    self.close();
                    return;
                }
                tracing::trace!(channel = %self.shared.name, "keep-alive sent");
                if missed_before > 0 {
                    tracing::warn!(
                        channel = %self.shared.name,
                        missed = missed_before,
                        "heartbeat miss"
                    );
                    self.shared.enqueue(Inbound::MissHeartbeat {
                        missed: missed_before,
                    });
                }
            }
            Beat::Lost { missed } => {
                self.shared.enqueue_error(
                    ChannelErrorKind::Heartbeat,
                    None,
                    format!("no heartbeat reply after {missed} intervals"),
                );
                self.close();
            }
        }
    }

    /// Drains the inbound queue, delivering each item to subscribers. The
    /// queue lock is released between items, so subscribers may reenter the
    /// channel freely.
    fn pump_inbound(&self) {
        let events = &self.shared.events;
        loop {
            let item = match self.shared.inbound_rx.lock().try_recv() {
                Ok(item) => item,
                Err(_) => break,
            };
            match item {
                Inbound::Connected { user_data } => {
                    events.connected.emit(&ConnectedEvent { user_data });
                }
                Inbound::Message(message) => {
                    events.message.emit(&MessageEvent { message });
                }
                Inbound::CallCompleted(response) => {
                    self.shared.rpc.notify_completed(response);
                }
                Inbound::MissHeartbeat { missed } => {
                    events.miss_heartbeat.emit(&MissHeartbeatEvent { missed });
                }
                Inbound::Error {
                    kind,
                    transport_code,
                    detail,
                } => {
                    events.error.emit(&ErrorEvent {
                        kind,
                        transport_code,
                        detail,
                    });
                }
                Inbound::Closed => {
                    events.closed.emit(&ClosedEvent);
                }
            }
        }
    }
}
