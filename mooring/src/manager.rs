//! Name-keyed channel registry.
//!
//! # Overview
//!
//! A [`NetworkManager`] owns every channel an application opens, keyed by a
//! unique name, and gives the host a single place to drive them:
//! [`NetworkManager::update`] fans the tick out to every registered channel
//! and [`NetworkManager::shutdown`] tears them all down.
//!
//! # Relays
//!
//! On registration the manager subscribes relay handlers to the channel's
//! lifecycle notifications. Each relay re-wraps the per-channel payload into
//! a manager-level one carrying the channel handle, so an observer can
//! watch every connection from one subscription:
//!
//! ```text
//!  channel "login"  ──connected──►┐
//!  channel "world"  ──connected──►├──► NetworkEvents::connected
//!  channel "chat"   ──connected──►┘    (payload carries the channel)
//! ```
//!
//! Relay delivery keeps registration order, and both hops run under the
//! guarded-list rules of [`crate::event`], so a panicking observer is
//! contained at either layer.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use thiserror::Error;

use crate::channel::{ChannelConfig, ChannelError, ChannelHelper, NetworkChannel, UserData};
use crate::error::ChannelErrorKind;
use crate::event::{CallbackId, EventSlot};

/// Result alias for manager operations.
pub type ManagerResult<T> = Result<T, ManagerError>;

/// Errors returned by registry operations.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// A channel with this name is already registered.
    #[error("channel '{name}' is already registered")]
    DuplicateChannel {
        /// The contested name.
        name: String,
    },

    /// The channel itself could not be constructed.
    #[error("channel '{name}' could not be created")]
    Channel {
        /// Name the channel would have had.
        name: String,
        /// The construction failure.
        #[source]
        source: ChannelError,
    },
}

/// A managed channel established a connection.
pub struct NetworkConnectedEvent<H: ChannelHelper> {
    /// The channel that connected.
    pub channel: Arc<NetworkChannel<H>>,
    /// Data passed to its `connect`, if any.
    pub user_data: Option<UserData>,
}

/// A managed channel's established connection ended.
pub struct NetworkClosedEvent<H: ChannelHelper> {
    /// The channel that closed.
    pub channel: Arc<NetworkChannel<H>>,
}

/// A managed channel observed a silent heartbeat interval.
pub struct NetworkMissHeartbeatEvent<H: ChannelHelper> {
    /// The channel that missed a beat.
    pub channel: Arc<NetworkChannel<H>>,
    /// Consecutive intervals already missed when this one fired.
    pub missed: u32,
}

/// A managed channel surfaced a transport or protocol failure.
pub struct NetworkErrorEvent<H: ChannelHelper> {
    /// The channel that failed.
    pub channel: Arc<NetworkChannel<H>>,
    /// Channel-agnostic classification.
    pub kind: ChannelErrorKind,
    /// Raw transport code when one exists, such as an OS errno.
    pub transport_code: Option<i32>,
    /// Human-readable detail.
    pub detail: String,
}

/// Subscription surface for manager-level notifications.
pub struct NetworkEvents<H: ChannelHelper> {
    /// Some managed channel connected.
    pub connected: EventSlot<NetworkConnectedEvent<H>>,
    /// Some managed channel's connection ended.
    pub closed: EventSlot<NetworkClosedEvent<H>>,
    /// Some managed channel missed a heartbeat.
    pub miss_heartbeat: EventSlot<NetworkMissHeartbeatEvent<H>>,
    /// Some managed channel surfaced a failure.
    pub error: EventSlot<NetworkErrorEvent<H>>,
}

impl<H: ChannelHelper> NetworkEvents<H> {
    fn new() -> Self {
        Self {
            connected: EventSlot::new("network-connected"),
            closed: EventSlot::new("network-closed"),
            miss_heartbeat: EventSlot::new("network-miss-heartbeat"),
            error: EventSlot::new("network-error"),
        }
    }

    fn clear(&self) {
        self.connected.clear();
        self.closed.clear();
        self.miss_heartbeat.clear();
        self.error.clear();
    }
}

struct RelayIds {
    connected: CallbackId,
    closed: CallbackId,
    miss_heartbeat: CallbackId,
    error: CallbackId,
}

struct ChannelEntry<H: ChannelHelper> {
    channel: Arc<NetworkChannel<H>>,
    relays: RelayIds,
}

/// Registry of named channels sharing one tick and one observer surface.
pub struct NetworkManager<H: ChannelHelper> {
    channels: DashMap<String, ChannelEntry<H>>,
    events: Arc<NetworkEvents<H>>,
}

impl<H: ChannelHelper> NetworkManager<H> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
            events: Arc::new(NetworkEvents::new()),
        }
    }

    /// Manager-level notification slots.
    pub fn events(&self) -> &NetworkEvents<H> {
        &self.events
    }

    /// Whether a channel is registered under `name`.
    pub fn has_channel(&self, name: &str) -> bool {
        self.channels.contains_key(name)
    }

    /// Handle of the channel registered under `name`, if any.
    pub fn get_channel(&self, name: &str) -> Option<Arc<NetworkChannel<H>>> {
        self.channels
            .get(name)
            .map(|entry| Arc::clone(&entry.channel))
    }

    /// Number of registered channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Registers a new channel under `name` with default settings and the
    /// given RPC timeout.
    ///
    /// # Errors
    ///
    /// See [`Self::create_network_channel_with_config`].
    pub fn create_network_channel(
        &self,
        name: impl Into<String>,
        helper: H,
        rpc_timeout: Duration,
    ) -> ManagerResult<Arc<NetworkChannel<H>>> {
        self.create_network_channel_with_config(
            name,
            helper,
            ChannelConfig::default().with_rpc_timeout(rpc_timeout),
        )
    }

    /// Registers a new channel under `name`, subscribing the manager's
    /// relay handlers to its notifications.
    ///
    /// # Errors
    ///
    /// [`ManagerError::DuplicateChannel`] when the name is taken; the
    /// existing registration is untouched. [`ManagerError::Channel`] when
    /// the channel rejects its configuration.
    pub fn create_network_channel_with_config(
        &self,
        name: impl Into<String>,
        helper: H,
        config: ChannelConfig,
    ) -> ManagerResult<Arc<NetworkChannel<H>>> {
        let name = name.into();
        match self.channels.entry(name.clone()) {
            Entry::Occupied(_) => Err(ManagerError::DuplicateChannel { name }),
            Entry::Vacant(slot) => {
                let channel = NetworkChannel::new(name.clone(), helper, config)
                    .map(Arc::new)
                    .map_err(|source| ManagerError::Channel {
                        name: name.clone(),
                        source,
                    })?;
                let relays = self.subscribe_relays(&channel);
                slot.insert(ChannelEntry {
                    channel: Arc::clone(&channel),
                    relays,
                });
                tracing::info!(channel = %name, "channel registered");
                Ok(channel)
            }
        }
    }

    /// Removes the channel registered under `name`, detaching its relays
    /// and shutting it down. Returns false when the name is unknown.
    ///
    /// The relays detach before the shutdown, so the final `closed` flush
    /// reaches the channel's remaining subscribers but is not re-broadcast
    /// at the manager level.
    pub fn destroy_network_channel(&self, name: &str) -> bool {
        let Some((_, entry)) = self.channels.remove(name) else {
            return false;
        };
        Self::unsubscribe_relays(&entry);
        entry.channel.shutdown();
        tracing::info!(channel = %name, "channel destroyed");
        true
    }

    /// Drives every registered channel's update. Iteration order over the
    /// registry is unspecified.
    ///
    /// The registered set is snapshotted first, so notification handlers
    /// may create or destroy channels without disturbing the pass; channels
    /// they add are picked up from the next tick.
    pub fn update(&self, elapsed: Duration, real_elapsed: Duration) {
        let channels: Vec<Arc<NetworkChannel<H>>> = self
            .channels
            .iter()
            .map(|entry| Arc::clone(&entry.channel))
            .collect();
        for channel in channels {
            channel.update(elapsed, real_elapsed);
        }
    }

    /// Destroys every registered channel and drops manager-level
    /// subscriptions. Idempotent; the manager may register new channels
    /// afterwards.
    pub fn shutdown(&self) {
        let names: Vec<String> = self
            .channels
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for name in &names {
            self.destroy_network_channel(name);
        }
        self.events.clear();
        if !names.is_empty() {
            tracing::info!(channels = names.len(), "network manager shut down");
        }
    }

    fn subscribe_relays(&self, channel: &Arc<NetworkChannel<H>>) -> RelayIds {
        let slots = channel.events();

        let connected = {
            let hub = Arc::clone(&self.events);
            let weak = Arc::downgrade(channel);
            slots.connected.subscribe(move |event| {
                let Some(channel) = weak.upgrade() else {
                    return;
                };
                hub.connected.emit(&NetworkConnectedEvent {
                    channel,
                    user_data: event.user_data.clone(),
                });
            })
        };

        let closed = {
            let hub = Arc::clone(&self.events);
            let weak = Arc::downgrade(channel);
            slots.closed.subscribe(move |_| {
                let Some(channel) = weak.upgrade() else {
                    return;
                };
                hub.closed.emit(&NetworkClosedEvent { channel });
            })
        };

        let miss_heartbeat = {
            let hub = Arc::clone(&self.events);
            let weak = Arc::downgrade(channel);
            slots.miss_heartbeat.subscribe(move |event| {
                let Some(channel) = weak.upgrade() else {
                    return;
                };
                hub.miss_heartbeat.emit(&NetworkMissHeartbeatEvent {
                    channel,
                    missed: event.missed,
                });
            })
        };

        let error = {
            let hub = Arc::clone(&self.events);
            let weak = Arc::downgrade(channel);
            slots.error.subscribe(move |event| {
                let Some(channel) = weak.upgrade() else {
                    return;
                };
                hub.error.emit(&NetworkErrorEvent {
                    channel,
                    kind: event.kind,
                    transport_code: event.transport_code,
                    detail: event.detail.clone(),
                });
            })
        };

        RelayIds {
            connected,
            closed,
            miss_heartbeat,
            error,
        }
    }

    fn unsubscribe_relays(entry: &ChannelEntry<H>) {
        let slots = entry.channel.events();
        slots.connected.unsubscribe(entry.relays.connected);
        slots.closed.unsubscribe(entry.relays.closed);
        slots.miss_heartbeat.unsubscribe(entry.relays.miss_heartbeat);
        slots.error.unsubscribe(entry.relays.error);
    }
}

impl<H: ChannelHelper> Default for NetworkManager<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: ChannelHelper> Drop for NetworkManager<H> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
