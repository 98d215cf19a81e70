//! Channel behavior configuration.

use std::time::Duration;

/// Tunables for one channel.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use mooring::ChannelConfig;
///
/// let config = ChannelConfig::default()
///     .with_heartbeat_interval(Duration::from_secs(10))
///     .with_max_missed_heartbeats(2)
///     .with_rpc_timeout(Duration::from_secs(8));
/// assert_eq!(config.max_missed_heartbeats, 2);
/// ```
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// How often a keep-alive probe goes out while the connection is silent.
    /// [`Duration::ZERO`] disables heartbeats entirely.
    pub heartbeat_interval: Duration,

    /// Consecutive unanswered intervals tolerated before the channel closes
    /// with a heartbeat error.
    pub max_missed_heartbeats: u32,

    /// Whether an inbound message restarts the elapsed cycle in addition to
    /// clearing the missed count.
    pub reset_heartbeat_elapsed_on_beat: bool,

    /// How long a call may stay pending before the sweep fails it. Values
    /// below [`MIN_RPC_TIMEOUT`](crate::rpc::MIN_RPC_TIMEOUT) are rejected
    /// at channel construction.
    pub rpc_timeout: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            max_missed_heartbeats: 3,
            reset_heartbeat_elapsed_on_beat: true,
            rpc_timeout: Duration::from_secs(30),
        }
    }
}

impl ChannelConfig {
    /// Sets the keep-alive probe interval.
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Sets how many silent intervals are tolerated before closing.
    pub fn with_max_missed_heartbeats(mut self, max: u32) -> Self {
        self.max_missed_heartbeats = max;
        self
    }

    /// Sets whether a beat restarts the elapsed cycle as well.
    pub fn with_reset_heartbeat_elapsed_on_beat(mut self, reset: bool) -> Self {
        self.reset_heartbeat_elapsed_on_beat = reset;
        self
    }

    /// Sets the pending-call timeout.
    pub fn with_rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = timeout;
        self
    }

    /// Settings for low-latency local links: tight probing, short call
    /// timeouts.
    pub fn local_network() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(5),
            max_missed_heartbeats: 2,
            reset_heartbeat_elapsed_on_beat: true,
            rpc_timeout: Duration::from_secs(3),
        }
    }

    /// Settings for high-latency WAN links: patient probing, generous call
    /// timeouts.
    pub fn wan_network() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            max_missed_heartbeats: 4,
            reset_heartbeat_elapsed_on_beat: true,
            rpc_timeout: Duration::from_secs(60),
        }
    }
}
