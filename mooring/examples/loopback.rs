//! Loopback Example: a full session over an in-process echo transport.
//!
//! This example wires a [`NetworkManager`] to a helper that answers every
//! request itself, then drives the whole stack from a plain tick loop the
//! way a game or simulation host would:
//!
//! - manager-level notifications watching every channel from one place
//! - an RPC call resolved by polling its future between ticks (no executor)
//! - heartbeat probes appearing once the link goes silent
//!
//! # Run
//!
//! ```bash
//! RUST_LOG=debug cargo run --example loopback
//! ```

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use mooring::{
    ChannelConfig, ChannelHelper, ChannelSink, Envelope, JsonCodec, MessageCodec, MessageKind,
    NetworkManager, TransportResult,
};

// ============================================================================
// Message type
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DemoMessage {
    unique_id: u64,
    kind: MessageKind,
    error_code: i32,
    body: String,
}

impl Envelope for DemoMessage {
    fn unique_id(&self) -> u64 {
        self.unique_id
    }

    fn kind(&self) -> MessageKind {
        self.kind
    }

    fn error_code(&self) -> i32 {
        self.error_code
    }
}

// ============================================================================
// Echo transport
// ============================================================================

/// Transport that plays both sides: every encoded request comes straight
/// back as a response with the same correlation id.
struct EchoHelper {
    codec: JsonCodec,
    sink: Option<ChannelSink<DemoMessage>>,
}

impl EchoHelper {
    fn new() -> Self {
        Self {
            codec: JsonCodec,
            sink: None,
        }
    }
}

impl ChannelHelper for EchoHelper {
    type Message = DemoMessage;

    fn connect(&mut self, address: &str, sink: ChannelSink<DemoMessage>) -> TransportResult<()> {
        tracing::info!(address, "echo transport attached");
        sink.connected();
        self.sink = Some(sink);
        Ok(())
    }

    fn send(&mut self, message: &DemoMessage) -> TransportResult<()> {
        // Round-trip through the codec, as a socket transport would.
        let bytes = self.codec.encode(message)?;
        let decoded: DemoMessage = self.codec.decode(&bytes)?;

        if decoded.kind == MessageKind::Request {
            if let Some(sink) = &self.sink {
                sink.deliver(DemoMessage {
                    unique_id: decoded.unique_id,
                    kind: MessageKind::Response,
                    error_code: 0,
                    body: format!("echo: {}", decoded.body),
                });
            }
        }
        Ok(())
    }

    fn send_keep_alive(&mut self) -> TransportResult<()> {
        tracing::info!("keep-alive probe (nobody echoes these)");
        Ok(())
    }

    fn close(&mut self) {
        self.sink = None;
    }
}

// ============================================================================
// Host loop
// ============================================================================

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let manager = NetworkManager::new();

    manager.events().connected.subscribe(|event| {
        tracing::info!(channel = event.channel.name(), "session up");
    });
    manager.events().closed.subscribe(|event| {
        tracing::info!(channel = event.channel.name(), "session down");
    });
    manager.events().error.subscribe(|event| {
        tracing::warn!(
            channel = event.channel.name(),
            kind = %event.kind,
            detail = %event.detail,
            "session error"
        );
    });

    let config = ChannelConfig::default()
        .with_heartbeat_interval(Duration::from_secs(1))
        .with_rpc_timeout(Duration::from_secs(5));
    let channel = manager
        .create_network_channel_with_config("echo", EchoHelper::new(), config)
        .expect("echo channel registers");
    channel.rpc_events().completed.subscribe(|event| {
        tracing::info!(
            unique_id = event.response.unique_id,
            body = %event.response.body,
            "call completed"
        );
    });

    channel
        .connect("loopback:echo", Some(Arc::new("demo-session".to_string())))
        .expect("echo transport accepts the connect");

    let future = channel
        .call(DemoMessage {
            unique_id: 1,
            kind: MessageKind::Request,
            error_code: 0,
            body: "hello over the loopback".to_string(),
        })
        .expect("call registers while connected");

    // Fixed-step tick loop; the future is polled between ticks instead of
    // awaited on an executor.
    let dt = Duration::from_millis(100);
    loop {
        manager.update(dt, dt);
        if let Some(result) = future.try_result() {
            match result {
                Ok(reply) => tracing::info!(body = %reply.body, "reply in hand"),
                Err(err) => tracing::error!(error = %err, "call failed"),
            }
            break;
        }
        thread::sleep(dt);
    }

    // Leave the link silent for a while to watch keep-alive probes go out.
    for _ in 0..15 {
        manager.update(dt, dt);
        thread::sleep(dt);
    }

    manager.shutdown();
}
