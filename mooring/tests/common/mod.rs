//! Shared fixtures: a serde-backed test message and an in-process loopback
//! transport whose probe side lets tests inject replies, pushes, and
//! transport failures.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use mooring::{
    ChannelErrorKind, ChannelHelper, ChannelSink, Envelope, JsonCodec, MessageCodec, MessageKind,
    TransportError, TransportResult,
};

/// Installs a fmt subscriber once per test binary. Set `RUST_LOG` to see
/// channel tracing while debugging.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestMessage {
    pub unique_id: u64,
    pub kind: MessageKind,
    pub error_code: i32,
    pub body: String,
}

impl Envelope for TestMessage {
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

pub fn request(id: u64, body: &str) -> TestMessage {
    TestMessage {
        unique_id: id,
        kind: MessageKind::Request,
        error_code: 0,
        body: body.to_string(),
    }
}

pub fn response(id: u64, body: &str) -> TestMessage {
    response_with_code(id, 0, body)
}

pub fn response_with_code(id: u64, code: i32, body: &str) -> TestMessage {
    TestMessage {
        unique_id: id,
        kind: MessageKind::Response,
        error_code: code,
        body: body.to_string(),
    }
}

pub fn push(id: u64, body: &str) -> TestMessage {
    TestMessage {
        unique_id: id,
        kind: MessageKind::Push,
        error_code: 0,
        body: body.to_string(),
    }
}

struct LoopbackShared {
    codec: JsonCodec,
    sink: Mutex<Option<ChannelSink<TestMessage>>>,
    wire_log: Mutex<Vec<Vec<u8>>>,
    keep_alives: AtomicUsize,
    closes: AtomicUsize,
    fail_connect: AtomicBool,
    fail_sends: AtomicBool,
    confirm_on_connect: AtomicBool,
    echo_replies: AtomicBool,
}

/// Transport half handed to the channel. Outbound messages are encoded to
/// JSON bytes (exercising the codec seam) and logged for the probe.
pub struct LoopbackHelper {
    inner: Arc<LoopbackShared>,
}

/// Test-side handle onto a [`LoopbackHelper`].
#[derive(Clone)]
pub struct LoopbackProbe {
    inner: Arc<LoopbackShared>,
}

pub fn loopback() -> (LoopbackHelper, LoopbackProbe) {
    let inner = Arc::new(LoopbackShared {
        codec: JsonCodec,
        sink: Mutex::new(None),
        wire_log: Mutex::new(Vec::new()),
        keep_alives: AtomicUsize::new(0),
        closes: AtomicUsize::new(0),
        fail_connect: AtomicBool::new(false),
        fail_sends: AtomicBool::new(false),
        confirm_on_connect: AtomicBool::new(true),
        echo_replies: AtomicBool::new(false),
    });
    (
        LoopbackHelper {
            inner: Arc::clone(&inner),
        },
        LoopbackProbe { inner },
    )
}

impl ChannelHelper for LoopbackHelper {
    type Message = TestMessage;

    fn connect(&mut self, _address: &str, sink: ChannelSink<TestMessage>) -> TransportResult<()> {
        if self.inner.fail_connect.load(Ordering::SeqCst) {
            return Err(TransportError::Connect {
                reason: "injected connect failure".to_string(),
            });
        }
        *self.inner.sink.lock() = Some(sink.clone());
        if self.inner.confirm_on_connect.load(Ordering::SeqCst) {
            sink.connected();
        }
        Ok(())
    }

    fn send(&mut self, message: &TestMessage) -> TransportResult<()> {
        if self.inner.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Send {
                reason: "injected send failure".to_string(),
            });
        }
        let bytes = self.inner.codec.encode(message)?;
        self.inner.wire_log.lock().push(bytes);
        if self.inner.echo_replies.load(Ordering::SeqCst) && message.kind == MessageKind::Request {
            let sink = self.inner.sink.lock().clone();
            if let Some(sink) = sink {
                sink.deliver(response(message.unique_id, &message.body));
            }
        }
        Ok(())
    }

    fn send_keep_alive(&mut self) -> TransportResult<()> {
        if self.inner.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Send {
                reason: "injected keep-alive failure".to_string(),
            });
        }
        self.inner.keep_alives.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) {
        self.inner.closes.fetch_add(1, Ordering::SeqCst);
        *self.inner.sink.lock() = None;
    }
}

impl LoopbackProbe {
    /// Current connection's sink handle. Cloning it before a reconnect
    /// yields a stale-generation handle for staleness tests.
    pub fn sink(&self) -> ChannelSink<TestMessage> {
        self.inner
            .sink
            .lock()
            .clone()
            .expect("no live connection; call connect first")
    }

    /// When disabled, `connect` succeeds without confirming; use
    /// [`LoopbackProbe::confirm_connected`] to complete the handshake as an
    /// I/O thread would.
    pub fn set_confirm_on_connect(&self, confirm: bool) {
        self.inner.confirm_on_connect.store(confirm, Ordering::SeqCst);
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.inner.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.inner.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// When enabled, every outbound request is answered from inside the
    /// helper's `send`, before it returns, echoing the request body back
    /// under the same id.
    pub fn set_echo_replies(&self, echo: bool) {
        self.inner.echo_replies.store(echo, Ordering::SeqCst);
    }

    pub fn confirm_connected(&self) {
        self.sink().connected();
    }

    /// Delivers a decoded inbound message as the transport would.
    pub fn deliver(&self, message: TestMessage) {
        self.sink().deliver(message);
    }

    /// Reports a fatal transport failure through the sink.
    pub fn report_error(&self, kind: ChannelErrorKind, code: Option<i32>, detail: &str) {
        self.sink().error(kind, code, detail);
    }

    /// Reports a remote close through the sink.
    pub fn report_closed(&self) {
        self.sink().closed();
    }

    pub fn has_live_sink(&self) -> bool {
        self.inner.sink.lock().is_some()
    }

    pub fn sent_count(&self) -> usize {
        self.inner.wire_log.lock().len()
    }

    /// Decodes the outbound wire log back into messages.
    pub fn sent_messages(&self) -> Vec<TestMessage> {
        let codec = JsonCodec;
        self.inner
            .wire_log
            .lock()
            .iter()
            .map(|bytes| codec.decode(bytes).expect("wire log should decode"))
            .collect()
    }

    pub fn last_sent(&self) -> Option<TestMessage> {
        self.sent_messages().pop()
    }

    pub fn keep_alive_count(&self) -> usize {
        self.inner.keep_alives.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.inner.closes.load(Ordering::SeqCst)
    }
}
