//! Integration tests for the channel state machine.
//!
//! These tests drive a channel over the loopback transport and cover:
//! - connect/close transitions and their queued notifications
//! - heartbeat probing, miss accounting, and loss-triggered closure
//! - inbound routing: responses resolve inline, notifications wait for the
//!   pump
//! - stale-generation sinks after a reconnect
//! - transport failure paths and shutdown teardown

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use common::{LoopbackHelper, LoopbackProbe, push, request, response};
use mooring::{
    ChannelConfig, ChannelError, ChannelErrorKind, ChannelState, MIN_RPC_TIMEOUT, NetworkChannel,
    RpcError,
};

fn channel_with(config: ChannelConfig) -> (NetworkChannel<LoopbackHelper>, LoopbackProbe) {
    let (helper, probe) = common::loopback();
    let channel =
        NetworkChannel::new("test", helper, config).expect("configuration should be valid");
    (channel, probe)
}

/// Channel that has connected and already delivered its `connected`
/// notification.
fn connected_channel() -> (NetworkChannel<LoopbackHelper>, LoopbackProbe) {
    let (channel, probe) =
        channel_with(ChannelConfig::default().with_rpc_timeout(MIN_RPC_TIMEOUT));
    channel
        .connect("loopback:1", None)
        .expect("connect should succeed");
    tick(&channel);
    (channel, probe)
}

fn tick(channel: &NetworkChannel<LoopbackHelper>) {
    channel.update(Duration::ZERO, Duration::ZERO);
}

fn tick_real(channel: &NetworkChannel<LoopbackHelper>, real_elapsed: Duration) {
    channel.update(Duration::ZERO, real_elapsed);
}

fn count_subscribed(counter: &Arc<AtomicUsize>) -> impl Fn() + Send + Sync + 'static {
    let counter = Arc::clone(counter);
    move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_connect_delivers_connected_with_user_data() {
    common::init_tracing();
    let (channel, _probe) =
        channel_with(ChannelConfig::default().with_rpc_timeout(MIN_RPC_TIMEOUT));

    let seen: Arc<Mutex<Option<u32>>> = Arc::new(Mutex::new(None));
    {
        let seen = Arc::clone(&seen);
        channel.events().connected.subscribe(move |event| {
            let value = event
                .user_data
                .as_ref()
                .and_then(|data| data.downcast_ref::<u32>())
                .copied();
            *seen.lock() = value;
        });
    }

    channel
        .connect("loopback:1", Some(Arc::new(7u32)))
        .expect("connect should succeed");
    assert_eq!(channel.state(), ChannelState::Connected);
    assert!(seen.lock().is_none(), "notification waits for the pump");

    tick(&channel);
    assert_eq!(*seen.lock(), Some(7));

    let held = channel.user_data().expect("connection carries the data");
    assert_eq!(held.downcast_ref::<u32>().copied(), Some(7));
}

#[test]
fn test_connect_while_active_is_rejected() {
    let (channel, probe) =
        channel_with(ChannelConfig::default().with_rpc_timeout(MIN_RPC_TIMEOUT));
    probe.set_confirm_on_connect(false);

    channel
        .connect("loopback:1", None)
        .expect("first connect should succeed");
    assert_eq!(channel.state(), ChannelState::Connecting);

    let err = channel
        .connect("loopback:1", None)
        .expect_err("connect while connecting should be rejected");
    assert!(matches!(
        err,
        ChannelError::AlreadyActive {
            state: ChannelState::Connecting,
            ..
        }
    ));

    probe.confirm_connected();
    assert_eq!(channel.state(), ChannelState::Connected);

    let err = channel
        .connect("loopback:1", None)
        .expect_err("connect while connected should be rejected");
    assert!(matches!(
        err,
        ChannelError::AlreadyActive {
            state: ChannelState::Connected,
            ..
        }
    ));
}

#[test]
fn test_close_fires_closed_once() {
    let (channel, probe) = connected_channel();
    let closed = Arc::new(AtomicUsize::new(0));
    {
        let bump = count_subscribed(&closed);
        channel.events().closed.subscribe(move |_| bump());
    }

    channel.close();
    assert_eq!(channel.state(), ChannelState::Disconnected);
    assert_eq!(probe.close_count(), 1);
    tick(&channel);
    assert_eq!(closed.load(Ordering::SeqCst), 1);

    channel.close();
    tick(&channel);
    assert_eq!(closed.load(Ordering::SeqCst), 1, "second close is a no-op");
    assert_eq!(probe.close_count(), 1);
}

#[test]
fn test_update_pumps_pushes_in_order() {
    let (channel, probe) = connected_channel();
    let bodies: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let bodies = Arc::clone(&bodies);
        channel.events().message.subscribe(move |event| {
            bodies.lock().push(event.message.body.clone());
        });
    }

    probe.deliver(push(50, "first"));
    probe.deliver(push(51, "second"));
    assert!(bodies.lock().is_empty(), "pushes wait for the pump");

    tick(&channel);
    assert_eq!(*bodies.lock(), vec!["first".to_string(), "second".to_string()]);
}

#[test]
fn test_response_resolves_inline_without_a_tick() {
    let (channel, probe) = connected_channel();
    let pushed = Arc::new(AtomicUsize::new(0));
    {
        let bump = count_subscribed(&pushed);
        channel.events().message.subscribe(move |_| bump());
    }

    let future = channel
        .call(request(70, "question"))
        .expect("call should register while connected");
    let sent = probe.last_sent().expect("request should hit the wire");
    assert_eq!(sent.unique_id, 70);
    assert_eq!(sent.body, "question");

    probe.deliver(response(70, "answer"));
    assert!(future.is_resolved(), "responses do not wait for update");
    let reply = future
        .try_result()
        .expect("resolved")
        .expect("successful reply");
    assert_eq!(reply.body, "answer");

    tick(&channel);
    assert_eq!(
        pushed.load(Ordering::SeqCst),
        0,
        "responses never surface as message notifications"
    );
}

#[test]
fn test_completed_subscriber_may_send_after_inline_echo() {
    let (channel, probe) = connected_channel();
    probe.set_echo_replies(true);
    let channel = Arc::new(channel);

    let completions = Arc::new(AtomicUsize::new(0));
    {
        let inner = Arc::clone(&channel);
        let completions = Arc::clone(&completions);
        channel.rpc_events().completed.subscribe(move |event| {
            inner
                .send(push(event.response.unique_id, "ack"))
                .expect("send from the completed notification should succeed");
            completions.fetch_add(1, Ordering::SeqCst);
        });
    }

    let future = channel
        .call(request(80, "ping"))
        .expect("call should register while connected");

    // The echoed reply resolved the future before `call` returned; its
    // notification still waits for the pump.
    let reply = future
        .try_result()
        .expect("echo resolves before call returns")
        .expect("successful reply");
    assert_eq!(reply.body, "ping");
    assert_eq!(completions.load(Ordering::SeqCst), 0);

    tick(&channel);
    assert_eq!(completions.load(Ordering::SeqCst), 1);

    let sent = probe.sent_messages();
    assert_eq!(sent.len(), 2, "the request, then the subscriber's ack");
    assert_eq!(sent[1].body, "ack");
    assert_eq!(channel.state(), ChannelState::Connected);
}

#[test]
fn test_heartbeat_probes_then_misses_then_closes() {
    let config = ChannelConfig::default()
        .with_heartbeat_interval(Duration::from_secs(2))
        .with_max_missed_heartbeats(2)
        .with_rpc_timeout(MIN_RPC_TIMEOUT);
    let (channel, probe) = channel_with(config);
    channel
        .connect("loopback:1", None)
        .expect("connect should succeed");
    tick(&channel);

    let misses: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));
    let errors: Arc<Mutex<Vec<ChannelErrorKind>>> = Arc::new(Mutex::new(Vec::new()));
    let closed = Arc::new(AtomicUsize::new(0));
    {
        let misses = Arc::clone(&misses);
        channel
            .events()
            .miss_heartbeat
            .subscribe(move |event| misses.lock().push(event.missed));
    }
    {
        let errors = Arc::clone(&errors);
        channel
            .events()
            .error
            .subscribe(move |event| errors.lock().push(event.kind));
    }
    {
        let bump = count_subscribed(&closed);
        channel.events().closed.subscribe(move |_| bump());
    }

    // First silent interval: probe goes out, nothing to report yet.
    tick_real(&channel, Duration::from_secs(2));
    assert_eq!(probe.keep_alive_count(), 1);
    assert!(misses.lock().is_empty());
    assert_eq!(channel.state(), ChannelState::Connected);

    // Second: another probe, and the first miss becomes visible.
    tick_real(&channel, Duration::from_secs(2));
    assert_eq!(probe.keep_alive_count(), 2);
    assert_eq!(*misses.lock(), vec![1]);
    assert_eq!(channel.state(), ChannelState::Connected);

    // Third: the miss limit is reached; the channel closes instead of probing.
    tick_real(&channel, Duration::from_secs(2));
    assert_eq!(probe.keep_alive_count(), 2);
    assert_eq!(channel.state(), ChannelState::Disconnected);
    assert_eq!(*errors.lock(), vec![ChannelErrorKind::Heartbeat]);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_zero_interval_disables_heartbeats() {
    let config = ChannelConfig::default()
        .with_heartbeat_interval(Duration::ZERO)
        .with_rpc_timeout(MIN_RPC_TIMEOUT);
    let (channel, probe) = channel_with(config);
    channel
        .connect("loopback:1", None)
        .expect("connect should succeed");
    tick(&channel);

    for _ in 0..10 {
        tick_real(&channel, Duration::from_secs(3600));
    }
    assert_eq!(probe.keep_alive_count(), 0);
    assert_eq!(channel.state(), ChannelState::Connected);
}

#[test]
fn test_inbound_traffic_revives_heartbeat() {
    let config = ChannelConfig::default()
        .with_heartbeat_interval(Duration::from_secs(2))
        .with_max_missed_heartbeats(2)
        .with_rpc_timeout(MIN_RPC_TIMEOUT);
    let (channel, probe) = channel_with(config);
    channel
        .connect("loopback:1", None)
        .expect("connect should succeed");
    tick(&channel);

    let misses = Arc::new(AtomicUsize::new(0));
    {
        let bump = count_subscribed(&misses);
        channel.events().miss_heartbeat.subscribe(move |_| bump());
    }

    // A silent interval leaves one recorded miss.
    tick_real(&channel, Duration::from_secs(2));
    assert_eq!(probe.keep_alive_count(), 1);

    // Any inbound delivery counts as a beat and clears the miss.
    probe.deliver(push(1, "beat"));
    tick(&channel);

    // The next silent interval is once again the first one.
    tick_real(&channel, Duration::from_secs(2));
    assert_eq!(probe.keep_alive_count(), 2);
    assert_eq!(misses.load(Ordering::SeqCst), 0, "the beat cleared the miss");
    assert_eq!(channel.state(), ChannelState::Connected);
}

#[test]
fn test_beat_without_elapsed_reset_keeps_probe_cadence() {
    let flagged = ChannelConfig::default()
        .with_heartbeat_interval(Duration::from_secs(2))
        .with_reset_heartbeat_elapsed_on_beat(false)
        .with_rpc_timeout(MIN_RPC_TIMEOUT);
    let (channel, probe) = channel_with(flagged);
    channel
        .connect("loopback:1", None)
        .expect("connect should succeed");
    tick(&channel);

    tick_real(&channel, Duration::from_millis(1500));
    probe.deliver(push(1, "beat"));
    tick_real(&channel, Duration::from_millis(500));
    assert_eq!(
        probe.keep_alive_count(),
        1,
        "the beat cleared misses but not the running interval"
    );

    let resetting = ChannelConfig::default()
        .with_heartbeat_interval(Duration::from_secs(2))
        .with_rpc_timeout(MIN_RPC_TIMEOUT);
    let (channel, probe) = channel_with(resetting);
    channel
        .connect("loopback:1", None)
        .expect("connect should succeed");
    tick(&channel);

    tick_real(&channel, Duration::from_millis(1500));
    probe.deliver(push(1, "beat"));
    tick_real(&channel, Duration::from_millis(500));
    assert_eq!(
        probe.keep_alive_count(),
        0,
        "the beat restarted the interval from zero"
    );
}

#[test]
fn test_stale_sink_is_ignored_after_reconnect() {
    let (channel, probe) = connected_channel();
    let messages = Arc::new(AtomicUsize::new(0));
    {
        let bump = count_subscribed(&messages);
        channel.events().message.subscribe(move |_| bump());
    }

    let old_sink = probe.sink();
    channel.close();
    tick(&channel);

    channel
        .connect("loopback:2", None)
        .expect("reconnect should succeed");
    tick(&channel);
    assert_eq!(channel.state(), ChannelState::Connected);

    // The dead connection's I/O thread keeps talking; nobody listens.
    old_sink.deliver(push(1, "ghost"));
    old_sink.closed();
    tick(&channel);

    assert_eq!(messages.load(Ordering::SeqCst), 0);
    assert_eq!(channel.state(), ChannelState::Connected);

    // The live sink still works.
    probe.deliver(push(2, "real"));
    tick(&channel);
    assert_eq!(messages.load(Ordering::SeqCst), 1);
}

#[test]
fn test_remote_error_closes_and_classifies() {
    let (channel, probe) = connected_channel();
    let errors: Arc<Mutex<Vec<(ChannelErrorKind, Option<i32>)>>> = Arc::new(Mutex::new(Vec::new()));
    let closed = Arc::new(AtomicUsize::new(0));
    {
        let errors = Arc::clone(&errors);
        channel
            .events()
            .error
            .subscribe(move |event| errors.lock().push((event.kind, event.transport_code)));
    }
    {
        let bump = count_subscribed(&closed);
        channel.events().closed.subscribe(move |_| bump());
    }

    probe.report_error(ChannelErrorKind::Receive, Some(104), "connection reset");
    assert_eq!(channel.state(), ChannelState::Disconnected);

    tick(&channel);
    assert_eq!(*errors.lock(), vec![(ChannelErrorKind::Receive, Some(104))]);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_send_failure_fails_the_call_and_closes() {
    let (channel, probe) = connected_channel();
    let rpc_failed = Arc::new(AtomicUsize::new(0));
    let errors: Arc<Mutex<Vec<ChannelErrorKind>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let bump = count_subscribed(&rpc_failed);
        channel.rpc_events().failed.subscribe(move |_| bump());
    }
    {
        let errors = Arc::clone(&errors);
        channel
            .events()
            .error
            .subscribe(move |event| errors.lock().push(event.kind));
    }

    probe.set_fail_sends(true);
    let future = channel
        .call(request(90, "doomed"))
        .expect("call itself succeeds; the failure lands in the future");

    let result = future.try_result().expect("already failed");
    assert!(matches!(result, Err(RpcError::SendFailed { .. })));
    assert_eq!(rpc_failed.load(Ordering::SeqCst), 1);
    assert_eq!(channel.state(), ChannelState::Disconnected);
    assert_eq!(channel.pending_rpc_count(), 0);

    tick(&channel);
    assert_eq!(*errors.lock(), vec![ChannelErrorKind::Send]);
}

#[test]
fn test_plain_send_failure_returns_transport_error() {
    let (channel, probe) = connected_channel();
    probe.set_fail_sends(true);

    let err = channel
        .send(push(1, "nope"))
        .expect_err("failed send should surface");
    assert!(matches!(err, ChannelError::Transport(_)));
    assert_eq!(channel.state(), ChannelState::Disconnected);
}

#[test]
fn test_operations_require_a_connection() {
    let (channel, _probe) =
        channel_with(ChannelConfig::default().with_rpc_timeout(MIN_RPC_TIMEOUT));

    let err = channel
        .send(push(1, "hello"))
        .expect_err("send without a connection should fail");
    assert!(matches!(err, ChannelError::NotConnected { .. }));

    let err = channel
        .call(request(2, "hello"))
        .err()
        .expect("call without a connection should fail");
    assert!(matches!(err, ChannelError::NotConnected { .. }));
}

#[test]
fn test_pending_calls_still_time_out_after_disconnect() {
    let (channel, _probe) = connected_channel();
    let future = channel
        .call(request(95, "orphaned"))
        .expect("call should register while connected");

    channel.close();
    assert!(!future.is_resolved(), "closing does not abandon pending calls");

    channel.update(Duration::from_secs(4), Duration::ZERO);
    let result = future.try_result().expect("sweep should run while disconnected");
    assert!(matches!(result, Err(RpcError::TimedOut { .. })));
}

#[test]
fn test_failed_connect_reports_error_not_closed() {
    let (channel, probe) =
        channel_with(ChannelConfig::default().with_rpc_timeout(MIN_RPC_TIMEOUT));
    probe.set_fail_connect(true);

    let errors: Arc<Mutex<Vec<ChannelErrorKind>>> = Arc::new(Mutex::new(Vec::new()));
    let closed = Arc::new(AtomicUsize::new(0));
    {
        let errors = Arc::clone(&errors);
        channel
            .events()
            .error
            .subscribe(move |event| errors.lock().push(event.kind));
    }
    {
        let bump = count_subscribed(&closed);
        channel.events().closed.subscribe(move |_| bump());
    }

    let err = channel
        .connect("loopback:1", None)
        .expect_err("injected connect failure should surface");
    assert!(matches!(err, ChannelError::Transport(_)));
    assert_eq!(channel.state(), ChannelState::Disconnected);

    tick(&channel);
    assert_eq!(*errors.lock(), vec![ChannelErrorKind::Connect]);
    assert_eq!(
        closed.load(Ordering::SeqCst),
        0,
        "closed is reserved for established connections"
    );
}

#[test]
fn test_shutdown_flushes_disposes_and_unsubscribes() {
    let (channel, _probe) = connected_channel();
    let closed = Arc::new(AtomicUsize::new(0));
    {
        let bump = count_subscribed(&closed);
        channel.events().closed.subscribe(move |_| bump());
    }

    let future = channel
        .call(request(96, "interrupted"))
        .expect("call should register while connected");

    channel.shutdown();
    assert_eq!(channel.state(), ChannelState::Disconnected);
    assert_eq!(
        closed.load(Ordering::SeqCst),
        1,
        "the final closed notification is flushed, not dropped"
    );

    let result = future.try_result().expect("dispose should fail the call");
    assert!(matches!(result, Err(RpcError::Disposed)));

    assert_eq!(channel.events().closed.subscriber_count(), 0);
    assert_eq!(channel.rpc_events().failed.subscriber_count(), 0);

    channel.shutdown();
    assert_eq!(channel.state(), ChannelState::Disconnected);
}
