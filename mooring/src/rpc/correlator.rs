//! Pending-call bookkeeping.
//!
//! The correlator owns one table of outstanding calls keyed by unique id.
//! Senders register through [`RpcCorrelator::call`] from any thread, the
//! decode side resolves through [`RpcCorrelator::try_reply`], and the tick
//! loop evicts expired entries through [`RpcCorrelator::update`].
//!
//! # Design
//!
//! The table is the single structure shared between the update thread and
//! I/O threads, so it is a sharded concurrent map. The timeout sweep scans
//! first and removes after the scan completes; entries are never removed
//! during iteration because senders may be inserting concurrently. Every
//! future resolves exactly once, whichever terminal path wins: reply,
//! sweep, or disposal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::message::{Envelope, MessageKind};

use super::error::RpcError;
use super::events::{
    CallCompletedEvent, CallFailedEvent, CallStartedEvent, ResponseErrorCodeEvent, RpcEvents,
};
use super::future::ResponseFuture;

/// Floor below which correlator timeouts are rejected, preventing ordinary
/// network latency from masquerading as failure.
pub const MIN_RPC_TIMEOUT: Duration = Duration::from_millis(3000);

struct PendingCall<M> {
    request: M,
    elapsed: Duration,
    timeout: Duration,
    future: ResponseFuture<M>,
}

/// Bookkeeping for the outstanding calls of one channel.
///
/// At most one pending entry exists per unique id; re-issuing an id that is
/// still pending hands back the same future instead of creating a duplicate.
pub struct RpcCorrelator<M> {
    pending: DashMap<u64, PendingCall<M>>,
    timeout: Duration,
    events: RpcEvents<M>,
    disposed: AtomicBool,
}

impl<M: Envelope> RpcCorrelator<M> {
    /// Creates a correlator whose entries expire after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::TimeoutTooShort`] when `timeout` is below
    /// [`MIN_RPC_TIMEOUT`].
    pub fn new(timeout: Duration) -> Result<Self, RpcError> {
        if timeout < MIN_RPC_TIMEOUT {
            return Err(RpcError::TimeoutTooShort {
                requested: timeout,
                minimum: MIN_RPC_TIMEOUT,
            });
        }
        Ok(Self {
            pending: DashMap::new(),
            timeout,
            events: RpcEvents::new(),
            disposed: AtomicBool::new(false),
        })
    }

    /// Registers a pending entry for `request` and returns its future.
    ///
    /// Idempotent per unique id: while an entry is pending, further calls
    /// with the same id return the same future and fire no additional
    /// `started` notification. After disposal the returned future is already
    /// failed with [`RpcError::Disposed`].
    pub fn call(&self, request: M) -> ResponseFuture<M> {
        debug_assert!(
            request.kind() == MessageKind::Request,
            "call expects a request message"
        );
        let id = request.unique_id();

        if self.disposed.load(Ordering::Acquire) {
            let future = ResponseFuture::new();
            future.resolve(Err(RpcError::Disposed));
            return future;
        }

        // Re-issuing an id that is still pending returns the existing handle.
        if let Some(entry) = self.pending.get(&id) {
            return entry.future.clone();
        }

        let future = ResponseFuture::new();
        let pending = PendingCall {
            request: request.clone(),
            elapsed: Duration::ZERO,
            timeout: self.timeout,
            future: future.clone(),
        };
        match self.pending.entry(id) {
            Entry::Occupied(existing) => return existing.get().future.clone(),
            Entry::Vacant(vacant) => {
                vacant.insert(pending);
            }
        }

        // Disposal may have drained the table while the entry went in; evict
        // it so no awaiter outlives the correlator.
        if self.disposed.load(Ordering::Acquire) {
            if let Some((_, entry)) = self.pending.remove(&id) {
                entry.future.resolve(Err(RpcError::Disposed));
            }
            return future;
        }

        tracing::debug!(unique_id = id, "pending call registered");
        self.events.started.emit(&CallStartedEvent { request });
        future
    }

    /// Delivers a response to its pending entry.
    ///
    /// Atomically removes the entry for the response's unique id. Returns
    /// false when no entry exists; a late, duplicate, or unsolicited reply
    /// is not an error. On a match the future resolves with the response,
    /// `completed` fires, and `error_code` fires additionally when the
    /// response carries a non-zero code.
    pub fn try_reply(&self, response: M) -> bool {
        match self.settle_reply(response) {
            Some(response) => {
                self.notify_completed(response);
                true
            }
            None => false,
        }
    }

    /// Resolution half of [`Self::try_reply`]: removes the entry and
    /// resolves its future, firing nothing. Hands the response back on a
    /// match so the caller decides where [`Self::notify_completed`] runs.
    pub(crate) fn settle_reply(&self, response: M) -> Option<M> {
        debug_assert!(
            response.kind() == MessageKind::Response,
            "settle_reply expects a response message"
        );
        let id = response.unique_id();
        let (_, entry) = self.pending.remove(&id)?;
        entry.future.resolve(Ok(response.clone()));
        tracing::debug!(unique_id = id, "reply delivered");
        Some(response)
    }

    /// Notification half of [`Self::try_reply`]: fires `completed`, then
    /// `error_code` when the response carries a non-zero code.
    pub(crate) fn notify_completed(&self, response: M) {
        let code = response.error_code();
        self.events.completed.emit(&CallCompletedEvent {
            response: response.clone(),
        });
        if code != 0 {
            self.events.error_code.emit(&ResponseErrorCodeEvent { response, code });
        }
    }

    /// Advances every pending entry by `elapsed` and evicts the expired.
    ///
    /// An entry expires once its accumulated time exceeds its timeout. Each
    /// evicted entry resolves its future with [`RpcError::TimedOut`] and
    /// fires one `failed` notification.
    pub fn update(&self, elapsed: Duration) {
        if self.disposed.load(Ordering::Acquire) {
            return;
        }

        // Scan first; senders may be inserting concurrently, so eviction
        // waits until iteration completes.
        let mut expired = Vec::new();
        for mut entry in self.pending.iter_mut() {
            entry.elapsed = entry.elapsed.saturating_add(elapsed);
            if entry.elapsed > entry.timeout {
                expired.push(*entry.key());
            }
        }

        for id in expired {
            // A reply may have won the race since the scan; losing the
            // removal here is correct.
            let Some((_, entry)) = self.pending.remove(&id) else {
                continue;
            };
            let error = RpcError::TimedOut {
                timeout: entry.timeout,
            };
            entry.future.resolve(Err(error.clone()));
            tracing::warn!(unique_id = id, timeout = ?entry.timeout, "call timed out");
            self.events.failed.emit(&CallFailedEvent {
                request: entry.request,
                error,
            });
        }
    }

    /// Evicts one pending entry and fails its future with `error`, firing
    /// one `failed` notification. Returns false when the id is not pending.
    pub fn fail(&self, unique_id: u64, error: RpcError) -> bool {
        let Some((_, entry)) = self.pending.remove(&unique_id) else {
            return false;
        };
        entry.future.resolve(Err(error.clone()));
        tracing::debug!(unique_id, error = %error, "pending call failed");
        self.events.failed.emit(&CallFailedEvent {
            request: entry.request,
            error,
        });
        true
    }
}

impl<M> RpcCorrelator<M> {
    /// Future of a currently pending entry, if one exists for the id.
    pub fn pending_future(&self, unique_id: u64) -> Option<ResponseFuture<M>> {
        self.pending.get(&unique_id).map(|entry| entry.future.clone())
    }

    /// Number of currently pending entries.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Whether the correlator has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Call lifecycle notification slots.
    pub fn events(&self) -> &RpcEvents<M> {
        &self.events
    }

    /// Disposes the correlator, failing every pending future with
    /// [`RpcError::Disposed`]. No `failed` notifications fire. Idempotent;
    /// later calls are no-ops and later `call`s return pre-failed futures.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let ids: Vec<u64> = self.pending.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Some((_, entry)) = self.pending.remove(&id) {
                entry.future.resolve(Err(RpcError::Disposed));
            }
        }
        tracing::debug!("correlator disposed");
    }
}

impl<M> Drop for RpcCorrelator<M> {
    fn drop(&mut self) {
        self.dispose();
    }
}
