//! Awaitable result handle for an in-flight call.
//!
//! A [`ResponseFuture`] is resolved exactly once by whichever terminal path
//! wins: reply delivery, the timeout sweep, or disposal. Resolution may
//! happen on any thread; wakers registered by pending polls are all woken.
//!
//! # Design
//!
//! The state machine has two states: `Pending` holds the wakers, `Ready`
//! holds the terminal value. Hosts driving a plain tick loop without
//! an executor can poll through [`ResponseFuture::try_result`] instead of
//! awaiting.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;

use super::error::RpcError;

/// Outcome type carried by [`ResponseFuture`].
pub type RpcResult<M> = Result<M, RpcError>;

enum FutureState<M> {
    Pending { wakers: Vec<Waker> },
    Ready(RpcResult<M>),
}

/// Cloneable handle to the eventual outcome of one call.
///
/// All clones share the same state; the first resolution wins and later
/// attempts are ignored.
pub struct ResponseFuture<M> {
    state: Arc<Mutex<FutureState<M>>>,
}

impl<M> Clone for ResponseFuture<M> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<M> ResponseFuture<M> {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FutureState::Pending { wakers: Vec::new() })),
        }
    }

    /// Delivers the terminal value, waking every registered poller. Returns
    /// false when the future was already resolved; the attempt is ignored.
    pub(crate) fn resolve(&self, result: RpcResult<M>) -> bool {
        let wakers = {
            let mut state = self.state.lock();
            match &mut *state {
                FutureState::Pending { wakers } => {
                    let wakers = std::mem::take(wakers);
                    *state = FutureState::Ready(result);
                    wakers
                }
                FutureState::Ready(_) => return false,
            }
        };
        for waker in wakers {
            waker.wake();
        }
        true
    }

    /// Whether a terminal value has been delivered.
    pub fn is_resolved(&self) -> bool {
        matches!(&*self.state.lock(), FutureState::Ready(_))
    }

    /// True when both handles track the same call.
    pub fn same_call(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl<M: Clone> ResponseFuture<M> {
    /// Terminal value, if resolution has happened yet.
    pub fn try_result(&self) -> Option<RpcResult<M>> {
        match &*self.state.lock() {
            FutureState::Ready(result) => Some(result.clone()),
            FutureState::Pending { .. } => None,
        }
    }
}

impl<M: Clone> Future for ResponseFuture<M> {
    type Output = RpcResult<M>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.state.lock();
        match &mut *state {
            FutureState::Ready(result) => Poll::Ready(result.clone()),
            FutureState::Pending { wakers } => {
                if !wakers.iter().any(|w| w.will_wake(cx.waker())) {
                    wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}
