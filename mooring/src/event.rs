//! Guarded subscriber lists.
//!
//! Notifications are explicit objects rather than multicast delegates: each
//! one is an [`EventSlot`] holding callbacks invoked in registration order
//! and removable by the [`CallbackId`] returned at subscribe time.
//!
//! # Design
//!
//! Callbacks are snapshotted before invocation, so subscriber code never runs
//! under the list lock and may re-enter `subscribe`/`unsubscribe` freely. A
//! panicking subscriber is caught and logged; bookkeeping that triggered the
//! notification has already completed and later subscribers still run.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Handle identifying one registered callback within one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Ordered, panic-guarded list of subscribers for one notification.
pub struct EventSlot<E> {
    name: &'static str,
    next_id: AtomicU64,
    entries: Mutex<Vec<(CallbackId, Callback<E>)>>,
}

impl<E> EventSlot<E> {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            next_id: AtomicU64::new(1),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Registers a callback, returning the handle that removes it.
    pub fn subscribe<F>(&self, callback: F) -> CallbackId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = CallbackId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.lock().push((id, Arc::new(callback)));
        id
    }

    /// Removes a previously registered callback. Returns false if the handle
    /// is unknown (already removed or from another slot).
    pub fn unsubscribe(&self, id: CallbackId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        entries.len() != before
    }

    /// Number of currently registered callbacks.
    pub fn subscriber_count(&self) -> usize {
        self.entries.lock().len()
    }

    /// Invokes every subscriber in registration order.
    pub(crate) fn emit(&self, event: &E) {
        let snapshot: Vec<Callback<E>> = {
            let entries = self.entries.lock();
            entries.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };
        for callback in snapshot {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback(event))) {
                tracing::error!(
                    notification = self.name,
                    panic = panic_message(payload.as_ref()),
                    "subscriber panicked; continuing with remaining subscribers"
                );
            }
        }
    }

    /// Drops every subscriber.
    pub(crate) fn clear(&self) {
        self.entries.lock().clear();
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
