use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use crossbeam_utils::CachePadded;

/// Creates a linked [`Handle`]/[`Suspension`] pair.
///
/// The `Handle` goes into a state machine; the `Suspension` is awaited by the
/// task that parked. Resuming the handle delivers the outcome and wakes the
/// suspension exactly once.
pub(crate) fn suspension<T, E>() -> (Handle<T, E>, Suspension<T, E>) {
    let slot = Arc::new(Mutex::new(Slot {
        outcome: None,
        waker: None,
    }));
    let handle = Handle {
        slot: Some(slot.clone()),
    };
    (handle, Suspension { slot })
}

struct Slot<T, E> {
    outcome: Option<Result<T, E>>,
    waker: Option<Waker>,
}

/// One-shot delivery slot: the resuming half of a suspension.
///
/// A handle is owned by exactly one state machine at a time and leaves it
/// only at the moment it is resumed. It must never be dropped unresumed; the
/// state machines uphold this by construction and a debug assertion backs
/// them up.
pub(crate) struct Handle<T, E = Infallible> {
    slot: Option<Arc<Mutex<Slot<T, E>>>>,
}

impl<T, E> Handle<T, E> {
    /// Delivers `outcome` to the waiting side and wakes it.
    ///
    /// The waker is invoked after the slot lock is released.
    pub(crate) fn resume(mut self, outcome: Result<T, E>) {
        let slot = self.slot.take().expect("handle resumed twice");
        let waker = {
            let mut slot = slot.lock().expect("suspension slot poisoned");
            debug_assert!(slot.outcome.is_none(), "suspension resumed twice");
            slot.outcome = Some(outcome);
            slot.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl<T, E> Drop for Handle<T, E> {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            debug_assert!(self.slot.is_none(), "suspension handle dropped without being resumed");
        }
    }
}

/// The awaiting half of a suspension. Resolves once the paired [`Handle`] is
/// resumed.
#[must_use = "futures do nothing unless polled"]
pub(crate) struct Suspension<T, E = Infallible> {
    slot: Arc<Mutex<Slot<T, E>>>,
}

impl<T, E> Suspension<T, E> {
    /// Whether the paired handle has already delivered an outcome.
    ///
    /// Used by drop-driven cancellation to tell a pending park from a lost
    /// race against a concurrent resume.
    pub(crate) fn is_resolved(&self) -> bool {
        self.slot.lock().expect("suspension slot poisoned").outcome.is_some()
    }
}

impl<T, E> Future for Suspension<T, E> {
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.slot.lock().expect("suspension slot poisoned");
        match slot.outcome.take() {
            Some(outcome) => Poll::Ready(outcome),
            None => {
                // Last poll wins; a suspension has a single awaiting task.
                slot.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

/// Wrapping 64-bit counter handing out waiter identities.
///
/// An id is unique over the lifetime of any currently-pending waiter of one
/// channel; wraparound is fine at that horizon.
pub(crate) struct Generation(CachePadded<AtomicU64>);

impl Generation {
    pub(crate) fn new() -> Self {
        Self(CachePadded::new(AtomicU64::new(0)))
    }

    pub(crate) fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}
