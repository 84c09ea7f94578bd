use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::handle::{suspension, Handle, Suspension};
use crate::region::Region;

use super::queued::{QueuedBuffer, QueuePolicy};
use super::suspending::SuspendingBuffer;
use super::BufferPolicy;

/// Deferred resumptions computed by a buffer transition, executed by the
/// caller once the region lock is dropped.
pub(super) enum Wake<T, E> {
    None,
    Producer(Handle<()>),
    Consumer {
        consumer: Handle<Option<T>, E>,
        outcome: Result<Option<T>, E>,
    },
    Both {
        producer: Handle<()>,
        consumer: Handle<Option<T>, E>,
        outcome: Result<Option<T>, E>,
    },
}

impl<T, E> Wake<T, E> {
    pub(super) fn run(self) {
        match self {
            Wake::None => {}
            Wake::Producer(producer) => producer.resume(Ok(())),
            Wake::Consumer { consumer, outcome } => consumer.resume(outcome),
            Wake::Both { producer, consumer, outcome } => {
                consumer.resume(outcome);
                producer.resume(Ok(()));
            }
        }
    }
}

enum Machine<T, E> {
    Suspending(SuspendingBuffer<T, E>),
    Queued(QueuedBuffer<T, E>),
}

impl<T, E> Machine<T, E> {
    fn new_element(&mut self, element: T, producer: Handle<()>) -> Wake<T, E> {
        match self {
            Machine::Suspending(buffer) => buffer.new_element(element, producer),
            Machine::Queued(buffer) => {
                // The queued producer never parks: fold its unconditional
                // wake into whatever the transition produced.
                match buffer.new_element(element) {
                    Wake::None => Wake::Producer(producer),
                    Wake::Consumer { consumer, outcome } => Wake::Both { producer, consumer, outcome },
                    Wake::Producer(_) | Wake::Both { .. } => {
                        unreachable!("queued buffer produced a producer wake")
                    }
                }
            }
        }
    }

    fn new_iterator(&mut self, consumer: Handle<Option<T>, E>) -> Wake<T, E> {
        match self {
            Machine::Suspending(buffer) => buffer.new_iterator(consumer),
            Machine::Queued(buffer) => buffer.new_iterator(consumer),
        }
    }

    fn finish(&mut self) -> Wake<T, E> {
        match self {
            Machine::Suspending(buffer) => buffer.finish(),
            Machine::Queued(buffer) => buffer.finish(),
        }
    }

    fn fail(&mut self, error: E) -> Wake<T, E> {
        match self {
            Machine::Suspending(buffer) => buffer.fail(error),
            Machine::Queued(buffer) => buffer.fail(error),
        }
    }

    fn cancel_up(&mut self) -> Wake<T, E> {
        match self {
            Machine::Suspending(buffer) => buffer.cancel_up(),
            Machine::Queued(buffer) => buffer.cancel_up(),
        }
    }

    fn cancel_down(&mut self) -> Wake<T, E> {
        match self {
            Machine::Suspending(buffer) => buffer.cancel_down(),
            Machine::Queued(buffer) => buffer.cancel_down(),
        }
    }
}

/// Shared storage driving a buffer state machine under one region lock.
///
/// Cloned into the drainer task and the consuming stream; all transitions
/// follow the lock-then-wake discipline.
pub(super) struct Storage<T, E> {
    inner: Arc<Region<Machine<T, E>>>,
}

impl<T, E> Clone for Storage<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, E> Storage<T, E> {
    pub(super) fn new(policy: BufferPolicy) -> Self {
        let machine = match policy {
            BufferPolicy::Bounded(limit) => Machine::Suspending(SuspendingBuffer::new(limit)),
            BufferPolicy::Unbounded => Machine::Queued(QueuedBuffer::new(QueuePolicy::Unbounded)),
            BufferPolicy::DropOldest(limit) => {
                Machine::Queued(QueuedBuffer::new(QueuePolicy::DropOldest(limit)))
            }
            BufferPolicy::DropNewest(limit) => {
                Machine::Queued(QueuedBuffer::new(QueuePolicy::DropNewest(limit)))
            }
        };
        Self {
            inner: Arc::new(Region::new(machine)),
        }
    }

    /// Offers one upstream element. Suspends only for a full
    /// [`BufferPolicy::Bounded`] buffer; dropping the future while parked
    /// cancels the upstream side.
    pub(super) fn send(&self, element: T) -> SendFuture<T, E> {
        SendFuture {
            storage: self.clone(),
            element: Some(element),
            suspension: None,
            parked: false,
            done: false,
        }
    }

    /// Pulls the next downstream event. Dropping the future while parked
    /// cancels the downstream side.
    pub(super) fn next(&self) -> NextFuture<T, E> {
        NextFuture {
            storage: self.clone(),
            suspension: None,
            parked: false,
            done: false,
        }
    }

    pub(super) fn finish(&self) {
        self.inner.with_region(Machine::finish).run();
    }

    pub(super) fn fail(&self, error: E) {
        self.inner.with_region(|machine| machine.fail(error)).run();
    }

    pub(super) fn cancel_up(&self) {
        self.inner.with_region(Machine::cancel_up).run();
    }

    pub(super) fn cancel_down(&self) {
        self.inner.with_region(Machine::cancel_down).run();
    }
}

/// Future returned by [`Storage::send`].
#[must_use = "futures do nothing unless polled"]
pub(super) struct SendFuture<T, E> {
    storage: Storage<T, E>,
    element: Option<T>,
    suspension: Option<Suspension<()>>,
    parked: bool,
    done: bool,
}

/// Safe: the struct is not self-referential, no field points into another
/// field of the same struct.
impl<T, E> Unpin for SendFuture<T, E> {}

impl<T, E> Future for SendFuture<T, E> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        assert!(!this.done, "send future polled after completion");
        if this.suspension.is_none() {
            let element = this.element.take().expect("send future without an element");
            let (producer, suspension) = suspension();
            let wake = this
                .storage
                .inner
                .with_region(|machine| machine.new_element(element, producer));
            this.parked = matches!(wake, Wake::None);
            wake.run();
            this.suspension = Some(suspension);
        }
        let pending = this.suspension.as_mut().expect("suspension installed above");
        match Pin::new(pending).poll(cx) {
            Poll::Ready(Ok(())) => {
                this.done = true;
                Poll::Ready(())
            }
            Poll::Ready(Err(infallible)) => match infallible {},
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T, E> Drop for SendFuture<T, E> {
    fn drop(&mut self) {
        if self.done || !self.parked {
            return;
        }
        if self.suspension.as_ref().is_some_and(Suspension::is_resolved) {
            return;
        }
        self.storage.cancel_up();
    }
}

/// Future returned by [`Storage::next`].
#[must_use = "futures do nothing unless polled"]
pub(super) struct NextFuture<T, E> {
    storage: Storage<T, E>,
    suspension: Option<Suspension<Option<T>, E>>,
    parked: bool,
    done: bool,
}

/// Safe: the struct is not self-referential, no field points into another
/// field of the same struct.
impl<T, E> Unpin for NextFuture<T, E> {}

impl<T, E> Future for NextFuture<T, E> {
    type Output = Result<Option<T>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        assert!(!this.done, "next future polled after completion");
        if this.suspension.is_none() {
            let (consumer, suspension) = suspension();
            let wake = this
                .storage
                .inner
                .with_region(|machine| machine.new_iterator(consumer));
            this.parked = matches!(wake, Wake::None);
            wake.run();
            this.suspension = Some(suspension);
        }
        let pending = this.suspension.as_mut().expect("suspension installed above");
        match Pin::new(pending).poll(cx) {
            Poll::Ready(outcome) => {
                this.done = true;
                Poll::Ready(outcome)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T, E> Drop for NextFuture<T, E> {
    fn drop(&mut self) {
        if self.done || !self.parked {
            return;
        }
        if self.suspension.as_ref().is_some_and(Suspension::is_resolved) {
            return;
        }
        self.storage.cancel_down();
    }
}
