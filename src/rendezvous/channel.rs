use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;

use crate::handle::{suspension, Generation, Suspension};
use crate::region::Region;

use super::state::{CancelAction, Emission, FinishAction, NextAction, SendAction};

struct Shared<T> {
    region: Region<Emission<T>>,
    generation: Generation,
}

/// Back-pressured rendezvous channel.
///
/// Unbuffered: every [`send`](RendezvousChannel::send) suspends until a
/// consumer takes the element or the channel terminates. Clones share the
/// same channel; any clone may send, receive, or finish. The channel itself
/// implements [`Stream`], so a clone per consumer is the iterator adapter.
pub struct RendezvousChannel<T> {
    shared: Arc<Shared<T>>,
    /// In-flight pull owned by this clone's `Stream` identity.
    pending: Option<NextFuture<T>>,
}

impl<T> RendezvousChannel<T> {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                region: Region::new(Emission::new()),
                generation: Generation::new(),
            }),
            pending: None,
        }
    }

    /// Offers `element` to the channel.
    ///
    /// The returned future resolves once a consumer has taken the element,
    /// or immediately (discarding the element) once the channel is terminal.
    /// Dropping the future while it is parked terminates the channel:
    /// producer cancellation is channel termination.
    pub fn send(&self, element: T) -> SendFuture<T> {
        SendFuture {
            shared: self.shared.clone(),
            element: Some(element),
            suspension: None,
            parked: false,
            done: false,
        }
    }

    /// Pulls the next element.
    ///
    /// Resolves with `Some(element)` once a producer hands one over, or
    /// `None` once the channel is terminal. Dropping the future while it is
    /// parked cancels just this waiter.
    pub fn next(&self) -> NextFuture<T> {
        NextFuture {
            shared: self.shared.clone(),
            id: self.shared.generation.advance(),
            suspension: None,
            parked: false,
            done: false,
        }
    }

    /// Terminates the channel: every parked producer resumes with its
    /// element discarded and every parked consumer resumes with `None`.
    /// Idempotent.
    pub fn finish(&self) {
        finish(&self.shared);
    }

    pub fn is_terminated(&self) -> bool {
        self.shared.region.with_region(|emission| emission.is_terminal())
    }
}

impl<T> Default for RendezvousChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for RendezvousChannel<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            pending: None,
        }
    }
}

impl<T> Stream for RendezvousChannel<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let this = self.get_mut();
        let pull = this.pending.get_or_insert_with(|| NextFuture {
            shared: this.shared.clone(),
            id: this.shared.generation.advance(),
            suspension: None,
            parked: false,
            done: false,
        });
        match Pin::new(pull).poll(cx) {
            Poll::Ready(element) => {
                this.pending = None;
                Poll::Ready(element)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

fn finish<T>(shared: &Shared<T>) {
    let FinishAction { producers, consumers } = shared.region.with_region(|emission| emission.finish());
    for producer in producers {
        producer.resume(Ok(()));
    }
    for consumer in consumers {
        consumer.resume(Ok(None));
    }
}

/// Future returned by [`RendezvousChannel::send`].
#[must_use = "futures do nothing unless polled"]
pub struct SendFuture<T> {
    shared: Arc<Shared<T>>,
    element: Option<T>,
    suspension: Option<Suspension<()>>,
    parked: bool,
    done: bool,
}

/// Safe: the struct is not self-referential, no field points into another
/// field of the same struct.
impl<T> Unpin for SendFuture<T> {}

impl<T> Future for SendFuture<T> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        assert!(!this.done, "send future polled after completion");
        if this.suspension.is_none() {
            let element = this.element.take().expect("send future without an element");
            let (handle, suspension) = suspension();
            let action = this
                .shared
                .region
                .with_region(|emission| emission.send(element, handle));
            match action {
                SendAction::Parked => this.parked = true,
                SendAction::Deliver { consumer, element, producer } => {
                    consumer.resume(Ok(Some(element)));
                    producer.resume(Ok(()));
                }
                SendAction::Dropped { producer } => producer.resume(Ok(())),
            }
            this.suspension = Some(suspension);
        }
        let suspension = this.suspension.as_mut().expect("suspension installed above");
        match Pin::new(suspension).poll(cx) {
            Poll::Ready(Ok(())) => {
                this.done = true;
                Poll::Ready(())
            }
            Poll::Ready(Err(infallible)) => match infallible {},
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> Drop for SendFuture<T> {
    fn drop(&mut self) {
        if self.done || !self.parked {
            return;
        }
        let resolved = self.suspension.as_ref().is_some_and(Suspension::is_resolved);
        if !resolved {
            // The element is still parked in the channel; cancelling the
            // producer terminates the channel and releases every waiter.
            finish(&self.shared);
        }
    }
}

/// Future returned by [`RendezvousChannel::next`].
#[must_use = "futures do nothing unless polled"]
pub struct NextFuture<T> {
    shared: Arc<Shared<T>>,
    id: u64,
    suspension: Option<Suspension<Option<T>>>,
    parked: bool,
    done: bool,
}

/// Safe: the struct is not self-referential, no field points into another
/// field of the same struct.
impl<T> Unpin for NextFuture<T> {}

impl<T> Future for NextFuture<T> {
    type Output = Option<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let this = self.get_mut();
        assert!(!this.done, "next future polled after completion");
        if this.suspension.is_none() {
            let (handle, suspension) = suspension();
            let action = this
                .shared
                .region
                .with_region(|emission| emission.next(this.id, handle));
            match action {
                NextAction::Parked => this.parked = true,
                NextAction::Deliver { element, producer, consumer } => {
                    producer.resume(Ok(()));
                    consumer.resume(Ok(Some(element)));
                }
                NextAction::Terminated { consumer } | NextAction::Cancelled { consumer } => {
                    consumer.resume(Ok(None));
                }
            }
            this.suspension = Some(suspension);
        }
        let suspension = this.suspension.as_mut().expect("suspension installed above");
        match Pin::new(suspension).poll(cx) {
            Poll::Ready(Ok(element)) => {
                this.done = true;
                Poll::Ready(element)
            }
            Poll::Ready(Err(infallible)) => match infallible {},
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> Drop for NextFuture<T> {
    fn drop(&mut self) {
        if self.done || !self.parked {
            return;
        }
        if self.suspension.as_ref().is_some_and(Suspension::is_resolved) {
            // Lost the race: a producer already resumed this waiter. The
            // element is discarded with the suspension.
            return;
        }
        let action = self
            .shared
            .region
            .with_region(|emission| emission.cancel_next(self.id));
        if let CancelAction::Resume(handle) = action {
            handle.resume(Ok(None));
        }
    }
}
