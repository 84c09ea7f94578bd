use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;

use crate::handle::{suspension, Generation, Suspension};
use crate::region::Region;

use super::state::{ChannelState, NextAction, SendAction, Termination, TerminateAction};

struct Shared<T, E> {
    region: Region<ChannelState<T, E>>,
    generation: Generation,
}

/// Unbounded buffered channel whose stream can end with a failure.
///
/// The producer side never suspends: [`send`](FallibleChannel::send) either
/// hands the element to a parked consumer or buffers it. A terminal event
/// ([`finish`](FallibleChannel::finish) or [`fail`](FallibleChannel::fail))
/// surfaces only after every buffered element has drained; sends past the
/// first terminal event are discarded.
///
/// Clones share the same channel. As a [`Stream`] it yields
/// `Result<T, E>` items: a failure is delivered once as `Err`, after which
/// the stream is over.
pub struct FallibleChannel<T, E> {
    shared: Arc<Shared<T, E>>,
    pending: Option<NextFuture<T, E>>,
}

impl<T, E> FallibleChannel<T, E> {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                region: Region::new(ChannelState::new()),
                generation: Generation::new(),
            }),
            pending: None,
        }
    }

    /// Offers `element` without suspending. Discarded once the channel has
    /// seen a terminal event.
    pub fn send(&self, element: T) {
        let action = self.shared.region.with_region(|state| state.send(element));
        match action {
            SendAction::Deliver { consumer, element } => consumer.resume(Ok(Some(element))),
            SendAction::Enqueued => {}
            SendAction::Ignored(element) => drop(element),
        }
    }

    /// Marks the channel finished. Buffered elements still drain; later
    /// terminal events are ignored.
    pub fn finish(&self) {
        let action = self
            .shared
            .region
            .with_region(|state| state.terminate(Termination::Finished));
        match action {
            TerminateAction::Resume { waiters, .. } => {
                for waiter in waiters {
                    waiter.resume(Ok(None));
                }
            }
            TerminateAction::Buffered | TerminateAction::Done => {}
            TerminateAction::Ignored(termination) => drop(termination),
        }
    }

    /// Pulls the next event: `Ok(Some(e))`, then on termination `Ok(None)`,
    /// or `Err(e)` once for a failed channel.
    pub fn next(&self) -> NextFuture<T, E> {
        NextFuture {
            shared: self.shared.clone(),
            id: self.shared.generation.advance(),
            suspension: None,
            parked: false,
            done: false,
        }
    }

    /// Buffered element count.
    pub fn len(&self) -> usize {
        self.shared.region.with_region(|state| state.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_terminated(&self) -> bool {
        self.shared.region.with_region(|state| state.is_terminated())
    }
}

impl<T, E: Clone> FallibleChannel<T, E> {
    /// Fails the channel. Parked consumers all observe the error (hence
    /// `E: Clone`); with buffered elements present the error surfaces after
    /// they drain. Ignored after the first terminal event.
    pub fn fail(&self, error: E) {
        let action = self
            .shared
            .region
            .with_region(|state| state.terminate(Termination::Failure(error)));
        match action {
            TerminateAction::Resume { mut waiters, termination } => {
                let error = match termination {
                    Termination::Failure(error) => error,
                    Termination::Finished => unreachable!("failure transition without an error"),
                };
                let last = waiters.pop();
                for waiter in waiters {
                    waiter.resume(Err(error.clone()));
                }
                if let Some(waiter) = last {
                    waiter.resume(Err(error));
                }
            }
            TerminateAction::Buffered | TerminateAction::Done => {}
            TerminateAction::Ignored(termination) => drop(termination),
        }
    }
}

impl<T, E> Default for FallibleChannel<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Clone for FallibleChannel<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            pending: None,
        }
    }
}

impl<T, E> Stream for FallibleChannel<T, E> {
    type Item = Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<T, E>>> {
        let this = self.get_mut();
        let pull = this.pending.get_or_insert_with(|| NextFuture {
            shared: this.shared.clone(),
            id: this.shared.generation.advance(),
            suspension: None,
            parked: false,
            done: false,
        });
        match Pin::new(pull).poll(cx) {
            Poll::Ready(outcome) => {
                this.pending = None;
                match outcome {
                    Ok(Some(element)) => Poll::Ready(Some(Ok(element))),
                    Ok(None) => Poll::Ready(None),
                    Err(error) => Poll::Ready(Some(Err(error))),
                }
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Future returned by [`FallibleChannel::next`].
#[must_use = "futures do nothing unless polled"]
pub struct NextFuture<T, E> {
    shared: Arc<Shared<T, E>>,
    id: u64,
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
            let (handle, suspension) = suspension();
            let action = this
                .shared
                .region
                .with_region(|state| state.next(this.id, handle));
            match action {
                NextAction::Parked => this.parked = true,
                NextAction::Resume { consumer, outcome } => consumer.resume(outcome),
            }
            this.suspension = Some(suspension);
        }
        let suspension = this.suspension.as_mut().expect("suspension installed above");
        match Pin::new(suspension).poll(cx) {
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
        let waiter = self
            .shared
            .region
            .with_region(|state| state.cancel_next(self.id));
        if let Some(handle) = waiter {
            handle.resume(Ok(None));
        }
    }
}
