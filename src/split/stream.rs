use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;

use crate::rendezvous::NextFuture;

use super::shared::{Side, Splitter};

/// One downstream side of a [`split`](crate::FlussoStreamExt::split)
/// upstream.
///
/// Cloning yields another iterator on the *same* side, sharing that side's
/// channel: each element of the side goes to exactly one of its iterators.
/// Dropping the last iterator of a side finishes the side; dropping the
/// last iterator overall cancels the upstream driver.
pub struct SplitSide<S: Stream> {
    splitter: Arc<Splitter<S>>,
    side: Side,
    id: u64,
    pending: Option<NextFuture<S::Item>>,
}

/// Splits `upstream` into two sides that each observe the full element
/// sequence in upstream order, advancing the upstream in lock-step.
pub(crate) fn split<S: Stream>(upstream: S) -> (SplitSide<S>, SplitSide<S>) {
    let splitter = Arc::new(Splitter::new(upstream));
    let left = SplitSide {
        id: splitter.register(Side::Left),
        splitter: splitter.clone(),
        side: Side::Left,
        pending: None,
    };
    let right = SplitSide {
        id: splitter.register(Side::Right),
        splitter,
        side: Side::Right,
        pending: None,
    };
    (left, right)
}

impl<S: Stream> Clone for SplitSide<S> {
    fn clone(&self) -> Self {
        Self {
            id: self.splitter.register(self.side),
            splitter: self.splitter.clone(),
            side: self.side,
            pending: None,
        }
    }
}

impl<S: Stream> Drop for SplitSide<S> {
    fn drop(&mut self) {
        // Release a parked pull before the side bookkeeping runs.
        self.pending = None;
        self.splitter.deregister(self.side, self.id);
    }
}

impl<S> Stream for SplitSide<S>
where
    S: Stream + Send + 'static,
    S::Item: Clone + Send + 'static,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        this.splitter.ensure_driver();
        let pull = this
            .pending
            .get_or_insert_with(|| this.splitter.channel(this.side).next());
        match Pin::new(pull).poll(cx) {
            Poll::Ready(element) => {
                this.pending = None;
                Poll::Ready(element)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
