use futures::{Stream, StreamExt};

use crate::buffer::{BufferPolicy, BufferStream};
use crate::split::SplitSide;

/// Combinator surface of this crate, blanket-implemented for every
/// [`Stream`].
pub trait FlussoStreamExt: Stream {
    /// Decouples this stream from its consumer through a buffer with the
    /// given policy. See [`BufferPolicy`] for the overflow contract.
    ///
    /// The upstream is driven by a background task spawned on first poll,
    /// so the result must be polled inside a tokio runtime.
    fn buffer<T, E>(self, policy: BufferPolicy) -> BufferStream<Self, T, E>
    where
        Self: Stream<Item = Result<T, E>> + Sized,
    {
        BufferStream::new(self, policy)
    }

    /// Splits this stream into two sides that each observe every element in
    /// order, advancing the upstream in lock-step with the slower side.
    fn split(self) -> (SplitSide<Self>, SplitSide<Self>)
    where
        Self: Sized,
        Self::Item: Clone,
    {
        crate::split::split(self)
    }

    /// Splits a stream of pairs into a stream of the first components and a
    /// stream of the second components.
    ///
    /// Built from [`split`](FlussoStreamExt::split) plus projections; named
    /// apart from [`StreamExt::unzip`], which collects instead.
    fn unzip_split<A, B>(self) -> (impl Stream<Item = A>, impl Stream<Item = B>)
    where
        Self: Stream<Item = (A, B)> + Sized + Send + 'static,
        A: Clone + Send + 'static,
        B: Clone + Send + 'static,
    {
        let (left, right) = crate::split::split(self);
        (left.map(|(a, _)| a), right.map(|(_, b)| b))
    }
}

impl<S: Stream> FlussoStreamExt for S {}
