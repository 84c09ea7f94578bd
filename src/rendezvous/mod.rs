//! Back-pressured rendezvous channel
//!
//! An unbuffered meeting point between producers and consumers: every send
//! suspends until a consumer is ready to take the element, so the producer
//! can never run ahead of the consumer.
//!
//! ## How It Works
//!
//!```text
//!  send(e) ──┐                       ┌── next()
//!            ▼                       ▼
//!        ┌─────────────────────────────────┐
//!        │ Idle │ Pending(p…) │ Awaiting(c…)│   emission state (one shape
//!        └─────────────────────────────────┘   at a time, under one lock)
//!            │                       │
//!            └── matched: resume c(e), resume p(())
//!```
//!
//! - A `send` finding no consumer parks the producer (FIFO) in `Pending`.
//! - A `next` finding no producer parks the consumer (FIFO) in `Awaiting`,
//!   keyed by a generation id so cancellation can find it again.
//! - Whichever side arrives second pops the other side's queue head and both
//!   resume; deliveries across the channel happen in the order sends were
//!   offered to waiting consumers.
//!
//! ## Synchronization
//!
//! All transitions run under one mutex and return a *wake action*; handles
//! are resumed only after the lock is dropped. The futures returned by
//! [`send`](RendezvousChannel::send) and [`next`](RendezvousChannel::next)
//! de-register themselves on drop: a cancelled consumer resumes with `None`,
//! while a cancelled producer terminates the channel (its element can no
//! longer be delivered in order).
//!
//! ## Example
//!
//!```
//! use flusso::RendezvousChannel;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let channel = RendezvousChannel::new();
//!
//! let producer = channel.clone();
//! tokio::spawn(async move {
//!     producer.send("hello").await;
//!     producer.finish();
//! });
//!
//! assert_eq!(channel.next().await, Some("hello"));
//! assert_eq!(channel.next().await, None);
//! # }
//!```
mod channel;
mod state;

pub use channel::{NextFuture, RendezvousChannel, SendFuture};

#[cfg(test)]
mod tests {
    use futures::{poll, StreamExt};

    use super::*;

    /// A send meets the next pull on a fresh channel.
    #[tokio::test]
    async fn test_send_meets_next() {
        let channel = RendezvousChannel::new();
        let mut send = channel.send(7);
        assert!(poll!(&mut send).is_pending());

        assert_eq!(channel.next().await, Some(7));
        assert!(poll!(&mut send).is_ready());
    }

    /// Two producers, one consumer: four pulls see both elements of both
    /// producers, each producer's pair in order.
    #[tokio::test]
    async fn test_two_producers_fifo_per_producer() {
        let channel = RendezvousChannel::new();

        let first = channel.clone();
        let first_task = tokio::spawn(async move {
            first.send(7).await;
            first.send(9).await;
        });
        let second = channel.clone();
        let second_task = tokio::spawn(async move {
            second.send(70).await;
            second.send(90).await;
        });

        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(channel.next().await.expect("channel still live"));
        }
        first_task.await.unwrap();
        second_task.await.unwrap();

        let firsts: Vec<i32> = seen.iter().copied().filter(|v| *v < 10).collect();
        let seconds: Vec<i32> = seen.iter().copied().filter(|v| *v >= 10).collect();
        assert_eq!(firsts, [7, 9]);
        assert_eq!(seconds, [70, 90]);
    }

    /// Consumers are served in the order they parked.
    #[tokio::test]
    async fn test_consumers_fifo() {
        let channel = RendezvousChannel::new();
        let mut early = channel.next();
        let mut late = channel.next();
        assert!(poll!(&mut early).is_pending());
        assert!(poll!(&mut late).is_pending());

        channel.send(1).await;
        assert_eq!(poll!(&mut early), std::task::Poll::Ready(Some(1)));
        assert!(poll!(&mut late).is_pending());

        channel.send(2).await;
        assert_eq!(poll!(&mut late), std::task::Poll::Ready(Some(2)));
    }

    /// Termination releases both sides, is idempotent, and makes every later
    /// call immediate.
    #[tokio::test]
    async fn test_finish_is_terminal_and_idempotent() {
        let channel = RendezvousChannel::new();
        let mut parked_send = channel.send(5);
        assert!(poll!(&mut parked_send).is_pending());

        channel.finish();
        channel.finish();
        assert!(channel.is_terminated());

        // The parked producer was released, its element discarded.
        assert!(poll!(&mut parked_send).is_ready());
        // Later operations resolve immediately.
        channel.send(6).await;
        assert_eq!(channel.next().await, None);
        assert_eq!(channel.next().await, None);
    }

    /// Dropping a parked consumer cancels only that waiter.
    #[tokio::test]
    async fn test_consumer_cancellation_is_local() {
        let channel = RendezvousChannel::<i32>::new();
        let mut cancelled = channel.next();
        assert!(poll!(&mut cancelled).is_pending());
        drop(cancelled);

        // The channel is back to idle: a send parks instead of delivering
        // into the removed waiter.
        let mut send = channel.send(3);
        assert!(poll!(&mut send).is_pending());
        assert_eq!(channel.next().await, Some(3));
        send.await;
        channel.finish();
    }

    /// Dropping a parked producer terminates the whole channel.
    #[tokio::test]
    async fn test_producer_cancellation_terminates() {
        let channel = RendezvousChannel::new();
        let mut send = channel.send(8);
        assert!(poll!(&mut send).is_pending());
        drop(send);

        assert!(channel.is_terminated());
        assert_eq!(channel.next().await, None);
    }

    /// The channel is a `Stream`; a clone per consumer.
    #[tokio::test]
    async fn test_stream_adapter() {
        let channel = RendezvousChannel::new();
        let producer = channel.clone();
        tokio::spawn(async move {
            for i in 0..3 {
                producer.send(i).await;
            }
            producer.finish();
        });

        let collected: Vec<i32> = channel.collect().await;
        assert_eq!(collected, [0, 1, 2]);
    }
}
