//! Fallible buffered channel
//!
//! The decoupled sibling of the rendezvous channel: an unbounded internal
//! queue lets producers run ahead of consumers, so `send` never suspends.
//! The price is a terminal-state protocol — the channel can *finish* or
//! *fail*, and either event travels through the same queue as the elements:
//!
//!```text
//!  send(1) send(2) fail(E)            next() next() next() next()
//!     │      │       │                  │
//!     ▼      ▼       ▼                  ▼
//!   ┌────────────────────────┐     Some(1), Some(2), Err(E), None
//!   │ 1 │ 2 │ Terminal(E) │  │
//!   └────────────────────────┘
//!```
//!
//! The first terminal event seals the queue: everything sent after it is
//! discarded, and once the buffered elements drain the termination surfaces
//! exactly once (`Err` for a failure, then `None` forever).
//!
//! Waiting consumers form an unordered set; when an element arrives the
//! channel serves the waiter with the lowest id. A terminal event with
//! waiters parked drains all of them at the transition.
mod channel;
mod state;

pub use channel::{FallibleChannel, NextFuture};

#[cfg(test)]
mod tests {
    use futures::{poll, StreamExt};

    use super::*;

    /// Elements, then the failure, then silence; the post-failure send is
    /// discarded.
    #[tokio::test]
    async fn test_failure_mid_stream() {
        let channel = FallibleChannel::new();
        channel.send(1);
        channel.send(2);
        channel.fail("boom");
        channel.send(3);

        assert_eq!(channel.next().await, Ok(Some(1)));
        assert_eq!(channel.next().await, Ok(Some(2)));
        assert_eq!(channel.next().await, Err("boom"));
        assert_eq!(channel.next().await, Ok(None));
        assert_eq!(channel.next().await, Ok(None));
    }

    /// A send resolves a parked consumer instead of buffering.
    #[tokio::test]
    async fn test_send_serves_parked_consumer() {
        let channel = FallibleChannel::<i32, &str>::new();
        let mut parked = channel.next();
        assert!(poll!(&mut parked).is_pending());

        channel.send(4);
        assert_eq!(poll!(&mut parked), std::task::Poll::Ready(Ok(Some(4))));
        assert!(channel.is_empty());
    }

    /// Finishing with waiters parked drains all of them with `None`.
    #[tokio::test]
    async fn test_finish_drains_all_waiters() {
        let channel = FallibleChannel::<i32, &str>::new();
        let mut first = channel.next();
        let mut second = channel.next();
        assert!(poll!(&mut first).is_pending());
        assert!(poll!(&mut second).is_pending());

        channel.finish();
        assert_eq!(poll!(&mut first), std::task::Poll::Ready(Ok(None)));
        assert_eq!(poll!(&mut second), std::task::Poll::Ready(Ok(None)));
        assert!(channel.is_terminated());
    }

    /// Failing with waiters parked delivers the error to every one of them.
    #[tokio::test]
    async fn test_fail_reaches_all_waiters() {
        let channel = FallibleChannel::<i32, String>::new();
        let mut first = channel.next();
        let mut second = channel.next();
        assert!(poll!(&mut first).is_pending());
        assert!(poll!(&mut second).is_pending());

        channel.fail("torn".to_string());
        assert_eq!(poll!(&mut first), std::task::Poll::Ready(Err("torn".to_string())));
        assert_eq!(poll!(&mut second), std::task::Poll::Ready(Err("torn".to_string())));
    }

    /// Terminal events are first-one-wins.
    #[tokio::test]
    async fn test_first_terminal_wins() {
        let channel = FallibleChannel::<i32, &str>::new();
        channel.finish();
        channel.fail("late");
        channel.finish();

        assert_eq!(channel.next().await, Ok(None));
    }

    /// Cancelling a parked consumer leaves later traffic intact.
    #[tokio::test]
    async fn test_cancelled_waiter_does_not_steal() {
        let channel = FallibleChannel::<i32, &str>::new();
        let mut parked = channel.next();
        assert!(poll!(&mut parked).is_pending());
        drop(parked);

        channel.send(6);
        assert_eq!(channel.len(), 1);
        assert_eq!(channel.next().await, Ok(Some(6)));
    }

    /// Stream adapter: items out, failure as `Err`, then the end.
    #[tokio::test]
    async fn test_stream_adapter() {
        let channel = FallibleChannel::new();
        channel.send(1);
        channel.send(2);
        channel.fail("boom");

        let collected: Vec<Result<i32, &str>> = channel.collect().await;
        assert_eq!(collected, [Ok(1), Ok(2), Err("boom")]);
    }
}
