//! Buffered stream operator
//!
//! Decouples an upstream producer from a downstream consumer through a
//! bounded queue with an explicit overflow contract:
//!
//!```text
//!               ┌───────────────────────────┐
//!  upstream ──► │ drainer task │  buffer    │ ──► downstream
//!  (Stream)     │  (spawned    │  state     │     (Stream)
//!               │   once)      │  machine   │
//!               └───────────────────────────┘
//!```
//!
//! | Policy | Full buffer behaviour |
//! |--------|-----------------------|
//! | [`Bounded(n)`](BufferPolicy::Bounded) | producer suspends (back-pressure) |
//! | [`Unbounded`](BufferPolicy::Unbounded) | grows, never drops |
//! | [`DropOldest(n)`](BufferPolicy::DropOldest) | oldest buffered element evicted |
//! | [`DropNewest(n)`](BufferPolicy::DropNewest) | incoming element discarded |
//!
//! The drainer task is spawned on the first downstream poll and drives the
//! upstream to completion: elements go through `send`, the end through
//! `finish`, an upstream error through `fail`. Termination is graceful on
//! the downstream side — buffered elements drain first, then the error (if
//! any) surfaces once, then the stream ends.
//!
//! Dropping the downstream stream cancels the cascade: the buffer finishes,
//! the drainer is aborted, and the aborted drainer's in-flight send releases
//! the upstream side.
mod queued;
mod storage;
mod stream;
mod suspending;

pub use stream::BufferStream;

/// Buffering contract of a [`BufferStream`].
///
/// Limits must be positive; a zero limit is a programming error and panics
/// at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferPolicy {
    /// Bounded queue; the producer suspends while it is full.
    Bounded(usize),
    /// Unbounded queue; the producer never suspends and nothing is dropped.
    Unbounded,
    /// Bounded queue; the oldest buffered element is evicted to admit a new
    /// one.
    DropOldest(usize),
    /// Bounded queue; the incoming element is discarded while it is full.
    DropNewest(usize),
}
