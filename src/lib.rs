//! Composable async stream primitives
//!
//! A small kit for moving values between concurrently executing producers
//! and consumers, with explicit suspension, back-pressure, and cancellation
//! semantics. Every primitive is the same machine underneath: a
//! lock-protected state enum whose transitions return the set of suspended
//! tasks to wake, executed only after the lock is dropped.
//!
//! | Primitive | Producer | Overflow |
//! |-----------|----------|----------|
//! | [`RendezvousChannel`] | suspends until matched | none (unbuffered) |
//! | [`FallibleChannel`] | never suspends | unbounded queue |
//! | [`FlussoStreamExt::buffer`] | per [`BufferPolicy`] | bounded / drop |
//! | [`FlussoStreamExt::split`] | lock-stepped fan-out | none (rendezvous) |
//!
//! Cancellation is drop-driven throughout: dropping an in-flight future (or
//! a consuming stream) de-registers its waiter and cascades — a dropped
//! buffered stream aborts its drainer task, which releases the upstream.
//!
//! ## Example
//!
//!```
//! use flusso::{BufferPolicy, FlussoStreamExt};
//! use futures::{stream, StreamExt, TryStreamExt};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! // Decouple a bursty source from its consumer.
//! let source = stream::iter(1..=5).map(Ok::<_, std::convert::Infallible>);
//! let buffered: Vec<i32> = source
//!     .buffer(BufferPolicy::Unbounded)
//!     .try_collect()
//!     .await
//!     .unwrap();
//! assert_eq!(buffered, [1, 2, 3, 4, 5]);
//!
//! // Fan one stream out to two lock-stepped consumers.
//! let (left, right) = FlussoStreamExt::split(stream::iter(0..3));
//! let pairs: Vec<(i32, i32)> = left.zip(right).collect().await;
//! assert_eq!(pairs, [(0, 0), (1, 1), (2, 2)]);
//! # }
//!```
//!
//! The channels build on `futures` alone; the `buffer` and `split`
//! operators spawn tasks and are gated behind the default `task` feature
//! (tokio).
pub mod fallible;
pub mod rendezvous;

#[cfg(feature = "task")]
pub mod buffer;
#[cfg(feature = "task")]
mod ext;
#[cfg(feature = "task")]
pub mod split;

mod handle;
mod region;

pub use fallible::FallibleChannel;
pub use rendezvous::RendezvousChannel;

#[cfg(feature = "task")]
pub use buffer::{BufferPolicy, BufferStream};
#[cfg(feature = "task")]
pub use ext::FlussoStreamExt;
#[cfg(feature = "task")]
pub use split::SplitSide;
