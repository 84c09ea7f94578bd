//! Fan-out splitter
//!
//! Replays one upstream onto two downstream sides, lock-stepped:
//!
//!```text
//!                      ┌── rendezvous ──► side A
//!  upstream ──► driver ┤
//!   (Stream)    task   └── rendezvous ──► side B
//!```
//!
//! The driver pulls one element, then sends it to both sides concurrently
//! and awaits both — the upstream only advances once each side consumed the
//! previous element, so the slower side back-pressures the whole fan-out.
//! Both sides observe the upstream sequence in upstream order.
//!
//! Sides die independently: when the last iterator of a side drops, that
//! side's channel finishes and its sends start resolving immediately, so the
//! surviving side keeps draining at its own pace. When both sides are gone
//! the driver task is aborted and the upstream dropped.
mod shared;
mod stream;

pub use stream::SplitSide;

pub(crate) use stream::split;
