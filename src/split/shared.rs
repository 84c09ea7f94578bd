use std::pin::Pin;

use futures::{future, Stream, StreamExt};
use tokio::task::JoinHandle;

use crate::handle::Generation;
use crate::region::Region;
use crate::rendezvous::RendezvousChannel;

#[derive(Clone, Copy, PartialEq, Eq)]
pub(super) enum Side {
    Left,
    Right,
}

/// Upstream driver slot: the upstream stream until the driver task spawns,
/// the task handle afterwards. Taking the upstream is the spawn-once guard.
struct Driver<S> {
    upstream: Option<Pin<Box<S>>>,
    task: Option<JoinHandle<()>>,
}

/// Live iterator ids per side. A side whose set empties finishes its
/// channel; once both are empty the driver is cancelled.
struct Children {
    left: Vec<u64>,
    right: Vec<u64>,
}

enum Cleanup {
    None,
    FinishSide,
    FinishSideAndAbort,
}

/// Core of the fan-out splitter: one upstream replayed, in lock-step, onto
/// two rendezvous channels.
///
/// The driver task advances the upstream exactly once per element and only
/// after *both* sides consumed the previous one: each pull amplifies into
/// two sends awaited together. A finished side's sends resolve immediately
/// without delivery, so the other side keeps draining.
pub(super) struct Splitter<S: Stream> {
    driver: Region<Driver<S>>,
    children: Region<Children>,
    generation: Generation,
    left: RendezvousChannel<S::Item>,
    right: RendezvousChannel<S::Item>,
}

impl<S: Stream> Splitter<S> {
    pub(super) fn new(upstream: S) -> Self {
        Self {
            driver: Region::new(Driver {
                upstream: Some(Box::pin(upstream)),
                task: None,
            }),
            children: Region::new(Children {
                left: Vec::new(),
                right: Vec::new(),
            }),
            generation: Generation::new(),
            left: RendezvousChannel::new(),
            right: RendezvousChannel::new(),
        }
    }

    pub(super) fn channel(&self, side: Side) -> &RendezvousChannel<S::Item> {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub(super) fn register(&self, side: Side) -> u64 {
        let id = self.generation.advance();
        self.children.with_region(|children| {
            match side {
                Side::Left => children.left.push(id),
                Side::Right => children.right.push(id),
            }
        });
        id
    }

    pub(super) fn deregister(&self, side: Side, id: u64) {
        let cleanup = self.children.with_region(|children| {
            let own = match side {
                Side::Left => &mut children.left,
                Side::Right => &mut children.right,
            };
            let Some(found) = own.iter().position(|child| *child == id) else {
                return Cleanup::None;
            };
            own.swap_remove(found);
            if !own.is_empty() {
                return Cleanup::None;
            }
            let other_empty = match side {
                Side::Left => children.right.is_empty(),
                Side::Right => children.left.is_empty(),
            };
            if other_empty {
                Cleanup::FinishSideAndAbort
            } else {
                Cleanup::FinishSide
            }
        });
        match cleanup {
            Cleanup::None => {}
            Cleanup::FinishSide => self.channel(side).finish(),
            Cleanup::FinishSideAndAbort => {
                self.channel(side).finish();
                let task = self.driver.with_region(|driver| driver.task.take());
                if let Some(task) = task {
                    tracing::trace!("both split sides gone; aborting driver");
                    task.abort();
                }
            }
        }
    }
}

impl<S> Splitter<S>
where
    S: Stream + Send + 'static,
    S::Item: Clone + Send + 'static,
{
    /// Spawns the driver task on the first pull from either side.
    pub(super) fn ensure_driver(&self) {
        let upstream = self.driver.with_region(|driver| driver.upstream.take());
        if let Some(upstream) = upstream {
            let task = tokio::spawn(drive(upstream, self.left.clone(), self.right.clone()));
            self.driver.with_region(|driver| driver.task = Some(task));
        }
    }
}

async fn drive<S>(
    mut upstream: Pin<Box<S>>,
    left: RendezvousChannel<S::Item>,
    right: RendezvousChannel<S::Item>,
) where
    S: Stream,
    S::Item: Clone,
{
    while let Some(element) = upstream.next().await {
        let mirrored = element.clone();
        future::join(left.send(element), right.send(mirrored)).await;
    }
    tracing::trace!("upstream drained; finishing both split sides");
    left.finish();
    right.finish();
}
