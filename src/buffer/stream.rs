use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio::task::JoinHandle;

use super::storage::{NextFuture, Storage};
use super::BufferPolicy;

/// Buffered adapter over an upstream fallible stream.
///
/// Construction is lazy: nothing runs until the first poll, which spawns a
/// drainer task pulling the upstream into the buffer storage. Dropping the
/// adapter cancels the whole chain — the parked pull (if any), the storage,
/// and the drainer task, whose in-flight send unwinds the upstream side from
/// its own drop.
pub struct BufferStream<S, T, E> {
    upstream: Option<Pin<Box<S>>>,
    storage: Storage<T, E>,
    drainer: Option<JoinHandle<()>>,
    pending: Option<NextFuture<T, E>>,
}

impl<S, T, E> BufferStream<S, T, E>
where
    S: Stream<Item = Result<T, E>>,
{
    pub(crate) fn new(upstream: S, policy: BufferPolicy) -> Self {
        Self {
            upstream: Some(Box::pin(upstream)),
            storage: Storage::new(policy),
            drainer: None,
            pending: None,
        }
    }
}

impl<S, T, E> Stream for BufferStream<S, T, E>
where
    S: Stream<Item = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    type Item = Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.drainer.is_none() {
            // The upstream slot doubles as the spawn-once guard.
            let upstream = this.upstream.take().expect("drainer respawned");
            this.drainer = Some(tokio::spawn(drain(upstream, this.storage.clone())));
        }
        let pull = this.pending.get_or_insert_with(|| this.storage.next());
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

impl<S, T, E> Drop for BufferStream<S, T, E> {
    fn drop(&mut self) {
        // Release the parked pull first so its handle resumes cleanly, then
        // shut the storage and the drainer. The aborted drainer's in-flight
        // send cancels the upstream side from its own drop.
        self.pending = None;
        self.storage.cancel_down();
        if let Some(drainer) = self.drainer.take() {
            drainer.abort();
        }
    }
}

async fn drain<S, T, E>(mut upstream: Pin<Box<S>>, storage: Storage<T, E>)
where
    S: Stream<Item = Result<T, E>>,
{
    loop {
        match upstream.next().await {
            Some(Ok(element)) => storage.send(element).await,
            Some(Err(error)) => {
                tracing::trace!("upstream failed; sealing buffer");
                storage.fail(error);
                break;
            }
            None => {
                tracing::trace!("upstream drained; finishing buffer");
                storage.finish();
                break;
            }
        }
    }
}
