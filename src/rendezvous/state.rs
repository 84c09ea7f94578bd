use std::collections::VecDeque;
use std::mem;

use crate::handle::Handle;

/// A producer parked in the channel: its element travels with its handle and
/// is handed over (or discarded at termination) when the handle leaves.
pub(super) struct ParkedSend<T> {
    pub(super) element: T,
    pub(super) handle: Handle<()>,
}

pub(super) struct ParkedNext<T> {
    pub(super) id: u64,
    pub(super) handle: Handle<Option<T>>,
}

enum Shape<T> {
    Idle,
    Pending(VecDeque<ParkedSend<T>>),
    Awaiting(VecDeque<ParkedNext<T>>),
}

/// Emission state of a rendezvous channel.
///
/// `Pending` and `Awaiting` are mutually exclusive: a waiter on one side is
/// matched before the other side can accumulate. Once `terminal` is set the
/// shape is forced to `Idle` and stays there.
///
/// `tombstones` records consumer ids whose cancellation arrived before (or
/// raced past) their registration; a registration that observes its own
/// tombstone resolves to `None` directly.
pub(super) struct Emission<T> {
    shape: Shape<T>,
    terminal: bool,
    tombstones: Vec<u64>,
}

pub(super) enum SendAction<T> {
    /// Producer handle parked; the caller suspends.
    Parked,
    /// A waiting consumer was matched; resume it with the element, then the
    /// producer with unit.
    Deliver {
        consumer: Handle<Option<T>>,
        element: T,
        producer: Handle<()>,
    },
    /// Channel is terminal; the element is discarded and the producer
    /// resumes immediately.
    Dropped { producer: Handle<()> },
}

pub(super) enum NextAction<T> {
    /// Consumer handle parked; the caller suspends.
    Parked,
    /// A parked producer was matched; resume the consumer with its element,
    /// then the producer with unit.
    Deliver {
        element: T,
        producer: Handle<()>,
        consumer: Handle<Option<T>>,
    },
    /// Channel is terminal; resume the consumer with `None`.
    Terminated { consumer: Handle<Option<T>> },
    /// The caller's id was tombstoned or collided with a live waiter; it is
    /// treated as cancelled and resumes with `None`.
    Cancelled { consumer: Handle<Option<T>> },
}

/// Everything to resume after a termination transition.
pub(super) struct FinishAction<T> {
    pub(super) producers: Vec<Handle<()>>,
    pub(super) consumers: Vec<Handle<Option<T>>>,
}

pub(super) enum CancelAction<T> {
    /// The waiter was found and removed; resume it with `None`.
    Resume(Handle<Option<T>>),
    /// No such waiter on a live channel; a tombstone was recorded for the
    /// racing registration.
    Recorded,
    /// Terminal channel; nothing to do.
    Ignored,
}

impl<T> Emission<T> {
    pub(super) fn new() -> Self {
        Self {
            shape: Shape::Idle,
            terminal: false,
            tombstones: Vec::new(),
        }
    }

    pub(super) fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub(super) fn send(&mut self, element: T, producer: Handle<()>) -> SendAction<T> {
        if self.terminal {
            return SendAction::Dropped { producer };
        }
        match &mut self.shape {
            Shape::Idle => {
                self.shape = Shape::Pending(VecDeque::from([ParkedSend { element, handle: producer }]));
                SendAction::Parked
            }
            Shape::Pending(sends) => {
                sends.push_back(ParkedSend { element, handle: producer });
                SendAction::Parked
            }
            Shape::Awaiting(waiters) => {
                let waiter = waiters.pop_front().expect("awaiting shape with no waiters");
                if waiters.is_empty() {
                    self.shape = Shape::Idle;
                }
                SendAction::Deliver {
                    consumer: waiter.handle,
                    element,
                    producer,
                }
            }
        }
    }

    pub(super) fn next(&mut self, id: u64, consumer: Handle<Option<T>>) -> NextAction<T> {
        if let Some(found) = self.tombstones.iter().position(|tombstone| *tombstone == id) {
            self.tombstones.swap_remove(found);
            return NextAction::Cancelled { consumer };
        }
        if self.terminal {
            return NextAction::Terminated { consumer };
        }
        match &mut self.shape {
            Shape::Idle => {
                self.shape = Shape::Awaiting(VecDeque::from([ParkedNext { id, handle: consumer }]));
                NextAction::Parked
            }
            Shape::Pending(sends) => {
                let send = sends.pop_front().expect("pending shape with no sends");
                if sends.is_empty() {
                    self.shape = Shape::Idle;
                }
                NextAction::Deliver {
                    element: send.element,
                    producer: send.handle,
                    consumer,
                }
            }
            Shape::Awaiting(waiters) => {
                if waiters.iter().any(|waiter| waiter.id == id) {
                    // An id can only recur after the counter wrapped all the
                    // way around to a still-parked waiter; the newcomer loses.
                    return NextAction::Cancelled { consumer };
                }
                waiters.push_back(ParkedNext { id, handle: consumer });
                NextAction::Parked
            }
        }
    }

    /// Transitions to terminal. Idempotent: a second call returns an empty
    /// action.
    pub(super) fn finish(&mut self) -> FinishAction<T> {
        if self.terminal {
            return FinishAction {
                producers: Vec::new(),
                consumers: Vec::new(),
            };
        }
        self.terminal = true;
        self.tombstones.clear();
        match mem::replace(&mut self.shape, Shape::Idle) {
            Shape::Idle => FinishAction {
                producers: Vec::new(),
                consumers: Vec::new(),
            },
            Shape::Pending(sends) => FinishAction {
                // Parked elements are discarded with the queue.
                producers: sends.into_iter().map(|send| send.handle).collect(),
                consumers: Vec::new(),
            },
            Shape::Awaiting(waiters) => FinishAction {
                producers: Vec::new(),
                consumers: waiters.into_iter().map(|waiter| waiter.handle).collect(),
            },
        }
    }

    pub(super) fn cancel_next(&mut self, id: u64) -> CancelAction<T> {
        if let Shape::Awaiting(waiters) = &mut self.shape {
            if let Some(found) = waiters.iter().position(|waiter| waiter.id == id) {
                let waiter = waiters.remove(found).expect("position out of bounds");
                if waiters.is_empty() {
                    self.shape = Shape::Idle;
                }
                return CancelAction::Resume(waiter.handle);
            }
        }
        if self.terminal {
            return CancelAction::Ignored;
        }
        self.tombstones.push(id);
        CancelAction::Recorded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::suspension;

    #[test]
    fn test_send_parks_on_idle() {
        let mut emission = Emission::new();
        let (producer, parked) = suspension();
        assert!(matches!(emission.send(1, producer), SendAction::Parked));
        assert!(!parked.is_resolved());
        assert!(matches!(emission.shape, Shape::Pending(_)));

        for producer in emission.finish().producers {
            producer.resume(Ok(()));
        }
        assert_eq!(futures::executor::block_on(parked), Ok(()));
    }

    #[test]
    fn test_producers_match_in_fifo_order() {
        let mut emission = Emission::new();
        let (first, _first_side) = suspension();
        let (second, _second_side) = suspension();
        assert!(matches!(emission.send(1, first), SendAction::Parked));
        assert!(matches!(emission.send(2, second), SendAction::Parked));

        let (consumer, _consumer_side) = suspension();
        match emission.next(0, consumer) {
            NextAction::Deliver { element, producer, consumer } => {
                assert_eq!(element, 1);
                producer.resume(Ok(()));
                consumer.resume(Ok(Some(element)));
            }
            _ => panic!("expected a parked producer to be matched"),
        }
        assert!(matches!(emission.shape, Shape::Pending(_)));

        for producer in emission.finish().producers {
            producer.resume(Ok(()));
        }
    }

    #[test]
    fn test_tombstone_consumed_by_registration() {
        let mut emission = Emission::<i32>::new();
        assert!(matches!(emission.cancel_next(7), CancelAction::Recorded));

        let (consumer, side) = suspension();
        match emission.next(7, consumer) {
            NextAction::Cancelled { consumer } => consumer.resume(Ok(None)),
            _ => panic!("tombstoned id should resolve as cancelled"),
        }
        assert_eq!(futures::executor::block_on(side), Ok(None));
        assert!(emission.tombstones.is_empty());
    }

    #[test]
    fn test_id_collision_treated_as_cancelled() {
        let mut emission = Emission::<i32>::new();
        let (first, _first_side) = suspension();
        assert!(matches!(emission.next(3, first), NextAction::Parked));

        let (second, second_side) = suspension();
        match emission.next(3, second) {
            NextAction::Cancelled { consumer } => consumer.resume(Ok(None)),
            _ => panic!("colliding id should resolve as cancelled"),
        }
        assert_eq!(futures::executor::block_on(second_side), Ok(None));

        // The original waiter is still parked.
        let action = emission.finish();
        assert_eq!(action.consumers.len(), 1);
        for consumer in action.consumers {
            consumer.resume(Ok(None));
        }
    }

    #[test]
    fn test_finish_releases_both_sides_and_is_idempotent() {
        let mut emission = Emission::new();
        let (producer, producer_side) = suspension();
        assert!(matches!(emission.send(9, producer), SendAction::Parked));

        let action = emission.finish();
        assert_eq!(action.producers.len(), 1);
        assert!(action.consumers.is_empty());
        for producer in action.producers {
            producer.resume(Ok(()));
        }
        assert_eq!(futures::executor::block_on(producer_side), Ok(()));

        let again = emission.finish();
        assert!(again.producers.is_empty() && again.consumers.is_empty());
        assert!(emission.is_terminal());
    }

    #[test]
    fn test_cancel_removes_parked_waiter() {
        let mut emission = Emission::<i32>::new();
        let (consumer, side) = suspension();
        assert!(matches!(emission.next(11, consumer), NextAction::Parked));

        match emission.cancel_next(11) {
            CancelAction::Resume(handle) => handle.resume(Ok(None)),
            _ => panic!("parked waiter should be removed"),
        }
        assert_eq!(futures::executor::block_on(side), Ok(None));
        assert!(matches!(emission.shape, Shape::Idle));
    }

    #[test]
    fn test_cancel_after_terminal_is_ignored() {
        let mut emission = Emission::<i32>::new();
        let _ = emission.finish();
        assert!(matches!(emission.cancel_next(5), CancelAction::Ignored));
        assert!(emission.tombstones.is_empty());
    }
}
