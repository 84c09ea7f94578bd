use std::collections::VecDeque;
use std::mem;

use crate::handle::Handle;

use super::storage::Wake;

enum State<T, E> {
    Idle,
    Buffering(VecDeque<T>),
    /// The buffer is full; the producer is parked together with the element
    /// that did not fit.
    WaitingForDownstream {
        producer: Handle<()>,
        element: T,
        queue: VecDeque<T>,
    },
    WaitingForUpstream {
        consumer: Handle<Option<T>, E>,
    },
    /// Terminal for the producer. Buffered elements still drain downstream,
    /// then the error (if any), then `None`.
    Finished {
        queue: VecDeque<T>,
        error: Option<E>,
    },
    /// Transient marker held while containers are moved out; observing it
    /// from another transition is impossible under the region lock.
    Modifying,
}

/// Bounded buffer whose producer suspends while the buffer is full.
///
/// Pure transition function: every event returns a [`Wake`] naming the
/// handles to resume once the region lock is dropped.
pub(super) struct SuspendingBuffer<T, E> {
    state: State<T, E>,
    limit: usize,
}

impl<T, E> SuspendingBuffer<T, E> {
    pub(super) fn new(limit: usize) -> Self {
        assert!(limit > 0, "buffer limit must be positive");
        Self {
            state: State::Idle,
            limit,
        }
    }

    pub(super) fn new_element(&mut self, element: T, producer: Handle<()>) -> Wake<T, E> {
        match mem::replace(&mut self.state, State::Modifying) {
            State::Idle => {
                self.state = State::Buffering(VecDeque::from([element]));
                Wake::Producer(producer)
            }
            State::Buffering(mut queue) => {
                if queue.len() < self.limit {
                    queue.push_back(element);
                    self.state = State::Buffering(queue);
                    Wake::Producer(producer)
                } else {
                    self.state = State::WaitingForDownstream { producer, element, queue };
                    Wake::None
                }
            }
            State::WaitingForUpstream { consumer } => {
                self.state = State::Idle;
                Wake::Both {
                    producer,
                    consumer,
                    outcome: Ok(Some(element)),
                }
            }
            State::WaitingForDownstream { .. } => {
                unreachable!("element produced while a producer is parked")
            }
            finished @ State::Finished { .. } => {
                self.state = finished;
                Wake::Producer(producer)
            }
            State::Modifying => unreachable!("re-entered buffer transition"),
        }
    }

    pub(super) fn new_iterator(&mut self, consumer: Handle<Option<T>, E>) -> Wake<T, E> {
        match mem::replace(&mut self.state, State::Modifying) {
            State::Idle => {
                self.state = State::WaitingForUpstream { consumer };
                Wake::None
            }
            State::Buffering(mut queue) => {
                let head = queue.pop_front().expect("buffering state with an empty queue");
                self.state = if queue.is_empty() {
                    State::Idle
                } else {
                    State::Buffering(queue)
                };
                Wake::Consumer {
                    consumer,
                    outcome: Ok(Some(head)),
                }
            }
            State::WaitingForDownstream { producer, element, mut queue } => {
                let head = queue.pop_front().expect("full buffer with an empty queue");
                queue.push_back(element);
                self.state = State::Buffering(queue);
                Wake::Both {
                    producer,
                    consumer,
                    outcome: Ok(Some(head)),
                }
            }
            State::WaitingForUpstream { .. } => {
                panic!("a consumer is already waiting on this buffer")
            }
            State::Finished { mut queue, error } => {
                if let Some(head) = queue.pop_front() {
                    self.state = State::Finished { queue, error };
                    Wake::Consumer {
                        consumer,
                        outcome: Ok(Some(head)),
                    }
                } else if let Some(error) = error {
                    self.state = State::Finished { queue, error: None };
                    Wake::Consumer {
                        consumer,
                        outcome: Err(error),
                    }
                } else {
                    self.state = State::Finished { queue, error: None };
                    Wake::Consumer {
                        consumer,
                        outcome: Ok(None),
                    }
                }
            }
            State::Modifying => unreachable!("re-entered buffer transition"),
        }
    }

    pub(super) fn finish(&mut self) -> Wake<T, E> {
        match mem::replace(&mut self.state, State::Modifying) {
            State::Idle => {
                self.state = State::Finished {
                    queue: VecDeque::new(),
                    error: None,
                };
                Wake::None
            }
            State::Buffering(queue) => {
                self.state = State::Finished { queue, error: None };
                Wake::None
            }
            State::WaitingForUpstream { consumer } => {
                self.state = State::Finished {
                    queue: VecDeque::new(),
                    error: None,
                };
                Wake::Consumer {
                    consumer,
                    outcome: Ok(None),
                }
            }
            State::WaitingForDownstream { .. } => {
                unreachable!("upstream finished while its own send is parked")
            }
            finished @ State::Finished { .. } => {
                self.state = finished;
                Wake::None
            }
            State::Modifying => unreachable!("re-entered buffer transition"),
        }
    }

    pub(super) fn fail(&mut self, error: E) -> Wake<T, E> {
        match mem::replace(&mut self.state, State::Modifying) {
            State::Idle => {
                self.state = State::Finished {
                    queue: VecDeque::new(),
                    error: Some(error),
                };
                Wake::None
            }
            State::Buffering(queue) => {
                self.state = State::Finished {
                    queue,
                    error: Some(error),
                };
                Wake::None
            }
            State::WaitingForUpstream { consumer } => {
                self.state = State::Finished {
                    queue: VecDeque::new(),
                    error: None,
                };
                Wake::Consumer {
                    consumer,
                    outcome: Err(error),
                }
            }
            State::WaitingForDownstream { .. } => {
                unreachable!("upstream failed while its own send is parked")
            }
            finished @ State::Finished { .. } => {
                // First terminal event wins; this one is a producer bug.
                debug_assert!(false, "buffer failed after it already terminated");
                self.state = finished;
                Wake::None
            }
            State::Modifying => unreachable!("re-entered buffer transition"),
        }
    }

    pub(super) fn cancel_up(&mut self) -> Wake<T, E> {
        match mem::replace(&mut self.state, State::Modifying) {
            State::Idle | State::Buffering(_) => {
                self.state = State::Finished {
                    queue: VecDeque::new(),
                    error: None,
                };
                Wake::None
            }
            State::WaitingForUpstream { consumer } => {
                self.state = State::Finished {
                    queue: VecDeque::new(),
                    error: None,
                };
                Wake::Consumer {
                    consumer,
                    outcome: Ok(None),
                }
            }
            State::WaitingForDownstream { producer, element, queue } => {
                // The parked overflow element is discarded; what was already
                // buffered still drains.
                drop(element);
                self.state = State::Finished { queue, error: None };
                Wake::Producer(producer)
            }
            finished @ State::Finished { .. } => {
                self.state = finished;
                Wake::None
            }
            State::Modifying => unreachable!("re-entered buffer transition"),
        }
    }

    pub(super) fn cancel_down(&mut self) -> Wake<T, E> {
        match mem::replace(&mut self.state, State::Modifying) {
            State::Idle | State::Buffering(_) => {
                self.state = State::Finished {
                    queue: VecDeque::new(),
                    error: None,
                };
                Wake::None
            }
            State::WaitingForUpstream { consumer } => {
                self.state = State::Finished {
                    queue: VecDeque::new(),
                    error: None,
                };
                Wake::Consumer {
                    consumer,
                    outcome: Ok(None),
                }
            }
            State::WaitingForDownstream { producer, element, queue } => {
                drop((element, queue));
                self.state = State::Finished {
                    queue: VecDeque::new(),
                    error: None,
                };
                Wake::Producer(producer)
            }
            finished @ State::Finished { .. } => {
                self.state = finished;
                Wake::None
            }
            State::Modifying => unreachable!("re-entered buffer transition"),
        }
    }
}
