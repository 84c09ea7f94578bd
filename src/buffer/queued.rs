use std::collections::VecDeque;
use std::mem;

use crate::handle::Handle;

use super::storage::Wake;

/// Overflow behaviour of a queued buffer.
pub(super) enum QueuePolicy {
    Unbounded,
    /// Evict the oldest buffered element to admit the new one.
    DropOldest(usize),
    /// Discard the incoming element while the buffer is full.
    DropNewest(usize),
}

enum State<T, E> {
    Idle,
    Buffering(VecDeque<T>),
    WaitingForUpstream {
        consumer: Handle<Option<T>, E>,
    },
    Finished {
        queue: VecDeque<T>,
        error: Option<E>,
    },
    Modifying,
}

/// Bounded buffer whose producer never suspends; overflow is resolved by the
/// policy instead.
///
/// Same shape as the suspending buffer minus the parked-producer state, and
/// with a terminal protocol that tolerates a late `fail` silently.
pub(super) struct QueuedBuffer<T, E> {
    state: State<T, E>,
    policy: QueuePolicy,
}

impl<T, E> QueuedBuffer<T, E> {
    pub(super) fn new(policy: QueuePolicy) -> Self {
        if let QueuePolicy::DropOldest(limit) | QueuePolicy::DropNewest(limit) = policy {
            assert!(limit > 0, "buffer limit must be positive");
        }
        Self {
            state: State::Idle,
            policy,
        }
    }

    pub(super) fn new_element(&mut self, element: T) -> Wake<T, E> {
        match mem::replace(&mut self.state, State::Modifying) {
            State::Idle => {
                self.state = State::Buffering(VecDeque::from([element]));
                Wake::None
            }
            State::Buffering(mut queue) => {
                match self.policy {
                    QueuePolicy::Unbounded => queue.push_back(element),
                    QueuePolicy::DropOldest(limit) => {
                        if queue.len() >= limit {
                            queue.pop_front();
                        }
                        queue.push_back(element);
                    }
                    QueuePolicy::DropNewest(limit) => {
                        if queue.len() < limit {
                            queue.push_back(element);
                        }
                    }
                }
                self.state = State::Buffering(queue);
                Wake::None
            }
            State::WaitingForUpstream { consumer } => {
                self.state = State::Idle;
                Wake::Consumer {
                    consumer,
                    outcome: Ok(Some(element)),
                }
            }
            finished @ State::Finished { .. } => {
                self.state = finished;
                Wake::None
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
        self.terminate(None)
    }

    pub(super) fn fail(&mut self, error: E) -> Wake<T, E> {
        self.terminate(Some(error))
    }

    fn terminate(&mut self, error: Option<E>) -> Wake<T, E> {
        match mem::replace(&mut self.state, State::Modifying) {
            State::Idle => {
                self.state = State::Finished {
                    queue: VecDeque::new(),
                    error,
                };
                Wake::None
            }
            State::Buffering(queue) => {
                self.state = State::Finished { queue, error };
                Wake::None
            }
            State::WaitingForUpstream { consumer } => {
                let outcome = match error {
                    Some(error) => Err(error),
                    None => Ok(None),
                };
                self.state = State::Finished {
                    queue: VecDeque::new(),
                    error: None,
                };
                Wake::Consumer { consumer, outcome }
            }
            finished @ State::Finished { .. } => {
                // First terminal event wins; a late fail is tolerated here.
                self.state = finished;
                Wake::None
            }
            State::Modifying => unreachable!("re-entered buffer transition"),
        }
    }

    pub(super) fn cancel_up(&mut self) -> Wake<T, E> {
        self.cancel()
    }

    pub(super) fn cancel_down(&mut self) -> Wake<T, E> {
        self.cancel()
    }

    fn cancel(&mut self) -> Wake<T, E> {
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
            finished @ State::Finished { .. } => {
                self.state = finished;
                Wake::None
            }
            State::Modifying => unreachable!("re-entered buffer transition"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;
    use crate::handle::suspension;

    fn take(buffer: &mut QueuedBuffer<i32, Infallible>) -> Result<Option<i32>, Infallible> {
        let (consumer, side) = suspension();
        buffer.new_iterator(consumer).run();
        futures::executor::block_on(side)
    }

    #[test]
    fn test_drop_oldest_evicts_head() {
        let mut buffer = QueuedBuffer::new(QueuePolicy::DropOldest(2));
        for element in 1..=5 {
            buffer.new_element(element).run();
        }
        buffer.finish().run();

        assert_eq!(take(&mut buffer), Ok(Some(4)));
        assert_eq!(take(&mut buffer), Ok(Some(5)));
        assert_eq!(take(&mut buffer), Ok(None));
    }

    #[test]
    fn test_drop_newest_discards_incoming() {
        let mut buffer = QueuedBuffer::new(QueuePolicy::DropNewest(2));
        for element in 1..=5 {
            buffer.new_element(element).run();
        }
        buffer.finish().run();

        assert_eq!(take(&mut buffer), Ok(Some(1)));
        assert_eq!(take(&mut buffer), Ok(Some(2)));
        assert_eq!(take(&mut buffer), Ok(None));
    }

    #[test]
    fn test_unbounded_never_drops() {
        let mut buffer = QueuedBuffer::new(QueuePolicy::Unbounded);
        for element in 0..100 {
            buffer.new_element(element).run();
        }
        buffer.finish().run();

        for element in 0..100 {
            assert_eq!(take(&mut buffer), Ok(Some(element)));
        }
        assert_eq!(take(&mut buffer), Ok(None));
    }

    #[test]
    fn test_waiting_consumer_served_directly() {
        let mut buffer = QueuedBuffer::<i32, Infallible>::new(QueuePolicy::DropOldest(1));
        let (consumer, side) = suspension();
        buffer.new_iterator(consumer).run();

        buffer.new_element(3).run();
        assert_eq!(futures::executor::block_on(side), Ok(Some(3)));
    }

    #[test]
    fn test_late_fail_is_tolerated() {
        let mut buffer = QueuedBuffer::<i32, &str>::new(QueuePolicy::Unbounded);
        buffer.finish().run();
        buffer.fail("late").run();

        let (consumer, side) = suspension();
        buffer.new_iterator(consumer).run();
        assert_eq!(futures::executor::block_on(side), Ok(None));
    }

    #[test]
    #[should_panic(expected = "buffer limit must be positive")]
    fn test_zero_limit_panics() {
        let _ = QueuedBuffer::<i32, Infallible>::new(QueuePolicy::DropNewest(0));
    }
}
