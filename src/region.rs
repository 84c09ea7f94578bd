use std::sync::Mutex;

use crossbeam_utils::CachePadded;

/// Mutex-guarded cell with a closure-scoped critical section.
///
/// Every state machine in this crate lives inside a `Region` and is only ever
/// touched through [`with_region`](Region::with_region). The closure must not
/// suspend and must not re-enter the same cell; it computes a wake action
/// (which handles to resume, and with what) that the caller executes after
/// the lock is dropped. Resuming a handle inside the region is forbidden.
///
/// The cell is cache-padded: the lock word is hit from both the producer and
/// the consumer side, and should not share a line with neighbouring fields.
pub(crate) struct Region<S> {
    state: CachePadded<Mutex<S>>,
}

impl<S> Region<S> {
    pub(crate) fn new(state: S) -> Self {
        Self {
            state: CachePadded::new(Mutex::new(state)),
        }
    }

    /// Runs `f` with exclusive access to the interior state and returns its
    /// value. The lock is released on every path, including a panic in `f`.
    ///
    /// A poisoned lock means a previous region panicked mid-transition; the
    /// state machine invariants cannot be trusted past that point, so the
    /// panic is propagated rather than swallowed.
    pub(crate) fn with_region<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let mut guard = self.state.lock().expect("region poisoned by a panicked transition");
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_returns_closure_value() {
        let region = Region::new(5_u32);
        let doubled = region.with_region(|state| *state * 2);
        assert_eq!(doubled, 10);
    }

    #[test]
    fn test_mutations_persist() {
        let region = Region::new(Vec::new());
        region.with_region(|state| state.push(1));
        region.with_region(|state| state.push(2));
        let len = region.with_region(|state| state.len());
        assert_eq!(len, 2);
    }
}
