use crate::task::Id;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// FIFO of task ids waiting to be polled.
///
/// Tasks only ever run on the runtime thread, but wakers must be `Send + Sync`
/// and may fire from anywhere. The condvar lets the runtime block for a
/// bounded time until an external wake shows up.
#[derive(Debug)]
pub(crate) struct ReadyQueue {
    inner: Mutex<VecDeque<Id>>,
    cond: Condvar,
}

impl ReadyQueue {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            cond: Condvar::new(),
        }
    }

    pub(crate) fn push(&self, id: Id) {
        self.inner.lock().push_back(id);
        self.cond.notify_one();
    }

    pub(crate) fn pop(&self) -> Option<Id> {
        self.inner.lock().pop_front()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Blocks until the queue is non-empty or `timeout` elapsed. Returns true if
    /// an id is ready.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut guard = self.inner.lock();
        if !guard.is_empty() {
            return true;
        }

        if timeout.is_zero() {
            return false;
        }

        // Spurious wakeups are possible, loop until the deadline.
        let deadline = Instant::now() + timeout;
        while guard.is_empty() {
            if self.cond.wait_until(&mut guard, deadline).timed_out() {
                break;
            }
        }

        !guard.is_empty()
    }
}
