use crate::runtime::local::ReadyQueue;
use crate::task::Id;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Wake, Waker};

/// Waker for a single task. Waking pushes the task id onto the runtime's ready
/// queue, at most once between two polls.
///
/// The queue is thread-safe so a task can be woken from another thread (for
/// example by a channel sender), even though it is only ever polled by the
/// runtime thread.
#[derive(Debug)]
pub(crate) struct TaskWaker {
    id: Id,

    /// Set while the id sits in the ready queue. Cleared right before polling
    /// so that a wake during the poll queues the task again.
    notified: AtomicBool,

    queue: Arc<ReadyQueue>,
}

impl TaskWaker {
    pub(crate) fn new(id: Id, queue: Arc<ReadyQueue>) -> Arc<Self> {
        Arc::new(Self {
            id,
            notified: AtomicBool::new(false),
            queue,
        })
    }

    /// True while a wake is pending, i.e. the task is in the ready queue.
    pub(crate) fn is_notified(&self) -> bool {
        self.notified.load(Ordering::Acquire)
    }

    pub(crate) fn clear_notified(&self) {
        self.notified.store(false, Ordering::Release);
    }

    pub(crate) fn waker(self: &Arc<Self>) -> Waker {
        Waker::from(Arc::clone(self))
    }
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        Wake::wake_by_ref(&self);
    }

    fn wake_by_ref(self: &Arc<Self>) {
        if !self.notified.swap(true, Ordering::AcqRel) {
            self.queue.push(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wake_is_deduplicated_until_cleared() {
        let queue = Arc::new(ReadyQueue::with_capacity(4));
        let id = Id::new(5).expect("non-zero");
        let task_waker = TaskWaker::new(id, queue.clone());
        let waker = task_waker.waker();

        assert!(!task_waker.is_notified());
        waker.wake_by_ref();
        waker.wake_by_ref();
        assert_eq!(queue.len(), 1);
        assert!(task_waker.is_notified());

        assert_eq!(queue.pop(), Some(id));
        task_waker.clear_notified();

        waker.wake();
        assert_eq!(queue.pop(), Some(id));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_wake_from_another_thread() {
        let queue = Arc::new(ReadyQueue::with_capacity(4));
        let id = Id::new(11).expect("non-zero");
        let waker = TaskWaker::new(id, queue.clone()).waker();

        std::thread::spawn(move || waker.wake())
            .join()
            .expect("waker thread panicked");

        assert_eq!(queue.pop(), Some(id));
    }
}
