use crate::runtime::local::ReadyQueue;
use crate::runtime::{RuntimeConfig, Schedule};
use crate::task::{Id, JoinHandle, Task, TaskExit};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;

/// Owns the tasks that are not currently being polled and the queue of those
/// ready to run.
///
/// A task is taken out of the map for the duration of its poll, so a body that
/// spawns or wakes other tasks never contends on the map borrow.
#[derive(Debug)]
pub(crate) struct Worker {
    tasks: RefCell<HashMap<Id, Task>>,

    ready: Arc<ReadyQueue>,

    /// Total number of polls, for diagnostics.
    polls: Cell<u64>,
}

impl Worker {
    pub(crate) fn new(cfg: &RuntimeConfig) -> Self {
        Self {
            tasks: RefCell::new(HashMap::with_capacity(cfg.initial_capacity)),
            ready: Arc::new(ReadyQueue::with_capacity(cfg.initial_capacity)),
            polls: Cell::new(0),
        }
    }

    /// Stores a new task and queues it for its first poll.
    pub(crate) fn add_task<F>(&self, id: Id, future: F) -> JoinHandle<F::Output>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        let (task, join) = crate::task::new_task(id, future, Arc::clone(&self.ready));
        task.schedule();

        let prev = self.tasks.borrow_mut().insert(id, task);
        debug_assert!(prev.is_none(), "task {id} added twice");

        join
    }

    /// Pops the next ready task. Wakes for tasks that already terminated are
    /// skipped.
    pub(crate) fn find_task(&self) -> Option<Task> {
        while let Some(id) = self.ready.pop() {
            let task = self.tasks.borrow_mut().remove(&id);
            if task.is_some() {
                return task;
            }
        }

        None
    }

    /// Polls the task once. A pending task goes back to the map, a terminated
    /// one is dropped and reported to `scheduler`.
    pub(crate) fn run_task<S: Schedule>(&self, mut task: Task, scheduler: &S) {
        let id = task.id();
        let span = tracing::trace_span!("task", %id);
        let _enter = span.enter();

        self.polls.set(self.polls.get() + 1);

        match task.poll() {
            Poll::Pending => {
                self.tasks.borrow_mut().insert(id, task);
            }
            Poll::Ready(exit) => {
                drop(task);

                if let TaskExit::Panicked(message) = &exit {
                    scheduler.unhandled_panic(id, message);
                }

                tracing::trace!("task terminated");
                scheduler.release(id);
            }
        }
    }

    /// Returns true if the stored task `id` has a wake pending. Tasks being
    /// polled or already terminated report false.
    pub(crate) fn is_notified(&self, id: Id) -> bool {
        self.tasks.borrow().get(&id).is_some_and(|task| task.is_notified())
    }

    /// Blocks until a task is woken or `timeout` elapsed. Returns true if a
    /// task is ready.
    pub(crate) fn wait_for_wake(&self, timeout: Duration) -> bool {
        self.ready.wait_timeout(timeout)
    }

    /// Drops every stored task. Returns how many were dropped.
    pub(crate) fn shutdown(&self) -> usize {
        // Dropping a task may wake others, don't hold the borrow.
        let tasks = std::mem::take(&mut *self.tasks.borrow_mut());
        let n = tasks.len();
        drop(tasks);

        n
    }

    pub(crate) fn num_tasks(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub(crate) fn polls(&self) -> u64 {
        self.polls.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::JoinError;
    use crate::test_utils::DummyScheduler;
    use crate::time::YieldNow;

    fn id(val: u64) -> Id {
        Id::new(val).expect("non-zero")
    }

    fn worker() -> Worker {
        Worker::new(&RuntimeConfig::default())
    }

    #[test]
    fn test_run_to_completion() {
        let worker = worker();
        let scheduler = DummyScheduler::default();

        let join = worker.add_task(id(1), async { 5 + 3 });
        assert_eq!(worker.num_tasks(), 1);

        let task = worker.find_task().expect("task should be ready");
        worker.run_task(task, &scheduler);

        assert_eq!(worker.num_tasks(), 0);
        assert_eq!(scheduler.released(), vec![id(1)]);
        assert_eq!(join.try_take_output(), Some(Ok(8)));
        assert!(worker.find_task().is_none());
    }

    #[test]
    fn test_fifo_order_with_yield() {
        let worker = worker();
        let scheduler = DummyScheduler::default();

        worker.add_task(id(1), async { YieldNow::new().await });
        worker.add_task(id(2), async {});

        let mut order = Vec::new();
        while let Some(task) = worker.find_task() {
            order.push(task.id());
            worker.run_task(task, &scheduler);
        }

        assert_eq!(order, vec![id(1), id(2), id(1)]);
        assert!(!worker.is_notified(id(1)));
        assert_eq!(scheduler.released(), vec![id(2), id(1)]);
        assert_eq!(worker.polls(), 3);
    }

    #[test]
    fn test_panic_reported_before_release() {
        let worker = worker();
        let scheduler = DummyScheduler::default();

        let join: JoinHandle<()> = worker.add_task(id(4), async {
            panic!("bad task");
        });

        let task = worker.find_task().expect("task should be ready");
        worker.run_task(task, &scheduler);

        assert_eq!(scheduler.panicked(), vec![(id(4), "bad task".to_string())]);
        assert_eq!(scheduler.released(), vec![id(4)]);
        assert!(join.try_take_output().is_some_and(|res| res.is_err_and(|e| e.is_panic())));
    }

    #[test]
    fn test_shutdown_cancels_pending() {
        let worker = worker();
        let scheduler = DummyScheduler::default();

        let join = worker.add_task(id(7), std::future::pending::<()>());
        let task = worker.find_task().expect("task should be ready");
        worker.run_task(task, &scheduler);

        assert_eq!(worker.shutdown(), 1);
        assert_eq!(join.try_take_output(), Some(Err(JoinError::Cancelled(id(7)))));
        assert!(scheduler.released().is_empty());
    }

    #[test]
    fn test_wait_for_wake_times_out() {
        let worker = worker();
        assert!(!worker.wait_for_wake(Duration::from_millis(1)));

        worker.add_task(id(1), async {});
        assert!(worker.is_notified(id(1)));
        assert!(worker.wait_for_wake(Duration::ZERO));
    }
}
