use crate::runtime::local::ReadyQueue;
use crate::task::harness::{Harness, TaskExit};
use crate::task::join::{Completion, JoinState};
use crate::task::waker::TaskWaker;
use crate::task::{Id, JoinHandle};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// A task owned by the runtime: the boxed body plus its waker.
///
/// Liveness is not tracked here. The registry owns it, and the worker reports
/// completion through [`Schedule::release`](crate::runtime::Schedule::release).
pub(crate) struct Task {
    id: Id,
    future: Pin<Box<dyn Future<Output = TaskExit>>>,
    waker: Arc<TaskWaker>,
}

impl Task {
    pub(crate) fn id(&self) -> Id {
        self.id
    }

    /// Pushes the task onto the ready queue.
    pub(crate) fn schedule(&self) {
        self.waker.waker().wake();
    }

    pub(crate) fn is_notified(&self) -> bool {
        self.waker.is_notified()
    }

    pub(crate) fn poll(&mut self) -> Poll<TaskExit> {
        self.waker.clear_notified();

        let waker = self.waker.waker();
        let mut cx = Context::from_waker(&waker);
        self.future.as_mut().poll(&mut cx)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("id", &self.id).finish()
    }
}

/// Creates a task and the handle used to join on it. The task is not
/// scheduled yet.
pub(crate) fn new_task<F>(id: Id, future: F, queue: Arc<ReadyQueue>) -> (Task, JoinHandle<F::Output>)
where
    F: Future + 'static,
    F::Output: 'static,
{
    let state = JoinState::new();
    let harness = Harness::new(future, Completion::new(id, state.clone()));

    let task = Task {
        id,
        future: Box::pin(harness),
        waker: TaskWaker::new(id, queue),
    };

    (task, JoinHandle::new(id, state))
}
