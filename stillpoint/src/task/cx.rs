use crate::error::SafepointError;
use crate::runtime::PauseState;
use crate::runtime::local::{self, Scheduler};
use crate::safepoint::MaybePause;
use crate::task::{Id, JoinHandle};
use crate::time::YieldNow;
use std::future::Future;
use std::rc::Weak;

/// Explicit context handed to every task body.
///
/// This is how a task reaches the runtime that owns it: marking safepoints,
/// spawning siblings, yielding. The context only holds a weak reference to
/// the scheduler, so a task that stashes it somewhere does not keep the
/// runtime alive.
#[derive(Debug, Clone)]
pub struct TaskCx {
    id: Id,
    scheduler: Weak<Scheduler>,
}

impl TaskCx {
    pub(crate) fn new(id: Id, scheduler: Weak<Scheduler>) -> Self {
        Self { id, scheduler }
    }

    /// Id of the task this context was created for.
    pub fn id(&self) -> Id {
        self.id
    }

    /// Marks a safepoint.
    ///
    /// When no pause is requested the returned future resolves on its first
    /// poll and the task keeps running in the same scheduling step. When a
    /// pause episode is active, the task arrives at the barrier and stays
    /// suspended until the driver resumes the runtime.
    ///
    /// Arriving twice in the same episode fails with
    /// [`SafepointError::DoubleArrival`].
    pub fn maybe_pause(&self) -> MaybePause {
        MaybePause::new(self.clone())
    }

    /// Returns true while a pause episode waits for tasks to reach a safepoint.
    ///
    /// Useful for tasks that want to cut a long computation short when the
    /// driver is waiting on them.
    pub fn is_pause_requested(&self) -> bool {
        self.scheduler
            .upgrade()
            .is_some_and(|s| s.state() == PauseState::Awaiting)
    }

    /// Submits a new task to the runtime owning this task.
    ///
    /// A task spawned while a pause episode is active is a *late joiner*; see
    /// [`LateJoinerPolicy`](crate::runtime::LateJoinerPolicy) for how it is
    /// counted.
    pub fn spawn<B, Fut>(&self, body: B) -> Result<JoinHandle<Fut::Output>, SafepointError>
    where
        B: FnOnce(TaskCx) -> Fut,
        Fut: Future + 'static,
        Fut::Output: 'static,
    {
        self.scheduler()?.spawn(None, body)
    }

    /// Suspends the task once, letting every other ready task run first.
    pub fn yield_now(&self) -> YieldNow {
        YieldNow::new()
    }

    pub(crate) fn scheduler(&self) -> Result<local::Handle, SafepointError> {
        self.scheduler
            .upgrade()
            .map(local::Handle::from)
            .ok_or(SafepointError::RuntimeGone)
    }
}
