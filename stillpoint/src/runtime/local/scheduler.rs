use crate::error::SafepointError;
use crate::runtime::local::worker::Worker;
use crate::runtime::{PauseOutcome, PauseState, RuntimeConfig, Schedule, TaskFlags, TaskRegistry};
use crate::safepoint::{EpisodeId, SafepointBarrier, Signal};
use crate::task::{Id, JoinHandle, TaskCx};
#[allow(unused)]
use crate::utils::scheduler::{Call, Method, Tracker};
use crate::utils::ScopeGuard;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::ops::Deref;
use std::rc::Rc;

#[derive(Debug)]
pub struct Scheduler {
    pub(crate) cfg: RuntimeConfig,

    pub(crate) worker: Worker,

    pub(crate) tasks: RefCell<TaskRegistry>,

    /// Barrier of the active episode, present while `Awaiting` or `Paused`.
    barrier: RefCell<Option<Rc<SafepointBarrier>>>,

    state: Cell<PauseState>,

    /// Number of episodes started so far.
    episodes: Cell<u64>,

    #[cfg(test)]
    pub(crate) tracker: Tracker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriveMode {
    /// Stop as soon as the barrier is satisfied.
    UntilSafeState,

    /// Release any satisfied barrier right away and keep going.
    ToCompletion,
}

impl Scheduler {
    pub(crate) fn new(cfg: &RuntimeConfig) -> Self {
        Self {
            cfg: cfg.clone(),
            worker: Worker::new(cfg),
            tasks: RefCell::new(TaskRegistry::with_capacity(cfg.initial_capacity)),
            barrier: RefCell::new(None),
            state: Cell::new(PauseState::Idle),
            episodes: Cell::new(0),

            #[cfg(test)]
            tracker: Tracker::new(),
        }
    }

    pub(crate) fn into_handle(self) -> Handle {
        Handle(Rc::new(self))
    }

    pub(crate) fn state(&self) -> PauseState {
        self.state.get()
    }

    pub(crate) fn live_count(&self) -> usize {
        self.tasks.borrow().live_count()
    }

    pub(crate) fn episode(&self) -> Option<EpisodeId> {
        self.current_barrier().map(|b| b.episode())
    }

    /// Counted arrivals at the active barrier.
    pub(crate) fn arrived_count(&self) -> usize {
        self.current_barrier().map_or(0, |b| b.arrived())
    }

    fn current_barrier(&self) -> Option<Rc<SafepointBarrier>> {
        self.barrier.borrow().clone()
    }

    /// Safepoint entry. Returns `None` when no episode is active, otherwise the
    /// barrier the task is now parked at and the signal to wait on.
    pub(crate) fn arrive(
        &self,
        id: Id,
    ) -> Result<Option<(Rc<SafepointBarrier>, Rc<Signal>)>, SafepointError> {
        let Some(barrier) = self.current_barrier() else {
            return Ok(None);
        };

        let counted = !self
            .tasks
            .borrow()
            .is_exempt(id, self.cfg.late_joiner_policy);

        let resume = barrier.arrive(id, counted)?;

        let episode = barrier.episode();
        tracing::trace!(task = %id, %episode, counted, "arrived at safepoint");
        self.track(Method::Arrive, Call::Arrive { id, episode, counted });

        self.evaluate_barrier();

        Ok(Some((barrier, resume)))
    }

    /// A parked task polled its safepoint again without being released.
    pub(crate) fn repark(&self, barrier: &SafepointBarrier, id: Id) {
        if barrier.repark(id) {
            tracing::trace!(task = %id, episode = %barrier.episode(), "parked again");
            self.evaluate_barrier();
        }
    }

    /// Re-evaluation point, after every arrival and every task completion.
    fn evaluate_barrier(&self) {
        let Some(barrier) = self.current_barrier() else {
            return;
        };

        let live = self
            .tasks
            .borrow()
            .live_participants(self.cfg.late_joiner_policy);

        if barrier.evaluate(live) {
            let episode = barrier.episode();
            let arrived = barrier.arrived();

            tracing::debug!(%episode, arrived, live, "safepoint barrier satisfied");
            self.track(Method::Satisfied, Call::Satisfied { episode, arrived });
        }
    }

    fn begin_episode(&self) {
        let episode = EpisodeId::new(self.episodes.get() + 1);
        self.episodes.set(episode.as_u64());

        self.tasks.borrow_mut().begin_episode(episode);
        self.barrier.replace(Some(Rc::new(SafepointBarrier::new(
            episode,
            self.cfg.initial_capacity,
        ))));
        self.state.set(PauseState::Awaiting);

        tracing::debug!(%episode, live = self.live_count(), "pause requested");
    }

    /// Releases every parked task and drops the barrier.
    fn end_episode(&self) {
        let barrier = self.barrier.borrow_mut().take();
        self.state.set(PauseState::Idle);

        if let Some(barrier) = barrier {
            let episode = barrier.episode();
            self.tasks.borrow_mut().end_episode();
            barrier.release();

            tracing::debug!(%episode, parked = barrier.parked(), "safepoint barrier released");
            self.track(Method::Resume, Call::Resume { episode });
        }
    }

    pub(crate) fn run_until_safe_state(&self) -> Result<PauseOutcome, SafepointError> {
        self.resume();

        match self.state.get() {
            PauseState::Idle if self.live_count() == 0 => return Ok(PauseOutcome::AllFinished),
            PauseState::Idle => self.begin_episode(),
            // A previous call stalled, the pause request still stands.
            PauseState::Awaiting => {}
            PauseState::Paused => unreachable!("paused runtime was just resumed"),
        }

        self.drive(DriveMode::UntilSafeState)
    }

    pub(crate) fn run_to_completion(&self) -> Result<(), SafepointError> {
        self.resume();
        self.drive(DriveMode::ToCompletion).map(|_| ())
    }

    /// `Paused` -> `Idle`. Returns false, and does nothing, in any other state.
    pub(crate) fn resume(&self) -> bool {
        if self.state.get() != PauseState::Paused {
            return false;
        }

        tracing::trace!(episode = ?self.episode(), "resuming");
        self.end_episode();
        true
    }

    fn drive(&self, mode: DriveMode) -> Result<PauseOutcome, SafepointError> {
        loop {
            if self.live_count() == 0 {
                self.end_episode();
                return Ok(PauseOutcome::AllFinished);
            }

            if let Some(barrier) = self.current_barrier()
                && self.is_safe_state(&barrier)
            {
                self.state.set(PauseState::Paused);
                tracing::debug!(
                    episode = ?self.episode(),
                    polls = self.worker.polls(),
                    "every live task reached a safepoint"
                );

                match mode {
                    DriveMode::UntilSafeState => return Ok(PauseOutcome::Paused),
                    DriveMode::ToCompletion => {
                        self.resume();
                        continue;
                    }
                }
            }

            if let Some(task) = self.worker.find_task() {
                // A parked task that runs again is no longer at its safepoint,
                // polling the safepoint parks it again.
                if let Some(barrier) = self.current_barrier() {
                    barrier.unpark(task.id());
                }

                self.worker.run_task(task, self);
                continue;
            }

            if !self.worker.wait_for_wake(self.cfg.stall_timeout) {
                return Err(self.stalled());
            }
        }
    }

    /// Confirms a satisfied barrier before pausing: every counted arrival must
    /// still be parked, with no wake pending, and cover every live
    /// participant. Otherwise the barrier is re-armed and the episode goes on.
    fn is_safe_state(&self, barrier: &SafepointBarrier) -> bool {
        if !barrier.is_satisfied() {
            return false;
        }

        for id in barrier.parked_participants() {
            if self.worker.is_notified(id) {
                barrier.unpark(id);
            }
        }

        let live = self
            .tasks
            .borrow()
            .live_participants(self.cfg.late_joiner_policy);

        if barrier.arrived() != live {
            barrier.rearm();
            return false;
        }

        barrier.is_satisfied()
    }

    fn stalled(&self) -> SafepointError {
        let live = self.live_count();
        let arrived = self.arrived_count();

        tracing::warn!(
            live,
            arrived,
            pending = self.worker.num_tasks(),
            episode = ?self.episode(),
            "scheduler stalled"
        );
        self.track(Method::Stall, Call::Stall { live, arrived });

        SafepointError::SchedulerStalled { live, arrived }
    }

    /// Drops every task without resuming parked ones. Returns how many tasks
    /// were still alive.
    pub(crate) fn shutdown(&self) -> usize {
        let barrier = self.barrier.borrow_mut().take();
        self.state.set(PauseState::Idle);

        let dropped = self.worker.shutdown();
        drop(barrier);

        dropped
    }

    // Small price to pay to get introspection on all scheduler calls during
    // testing. No op in release builds.
    #[allow(unused)]
    #[inline(always)]
    fn track(&self, method: Method, call: Call) {
        #[cfg(test)]
        self.tracker.record(method, call);
    }
}

impl Schedule for Scheduler {
    fn release(&self, id: Id) {
        self.track(Method::Release, Call::Release { id });

        // A finished task is never parked, even if its safepoint future
        // outlives it.
        if let Some(barrier) = self.current_barrier()
            && barrier.withdraw(id)
        {
            tracing::trace!(task = %id, episode = %barrier.episode(), "finished task withdrawn");
        }

        let finished = self.tasks.borrow_mut().mark_finished(id);
        if finished {
            self.evaluate_barrier();
        }
    }

    fn unhandled_panic(&self, id: Id, message: &str) {
        tracing::warn!(task = %id, message, "task panicked");
        self.tasks.borrow_mut().insert_flags(id, TaskFlags::PANICKED);
        self.track(Method::UnhandledPanic, Call::UnhandledPanic { id });
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Handle(Rc<Scheduler>);

impl Handle {
    /// Registers a task and queues it for its first poll.
    ///
    /// `id` is the caller-chosen identity, if any. The body is built with the
    /// task's [`TaskCx`] right away, the returned future only runs once the
    /// runtime is driven.
    pub(crate) fn spawn<B, Fut>(
        &self,
        id: Option<Id>,
        body: B,
    ) -> Result<JoinHandle<Fut::Output>, SafepointError>
    where
        B: FnOnce(TaskCx) -> Fut,
        Fut: Future + 'static,
        Fut::Output: 'static,
    {
        let (id, flags) = {
            let mut tasks = self.tasks.borrow_mut();
            let (id, flags) = match id {
                Some(id) => (id, TaskFlags::USER_ID),
                None => (tasks.next_id(), TaskFlags::empty()),
            };

            tasks.register(id, flags)?;
            (id, tasks.flags(id).unwrap_or(flags))
        };

        let late = flags.contains(TaskFlags::LATE_JOINER);
        tracing::trace!(task = %id, late, "task submitted");
        self.track(Method::Spawn, Call::Spawn { id, late });

        // A body that panics while building its future never becomes a task.
        let mut guard = ScopeGuard::new(|| self.release(id));
        let future = body(TaskCx::new(id, Rc::downgrade(&self.0)));
        guard.disarm();

        Ok(self.worker.add_task(id, future))
    }
}

impl From<Rc<Scheduler>> for Handle {
    fn from(scheduler: Rc<Scheduler>) -> Self {
        Handle(scheduler)
    }
}

impl Deref for Handle {
    type Target = Rc<Scheduler>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
