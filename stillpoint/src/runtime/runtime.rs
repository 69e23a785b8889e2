use crate::error::SafepointError;
use crate::runtime::local;
use crate::runtime::{PauseOutcome, PauseState, SpawnBuilder, TaskFlags, TaskStatus};
use crate::safepoint::EpisodeId;
use crate::task::{Id, JoinHandle, TaskCx};
use anyhow::{Result, anyhow};
use std::convert::TryFrom;
use std::future::Future;
use std::time::Duration;

/// Default number of task slots pre-allocated by the registry and the worker.
const INITIAL_CAPACITY: usize = 64;

/// Larger capacities are almost certainly a unit mistake.
const MAX_INITIAL_CAPACITY: usize = 1 << 20;

/// Upper bound on how long a stalled runtime waits for an external wake.
const MAX_STALL_TIMEOUT: Duration = Duration::from_secs(3600);

/// Decides how tasks submitted during an active pause episode are counted.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LateJoinerPolicy {
    /// The task is a regular participant of the running episode: the pause
    /// is not reached until it arrives at a safepoint or finishes.
    #[default]
    Block,

    /// The task is ignored by the running episode. If it reaches a safepoint
    /// anyway it parks, uncounted, and is released with everyone else. It
    /// becomes a regular participant from the next episode on.
    ///
    /// With this policy a `Paused` runtime may still hold late joiners that
    /// are not parked.
    Exempt,
}

#[derive(Debug)]
pub struct Builder {
    /// How tasks submitted mid-episode are counted.
    late_joiner_policy: LateJoinerPolicy,

    /// How long the runtime blocks waiting for an external wake when no task
    /// is ready, before reporting a stall.
    stall_timeout: Duration,

    /// Task slots pre-allocated by the registry, the worker and each barrier.
    initial_capacity: usize,
}

impl Builder {
    /// Returns a new builder for a runtime driven by the current thread.
    ///
    /// Configuration methods can be chained on the return value.
    pub fn new_local() -> Builder {
        Builder {
            late_joiner_policy: LateJoinerPolicy::default(),
            stall_timeout: Duration::ZERO,
            initial_capacity: INITIAL_CAPACITY,
        }
    }

    pub fn late_joiner_policy(mut self, policy: LateJoinerPolicy) -> Self {
        self.late_joiner_policy = policy;
        self
    }

    /// Sets how long the runtime waits for a task to be woken from outside
    /// (another thread, a channel) when nothing is ready to run.
    ///
    /// The default is zero: a runtime with no ready task and an unsatisfied
    /// barrier reports [`SafepointError::SchedulerStalled`] right away.
    pub fn stall_timeout(mut self, val: Duration) -> Self {
        self.stall_timeout = val;
        self
    }

    #[track_caller]
    pub fn initial_capacity(mut self, val: usize) -> Self {
        assert!(
            val.is_power_of_two(),
            "initial_capacity must be a power of two"
        );
        self.initial_capacity = val;
        self
    }

    /// Creates the configured `Runtime`.
    ///
    /// The returned `Runtime` is ready to accept tasks. Nothing runs until it
    /// is driven with [`Runtime::run_until_safe_state`] or
    /// [`Runtime::run_to_completion`].
    pub fn try_build(self) -> Result<Runtime> {
        let cfg = RuntimeConfig::try_from(self)?;
        let scheduler = local::Scheduler::new(&cfg).into_handle();

        tracing::debug!(
            policy = ?cfg.late_joiner_policy,
            stall_timeout = ?cfg.stall_timeout,
            "runtime created"
        );

        Ok(Runtime { scheduler })
    }
}

/// The pausable runtime.
///
/// Owns every submitted task and drives them from the calling thread. The
/// runtime is neither `Send` nor `Sync`: tasks and the driver share one
/// thread.
#[derive(Debug)]
pub struct Runtime {
    scheduler: local::Handle,
}

impl Runtime {
    /// Submits a task. `body` receives the task's [`TaskCx`] and returns the
    /// future to run.
    ///
    /// Submitting while a pause episode is active creates a late joiner, see
    /// [`LateJoinerPolicy`].
    pub fn submit<B, Fut>(&self, body: B) -> Result<JoinHandle<Fut::Output>, SafepointError>
    where
        B: FnOnce(TaskCx) -> Fut,
        Fut: Future + 'static,
        Fut::Output: 'static,
    {
        self.scheduler.spawn(None, body)
    }

    /// Returns a [`SpawnBuilder`] to configure the task before submitting it.
    pub fn spawn_builder(&self) -> SpawnBuilder<'_> {
        SpawnBuilder::new(&self.scheduler)
    }

    /// Drives tasks until every live task is parked at a safepoint or
    /// finished.
    ///
    /// A paused runtime is resumed first. With no live task, returns
    /// [`PauseOutcome::AllFinished`] right away.
    ///
    /// # Errors
    ///
    /// [`SafepointError::SchedulerStalled`] when no task can make progress and
    /// no external wake arrived within the stall timeout. The pause request
    /// stays active, the next call picks it up where it stopped.
    pub fn run_until_safe_state(&self) -> Result<PauseOutcome, SafepointError> {
        self.scheduler.run_until_safe_state()
    }

    /// Wakes every parked task at once. Returns false, and does nothing,
    /// unless the runtime is [`PauseState::Paused`].
    pub fn resume(&self) -> bool {
        self.scheduler.resume()
    }

    /// Drives tasks until all of them finished, without requesting a pause.
    ///
    /// A pending pause request (left by a stalled [`run_until_safe_state`])
    /// is honored and released as soon as it is satisfied.
    ///
    /// [`run_until_safe_state`]: Runtime::run_until_safe_state
    pub fn run_to_completion(&self) -> Result<(), SafepointError> {
        self.scheduler.run_to_completion()
    }

    pub fn state(&self) -> PauseState {
        self.scheduler.state()
    }

    /// Number of tasks that did not finish yet.
    pub fn live_count(&self) -> usize {
        self.scheduler.live_count()
    }

    /// The active pause episode, if any.
    pub fn episode(&self) -> Option<EpisodeId> {
        self.scheduler.episode()
    }

    /// Counted tasks parked at the active barrier.
    pub fn arrived_count(&self) -> usize {
        self.scheduler.arrived_count()
    }

    /// Number of tasks that terminated, by returning or panicking.
    pub fn finished_count(&self) -> usize {
        self.scheduler.tasks.borrow().finished_count()
    }

    /// Returns true when every submitted task finished.
    pub fn is_finished(&self) -> bool {
        self.live_count() == 0
    }

    /// Returns `None` if no task was ever registered with this id.
    pub fn task_status(&self, id: Id) -> Option<TaskStatus> {
        self.scheduler.tasks.borrow().status(id)
    }

    pub fn task_flags(&self, id: Id) -> Option<TaskFlags> {
        self.scheduler.tasks.borrow().flags(id)
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        let dropped = self.scheduler.shutdown();
        if dropped > 0 {
            tracing::debug!(dropped, "runtime dropped with live tasks");
        }
    }
}

// Test-only helpers
#[cfg(test)]
impl Runtime {
    pub(crate) fn expect_scheduler(&self) -> local::Handle {
        self.scheduler.clone()
    }
}

// Export runtime builder as a RuntimeConfig object to be consumed by the
// scheduler and its worker.
#[derive(Debug, Clone)]
pub(crate) struct RuntimeConfig {
    pub(crate) late_joiner_policy: LateJoinerPolicy,
    pub(crate) stall_timeout: Duration,
    pub(crate) initial_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            late_joiner_policy: LateJoinerPolicy::default(),
            stall_timeout: Duration::ZERO,
            initial_capacity: INITIAL_CAPACITY,
        }
    }
}

impl RuntimeConfig {
    fn validate(&self) -> Result<()> {
        if self.initial_capacity > MAX_INITIAL_CAPACITY {
            return Err(anyhow!(
                "initial_capacity {} exceeds the maximum of {}",
                self.initial_capacity,
                MAX_INITIAL_CAPACITY
            ));
        }

        if self.stall_timeout > MAX_STALL_TIMEOUT {
            return Err(anyhow!(
                "stall_timeout {:?} exceeds the maximum of {:?}",
                self.stall_timeout,
                MAX_STALL_TIMEOUT
            ));
        }

        Ok(())
    }
}

impl TryFrom<Builder> for RuntimeConfig {
    type Error = anyhow::Error;

    fn try_from(builder: Builder) -> Result<Self, Self::Error> {
        let cfg = RuntimeConfig {
            late_joiner_policy: builder.late_joiner_policy,
            stall_timeout: builder.stall_timeout,
            initial_capacity: builder.initial_capacity,
        };

        cfg.validate()?;

        Ok(cfg)
    }
}
