use crate::task::Id;

/// Errors raised by the safepoint machinery.
///
/// All of them signal a contract violation by the embedding program or a
/// program that cannot make progress. The scheduler never retries on its own.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SafepointError {
    /// A task identity was registered twice. Ids stay reserved after the task
    /// finishes.
    #[error("task {0} is already registered")]
    DuplicateRegistration(Id),

    /// A task reached the safepoint again before the current pause episode
    /// released it.
    #[error("task {0} arrived at the safepoint twice in the same episode")]
    DoubleArrival(Id),

    /// Nothing is ready to run, no external wake arrived in time and the
    /// barrier is not satisfied.
    #[error("scheduler stalled with {live} live tasks, {arrived} parked at the safepoint")]
    SchedulerStalled { live: usize, arrived: usize },

    /// A [`TaskCx`] outlived the runtime that created it.
    ///
    /// [`TaskCx`]: crate::task::TaskCx
    #[error("the runtime owning this task has been dropped")]
    RuntimeGone,
}

impl SafepointError {
    /// Returns true if the error reports a stall rather than a misuse of the API.
    pub fn is_stalled(&self) -> bool {
        matches!(self, SafepointError::SchedulerStalled { .. })
    }
}
