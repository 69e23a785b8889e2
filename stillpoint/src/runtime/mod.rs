use crate::task::Id;

// Public API
pub mod runtime;
pub use runtime::{Builder, LateJoinerPolicy, Runtime};

pub mod spawn;
pub use spawn::SpawnBuilder;

pub mod registry;
pub use registry::{TaskFlags, TaskStatus};

// Exports
pub(crate) mod local;

pub(crate) use registry::TaskRegistry;
pub(crate) use runtime::RuntimeConfig;

/// Completion hook injected into every task when it is submitted. The worker
/// calls it once the task body returned or panicked.
pub(crate) trait Schedule {
    /// The task terminated. Its body and output slot are already dropped.
    fn release(&self, id: Id);

    /// Polling the task resulted in a panic. Called before `release`.
    fn unhandled_panic(&self, _id: Id, _message: &str) {
        // By default, do nothing.
    }
}

/// Where the runtime stands in the pause cycle.
///
/// ```text
/// Idle --run_until_safe_state--> Awaiting --barrier satisfied--> Paused
///   ^                                                              |
///   +------------------------------resume--------------------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseState {
    /// No pause requested. Safepoints are no-ops.
    Idle,

    /// A pause was requested and the runtime is waiting for live tasks to
    /// reach a safepoint.
    Awaiting,

    /// Every live task is parked at a safepoint or finished.
    Paused,
}

/// Result of driving the runtime towards a safe state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseOutcome {
    /// Every live task is parked at a safepoint. Call
    /// [`Runtime::resume`] to let them continue.
    Paused,

    /// No live task remains.
    AllFinished,
}
