//! A single-threaded cooperative scheduler that can be paused at a *safepoint*.
//!
//! Tasks mark the places where they are safe to suspend by awaiting
//! [`TaskCx::maybe_pause`]. An external driver asks the [`Runtime`] to
//! [`run_until_safe_state`], which polls tasks until every live task is either
//! finished or parked at its safepoint. The driver then owns a quiescent
//! program: it can snapshot, inspect or step it, and finally [`resume`] every
//! parked task at once.
//!
//! ```no_run
//! use stillpoint::{Builder, PauseOutcome};
//!
//! # fn main() -> anyhow::Result<()> {
//! let runtime = Builder::new_local().try_build()?;
//!
//! for worker in 0..3 {
//!     runtime.submit(move |cx| async move {
//!         for step in 0..5 {
//!             println!("worker {worker} step {step}");
//!             cx.maybe_pause().await?;
//!         }
//!         Ok::<_, stillpoint::SafepointError>(())
//!     })?;
//! }
//!
//! while let PauseOutcome::Paused = runtime.run_until_safe_state()? {
//!     // Every live task is parked at a safepoint here.
//!     runtime.resume();
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [`run_until_safe_state`]: Runtime::run_until_safe_state
//! [`resume`]: Runtime::resume

pub mod error;
pub use error::SafepointError;

pub mod runtime;
pub use runtime::{
    Builder, LateJoinerPolicy, PauseOutcome, PauseState, Runtime, SpawnBuilder, TaskFlags, TaskStatus,
};

pub mod safepoint;
pub use safepoint::{EpisodeId, MaybePause};

pub mod task;
pub use task::{Id, JoinError, JoinHandle, TaskCx};

pub mod time;

mod utils;

#[cfg(test)]
mod test_utils;
