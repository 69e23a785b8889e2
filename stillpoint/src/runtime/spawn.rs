//! Configurable task submission.
//!
//! [`Runtime::submit`] covers the common case. The [`SpawnBuilder`] lets the
//! caller pick the task identity, which is how a task restored from a
//! snapshot keeps the id it had before.
//!
//! [`Runtime::submit`]: crate::runtime::Runtime::submit

use crate::error::SafepointError;
use crate::runtime::local;
use crate::task::{Id, JoinHandle, TaskCx};
use std::future::Future;

/// A builder for configuring and submitting a task.
///
/// # Example
///
/// ```no_run
/// use stillpoint::{Builder, Id};
///
/// # fn main() -> anyhow::Result<()> {
/// let runtime = Builder::new_local().try_build()?;
/// let id = Id::new(42).expect("non-zero");
///
/// let handle = runtime
///     .spawn_builder()
///     .with_id(id)
///     .submit(|cx| async move { cx.id() })?;
///
/// runtime.run_to_completion()?;
/// assert_eq!(handle.try_take_output(), Some(Ok(id)));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
#[must_use = "a SpawnBuilder does nothing until `submit` is called"]
pub struct SpawnBuilder<'a> {
    scheduler: &'a local::Handle,
    id: Option<Id>,
}

impl<'a> SpawnBuilder<'a> {
    pub(crate) fn new(scheduler: &'a local::Handle) -> Self {
        Self {
            scheduler,
            id: None,
        }
    }

    /// Uses `id` instead of letting the runtime allocate one. Submitting fails
    /// with [`SafepointError::DuplicateRegistration`] if the id was ever used
    /// by this runtime.
    pub fn with_id(mut self, id: Id) -> Self {
        self.id = Some(id);
        self
    }

    pub fn submit<B, Fut>(self, body: B) -> Result<JoinHandle<Fut::Output>, SafepointError>
    where
        B: FnOnce(TaskCx) -> Fut,
        Fut: Future + 'static,
        Fut::Output: 'static,
    {
        self.scheduler.spawn(self.id, body)
    }
}
