use crate::task::{Id, JoinError, Result};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

/// Output slot shared between a task and its [`JoinHandle`].
pub(crate) struct JoinState<T> {
    finished: Cell<bool>,
    output: RefCell<Option<Result<T>>>,
    waker: RefCell<Option<Waker>>,
}

impl<T> JoinState<T> {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self {
            finished: Cell::new(false),
            output: RefCell::new(None),
            waker: RefCell::new(None),
        })
    }

    fn is_finished(&self) -> bool {
        self.finished.get()
    }

    /// Stores the task result. Only the first result is kept.
    fn complete(&self, res: Result<T>) {
        if self.finished.replace(true) {
            return;
        }

        self.output.replace(Some(res));

        let waker = self.waker.borrow_mut().take();
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

/// The task side of a [`JoinState`]. Completes the handle with
/// [`JoinError::Cancelled`] if the task is dropped before producing a result.
pub(crate) struct Completion<T> {
    id: Id,
    state: Rc<JoinState<T>>,
}

impl<T> Completion<T> {
    pub(crate) fn new(id: Id, state: Rc<JoinState<T>>) -> Self {
        Self { id, state }
    }

    pub(crate) fn id(&self) -> Id {
        self.id
    }

    pub(crate) fn complete(&self, res: Result<T>) {
        self.state.complete(res);
    }
}

impl<T> Drop for Completion<T> {
    fn drop(&mut self) {
        if !self.state.is_finished() {
            self.state.complete(Err(JoinError::Cancelled(self.id)));
        }
    }
}

/// An owned permission to join on a task (await its termination).
///
/// The handle is returned by [`Runtime::submit`] and [`TaskCx::spawn`]. Tasks
/// can `.await` it. The driver, which runs outside of any task, reads the
/// result with [`JoinHandle::try_take_output`] once the task finished.
///
/// Dropping the handle detaches the task: it keeps running and its result is
/// discarded.
///
/// ```no_run
/// use stillpoint::Builder;
///
/// # fn main() -> anyhow::Result<()> {
/// let runtime = Builder::new_local().try_build()?;
/// let handle = runtime.submit(|_cx| async { 5 + 3 })?;
///
/// runtime.run_to_completion()?;
/// assert_eq!(handle.try_take_output(), Some(Ok(8)));
/// # Ok(())
/// # }
/// ```
///
/// [`Runtime::submit`]: crate::runtime::Runtime::submit
/// [`TaskCx::spawn`]: crate::task::TaskCx::spawn
pub struct JoinHandle<T> {
    id: Id,
    state: Rc<JoinState<T>>,
}

impl<T> JoinHandle<T> {
    pub(crate) fn new(id: Id, state: Rc<JoinState<T>>) -> Self {
        Self { id, state }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    /// Returns true once the task completed, panicked or was cancelled.
    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    /// Takes the task result if the task is finished. Returns `None` if the
    /// task is still running or the output was already taken.
    pub fn try_take_output(&self) -> Option<Result<T>> {
        self.state.output.borrow_mut().take()
    }
}

impl<T> Future for JoinHandle<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if !self.state.is_finished() {
            self.state.waker.replace(Some(cx.waker().clone()));
            return Poll::Pending;
        }

        match self.state.output.borrow_mut().take() {
            Some(output) => Poll::Ready(output),
            None => panic!("JoinHandle for task {} polled after its output was taken", self.id),
        }
    }
}

impl<T> fmt::Debug for JoinHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinHandle")
            .field("id", &self.id)
            .field("finished", &self.is_finished())
            .finish()
    }
}
