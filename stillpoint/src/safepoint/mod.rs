//! Safepoints: the places where a task agrees to be suspended while the
//! driver works on a quiescent program.

use crate::error::SafepointError;
use crate::task::TaskCx;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

pub(crate) mod barrier;
pub use barrier::EpisodeId;
pub(crate) use barrier::SafepointBarrier;

pub(crate) mod signal;
pub(crate) use signal::Signal;

/// Future returned by [`TaskCx::maybe_pause`].
///
/// Resolves immediately when no pause is requested. Otherwise the task arrives
/// at the current episode's barrier and the future stays pending until the
/// driver resumes the runtime.
///
/// Dropping a parked `MaybePause` withdraws the arrival, so a task that stops
/// waiting (for example because it raced the safepoint against another
/// future) is no longer counted as parked.
#[must_use = "futures do nothing unless you `.await` or poll them"]
#[derive(Debug)]
pub struct MaybePause {
    task: TaskCx,
    stage: Stage,
}

#[derive(Debug)]
enum Stage {
    Init,
    Parked {
        barrier: Rc<SafepointBarrier>,
        resume: Rc<Signal>,
    },
    Done,
}

impl MaybePause {
    pub(crate) fn new(task: TaskCx) -> Self {
        Self {
            task,
            stage: Stage::Init,
        }
    }

    fn park(
        &mut self,
        barrier: Rc<SafepointBarrier>,
        resume: Rc<Signal>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<(), SafepointError>> {
        match resume.poll_fired(cx.waker()) {
            Poll::Ready(()) => Poll::Ready(Ok(())),
            Poll::Pending => {
                self.stage = Stage::Parked { barrier, resume };
                Poll::Pending
            }
        }
    }
}

impl Future for MaybePause {
    type Output = Result<(), SafepointError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        match std::mem::replace(&mut this.stage, Stage::Done) {
            Stage::Init => {
                let scheduler = this.task.scheduler()?;

                match scheduler.arrive(this.task.id())? {
                    Some((barrier, resume)) => this.park(barrier, resume, cx),
                    None => Poll::Ready(Ok(())),
                }
            }
            Stage::Parked { barrier, resume } => {
                // Polled again before the release: the task is back at its
                // safepoint.
                if !resume.is_fired()
                    && let Ok(scheduler) = this.task.scheduler()
                {
                    scheduler.repark(&barrier, this.task.id());
                }

                this.park(barrier, resume, cx)
            }
            Stage::Done => panic!("`MaybePause` polled after completion"),
        }
    }
}

impl Drop for MaybePause {
    fn drop(&mut self) {
        if let Stage::Parked { barrier, .. } = &self.stage
            && barrier.withdraw(self.task.id())
        {
            tracing::trace!(
                task = %self.task.id(),
                episode = %barrier.episode(),
                "safepoint arrival withdrawn"
            );
        }
    }
}
