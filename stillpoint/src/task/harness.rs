use crate::task::error::panic_payload_as_str;
use crate::task::join::Completion;
use crate::task::JoinError;
use pin_project::pin_project;
use std::future::Future;
use std::panic;
use std::pin::Pin;
use std::task::{Context, Poll};

/// How a task body ended, reported to the scheduler's completion hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TaskExit {
    Completed,
    Panicked(String),
}

/// Wraps a task body, catches panics and routes the output to the
/// [`JoinHandle`](crate::task::JoinHandle).
#[pin_project]
pub(crate) struct Harness<F: Future> {
    #[pin]
    future: F,
    completion: Completion<F::Output>,
}

impl<F: Future> Harness<F> {
    pub(crate) fn new(future: F, completion: Completion<F::Output>) -> Self {
        Self { future, completion }
    }
}

impl<F: Future> Future for Harness<F> {
    type Output = TaskExit;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut this = self.project();

        let res = panic::catch_unwind(panic::AssertUnwindSafe(|| this.future.as_mut().poll(cx)));

        match res {
            Ok(Poll::Pending) => Poll::Pending,
            Ok(Poll::Ready(output)) => {
                this.completion.complete(Ok(output));
                Poll::Ready(TaskExit::Completed)
            }
            Err(payload) => {
                let message = panic_payload_as_str(&payload)
                    .unwrap_or("unknown")
                    .to_string();

                this.completion.complete(Err(JoinError::Panic {
                    id: this.completion.id(),
                    message: message.clone(),
                }));

                Poll::Ready(TaskExit::Panicked(message))
            }
        }
    }
}
