use smallvec::SmallVec;
use std::cell::{Cell, RefCell};
use std::task::{Poll, Waker};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum SignalState {
    #[default]
    Pending,
    Fired,
}

/// One-shot event. Starts `Pending`, moves to `Fired` once and stays there.
///
/// Waiters register their waker through [`Signal::poll_fired`]; firing wakes
/// all of them at once.
#[derive(Debug, Default)]
pub(crate) struct Signal {
    state: Cell<SignalState>,
    waiters: RefCell<SmallVec<[Waker; 8]>>,
}

impl Signal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn state(&self) -> SignalState {
        self.state.get()
    }

    pub(crate) fn is_fired(&self) -> bool {
        self.state() == SignalState::Fired
    }

    /// Fires the signal. Returns false, and does nothing, if it already fired.
    pub(crate) fn fire(&self) -> bool {
        if self.state.replace(SignalState::Fired) == SignalState::Fired {
            return false;
        }

        // Waking may re-enter the signal, don't hold the borrow.
        let waiters = std::mem::take(&mut *self.waiters.borrow_mut());
        for waker in waiters {
            waker.wake();
        }

        true
    }

    pub(crate) fn poll_fired(&self, waker: &Waker) -> Poll<()> {
        if self.is_fired() {
            return Poll::Ready(());
        }

        let mut waiters = self.waiters.borrow_mut();
        if !waiters.iter().any(|w| w.will_wake(waker)) {
            waiters.push(waker.clone());
        }

        Poll::Pending
    }
}
