use crate::error::SafepointError;
use crate::safepoint::signal::Signal;
use crate::task::Id;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Identifies one pause episode: the span between a pause request and the
/// matching resume. Episodes are numbered from 1 and never reused by a runtime.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct EpisodeId(u64);

impl EpisodeId {
    pub(crate) fn new(val: u64) -> Self {
        Self(val)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy)]
struct Arrival {
    /// Exempt late joiners park without being counted.
    counted: bool,

    /// False while the task runs again after arriving, for example because
    /// another future it awaits next to the safepoint woke it up.
    parked: bool,
}

/// Rendezvous point for a single pause episode.
///
/// Tasks arrive one by one and park on the `resume` signal. The scheduler
/// re-evaluates the barrier after every arrival and every task completion;
/// `satisfied` fires when the number of counted, parked tasks matches the live
/// participants. A barrier is dropped at the end of its episode, the next
/// episode gets a fresh one.
///
/// An arrival stops counting as soon as its task runs again, stops waiting on
/// the safepoint or finishes. If that happens after `satisfied` fired, the
/// signal is re-armed and has to fire again before the runtime can pause.
#[derive(Debug)]
pub(crate) struct SafepointBarrier {
    episode: EpisodeId,

    /// Counted arrivals whose task is currently parked.
    arrived: Cell<usize>,

    arrivals: RefCell<HashMap<Id, Arrival>>,

    satisfied: RefCell<Signal>,

    resume: Rc<Signal>,
}

impl SafepointBarrier {
    pub(crate) fn new(episode: EpisodeId, capacity: usize) -> Self {
        Self {
            episode,
            arrived: Cell::new(0),
            arrivals: RefCell::new(HashMap::with_capacity(capacity)),
            satisfied: RefCell::new(Signal::new()),
            resume: Rc::new(Signal::new()),
        }
    }

    pub(crate) fn episode(&self) -> EpisodeId {
        self.episode
    }

    /// Records the arrival of `id` and hands back the signal to park on.
    ///
    /// Callers must run [`SafepointBarrier::evaluate`] afterwards.
    pub(crate) fn arrive(&self, id: Id, counted: bool) -> Result<Rc<Signal>, SafepointError> {
        let mut arrivals = self.arrivals.borrow_mut();
        if arrivals.contains_key(&id) {
            return Err(SafepointError::DoubleArrival(id));
        }

        arrivals.insert(
            id,
            Arrival {
                counted,
                parked: true,
            },
        );
        if counted {
            self.arrived.set(self.arrived.get() + 1);
        }

        Ok(Rc::clone(&self.resume))
    }

    /// Fires `satisfied` if every live participant arrived. Returns true only
    /// on the call that fired it.
    pub(crate) fn evaluate(&self, live: usize) -> bool {
        let arrived = self.arrived.get();
        debug_assert!(
            arrived <= live,
            "episode {}: {arrived} arrivals for {live} live tasks",
            self.episode
        );

        arrived == live && self.satisfied.borrow().fire()
    }

    /// The task is about to run again. Returns true if it was parked here.
    pub(crate) fn unpark(&self, id: Id) -> bool {
        let mut arrivals = self.arrivals.borrow_mut();
        let Some(arrival) = arrivals.get_mut(&id).filter(|a| a.parked) else {
            return false;
        };

        arrival.parked = false;
        if arrival.counted {
            self.uncount();
        }
        true
    }

    /// The task went back to waiting on the safepoint. Returns true if it had
    /// been unparked. Callers must run [`SafepointBarrier::evaluate`]
    /// afterwards.
    pub(crate) fn repark(&self, id: Id) -> bool {
        if self.is_released() {
            return false;
        }

        let mut arrivals = self.arrivals.borrow_mut();
        let Some(arrival) = arrivals.get_mut(&id).filter(|a| !a.parked) else {
            return false;
        };

        arrival.parked = true;
        if arrival.counted {
            self.arrived.set(self.arrived.get() + 1);
        }
        true
    }

    /// Wakes every parked task. Returns false if the barrier was already
    /// released.
    pub(crate) fn release(&self) -> bool {
        self.resume.fire()
    }

    /// Cancels a parked arrival whose task stopped waiting. No-op once the
    /// barrier is released.
    pub(crate) fn withdraw(&self, id: Id) -> bool {
        if self.is_released() {
            return false;
        }

        match self.arrivals.borrow_mut().remove(&id) {
            Some(arrival) => {
                if arrival.counted && arrival.parked {
                    self.uncount();
                }
                true
            }
            None => false,
        }
    }

    /// Drops one counted arrival. A satisfied barrier no longer is.
    fn uncount(&self) {
        self.arrived.set(self.arrived.get() - 1);
        self.rearm();
    }

    /// Replaces a fired `satisfied` signal with a pending one.
    pub(crate) fn rearm(&self) {
        if self.is_satisfied() {
            self.satisfied.replace(Signal::new());
        }
    }

    /// Counted arrivals whose task is parked.
    pub(crate) fn parked_participants(&self) -> Vec<Id> {
        self.arrivals
            .borrow()
            .iter()
            .filter(|(_, a)| a.counted && a.parked)
            .map(|(id, _)| *id)
            .collect()
    }

    pub(crate) fn is_satisfied(&self) -> bool {
        self.satisfied.borrow().is_fired()
    }

    pub(crate) fn is_released(&self) -> bool {
        self.resume.is_fired()
    }

    pub(crate) fn arrived(&self) -> usize {
        self.arrived.get()
    }

    /// Parked tasks, counted or not.
    pub(crate) fn parked(&self) -> usize {
        self.arrivals.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::mock_waker;
    use anyhow::Result;

    fn id(val: u64) -> Id {
        Id::new(val).expect("non-zero")
    }

    fn barrier() -> SafepointBarrier {
        SafepointBarrier::new(EpisodeId::new(1), 4)
    }

    #[test]
    fn test_satisfied_fires_once() -> Result<()> {
        let barrier = barrier();

        barrier.arrive(id(1), true)?;
        assert!(!barrier.evaluate(2));

        barrier.arrive(id(2), true)?;
        assert!(barrier.evaluate(2));
        assert!(!barrier.evaluate(2));
        assert!(barrier.is_satisfied());
        assert_eq!(barrier.arrived(), 2);

        Ok(())
    }

    #[test]
    fn test_vacuous_barrier() {
        let barrier = barrier();
        assert!(barrier.evaluate(0));
    }

    #[test]
    fn test_completion_satisfies() -> Result<()> {
        let barrier = barrier();

        barrier.arrive(id(1), true)?;
        assert!(!barrier.evaluate(2));

        // The other task finished without arriving.
        assert!(barrier.evaluate(1));

        Ok(())
    }

    #[test]
    fn test_double_arrival() -> Result<()> {
        let barrier = barrier();

        barrier.arrive(id(1), true)?;
        assert_eq!(
            barrier.arrive(id(1), true).err(),
            Some(SafepointError::DoubleArrival(id(1)))
        );
        assert_eq!(barrier.arrived(), 1);

        Ok(())
    }

    #[test]
    fn test_uncounted_arrival() -> Result<()> {
        let barrier = barrier();

        barrier.arrive(id(1), true)?;
        barrier.arrive(id(2), false)?;
        assert_eq!(barrier.arrived(), 1);
        assert_eq!(barrier.parked(), 2);
        assert!(barrier.evaluate(1));

        Ok(())
    }

    #[test]
    fn test_release_wakes_parked() -> Result<()> {
        let barrier = barrier();
        let (waker, data) = mock_waker();

        let resume = barrier.arrive(id(1), true)?;
        assert!(resume.poll_fired(&waker).is_pending());

        assert!(barrier.evaluate(1));
        assert!(barrier.release());
        assert!(!barrier.release());

        assert_eq!(data.get_count(), 1);
        assert!(resume.poll_fired(&waker).is_ready());
        assert!(barrier.is_released());

        Ok(())
    }

    #[test]
    fn test_withdraw_rearms_satisfied() -> Result<()> {
        let barrier = barrier();

        barrier.arrive(id(1), true)?;
        assert!(barrier.evaluate(1));
        assert!(barrier.is_satisfied());

        assert!(barrier.withdraw(id(1)));
        assert!(!barrier.is_satisfied());
        assert_eq!(barrier.arrived(), 0);

        // Fires again once the barrier holds again.
        assert!(!barrier.evaluate(1));
        assert!(barrier.evaluate(0));

        Ok(())
    }

    #[test]
    fn test_unpark_and_repark() -> Result<()> {
        let barrier = barrier();

        barrier.arrive(id(1), true)?;
        barrier.arrive(id(2), false)?;
        assert!(barrier.evaluate(1));
        assert_eq!(barrier.parked_participants(), vec![id(1)]);

        assert!(barrier.unpark(id(1)));
        assert!(!barrier.unpark(id(1)));
        assert!(!barrier.is_satisfied());
        assert_eq!(barrier.arrived(), 0);
        assert!(barrier.parked_participants().is_empty());

        // Uncounted arrivals never move the count.
        assert!(barrier.unpark(id(2)));
        assert_eq!(barrier.arrived(), 0);

        assert!(barrier.repark(id(1)));
        assert!(!barrier.repark(id(1)));
        assert_eq!(barrier.arrived(), 1);
        assert!(barrier.evaluate(1));

        // Unparked arrivals withdraw without touching the count.
        assert!(barrier.repark(id(2)));
        assert!(barrier.unpark(id(2)));
        assert!(barrier.withdraw(id(2)));
        assert_eq!(barrier.arrived(), 1);
        assert!(barrier.is_satisfied());

        Ok(())
    }

    #[test]
    fn test_withdraw() -> Result<()> {
        let barrier = barrier();

        barrier.arrive(id(1), true)?;
        barrier.arrive(id(2), false)?;

        assert!(barrier.withdraw(id(1)));
        assert!(!barrier.withdraw(id(1)));
        assert_eq!(barrier.arrived(), 0);

        assert!(barrier.withdraw(id(2)));
        assert_eq!(barrier.parked(), 0);

        // Withdrawn tasks may arrive again.
        barrier.arrive(id(1), true)?;
        barrier.release();
        assert!(!barrier.withdraw(id(1)));
        assert_eq!(barrier.arrived(), 1);

        Ok(())
    }
}
