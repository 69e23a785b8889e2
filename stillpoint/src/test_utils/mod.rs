use crate::runtime::{Builder, LateJoinerPolicy, Runtime};
use anyhow::Result;
use std::cell::RefCell;
use std::rc::Rc;

pub(crate) mod mocks;
pub(crate) use mocks::{DummyScheduler, mock_waker};

pub(crate) fn init_local_runtime(policy: Option<LateJoinerPolicy>) -> Result<Runtime> {
    Builder::new_local()
        .late_joiner_policy(policy.unwrap_or_default())
        .try_build()
}

/// Ordered record of what tasks did, shared between task bodies and the test.
#[derive(Debug, Clone, Default)]
pub(crate) struct EventLog(Rc<RefCell<Vec<String>>>);

impl EventLog {
    pub(crate) fn push(&self, event: impl Into<String>) {
        self.0.borrow_mut().push(event.into());
    }

    pub(crate) fn events(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Number of events equal to `event`.
    pub(crate) fn count(&self, event: &str) -> usize {
        self.0.borrow().iter().filter(|e| *e == event).count()
    }
}
