#![allow(unused)]

use crate::safepoint::EpisodeId;
use crate::task::Id;
use std::cell::RefCell;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Method {
    Spawn,
    Release,
    Arrive,
    Satisfied,
    Resume,
    Stall,
    UnhandledPanic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Spawn {
        id: Id,
        late: bool,
    },
    Release {
        id: Id,
    },
    Arrive {
        id: Id,
        episode: EpisodeId,
        counted: bool,
    },
    Satisfied {
        episode: EpisodeId,
        arrived: usize,
    },
    Resume {
        episode: EpisodeId,
    },
    Stall {
        live: usize,
        arrived: usize,
    },
    UnhandledPanic {
        id: Id,
    },
}

/// Records every call made on the scheduler, in order, per method.
#[derive(Debug, Default)]
pub(crate) struct Tracker {
    calls: RefCell<HashMap<Method, Vec<Call>>>,
}

impl Tracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&self, method: Method, call: Call) {
        self.calls.borrow_mut().entry(method).or_default().push(call)
    }

    pub(crate) fn get_calls(&self, method: &Method) -> Vec<Call> {
        self.calls
            .borrow()
            .get(method)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn num_calls(&self, method: &Method) -> usize {
        self.calls.borrow().get(method).map_or(0, |calls| calls.len())
    }
}
