//! Single-threaded executor driving the safepoint scheduler.

pub(crate) mod queue;
pub(crate) use queue::ReadyQueue;

pub(crate) mod scheduler;
pub(crate) use scheduler::{Handle, Scheduler};


pub(crate) mod worker;
