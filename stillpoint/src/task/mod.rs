// Public API
mod cx;
pub use self::cx::TaskCx;

mod error;
pub use self::error::JoinError;

mod join;
pub use self::join::JoinHandle;

pub mod id;
pub use self::id::Id;

mod harness;
pub(crate) use self::harness::TaskExit;

pub(crate) mod task;
pub(crate) use self::task::{Task, new_task};

mod waker;

/// Task result sent back through the [`JoinHandle`].
pub type Result<T> = std::result::Result<T, JoinError>;
