use crate::task::Id;
use std::any::Any;

/// Task failed to execute to completion.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum JoinError {
    /// The task body panicked. The payload is kept as text when it was a
    /// string, which covers `panic!` with a message.
    #[error("task {id} panicked: {message}")]
    Panic { id: Id, message: String },

    /// The task was dropped before it completed, which happens when the
    /// runtime is dropped with tasks still alive.
    #[error("task {0} was cancelled")]
    Cancelled(Id),
}

impl JoinError {
    pub fn id(&self) -> Id {
        match self {
            JoinError::Panic { id, .. } => *id,
            JoinError::Cancelled(id) => *id,
        }
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, JoinError::Panic { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, JoinError::Cancelled(_))
    }
}

pub(crate) fn panic_payload_as_str(payload: &Box<dyn Any + Send>) -> Option<&str> {
    if let Some(s) = payload.downcast_ref::<String>() {
        return Some(s);
    }

    if let Some(s) = payload.downcast_ref::<&'static str>() {
        return Some(s);
    }

    None
}
