use std::{fmt, num::NonZeroU64};

/// An opaque ID that uniquely identifies a task within its runtime.
///
/// Ids are handed out by the runtime when a task is submitted, or picked by the
/// embedder through [`SpawnBuilder::with_id`] when a task must keep a stable
/// identity (for example a task restored from a snapshot). An id is never
/// reused by the same runtime, even after its task finished.
///
/// [`SpawnBuilder::with_id`]: crate::runtime::SpawnBuilder::with_id
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct Id(pub(crate) NonZeroU64);

impl Id {
    /// Smallest id, the first one the runtime allocates.
    pub(crate) const MIN: Id = Id(NonZeroU64::MIN);

    /// Builds an id from a raw value. Returns `None` for zero.
    pub fn new(val: u64) -> Option<Self> {
        NonZeroU64::new(val).map(Self)
    }

    pub fn as_u64(&self) -> u64 {
        self.0.get()
    }

    /// The id following this one. Used by the registry to allocate fresh ids.
    pub(crate) fn successor(&self) -> Self {
        match self.0.checked_add(1) {
            Some(next) => Self(next),
            None => Self::exhausted(),
        }
    }

    #[cold]
    fn exhausted() -> ! {
        panic!("failed to generate unique task ID: bitspace exhausted")
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
