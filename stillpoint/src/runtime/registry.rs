use crate::error::SafepointError;
use crate::runtime::LateJoinerPolicy;
use crate::safepoint::EpisodeId;
use crate::task::Id;
use bitflags::bitflags;
use std::collections::HashMap;

bitflags! {
    /// Extra facts recorded about a task when it is registered or later.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TaskFlags: u8 {
        /// The id was picked by the caller instead of allocated by the runtime.
        const USER_ID = 1;

        /// The task was submitted while a pause episode was active.
        const LATE_JOINER = 1 << 1;

        /// The task body panicked.
        const PANICKED = 1 << 2;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Alive,
    Finished,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    status: TaskStatus,
    flags: TaskFlags,

    /// Episode that was active when the task was registered.
    joined_during: Option<EpisodeId>,
}

/// Every task the runtime ever accepted, alive or finished.
///
/// Entries are never removed, which is what makes an id single-use for the
/// lifetime of the runtime. The live count is kept separately so that the
/// barrier can be re-evaluated without scanning the map.
#[derive(Debug)]
pub(crate) struct TaskRegistry {
    entries: HashMap<Id, Entry>,

    live: usize,

    /// Alive tasks that joined during the current episode.
    late_live: usize,

    episode: Option<EpisodeId>,

    next_id: Id,
}

impl TaskRegistry {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            live: 0,
            late_live: 0,
            episode: None,
            next_id: Id::MIN,
        }
    }

    /// Records a new alive task.
    ///
    /// An id that was registered before is rejected, even if its task already
    /// finished.
    pub(crate) fn register(&mut self, id: Id, mut flags: TaskFlags) -> Result<(), SafepointError> {
        if self.entries.contains_key(&id) {
            return Err(SafepointError::DuplicateRegistration(id));
        }

        if self.episode.is_some() {
            flags |= TaskFlags::LATE_JOINER;
            self.late_live += 1;
        }

        self.entries.insert(
            id,
            Entry {
                status: TaskStatus::Alive,
                flags,
                joined_during: self.episode,
            },
        );
        self.live += 1;

        Ok(())
    }

    /// Marks a task finished. Returns false if the task is unknown or was
    /// already finished.
    pub(crate) fn mark_finished(&mut self, id: Id) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };

        if entry.status == TaskStatus::Finished {
            return false;
        }

        entry.status = TaskStatus::Finished;
        self.live -= 1;

        if self.episode.is_some() && entry.joined_during == self.episode {
            self.late_live -= 1;
        }

        true
    }

    pub(crate) fn insert_flags(&mut self, id: Id, flags: TaskFlags) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.flags |= flags;
        }
    }

    pub(crate) fn status(&self, id: Id) -> Option<TaskStatus> {
        self.entries.get(&id).map(|e| e.status)
    }

    pub(crate) fn flags(&self, id: Id) -> Option<TaskFlags> {
        self.entries.get(&id).map(|e| e.flags)
    }

    pub(crate) fn live_count(&self) -> usize {
        self.live
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn finished_count(&self) -> usize {
        self.len() - self.live
    }

    /// Number of alive tasks the current episode has to wait for.
    pub(crate) fn live_participants(&self, policy: LateJoinerPolicy) -> usize {
        match policy {
            LateJoinerPolicy::Block => self.live,
            LateJoinerPolicy::Exempt => self.live - self.late_live,
        }
    }

    /// Returns true if the task joined during the current episode and the
    /// policy does not count it.
    pub(crate) fn is_exempt(&self, id: Id, policy: LateJoinerPolicy) -> bool {
        if policy == LateJoinerPolicy::Block || self.episode.is_none() {
            return false;
        }

        self.entries
            .get(&id)
            .is_some_and(|e| e.joined_during == self.episode)
    }

    pub(crate) fn begin_episode(&mut self, episode: EpisodeId) {
        debug_assert!(self.episode.is_none(), "episode {episode} started twice");
        self.episode = Some(episode);
        self.late_live = 0;
    }

    /// Late joiners of the finished episode become regular participants.
    pub(crate) fn end_episode(&mut self) {
        self.episode = None;
        self.late_live = 0;
    }

    /// Allocates an id that was never registered.
    pub(crate) fn next_id(&mut self) -> Id {
        let mut id = self.next_id;
        while self.entries.contains_key(&id) {
            id = id.successor();
        }

        self.next_id = id.successor();
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use rstest::rstest;

    fn id(val: u64) -> Id {
        Id::new(val).expect("non-zero")
    }

    #[test]
    fn test_register_and_finish() -> Result<()> {
        let mut registry = TaskRegistry::with_capacity(4);

        registry.register(id(1), TaskFlags::empty())?;
        registry.register(id(2), TaskFlags::USER_ID)?;
        assert_eq!(registry.live_count(), 2);
        assert_eq!(registry.status(id(1)), Some(TaskStatus::Alive));
        assert_eq!(registry.flags(id(2)), Some(TaskFlags::USER_ID));

        assert!(registry.mark_finished(id(1)));
        assert_eq!(registry.live_count(), 1);
        assert_eq!(registry.finished_count(), 1);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.status(id(1)), Some(TaskStatus::Finished));

        Ok(())
    }

    #[test]
    fn test_mark_finished_is_idempotent() -> Result<()> {
        let mut registry = TaskRegistry::with_capacity(4);
        registry.register(id(1), TaskFlags::empty())?;

        assert!(registry.mark_finished(id(1)));
        assert!(!registry.mark_finished(id(1)));
        assert!(!registry.mark_finished(id(99)));
        assert_eq!(registry.live_count(), 0);

        Ok(())
    }

    #[rstest]
    #[case::alive(false)]
    #[case::finished(true)]
    fn test_duplicate_registration(#[case] finish_first: bool) -> Result<()> {
        let mut registry = TaskRegistry::with_capacity(4);
        registry.register(id(3), TaskFlags::empty())?;

        if finish_first {
            registry.mark_finished(id(3));
        }

        assert_eq!(
            registry.register(id(3), TaskFlags::empty()),
            Err(SafepointError::DuplicateRegistration(id(3)))
        );
        assert_eq!(registry.len(), 1);

        Ok(())
    }

    #[test]
    fn test_next_id_skips_registered() -> Result<()> {
        let mut registry = TaskRegistry::with_capacity(4);
        registry.register(id(1), TaskFlags::USER_ID)?;
        registry.register(id(2), TaskFlags::USER_ID)?;

        assert_eq!(registry.next_id(), id(3));
        assert_eq!(registry.next_id(), id(4));

        Ok(())
    }

    #[rstest]
    #[case::block(LateJoinerPolicy::Block, 3, false)]
    #[case::exempt(LateJoinerPolicy::Exempt, 2, true)]
    fn test_late_joiner_bookkeeping(
        #[case] policy: LateJoinerPolicy,
        #[case] expected_participants: usize,
        #[case] expected_exempt: bool,
    ) -> Result<()> {
        let mut registry = TaskRegistry::with_capacity(4);
        registry.register(id(1), TaskFlags::empty())?;
        registry.register(id(2), TaskFlags::empty())?;

        registry.begin_episode(EpisodeId::new(1));
        registry.register(id(3), TaskFlags::empty())?;

        assert_eq!(registry.flags(id(3)), Some(TaskFlags::LATE_JOINER));
        assert_eq!(registry.live_participants(policy), expected_participants);
        assert_eq!(registry.is_exempt(id(3), policy), expected_exempt);
        assert!(!registry.is_exempt(id(1), policy));

        // A late joiner finishing is no longer counted either way.
        registry.mark_finished(id(3));
        assert_eq!(registry.live_participants(policy), 2);

        registry.end_episode();
        assert!(!registry.is_exempt(id(3), policy));

        Ok(())
    }

    #[test]
    fn test_late_joiner_counts_after_episode() -> Result<()> {
        let mut registry = TaskRegistry::with_capacity(4);
        registry.register(id(1), TaskFlags::empty())?;

        registry.begin_episode(EpisodeId::new(1));
        registry.register(id(2), TaskFlags::empty())?;
        assert_eq!(registry.live_participants(LateJoinerPolicy::Exempt), 1);
        registry.end_episode();

        registry.begin_episode(EpisodeId::new(2));
        assert_eq!(registry.live_participants(LateJoinerPolicy::Exempt), 2);
        assert!(!registry.is_exempt(id(2), LateJoinerPolicy::Exempt));

        Ok(())
    }
}
