/// Runs a closure when dropped, unless disarmed first.
///
/// The scheduler uses it to keep the registry consistent when building a task
/// body panics halfway through a spawn.
pub(crate) struct ScopeGuard<F: FnOnce()> {
    // Taken on drop or disarm, so the closure runs at most once.
    closure: Option<F>,
}

impl<F: FnOnce()> ScopeGuard<F> {
    pub(crate) fn new(closure: F) -> Self {
        ScopeGuard {
            closure: Some(closure),
        }
    }

    pub(crate) fn disarm(&mut self) {
        self.closure.take();
    }
}

impl<F: FnOnce()> Drop for ScopeGuard<F> {
    fn drop(&mut self) {
        if let Some(closure) = self.closure.take() {
            closure();
        }
    }
}
