use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A one-shot event: fires at most once and stays fired.
///
/// Waiters that arrive after the fire return immediately, so a fire that
/// precedes every wait is never lost.
#[derive(Debug, Default)]
pub struct ExitLatch {
    fired: Mutex<bool>,
    cond: Condvar,
}

impl ExitLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the latch. Returns `true` only for the call that fired it.
    pub fn fire(&self) -> bool {
        let mut fired = lock(&self.fired);
        if *fired {
            return false;
        }
        *fired = true;
        self.cond.notify_all();
        true
    }

    /// Block until the latch has fired.
    pub fn wait(&self) {
        let mut fired = lock(&self.fired);
        while !*fired {
            fired = self
                .cond
                .wait(fired)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn is_fired(&self) -> bool {
        *lock(&self.fired)
    }
}
