use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::error::{ClientError, Result};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct Slot {
    fired: bool,
    outcome: Option<Result<()>>,
}

/// The session's single completion signal.
///
/// The first outcome wins; later ones are dropped.
#[derive(Debug, Default)]
pub struct Completion {
    slot: Mutex<Slot>,
    cond: Condvar,
}

impl Completion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome. Returns `true` if this call completed the session.
    pub fn fire(&self, outcome: Result<()>) -> bool {
        let mut slot = lock(&self.slot);
        if slot.fired {
            return false;
        }
        slot.fired = true;
        slot.outcome = Some(outcome);
        self.cond.notify_all();
        true
    }

    /// Block until fired and take the outcome.
    pub fn wait(&self) -> Result<()> {
        let mut slot = lock(&self.slot);
        while !slot.fired {
            slot = self.cond.wait(slot).unwrap_or_else(PoisonError::into_inner);
        }
        slot.outcome.take().unwrap_or(Ok(()))
    }

    pub fn is_fired(&self) -> bool {
        lock(&self.slot).fired
    }
}

/// Completes a session with [`ClientError::Interrupted`].
#[derive(Debug, Clone)]
pub struct InterruptHandle {
    completion: Arc<Completion>,
}

impl InterruptHandle {
    pub(crate) fn new(completion: Arc<Completion>) -> Self {
        Self { completion }
    }

    pub fn interrupt(&self) -> bool {
        self.completion.fire(Err(ClientError::Interrupted))
    }
}
