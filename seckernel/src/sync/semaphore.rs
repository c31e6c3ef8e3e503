//! One-shot, reference-counted semaphores.
//!
//! Once set and cleared a semaphore can never be reset; the only states
//! reachable once `clear()` has been called anywhere in the reference chain
//! are `PreClear` (other holders are still active) and `Clear` (the last
//! holder dropped and the "OS resource" -- here, nothing, since std gives us
//! safe teardown for free -- was released). Used to synchronise worker
//! threads with their creators, e.g. "signal me once you've finished your
//! first poll of the entropy sources".

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Condvar, Mutex};

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum SemaphoreState {
    Uninitialised,
    Set,
    PreClear,
    Clear,
}

pub struct Semaphore {
    state: Mutex<SemaphoreState>,
    condvar: Condvar,
    ref_count: AtomicUsize,
}

impl Semaphore {
    pub fn new() -> Self {
        Semaphore {
            state: Mutex::new(SemaphoreState::Uninitialised),
            condvar: Condvar::new(),
            ref_count: AtomicUsize::new(1),
        }
    }

    /// Another thread now also holds a reference to this semaphore and is
    /// responsible for its own matching `clear()`.
    pub fn add_ref(&self) {
        self.ref_count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn state(&self) -> SemaphoreState {
        *self.state.lock()
    }

    pub fn is_set(&self) -> bool {
        self.state() == SemaphoreState::Set
    }

    /// Uninited -> Set, Set -> Set. No-op once the semaphore has started
    /// clearing (`PreClear`/`Clear`): a one-shot semaphore cannot be reset.
    pub fn set(&self) {
        let mut state = self.state.lock();
        if matches!(*state, SemaphoreState::Uninitialised | SemaphoreState::Set) {
            *state = SemaphoreState::Set;
            self.condvar.notify_all();
        }
    }

    /// This holder is done with the semaphore. The last holder out
    /// transitions to the true `Clear` state (and would release the OS
    /// object, if there were one); every earlier holder lands on
    /// `PreClear`.
    pub fn clear(&self) {
        let remaining = self.ref_count.fetch_sub(1, Ordering::SeqCst) - 1;
        let mut state = self.state.lock();
        *state = if remaining == 0 {
            SemaphoreState::Clear
        } else {
            SemaphoreState::PreClear
        };
        self.condvar.notify_all();
    }

    /// Block until `set()` has been called, or the semaphore was cleared
    /// without ever being set.
    pub fn wait(&self) {
        let mut state = self.state.lock();
        while *state == SemaphoreState::Uninitialised {
            self.condvar.wait(&mut state);
        }
    }
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn state_transitions_are_one_shot() {
        let sem = Semaphore::new();
        assert_eq!(sem.state(), SemaphoreState::Uninitialised);
        sem.set();
        assert_eq!(sem.state(), SemaphoreState::Set);
        sem.clear();
        assert_eq!(sem.state(), SemaphoreState::Clear);
        // Cannot be re-set once cleared.
        sem.set();
        assert_eq!(sem.state(), SemaphoreState::Clear);
    }

    #[test]
    fn last_referencer_reaches_true_clear() {
        let sem = Arc::new(Semaphore::new());
        sem.add_ref();
        sem.clear();
        assert_eq!(sem.state(), SemaphoreState::PreClear);
        sem.clear();
        assert_eq!(sem.state(), SemaphoreState::Clear);
    }

    #[test]
    fn wait_unblocks_on_set() {
        let sem = Arc::new(Semaphore::new());
        let sem2 = sem.clone();
        let h = std::thread::spawn(move || sem2.wait());
        std::thread::sleep(std::time::Duration::from_millis(10));
        sem.set();
        h.join().unwrap();
    }
}
