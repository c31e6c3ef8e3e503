//! Staged startup and shutdown for a `Kernel` instance.
//!
//! Initialisation is a single external lock around two phases (begin, then
//! complete) so that two threads racing to initialise the same kernel don't
//! both think they won. Shutdown is the reverse: signal outstanding
//! threads off the object table, refuse anything but destroy/refcount
//! traffic, then sweep surviving objects in repeated passes so dependents
//! get a chance to be freed before the objects that depend on them are
//! retried, rather than assuming a single top-down pass suffices.

use seckernel_types::{KernelError, KernelResult, Message, MessageKind};

use crate::dispatch::Dispatcher;
use crate::sync::ReentrantMutex;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum InitState {
    NotInited,
    Initialising,
    Inited,
    ShuttingDown,
}

pub struct KernelLifecycle {
    lock: ReentrantMutex,
    state: parking_lot::Mutex<InitState>,
}

impl KernelLifecycle {
    pub fn new() -> Self {
        KernelLifecycle {
            lock: ReentrantMutex::new(),
            state: parking_lot::Mutex::new(InitState::NotInited),
        }
    }

    /// Claims the init lock and moves `NotInited -> Initialising`. Returns
    /// an error if another thread already claimed it, or init already ran.
    pub fn begin_init(&self) -> KernelResult<()> {
        self.lock.acquire();
        let mut state = self.state.lock();
        match *state {
            InitState::NotInited => {
                *state = InitState::Initialising;
                Ok(())
            }
            _ => {
                drop(state);
                self.lock.release();
                Err(KernelError::Inited)
            }
        }
    }

    /// `Initialising -> Inited`. Releases the lock claimed by `begin_init`.
    pub fn complete_init(&self) -> KernelResult<()> {
        let mut state = self.state.lock();
        if *state != InitState::Initialising {
            return Err(KernelError::NotInited);
        }
        *state = InitState::Inited;
        drop(state);
        self.lock.release();
        Ok(())
    }

    pub fn is_inited(&self) -> bool {
        *self.state.lock() == InitState::Inited
    }

    /// Four-phase teardown: mark shutting-down (refuses new non-surviving
    /// traffic at the dispatcher), then repeatedly sweep the object table
    /// destroying whatever is still there, retrying objects whose destroy
    /// fails because a dependent hasn't been freed yet. Three passes covers
    /// every depth the dependent-object graph can have (object -> keyset ->
    /// device); a leftover object after that is reported, not silently
    /// dropped.
    pub fn shutdown(&self, dispatcher: &Dispatcher) -> KernelResult<()> {
        self.lock.acquire();
        *self.state.lock() = InitState::ShuttingDown;
        dispatcher.begin_shutdown();

        const PASSES: usize = 3;
        let mut last_failure = None;
        for _ in 0..PASSES {
            let remaining = dispatcher.objects().live_handles();
            if remaining.is_empty() {
                break;
            }
            last_failure = None;
            for handle in remaining {
                if handle.is_reserved() {
                    continue;
                }
                if let Err(e) = dispatcher.send(Message::new(handle, MessageKind::Destroy).internal()) {
                    last_failure = Some(e);
                }
            }
        }

        // The two reserved singletons (system device, default user) go last,
        // once every ordinary object that might depend on them is gone.
        for handle in [seckernel_types::Handle::SYSTEM, seckernel_types::Handle::DEFAULT_USER] {
            let _ = dispatcher.send(Message::new(handle, MessageKind::Destroy).internal());
        }

        self.lock.release();
        match last_failure {
            Some(e) if !dispatcher.objects().live_handles().is_empty() => Err(e),
            _ => Ok(()),
        }
    }
}

impl Default for KernelLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KernelConfig;

    #[test]
    fn init_cannot_be_claimed_twice() {
        let lifecycle = KernelLifecycle::new();
        lifecycle.begin_init().unwrap();
        lifecycle.complete_init().unwrap();
        assert!(lifecycle.is_inited());
        assert_eq!(lifecycle.begin_init(), Err(KernelError::Inited));
    }

    #[test]
    fn shutdown_with_no_objects_succeeds() {
        let lifecycle = KernelLifecycle::new();
        let dispatcher = Dispatcher::new(KernelConfig::default());
        lifecycle.begin_init().unwrap();
        lifecycle.complete_init().unwrap();
        assert!(lifecycle.shutdown(&dispatcher).is_ok());
        assert!(dispatcher.is_shutting_down());
    }
}
