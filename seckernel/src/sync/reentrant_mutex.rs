//! A re-entrant mutex built above a non-re-entrant OS primitive
//! a re-entrant mutex: try-lock, then compare-owner, then a depth counter.
//!
//! `parking_lot::RawMutex` is used purely as "the non-re-entrant OS mutex"
//! the source builds on (`thread.h`'s `MUTEX_HANDLE`) -- we drive it through
//! `lock_api::RawMutex`'s non-RAII `lock`/`try_lock`/`unlock` so the
//! acquire/release pair can cross separate dispatcher calls exactly as the
//! source's `krnlEnterMutex`/`krnlExitMutex` do, rather than being scoped to
//! one Rust lexical block.

use std::thread::ThreadId;

use lock_api::RawMutex as _;
use parking_lot::{Mutex as MetaMutex, RawMutex};

struct Owner {
    thread: ThreadId,
    /// Number of *additional* acquisitions beyond the first by this thread.
    depth: usize,
}

pub struct ReentrantMutex {
    raw: RawMutex,
    owner: MetaMutex<Option<Owner>>,
}

impl Default for ReentrantMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl ReentrantMutex {
    pub fn new() -> Self {
        ReentrantMutex {
            raw: RawMutex::INIT,
            owner: MetaMutex::new(None),
        }
    }

    /// Acquire, blocking the calling thread if another thread holds the
    /// lock. Re-entrant: the same thread may acquire repeatedly.
    pub fn acquire(&self) {
        let me = std::thread::current().id();

        if self.raw.try_lock() {
            *self.owner.lock() = Some(Owner { thread: me, depth: 0 });
            return;
        }

        {
            let mut owner = self.owner.lock();
            if let Some(o) = owner.as_mut() {
                if o.thread == me {
                    o.depth += 1;
                    return;
                }
            }
        }

        // Contended by another thread: block on the raw primitive.
        self.raw.lock();
        *self.owner.lock() = Some(Owner { thread: me, depth: 0 });
    }

    /// Release one level of acquisition. Panics (debug-only invariant) if
    /// called by a thread that does not hold the lock -- that is always a
    /// caller bug, never a condition a correct caller needs to recover from.
    pub fn release(&self) {
        let me = std::thread::current().id();
        let mut owner = self.owner.lock();
        match owner.as_mut() {
            Some(o) if o.thread == me && o.depth > 0 => {
                o.depth -= 1;
            }
            Some(o) if o.thread == me => {
                *owner = None;
                drop(owner);
                // SAFETY: this thread is the recorded owner and is
                // releasing its final level of acquisition.
                unsafe { self.raw.unlock() };
            }
            _ => debug_assert!(false, "release() by a thread that does not hold the lock"),
        }
    }

    /// Acquire then immediately release: used as a final drain before the
    /// mutex and its underlying OS object are torn down
    /// torn down.
    pub fn destroy(self) {
        self.acquire();
        self.release();
    }
}

// SAFETY: all mutable state is behind `owner` (a parking_lot::Mutex) or the
// raw primitive itself; both are safe to share across threads.
unsafe impl Sync for ReentrantMutex {}
unsafe impl Send for ReentrantMutex {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn same_thread_reentry_does_not_deadlock() {
        let m = ReentrantMutex::new();
        m.acquire();
        m.acquire();
        m.acquire();
        m.release();
        m.release();
        m.release();
    }

    #[test]
    fn other_thread_blocks_until_release() {
        let m = Arc::new(ReentrantMutex::new());
        m.acquire();

        let m2 = m.clone();
        let handle = std::thread::spawn(move || {
            m2.acquire();
            m2.release();
        });

        std::thread::sleep(std::time::Duration::from_millis(20));
        m.release();
        handle.join().unwrap();
    }
}
