//! Concurrency primitives: a re-entrant mutex above a
//! non-re-entrant OS primitive, bounded object-wait, and one-shot
//! reference-counted semaphores.

pub mod object_wait;
pub mod reentrant_mutex;
pub mod semaphore;

pub use object_wait::{bounded_yield_wait, Poll, WaitOutcome};
pub use reentrant_mutex::ReentrantMutex;
pub use semaphore::{Semaphore, SemaphoreState};
