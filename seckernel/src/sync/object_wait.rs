//! Bounded yield-loop waiting for a busy object.
//!
//! When a message arrives for an object that is busy in another thread, the
//! caller enters a bounded loop of "yield the timeslice, re-check under the
//! table lock" rather than blocking on a condition variable -- appropriate
//! here because wait targets are fine-grained (one specific handle) and
//! waits are expected to be short.
//! A soft threshold logs a diagnostic identifying the bottleneck without
//! aborting the wait; exceeding the hard bound times out.

use crate::config::KernelConfig;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Poll {
    /// Still busy; keep waiting.
    Busy,
    /// No longer busy; the caller may proceed.
    Ready,
    /// The object was destroyed while we were waiting (unique-ID mismatch).
    Signalled,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum WaitOutcome {
    Ready,
    Signalled,
    Timeout,
}

/// Repeatedly calls `poll` (expected to re-check object state under the
/// table lock and compare the unique-ID snapshot taken before the wait
/// started) until it reports `Ready`/`Signalled`, or `config.max_wait_count`
/// iterations have elapsed.
pub fn bounded_yield_wait(
    config: &KernelConfig,
    object_handle: seckernel_types::Handle,
    mut poll: impl FnMut() -> Poll,
) -> WaitOutcome {
    for iteration in 1..=config.max_wait_count {
        match poll() {
            Poll::Ready => return WaitOutcome::Ready,
            Poll::Signalled => return WaitOutcome::Signalled,
            Poll::Busy => {
                if iteration == config.wait_warn_threshold {
                    log::warn!(
                        "object {object_handle} still busy after {iteration} yields; \
                         possible contention bottleneck"
                    );
                }
                std::thread::yield_now();
            }
        }
    }
    WaitOutcome::Timeout
}

#[cfg(test)]
mod tests {
    use super::*;
    use seckernel_types::Handle;

    #[test]
    fn returns_ready_once_poll_reports_ready() {
        let cfg = KernelConfig::default();
        let mut calls = 0;
        let outcome = bounded_yield_wait(&cfg, Handle(5), || {
            calls += 1;
            if calls < 3 {
                Poll::Busy
            } else {
                Poll::Ready
            }
        });
        assert_eq!(outcome, WaitOutcome::Ready);
        assert_eq!(calls, 3);
    }

    #[test]
    fn returns_signalled_on_unique_id_mismatch() {
        let cfg = KernelConfig::default();
        let outcome = bounded_yield_wait(&cfg, Handle(5), || Poll::Signalled);
        assert_eq!(outcome, WaitOutcome::Signalled);
    }

    #[test]
    fn times_out_after_max_wait_count() {
        let mut cfg = KernelConfig::default();
        cfg.max_wait_count = 5;
        let outcome = bounded_yield_wait(&cfg, Handle(5), || Poll::Busy);
        assert_eq!(outcome, WaitOutcome::Timeout);
    }
}
