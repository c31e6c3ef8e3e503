//! Fork detection: on Unix, a forked child must not share its parent's
//! CSPRNG state, or two processes will emit the same "random" output
//! stream. Detected by comparing the cached pid against `getpid()` on every
//! draw; a mismatch forces a rekey before any output is returned.

pub trait ForkDetector: Send + Sync {
    /// True the first time this is called after a fork (or on the very
    /// first call in a freshly-started process, trivially "not forked").
    fn has_forked(&mut self) -> bool;
}

#[cfg(unix)]
pub struct UnixForkDetector {
    recorded_pid: i32,
}

#[cfg(unix)]
impl UnixForkDetector {
    pub fn new() -> Self {
        UnixForkDetector {
            recorded_pid: unsafe { libc::getpid() },
        }
    }
}

#[cfg(unix)]
impl Default for UnixForkDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
impl ForkDetector for UnixForkDetector {
    fn has_forked(&mut self) -> bool {
        let current = unsafe { libc::getpid() };
        if current != self.recorded_pid {
            self.recorded_pid = current;
            true
        } else {
            false
        }
    }
}

/// Used on platforms with no reliable process-identity primitive to poll;
/// fork safety there is the embedder's responsibility.
pub struct NeverForked;

impl ForkDetector for NeverForked {
    fn has_forked(&mut self) -> bool {
        false
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn same_process_never_reports_a_fork() {
        let mut detector = UnixForkDetector::new();
        assert!(!detector.has_forked());
        assert!(!detector.has_forked());
    }
}
