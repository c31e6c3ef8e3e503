//! Reference-monitor security kernel: object table, message dispatcher,
//! declarative ACL tables, CSPRNG, secure memory and concurrency
//! primitives.
//!
//! Concrete algorithm implementations, certificate encoding, envelope and
//! session state machines, keyset back-ends, hardware-token bindings, OS
//! entropy polling, and the external-facing API surface all live outside
//! this crate -- it only ever sees them through the `ObjectHandler` seam
//! and the caller-supplied entropy fed to `Kernel::add_entropy`.

pub mod acl;
pub mod alloc;
pub mod config;
pub mod dispatch;
pub mod init;
pub mod object;
pub mod rng;
pub mod selftest;
pub mod sync;

use parking_lot::Mutex;

use seckernel_types::{Handle, KernelResult, Message};

use config::KernelConfig;
use dispatch::Dispatcher;
use init::KernelLifecycle;
use object::{HandlerOutcome, ObjectTable};
use rng::fork::{ForkDetector, NeverForked};
use rng::Rng;

#[cfg(unix)]
use rng::fork::UnixForkDetector;

/// The top-level handle embedders hold: one dispatcher, one lifecycle
/// guard, one CSPRNG. There is exactly one of these per process in
/// practice (the dispatcher's object table has no notion of more than one
/// kernel instance talking to the same objects), but nothing here enforces
/// that -- it's the embedder's responsibility, same as the source's single
/// process-global kernel state.
pub struct Kernel {
    dispatcher: Dispatcher,
    lifecycle: KernelLifecycle,
    rng: Mutex<Rng>,
}

impl Kernel {
    /// Runs the self-test suite, then brings up the dispatcher and CSPRNG
    /// under the init lock. Fails closed: any self-test failure aborts
    /// construction rather than handing back a kernel that might silently
    /// misbehave.
    pub fn new(config: KernelConfig) -> anyhow::Result<Self> {
        selftest::run_all().map_err(|e| anyhow::anyhow!("kernel self-test failed: {e}"))?;

        let lifecycle = KernelLifecycle::new();
        lifecycle.begin_init()?;

        let dispatcher = Dispatcher::new(config);

        #[cfg(unix)]
        let fork_detector: Box<dyn ForkDetector> = Box::new(UnixForkDetector::new());
        #[cfg(not(unix))]
        let fork_detector: Box<dyn ForkDetector> = Box::new(NeverForked);

        let kernel = Kernel {
            dispatcher,
            lifecycle,
            rng: Mutex::new(Rng::new(fork_detector)),
        };
        kernel.lifecycle.complete_init()?;
        log::debug!("kernel initialised");
        Ok(kernel)
    }

    pub fn send(&self, message: Message) -> KernelResult<HandlerOutcome> {
        self.dispatcher.send(message)
    }

    pub fn objects(&self) -> &ObjectTable {
        self.dispatcher.objects()
    }

    pub fn system_device(&self) -> Handle {
        Handle::SYSTEM
    }

    pub fn default_user(&self) -> Handle {
        Handle::DEFAULT_USER
    }

    /// Feed raw entropy into the CSPRNG pool. `quality` is the caller's
    /// claim, 1-100, about how many bits per byte are genuinely random.
    pub fn add_entropy(&self, data: &[u8], quality: u8) {
        self.rng.lock().add_entropy(data, quality);
    }

    pub fn random_bytes(&self, len: usize) -> KernelResult<Vec<u8>> {
        self.rng.lock().generate(len)
    }

    pub fn nonce(&self, len: usize) -> KernelResult<Vec<u8>> {
        self.rng.lock().nonce(len)
    }

    pub fn shutdown(&self) -> KernelResult<()> {
        log::debug!("kernel shutting down");
        self.lifecycle.shutdown(&self.dispatcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_fresh_kernel_passes_its_own_self_tests_and_shuts_down_cleanly() {
        let kernel = Kernel::new(KernelConfig::default()).unwrap();
        // Enough to cross both the pool's quality cap and its
        // minimum-mixes threshold (one mix per 256-byte wrap).
        kernel.add_entropy(&[0x42; rng::pool::POOL_SIZE * 12], 100);
        let bytes = kernel.random_bytes(16).unwrap();
        assert_eq!(bytes.len(), 16);
        assert!(kernel.shutdown().is_ok());
    }
}
