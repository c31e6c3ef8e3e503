//! Deployment knobs externalized from the source's compile-time `#define`s
//! The embedder constructs one of these and passes it
//! to `Kernel::new`; there is no file- or environment-based loader; the
//! kernel is a library, not a standalone process.

#[derive(Copy, Clone, Debug)]
pub struct KernelConfig {
    /// Object table starting capacity.
    pub initial_table_capacity: usize,
    /// Hard cap on object-table growth -- a DoS bound, not a tuning knob.
    pub max_objects: usize,
    /// Per-object recursive-message ring depth.
    pub message_queue_depth: usize,
    /// Object-wait bounded yield-loop iteration cap.
    pub max_wait_count: usize,
    /// Iteration count at which object-wait logs a contention diagnostic.
    pub wait_warn_threshold: usize,
    /// Lower bound for time-typed attributes (resolving an open question --
    /// signed-time attributes"): values below this are rejected rather than
    /// silently clamped, so a caller sees `ArgError` instead of a quietly
    /// corrected timestamp.
    pub min_sensible_time: i64,
    /// Upper bound for time-typed attributes. The source left this
    /// unbounded above; we make it explicit per the same open question.
    pub max_sensible_time: i64,
}

impl KernelConfig {
    /// Matches the source's memory-constrained build profile.
    pub fn memory_constrained() -> Self {
        KernelConfig {
            initial_table_capacity: 128,
            ..Self::general()
        }
    }

    /// Matches the source's general-purpose build profile. This is also
    /// `KernelConfig::default()`.
    pub fn general() -> Self {
        KernelConfig {
            initial_table_capacity: 1024,
            max_objects: 1 << 16,
            message_queue_depth: 16,
            max_wait_count: 10_000,
            wait_warn_threshold: 100,
            // 2000-01-01T00:00:00Z: nothing meaningful in this protocol
            // predates it.
            min_sensible_time: 946_684_800,
            // 2100-01-01T00:00:00Z: far enough out that only a corrupted or
            // adversarial value would exceed it.
            max_sensible_time: 4_102_444_800,
        }
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::general()
    }
}
