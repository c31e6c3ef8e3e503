//! Opaque object handles.
//!
//! Handles are plain indices into the object table; the non-sequential LFSR
//! allocation that makes them look random lives in `seckernel::object`, not
//! here.

/// An opaque reference to a live or free slot in the object table.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Handle(pub i32);

impl Handle {
    /// Handle 0: the system device, owner of the CSPRNG and default
    /// capabilities.
    pub const SYSTEM: Handle = Handle(0);

    /// Handle 1: the default user, root policy scope.
    pub const DEFAULT_USER: Handle = Handle(1);

    /// Number of low handle values reserved for built-in singletons.
    pub const RESERVED_COUNT: usize = 2;

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_reserved(self) -> bool {
        (0..Self::RESERVED_COUNT as i32).contains(&self.0)
    }
}

impl From<i32> for Handle {
    fn from(v: i32) -> Self {
        Handle(v)
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
