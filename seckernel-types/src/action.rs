//! Action kinds and the permission levels attached to them.
//!
//! The source describes a 64-entry action-permission bitmap: for each of
//! six action kinds, an access level drawn from four values. We keep the
//! six-kinds-by-four-levels shape but represent it as a small fixed array
//! rather than hand-packed bits -- the ACL consumer (`seckernel::acl::action`)
//! only ever needs "what level does this object grant this action", and a
//! `[AccessLevel; 6]` makes that a direct index instead of shift-and-mask.

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ActionKind {
    Encrypt,
    Decrypt,
    Sign,
    SigCheck,
    Hash,
    GenKey,
}

impl ActionKind {
    pub const ALL: [ActionKind; 6] = [
        ActionKind::Encrypt,
        ActionKind::Decrypt,
        ActionKind::Sign,
        ActionKind::SigCheck,
        ActionKind::Hash,
        ActionKind::GenKey,
    ];

    fn index(self) -> usize {
        match self {
            ActionKind::Encrypt => 0,
            ActionKind::Decrypt => 1,
            ActionKind::Sign => 2,
            ActionKind::SigCheck => 3,
            ActionKind::Hash => 4,
            ActionKind::GenKey => 5,
        }
    }
}

/// One object's grant for one action kind.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub enum AccessLevel {
    /// The action has been explicitly withdrawn and can never be
    /// re-granted for this object's lifetime.
    #[default]
    NotAvailable,
    /// Permitted for internal (kernel-issued) callers only.
    InternalOnly,
    /// Permitted for both internal and external callers.
    Full,
    /// No permission bit set at all (distinct from `NotAvailable`: a
    /// caller can still raise this to `InternalOnly`/`Full` later, whereas
    /// `NotAvailable` is a one-way trapdoor).
    None,
}

impl AccessLevel {
    /// Is this level sufficient for a caller of the given internality?
    pub fn permits(self, caller_is_external: bool) -> bool {
        match self {
            AccessLevel::Full => true,
            AccessLevel::InternalOnly => !caller_is_external,
            AccessLevel::None | AccessLevel::NotAvailable => false,
        }
    }
}

/// The per-object action-permission table.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct ActionPermissions {
    levels: [AccessLevel; 6],
}

impl Default for ActionPermissions {
    fn default() -> Self {
        ActionPermissions {
            levels: [AccessLevel::None; 6],
        }
    }
}

impl ActionPermissions {
    pub fn get(&self, kind: ActionKind) -> AccessLevel {
        self.levels[kind.index()]
    }

    pub fn set(&mut self, kind: ActionKind, level: AccessLevel) {
        self.levels[kind.index()] = level;
    }

    /// Action becomes permanently impossible: used when `usageCount` hits
    /// zero.
    pub fn revoke_all(&mut self) {
        self.levels = [AccessLevel::NotAvailable; 6];
    }
}
