//! The object record.

use std::any::Any;
use std::sync::Arc;
use std::thread::ThreadId;

use bitflags::bitflags;
use seckernel_types::{ActionPermissions, Handle, KernelResult, Message, ObjectType, SubtypeMask};

bitflags! {
    #[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
    pub struct ObjectFlags: u16 {
        const INTERNAL          = 0b0000_0001;
        const NOT_INITIALISED   = 0b0000_0010;
        const HIGH_STATE        = 0b0000_0100;
        /// Destroyed by a dependent-object cascade (or while
        /// not-initialised); the real teardown is deferred.
        const SIGNALLED         = 0b0000_1000;
        const BUSY              = 0b0001_0000;
        const SECURE_MEMORY     = 0b0010_0000;
        const OWNED_BY_THREAD   = 0b0100_0000;
        const ATTRIBUTES_LOCKED = 0b1000_0000;
    }
}

/// What a message handler hands back to the dispatcher on success.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct HandlerOutcome {
    pub data: Option<Vec<u8>>,
    pub value: i32,
}

/// The behaviour specific to one concrete object kind (a conventional-cipher
/// context, a certificate, a keyset, ...). Real algorithm bodies are out of
/// scope; this is the seam through which they would plug in.
pub trait ObjectHandler: Send + Sync {
    /// Build this object's private instance data right after the table slot
    /// is allocated.
    fn construct(&self) -> Box<dyn Any + Send>;

    /// Handle one message. Called with the table lock dropped
    /// (the table lock is never held across a handler call).
    fn handle(
        &self,
        instance: &mut (dyn Any + Send),
        message: &Message,
    ) -> KernelResult<HandlerOutcome>;
}

pub struct ObjectRecord {
    pub object_type: ObjectType,
    pub subtype: SubtypeMask,
    pub instance: Box<dyn Any + Send>,
    pub handler: Arc<dyn ObjectHandler>,

    pub flags: ObjectFlags,
    pub action_permissions: ActionPermissions,

    pub ref_count: i32,
    pub lock_count: i32,
    pub lock_owner: Option<ThreadId>,

    /// Strictly monotonic within the process; disambiguates handle reuse.
    pub unique_id: u32,

    /// Remaining ownership transfers allowed. `None` = unlimited.
    pub forward_count: Option<i32>,
    /// Remaining permitted uses. `None` = unlimited; `Some(n)` is always
    /// `>= 0` once set (invariant 3: finite counts stay `> 0` until the
    /// action that drives them to zero also revokes all action
    /// permissions in the same step).
    pub usage_count: Option<i32>,

    pub owner: Option<Handle>,
    pub dependent_object: Option<Handle>,
    pub dependent_device: Option<Handle>,
}

impl ObjectRecord {
    pub fn is_high_state(&self) -> bool {
        self.flags.contains(ObjectFlags::HIGH_STATE)
    }

    pub fn is_internal_only(&self) -> bool {
        self.flags.contains(ObjectFlags::INTERNAL)
    }

    pub fn is_not_initialised(&self) -> bool {
        self.flags.contains(ObjectFlags::NOT_INITIALISED)
    }

    pub fn is_signalled(&self) -> bool {
        self.flags.contains(ObjectFlags::SIGNALLED)
    }

    pub fn is_busy(&self) -> bool {
        self.flags.contains(ObjectFlags::BUSY)
    }

    /// Invariant 3: decrement on each action message; once it hits zero the
    /// action becomes permanently impossible. A finite count stays in the
    /// record as `Some(0)` rather than being reinterpreted as "unlimited".
    pub fn decrement_usage(&mut self) {
        if let Some(count) = self.usage_count.as_mut() {
            *count -= 1;
            if *count <= 0 {
                *count = 0;
                self.action_permissions.revoke_all();
            }
        }
    }

    /// Invariant 3 as a predicate: is there at least one use left?
    pub fn has_usage_remaining(&self) -> bool {
        !matches!(self.usage_count, Some(0))
    }
}
