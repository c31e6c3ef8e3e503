//! The object table: handle allocation, busy/lock bookkeeping, dependent-
//! object links, and the entry/exit points the dispatcher and the direct
//! external-access calls use to get at a record safely.

use std::thread::ThreadId;

use seckernel_types::{Handle, KernelError, KernelResult, ObjectType, SubtypeMask};

use super::lfsr::Lfsr;
use super::record::{ObjectFlags, ObjectRecord};
use crate::config::KernelConfig;
use crate::sync::{bounded_yield_wait, Poll, WaitOutcome};

/// What kind of direct, non-message access a caller is attempting.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum AccessCheckKind {
    /// An external API call reading or writing the object's data directly
    /// (as opposed to going through the message dispatcher).
    ExternalAccess,
    /// The caller wants to use the object as a key source for another
    /// object (e.g. loading a context from a keyset).
    KeyAccess,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum DependentKind {
    Object,
    Device,
}

/// Result of a non-blocking entry attempt.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum EntryOutcome {
    Entered,
    /// The object is busy and owned by the calling thread, but reentry
    /// wasn't requested: this is the dispatcher's cue to enqueue the
    /// message on the object's ring instead of nesting straight into the
    /// handler.
    BusySameThread,
}

struct TableState {
    slots: Vec<Option<ObjectRecord>>,
    lfsr: Lfsr,
    /// Strictly increasing; wrapping would let a stale handle alias a new
    /// object, so a wrap is treated as a hard failure rather than silently
    /// restarting from zero.
    next_unique_id: u32,
}

pub struct ObjectTable {
    config: KernelConfig,
    state: parking_lot::Mutex<TableState>,
}

impl ObjectTable {
    pub fn new(config: KernelConfig) -> Self {
        let capacity = config.initial_table_capacity.max(8);
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        ObjectTable {
            state: parking_lot::Mutex::new(TableState {
                slots,
                lfsr: Lfsr::new(capacity, rand::random()),
                next_unique_id: Handle::RESERVED_COUNT as u32,
            }),
            config,
        }
    }

    /// Allocate a slot and install `record`. Handles are drawn from the
    /// LFSR sequence rather than handed out in order, so a caller cannot
    /// assume the next object will land at `previous + 1`.
    pub fn create(&self, mut record: ObjectRecord) -> KernelResult<Handle> {
        let mut state = self.state.lock();
        let unique_id = state.next_unique_id;
        state.next_unique_id = state
            .next_unique_id
            .checked_add(1)
            .ok_or(KernelError::Failed)?;
        record.unique_id = unique_id;

        let index = Self::find_free_slot(&mut state, &self.config)?;
        state.slots[index] = Some(record);
        Ok(Handle(index as i32))
    }

    fn find_free_slot(state: &mut TableState, config: &KernelConfig) -> KernelResult<usize> {
        loop {
            let len = state.slots.len();
            let cycle = state.lfsr.cycle_length() as usize;
            for _ in 0..cycle {
                let candidate = (state.lfsr.next() as usize) % len;
                if candidate >= Handle::RESERVED_COUNT && state.slots[candidate].is_none() {
                    return Ok(candidate);
                }
            }

            // A full LFSR cycle turned up nothing free: grow.
            if len >= config.max_objects {
                return Err(KernelError::Memory);
            }
            let new_len = (len * 2).min(config.max_objects).max(len + 1);
            state.slots.resize_with(new_len, || None);
            state.lfsr.advance_polynomial(new_len);
        }
    }

    /// The dispatcher's entry point before handing a message to an object's
    /// handler: resolve the handle, wait out any other thread's in-flight
    /// call on the same object, then mark it busy and bump the recursion
    /// depth for same-thread re-entry.
    pub fn enter_for_dispatch(&self, handle: Handle, caller: ThreadId) -> KernelResult<()> {
        match self.try_enter(handle, caller, true)? {
            EntryOutcome::Entered => Ok(()),
            EntryOutcome::BusySameThread => unreachable!("reentry was requested"),
        }
    }

    /// The dispatcher's entry point: unlike `enter_for_dispatch`, same-
    /// thread reentry onto a busy object is reported as `BusySameThread`
    /// rather than nested, so the message can be queued on the object's
    /// ring instead of recursing straight into its handler.
    pub fn try_enter_for_dispatch(&self, handle: Handle, caller: ThreadId) -> KernelResult<EntryOutcome> {
        self.try_enter(handle, caller, false)
    }

    fn try_enter(&self, handle: Handle, caller: ThreadId, allow_reentry: bool) -> KernelResult<EntryOutcome> {
        let expected_unique_id = {
            let state = self.state.lock();
            let record = Self::record_at(&state, handle)?;
            record.unique_id
        };

        loop {
            let mut state = self.state.lock();
            let index = handle.index();
            let record = state
                .slots
                .get(index)
                .and_then(|s| s.as_ref())
                .ok_or(KernelError::Signalled)?;

            if record.unique_id != expected_unique_id {
                return Err(KernelError::Signalled);
            }

            let owned_by_caller = record.lock_owner == Some(caller);
            if owned_by_caller && record.is_busy() && !allow_reentry {
                return Ok(EntryOutcome::BusySameThread);
            }
            if !record.is_busy() || owned_by_caller {
                let record = state.slots[index].as_mut().unwrap();
                record.flags.insert(ObjectFlags::BUSY | ObjectFlags::OWNED_BY_THREAD);
                record.lock_owner = Some(caller);
                record.lock_count += 1;
                return Ok(EntryOutcome::Entered);
            }

            drop(state);
            let outcome = bounded_yield_wait(&self.config, handle, || {
                let state = self.state.lock();
                match state.slots.get(index).and_then(|s| s.as_ref()) {
                    None => Poll::Signalled,
                    Some(r) if r.unique_id != expected_unique_id => Poll::Signalled,
                    Some(r) if !r.is_busy() => Poll::Ready,
                    Some(_) => Poll::Busy,
                }
            });
            match outcome {
                WaitOutcome::Ready => continue,
                WaitOutcome::Signalled => return Err(KernelError::Signalled),
                WaitOutcome::Timeout => return Err(KernelError::Timeout),
            }
        }
    }

    /// The matching exit: drop one level of recursion, and only clear the
    /// busy flag once the caller's lock count returns to zero.
    pub fn exit_after_dispatch(&self, handle: Handle) -> KernelResult<()> {
        let mut state = self.state.lock();
        let index = handle.index();
        let record = state
            .slots
            .get_mut(index)
            .and_then(|s| s.as_mut())
            .ok_or(KernelError::Signalled)?;
        record.lock_count -= 1;
        if record.lock_count <= 0 {
            record.lock_count = 0;
            record.flags.remove(ObjectFlags::BUSY | ObjectFlags::OWNED_BY_THREAD);
            record.lock_owner = None;
        }
        Ok(())
    }

    /// Direct (non-message) access from the external API: the same busy
    /// check as dispatch, but also enforces the access-kind-specific rules
    /// that only apply outside the message path (e.g. key access requires
    /// the object to have completed initialisation).
    pub fn acquire_direct(&self, handle: Handle, kind: AccessCheckKind) -> KernelResult<()> {
        let caller = std::thread::current().id();
        self.enter_for_dispatch(handle, caller)?;

        let mut state = self.state.lock();
        let record = match Self::record_at(&state, handle) {
            Ok(r) => r,
            Err(e) => {
                drop(state);
                let _ = self.exit_after_dispatch(handle);
                return Err(e);
            }
        };
        let ok = match kind {
            AccessCheckKind::ExternalAccess => !record.is_not_initialised(),
            AccessCheckKind::KeyAccess => !record.is_not_initialised() && !record.is_internal_only(),
        };
        if !ok {
            drop(state);
            let _ = self.exit_after_dispatch(handle);
            return Err(KernelError::NotInited);
        }
        let _ = &mut state;
        Ok(())
    }

    pub fn release_direct(&self, handle: Handle) -> KernelResult<()> {
        self.exit_after_dispatch(handle)
    }

    /// Mark an object as signalled without removing its slot: used when a
    /// dependent-object cascade reaches an object that is itself currently
    /// busy, so the real teardown has to wait for the holder to exit.
    pub fn suspend(&self, handle: Handle) -> KernelResult<()> {
        let mut state = self.state.lock();
        let record = state
            .slots
            .get_mut(handle.index())
            .and_then(|s| s.as_mut())
            .ok_or(KernelError::Signalled)?;
        record.flags.insert(ObjectFlags::SIGNALLED);
        Ok(())
    }

    pub fn resume(&self, handle: Handle) -> KernelResult<()> {
        let mut state = self.state.lock();
        let record = state
            .slots
            .get_mut(handle.index())
            .and_then(|s| s.as_mut())
            .ok_or(KernelError::Signalled)?;
        record.flags.remove(ObjectFlags::SIGNALLED);
        Ok(())
    }

    /// Remove a slot outright and hand back whatever dependent handles it
    /// held, so the dispatcher can cascade a destroy onto them.
    pub fn destroy_slot(&self, handle: Handle) -> KernelResult<(Option<Handle>, Option<Handle>)> {
        let mut state = self.state.lock();
        let index = handle.index();
        let record = state
            .slots
            .get_mut(index)
            .and_then(|s| s.take())
            .ok_or(KernelError::Signalled)?;
        Ok((record.dependent_object, record.dependent_device))
    }

    /// Link `handle`'s dependent object/device, rejecting a link that would
    /// create a cycle reachable within three hops (the only depth the
    /// dependent-object graph is ever supposed to have: object -> keyset ->
    /// device).
    pub fn set_dependent(
        &self,
        handle: Handle,
        dependent: Handle,
        kind: DependentKind,
    ) -> KernelResult<()> {
        let mut state = self.state.lock();

        let mut cursor = dependent;
        for _ in 0..3 {
            if cursor == handle {
                return Err(KernelError::arg(seckernel_types::ArgPosition::Object));
            }
            cursor = match state.slots.get(cursor.index()).and_then(|s| s.as_ref()) {
                Some(r) => match r.dependent_object {
                    Some(next) => next,
                    None => break,
                },
                None => break,
            };
        }

        let record = state
            .slots
            .get_mut(handle.index())
            .and_then(|s| s.as_mut())
            .ok_or(KernelError::Signalled)?;
        match kind {
            DependentKind::Object => record.dependent_object = Some(dependent),
            DependentKind::Device => record.dependent_device = Some(dependent),
        }
        Ok(())
    }

    /// Every currently-occupied slot, reserved singletons included. Used by
    /// shutdown to find the objects it needs to tear down.
    pub fn live_handles(&self) -> Vec<Handle> {
        let state = self.state.lock();
        state
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(i, _)| Handle(i as i32))
            .collect()
    }

    pub fn unique_id_of(&self, handle: Handle) -> KernelResult<u32> {
        let state = self.state.lock();
        Ok(Self::record_at(&state, handle)?.unique_id)
    }

    pub fn object_type_of(&self, handle: Handle) -> KernelResult<ObjectType> {
        let state = self.state.lock();
        Ok(Self::record_at(&state, handle)?.object_type)
    }

    pub fn subtype_of(&self, handle: Handle) -> KernelResult<SubtypeMask> {
        let state = self.state.lock();
        Ok(Self::record_at(&state, handle)?.subtype)
    }

    /// Read-only access to a live record for callers (the ACL checks, the
    /// self-tests) that only need to inspect state, not mutate it.
    pub fn with_record<T>(
        &self,
        handle: Handle,
        f: impl FnOnce(&ObjectRecord) -> T,
    ) -> KernelResult<T> {
        let state = self.state.lock();
        Ok(f(Self::record_at(&state, handle)?))
    }

    pub fn with_record_mut<T>(
        &self,
        handle: Handle,
        f: impl FnOnce(&mut ObjectRecord) -> T,
    ) -> KernelResult<T> {
        let mut state = self.state.lock();
        let index = handle.index();
        let record = state
            .slots
            .get_mut(index)
            .and_then(|s| s.as_mut())
            .ok_or(KernelError::Signalled)?;
        Ok(f(record))
    }

    fn record_at(state: &TableState, handle: Handle) -> KernelResult<&ObjectRecord> {
        state
            .slots
            .get(handle.index())
            .and_then(|s| s.as_ref())
            .ok_or(KernelError::Signalled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::record::{HandlerOutcome, ObjectHandler};
    use seckernel_types::{ActionPermissions, Message};
    use std::any::Any;
    use std::sync::Arc;

    struct NoopHandler;
    impl ObjectHandler for NoopHandler {
        fn construct(&self) -> Box<dyn Any + Send> {
            Box::new(())
        }
        fn handle(&self, _: &mut (dyn Any + Send), _: &Message) -> KernelResult<HandlerOutcome> {
            Ok(HandlerOutcome::default())
        }
    }

    fn sample_record() -> ObjectRecord {
        let handler = Arc::new(NoopHandler);
        ObjectRecord {
            object_type: ObjectType::Context,
            subtype: SubtypeMask::NONE,
            instance: handler.construct(),
            handler,
            flags: ObjectFlags::empty(),
            action_permissions: ActionPermissions::default(),
            ref_count: 1,
            lock_count: 0,
            lock_owner: None,
            unique_id: 0,
            forward_count: None,
            usage_count: None,
            owner: None,
            dependent_object: None,
            dependent_device: None,
        }
    }

    #[test]
    fn create_skips_reserved_handles() {
        let table = ObjectTable::new(KernelConfig::default());
        let h = table.create(sample_record()).unwrap();
        assert!(!h.is_reserved());
    }

    #[test]
    fn handles_are_not_sequential() {
        let table = ObjectTable::new(KernelConfig::default());
        let a = table.create(sample_record()).unwrap();
        let b = table.create(sample_record()).unwrap();
        assert_ne!(a.0, b.0);
    }

    #[test]
    fn enter_then_exit_clears_busy() {
        let table = ObjectTable::new(KernelConfig::default());
        let h = table.create(sample_record()).unwrap();
        let me = std::thread::current().id();
        table.enter_for_dispatch(h, me).unwrap();
        assert!(table.with_record(h, |r| r.is_busy()).unwrap());
        table.exit_after_dispatch(h).unwrap();
        assert!(!table.with_record(h, |r| r.is_busy()).unwrap());
    }

    #[test]
    fn same_thread_reentry_nests_lock_count() {
        let table = ObjectTable::new(KernelConfig::default());
        let h = table.create(sample_record()).unwrap();
        let me = std::thread::current().id();
        table.enter_for_dispatch(h, me).unwrap();
        table.enter_for_dispatch(h, me).unwrap();
        table.exit_after_dispatch(h).unwrap();
        assert!(table.with_record(h, |r| r.is_busy()).unwrap());
        table.exit_after_dispatch(h).unwrap();
        assert!(!table.with_record(h, |r| r.is_busy()).unwrap());
    }

    #[test]
    fn destroy_slot_returns_dependents_and_frees_handle() {
        let table = ObjectTable::new(KernelConfig::default());
        let dep = table.create(sample_record()).unwrap();
        let mut rec = sample_record();
        rec.dependent_object = Some(dep);
        let h = table.create(rec).unwrap();
        let (dependent_object, dependent_device) = table.destroy_slot(h).unwrap();
        assert_eq!(dependent_object, Some(dep));
        assert_eq!(dependent_device, None);
        assert!(table.with_record(h, |_| ()).is_err());
    }

    #[test]
    fn set_dependent_rejects_a_direct_cycle() {
        let table = ObjectTable::new(KernelConfig::default());
        let h = table.create(sample_record()).unwrap();
        assert!(table.set_dependent(h, h, DependentKind::Object).is_err());
    }
}
