//! Runtime self-tests for the kernel's own invariants: these are not
//! algorithm known-answer tests (there are no algorithms in this crate) but
//! checks that the ACL tables and object-table bookkeeping actually behave
//! the way the rest of the kernel assumes they do. Meant to be run once at
//! startup, before any caller-visible object is created; a failure here
//! means the kernel itself is broken, not that some input was bad.

use std::any::Any;
use std::sync::Arc;

use seckernel_types::{
    AccessLevel, ActionKind, ActionPermissions, AttrAccess, AttributeId, Handle, KernelError,
    KernelResult, Message, MessageKind, ObjectType, SubtypeA, SubtypeMask,
};

use crate::acl;
use crate::config::KernelConfig;
use crate::dispatch::Dispatcher;
use crate::object::{HandlerOutcome, ObjectFlags, ObjectHandler, ObjectRecord};

struct CountingHandler;
impl ObjectHandler for CountingHandler {
    fn construct(&self) -> Box<dyn Any + Send> {
        Box::new(0i32)
    }
    fn handle(&self, _: &mut (dyn Any + Send), _: &Message) -> KernelResult<HandlerOutcome> {
        Ok(HandlerOutcome::default())
    }
}

fn fresh_context(dispatcher: &Dispatcher, usage_count: Option<i32>) -> Handle {
    let handler = Arc::new(CountingHandler);
    let mut permissions = ActionPermissions::default();
    permissions.set(ActionKind::Hash, AccessLevel::Full);
    dispatcher
        .objects()
        .create(ObjectRecord {
            object_type: ObjectType::Context,
            subtype: SubtypeMask::from_a(SubtypeA::CTX_HASH),
            instance: handler.construct(),
            handler,
            flags: ObjectFlags::empty(),
            action_permissions: permissions,
            ref_count: 1,
            lock_count: 0,
            lock_owner: None,
            unique_id: 0,
            forward_count: None,
            usage_count,
            owner: None,
            dependent_object: None,
            dependent_device: None,
        })
        .unwrap()
}

fn check(name: &'static str, ok: bool) -> KernelResult<()> {
    if ok {
        log::trace!("self-test passed: {name}");
        Ok(())
    } else {
        log::error!("self-test failed: {name}");
        Err(KernelError::Failed)
    }
}

fn boolean_range_enforced() -> KernelResult<()> {
    let entry = acl::attribute::lookup(AttributeId::Status);
    check(
        "boolean range rejects values outside {0,1}",
        entry.range.check_numeric(0) && entry.range.check_numeric(1) && !entry.range.check_numeric(2),
    )
}

fn numeric_range_enforced() -> KernelResult<()> {
    let entry = acl::attribute::lookup(AttributeId::Mode);
    check(
        "numeric range rejects out-of-bounds cipher modes",
        entry.range.check_numeric(0) && !entry.range.check_numeric(99),
    )
}

fn length_range_enforced() -> KernelResult<()> {
    let entry = acl::attribute::lookup(AttributeId::Key);
    check(
        "length range rejects an undersized key",
        !entry.range.check_length(1) && entry.range.check_length(16),
    )
}

fn time_range_enforced() -> KernelResult<()> {
    let config = KernelConfig::default();
    check(
        "configured time bounds reject a pre-epoch-ish timestamp",
        config.min_sensible_time > 0 && config.max_sensible_time > config.min_sensible_time,
    )
}

fn ip_address_and_current_group_composite_ranges() -> KernelResult<()> {
    let ip = acl::attribute::lookup(AttributeId::IpAddress);
    let group = acl::attribute::lookup(AttributeId::CurrentGroup);
    check(
        "IP address length and attribute-group cursor accept their documented special values",
        ip.range.check_length(4)
            && ip.range.check_length(16)
            && !ip.range.check_length(5)
            && group.range.check_numeric(-1)
            && group.range.check_numeric(500)
            && !group.range.check_numeric(-99),
    )
}

fn usage_count_exhaustion_revokes_actions() -> KernelResult<()> {
    let dispatcher = Dispatcher::new(KernelConfig::default());
    let h = fresh_context(&dispatcher, Some(1));
    dispatcher.send(Message::new(h, MessageKind::Hash)).unwrap();
    let second = dispatcher.send(Message::new(h, MessageKind::Hash));
    check("usage count exhaustion permanently blocks the action", second == Err(KernelError::NotAvail))
}

fn mechanism_table_rejects_an_unimplemented_combination() -> KernelResult<()> {
    use acl::mechanism::MechanismId;
    let implemented = acl::mechanism::check(ActionKind::Sign, MechanismId::Pkcs1).is_ok();
    let rejected = acl::mechanism::check(ActionKind::Sign, MechanismId::Ecb).is_err();
    check(
        "the mechanism table distinguishes implemented from unimplemented (action, mechanism) pairs",
        implemented && rejected,
    )
}

fn forward_count_property_is_kernel_owned() -> KernelResult<()> {
    let entry = acl::attribute::lookup(AttributeId::ForwardCount);
    check(
        "forward count is flagged as a kernel-owned property",
        entry.flags.contains(seckernel_types::AttributeFlags::PROPERTY),
    )
}

fn internal_only_attribute_hidden_from_external_callers() -> KernelResult<()> {
    let subtype = SubtypeMask::from_a(SubtypeA::CTX_HASH);
    let result = acl::attribute::check_access(AttributeId::Key, subtype, false, true, AttrAccess::READ);
    check("an internal-only attribute refuses an external high-state read", result.is_err())
}

fn status_write_triggers_state_change() -> KernelResult<()> {
    let entry = acl::attribute::lookup(AttributeId::Status);
    check(
        "status is marked as a trigger attribute",
        entry.flags.contains(seckernel_types::AttributeFlags::TRIGGER),
    )
}

/// Runs every self-test in sequence, stopping at the first failure (a
/// later test may assume an earlier one already holds).
pub fn run_all() -> KernelResult<()> {
    boolean_range_enforced()?;
    numeric_range_enforced()?;
    length_range_enforced()?;
    time_range_enforced()?;
    ip_address_and_current_group_composite_ranges()?;
    usage_count_exhaustion_revokes_actions()?;
    mechanism_table_rejects_an_unimplemented_combination()?;
    forward_count_property_is_kernel_owned()?;
    internal_only_attribute_hidden_from_external_callers()?;
    status_write_triggers_state_change()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_whole_suite_passes() {
        assert!(run_all().is_ok());
    }
}
