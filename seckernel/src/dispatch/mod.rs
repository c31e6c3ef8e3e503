//! The message dispatcher: the single funnel every operation on an object
//! passes through. Resolves the target, waits out any other thread's call
//! on it, runs the relevant ACL checks, calls the handler, and cascades a
//! destroy onto dependent objects.

pub mod handling_table;
pub mod queue;

use std::sync::atomic::{AtomicBool, Ordering};

use seckernel_types::{ArgPosition, AttrAccess, Handle, KernelError, KernelResult, Message, MessageKind};

use crate::acl;
use crate::config::KernelConfig;
use crate::object::{EntryOutcome, HandlerOutcome, ObjectTable};
use handling_table::AttributeOp;
use queue::{MessageQueue, RecursionTracker};

pub struct Dispatcher {
    objects: ObjectTable,
    recursion: RecursionTracker,
    queue: MessageQueue,
    shutting_down: AtomicBool,
}

impl Dispatcher {
    pub fn new(config: KernelConfig) -> Self {
        Dispatcher {
            recursion: RecursionTracker::new(config.message_queue_depth),
            queue: MessageQueue::new(config.message_queue_depth),
            objects: ObjectTable::new(config),
            shutting_down: AtomicBool::new(false),
        }
    }

    pub fn objects(&self) -> &ObjectTable {
        &self.objects
    }

    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    pub fn send(&self, message: Message) -> KernelResult<HandlerOutcome> {
        if self.is_shutting_down() && !message.kind.survives_shutdown() {
            return Err(KernelError::Permission);
        }
        let _guard = self.recursion.enter().ok_or(KernelError::Timeout)?;

        let me = std::thread::current().id();
        match self.objects.try_enter_for_dispatch(message.target, me)? {
            EntryOutcome::Entered => {}
            // The target is busy on this very thread but we're not its
            // active call frame (that frame is further up the stack): ring
            // it instead of recursing straight into the handler. The
            // active frame drains this once its own handler call returns.
            EntryOutcome::BusySameThread => {
                return if self.queue.try_enqueue(message.target, message) {
                    Ok(HandlerOutcome::default())
                } else {
                    Err(KernelError::Timeout)
                };
            }
        }

        let result = self.dispatch_checked(&message);
        let _ = self.objects.exit_after_dispatch(message.target);

        if message.kind == MessageKind::Destroy && result.is_ok() {
            self.queue.purge_for(message.target);
            if let Ok((dependent_object, dependent_device)) = self.objects.destroy_slot(message.target) {
                if let Some(d) = dependent_object {
                    let _ = self.send(Message::new(d, MessageKind::Destroy).internal());
                }
                if let Some(d) = dependent_device {
                    let _ = self.send(Message::new(d, MessageKind::Destroy).internal());
                }
            }
        } else {
            self.drain_queue(message.target);
        }

        result
    }

    /// Drain messages queued by same-thread recursion onto `handle`, in
    /// strict insertion order, stopping if one fails or the object stops
    /// existing -- the remainder is then purged rather than left to target
    /// a handle that will never process them.
    fn drain_queue(&self, handle: Handle) {
        while let Some(queued) = self.queue.pop_front_for(handle) {
            let failed = self.send(queued).is_err();
            let gone = self.objects.with_record(handle, |_| ()).is_err();
            if failed || gone {
                self.queue.purge_for(handle);
                break;
            }
        }
    }

    fn dispatch_checked(&self, message: &Message) -> KernelResult<HandlerOutcome> {
        self.check_routed_acl(message)?;

        if let Some(op) = handling_table::attribute_op_of(message.kind) {
            let attr = message.attribute.ok_or(KernelError::arg(ArgPosition::Value))?;
            let access = match op {
                AttributeOp::Get => AttrAccess::READ,
                AttributeOp::Set => AttrAccess::WRITE,
                AttributeOp::Delete => AttrAccess::DELETE,
            };
            let (subtype, high_state) = self
                .objects
                .with_record(message.target, |r| (r.subtype, r.is_high_state()))?;
            acl::attribute::check_access(attr, subtype, message.internal, high_state, access)?;
        }

        if let Some(action) = handling_table::action_of(message.kind) {
            let (subtype, granted, has_usage) = self.objects.with_record(message.target, |r| {
                (r.subtype, r.action_permissions.get(action), r.has_usage_remaining())
            })?;
            if !has_usage {
                return Err(KernelError::NotAvail);
            }
            acl::action::check_action(action, subtype, granted, !message.internal)?;
        }

        let outcome = self.objects.with_record_mut(message.target, |record| {
            let handler = record.handler.clone();
            handler.handle(record.instance.as_mut(), message)
        })??;

        if handling_table::consumes_usage(message.kind) {
            let _ = self.objects.with_record_mut(message.target, |r| r.decrement_usage());
        }

        Ok(outcome)
    }

    fn check_routed_acl(&self, message: &Message) -> KernelResult<()> {
        match message.kind {
            MessageKind::CertSign | MessageKind::CertSigCheck | MessageKind::CertExport | MessageKind::CertMgmt => {
                let subtype = self.objects.subtype_of(message.target)?;
                acl::certmgmt::check(message.kind, subtype)
            }
            MessageKind::KeysetGetKey
            | MessageKind::KeysetSetKey
            | MessageKind::KeysetDeleteKey
            | MessageKind::KeysetGetFirstCert
            | MessageKind::KeysetGetNextCert => {
                let subtype = self.objects.subtype_of(message.target)?;
                acl::keymgmt::check(message.kind, subtype, !message.internal)
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ObjectFlags, ObjectHandler, ObjectRecord};
    use seckernel_types::{
        ActionKind, ActionPermissions, AccessLevel, AttributeId, Handle, ObjectType, SubtypeA, SubtypeMask,
    };
    use std::any::Any;
    use std::sync::Arc;

    struct EchoHandler;
    impl ObjectHandler for EchoHandler {
        fn construct(&self) -> Box<dyn Any + Send> {
            Box::new(0i32)
        }
        fn handle(&self, _: &mut (dyn Any + Send), message: &Message) -> KernelResult<HandlerOutcome> {
            Ok(HandlerOutcome {
                data: None,
                value: message.value,
            })
        }
    }

    fn make_context_with_usage(dispatcher: &Dispatcher, usage_count: Option<i32>) -> Handle {
        let handler = Arc::new(EchoHandler);
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

    fn make_context(dispatcher: &Dispatcher) -> Handle {
        make_context_with_usage(dispatcher, Some(1))
    }

    #[test]
    fn a_granted_action_reaches_the_handler() {
        let dispatcher = Dispatcher::new(KernelConfig::default());
        let h = make_context(&dispatcher);
        let result = dispatcher.send(Message::new(h, MessageKind::Hash).with_value(7));
        assert_eq!(result.unwrap().value, 7);
    }

    #[test]
    fn usage_count_exhaustion_blocks_a_second_action() {
        let dispatcher = Dispatcher::new(KernelConfig::default());
        let h = make_context(&dispatcher);
        dispatcher.send(Message::new(h, MessageKind::Hash)).unwrap();
        let second = dispatcher.send(Message::new(h, MessageKind::Hash));
        assert_eq!(second, Err(KernelError::NotAvail));
    }

    #[test]
    fn an_action_illegal_for_the_subtype_is_rejected() {
        let dispatcher = Dispatcher::new(KernelConfig::default());
        let h = make_context(&dispatcher);
        let result = dispatcher.send(Message::new(h, MessageKind::Sign));
        assert_eq!(result, Err(KernelError::NotAvail));
    }

    #[test]
    fn shutdown_refuses_non_surviving_messages() {
        let dispatcher = Dispatcher::new(KernelConfig::default());
        let h = make_context(&dispatcher);
        dispatcher.begin_shutdown();
        let result = dispatcher.send(Message::new(h, MessageKind::Hash));
        assert_eq!(result, Err(KernelError::Permission));
    }

    #[test]
    fn attribute_get_requires_an_attribute_id() {
        let dispatcher = Dispatcher::new(KernelConfig::default());
        let h = make_context(&dispatcher);
        let result = dispatcher.send(Message::new(h, MessageKind::GetAttribute));
        assert!(result.is_err());
        let ok = dispatcher.send(
            Message::new(h, MessageKind::SetAttribute)
                .with_attribute(AttributeId::Status)
                .with_value(1),
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn busy_same_thread_message_is_queued_then_drained_by_the_active_frame() {
        let dispatcher = Dispatcher::new(KernelConfig::default());
        let h = make_context_with_usage(&dispatcher, Some(2));
        let me = std::thread::current().id();

        // Simulate an active call frame already holding the object busy on
        // this thread (as if we were inside its handler further up the
        // stack).
        dispatcher.objects().enter_for_dispatch(h, me).unwrap();
        let queued = dispatcher
            .send(Message::new(h, MessageKind::Hash).with_value(9))
            .unwrap();
        assert_eq!(
            queued.value, 0,
            "a queued message returns immediately without ever reaching the handler"
        );
        dispatcher.objects().exit_after_dispatch(h).unwrap();

        let direct = dispatcher
            .send(Message::new(h, MessageKind::Hash).with_value(5))
            .unwrap();
        assert_eq!(direct.value, 5);

        // Both the drained queue entry and the direct call above consumed
        // the context's usage count; a third action now finds it exhausted.
        let third = dispatcher.send(Message::new(h, MessageKind::Hash));
        assert_eq!(third, Err(KernelError::NotAvail));
    }
}
