//! Per-thread recursion bookkeeping for the dispatcher's recursive-message
//! ring: a handler is allowed to send further messages back through the
//! dispatcher (e.g. a destroy cascading onto a dependent object), but
//! unbounded recursion on one thread is treated as a programming error, not
//! a condition to block on.

use std::collections::{HashMap, VecDeque};
use std::thread::ThreadId;

use parking_lot::Mutex;

use seckernel_types::{Handle, Message};

pub struct RecursionGuard<'a> {
    table: &'a Mutex<HashMap<ThreadId, usize>>,
    thread: ThreadId,
}

impl<'a> Drop for RecursionGuard<'a> {
    fn drop(&mut self) {
        let mut table = self.table.lock();
        if let Some(depth) = table.get_mut(&self.thread) {
            *depth -= 1;
            if *depth == 0 {
                table.remove(&self.thread);
            }
        }
    }
}

pub struct RecursionTracker {
    depths: Mutex<HashMap<ThreadId, usize>>,
    /// Messages in flight on one thread beyond this are refused rather than
    /// queued -- half the configured ring depth, matching the source's
    /// "recursion is legitimate but bounded" stance.
    limit: usize,
}

impl RecursionTracker {
    pub fn new(queue_depth: usize) -> Self {
        RecursionTracker {
            depths: Mutex::new(HashMap::new()),
            limit: (queue_depth / 2).max(1),
        }
    }

    /// Enter one level of recursion for the calling thread, or `None` if
    /// that would exceed the bound.
    pub fn enter(&self) -> Option<RecursionGuard<'_>> {
        let thread = std::thread::current().id();
        let mut depths = self.depths.lock();
        let depth = depths.entry(thread).or_insert(0);
        if *depth >= self.limit {
            return None;
        }
        *depth += 1;
        drop(depths);
        Some(RecursionGuard {
            table: &self.depths,
            thread,
        })
    }
}

/// The global ring a same-thread recursive send onto a busy object lands
/// in: the active call frame for that object drains it, in strict
/// insertion order, once its own handler call returns. Entries for other
/// handles keep their relative order too -- draining one handle never
/// reorders another's.
pub struct MessageQueue {
    ring: Mutex<VecDeque<(Handle, Message)>>,
    capacity: usize,
}

impl MessageQueue {
    pub fn new(capacity: usize) -> Self {
        MessageQueue {
            ring: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append `message` for `handle`, or refuse if the ring is already at
    /// capacity.
    pub fn try_enqueue(&self, handle: Handle, message: Message) -> bool {
        let mut ring = self.ring.lock();
        if ring.len() >= self.capacity {
            return false;
        }
        ring.push_back((handle, message));
        true
    }

    /// Remove and return the oldest queued message for `handle`, if any.
    pub fn pop_front_for(&self, handle: Handle) -> Option<Message> {
        let mut ring = self.ring.lock();
        let position = ring.iter().position(|(h, _)| *h == handle)?;
        ring.remove(position).map(|(_, message)| message)
    }

    /// Drop every message still queued for `handle`: used when the object
    /// has been destroyed or a drained message failed, so stale sends
    /// don't linger forever targeting a handle that will never drain them.
    pub fn purge_for(&self, handle: Handle) {
        self.ring.lock().retain(|(h, _)| *h != handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_enters_up_to_the_limit_succeed() {
        let tracker = RecursionTracker::new(4); // limit = 2
        let a = tracker.enter();
        assert!(a.is_some());
        let b = tracker.enter();
        assert!(b.is_some());
        let c = tracker.enter();
        assert!(c.is_none());
    }

    #[test]
    fn dropping_a_guard_frees_its_slot() {
        let tracker = RecursionTracker::new(2); // limit = 1
        let a = tracker.enter();
        assert!(a.is_some());
        assert!(tracker.enter().is_none());
        drop(a);
        assert!(tracker.enter().is_some());
    }

    use seckernel_types::MessageKind;

    #[test]
    fn enqueue_refuses_past_capacity() {
        let queue = MessageQueue::new(2);
        let h = Handle(10);
        assert!(queue.try_enqueue(h, Message::new(h, MessageKind::Hash)));
        assert!(queue.try_enqueue(h, Message::new(h, MessageKind::Hash)));
        assert!(!queue.try_enqueue(h, Message::new(h, MessageKind::Hash)));
    }

    #[test]
    fn pop_front_preserves_insertion_order_and_leaves_other_handles_alone() {
        let queue = MessageQueue::new(8);
        let a = Handle(10);
        let b = Handle(11);
        queue.try_enqueue(a, Message::new(a, MessageKind::Hash).with_value(1));
        queue.try_enqueue(b, Message::new(b, MessageKind::Hash).with_value(9));
        queue.try_enqueue(a, Message::new(a, MessageKind::Hash).with_value(2));

        assert_eq!(queue.pop_front_for(a).unwrap().value, 1);
        assert_eq!(queue.pop_front_for(a).unwrap().value, 2);
        assert!(queue.pop_front_for(a).is_none());
        assert_eq!(queue.pop_front_for(b).unwrap().value, 9);
    }

    #[test]
    fn purge_drops_every_queued_message_for_a_handle() {
        let queue = MessageQueue::new(8);
        let h = Handle(10);
        queue.try_enqueue(h, Message::new(h, MessageKind::Hash));
        queue.try_enqueue(h, Message::new(h, MessageKind::Hash));
        queue.purge_for(h);
        assert!(queue.pop_front_for(h).is_none());
    }
}
