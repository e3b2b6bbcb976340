//! Timer event queue for the single-writer core.
//!
//! Events are ordered by (due time, scheduling sequence), so events
//! scheduled for the same instant fire in the order they were scheduled.
//! Cancellation goes through opaque handles; a cancelled entry left in the
//! heap is skipped when it surfaces.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::objects::{ServiceKey, Timestamp};

/// What a timed event does when it fires. The main loop dispatches these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventAction {
    DowntimeStart(u64),
    DowntimeStop(u64),
    /// Periodic sweep removing downtimes that never activated.
    ExpireDowntimes,
    /// A host check becoming due. Execution belongs to the check engine;
    /// firing only surfaces the event to observers.
    HostCheck(String),
    ServiceCheck(ServiceKey),
    Shutdown,
    Restart,
}

/// Opaque handle to a scheduled event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventHandle(u64);

#[derive(Debug)]
struct Entry {
    at: Timestamp,
    action: EventAction,
}

#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<(Timestamp, u64)>>,
    entries: HashMap<u64, Entry>,
    next_seq: u64,
}

impl EventQueue {
    #[must_use]
    pub fn new() -> Self {
        EventQueue::default()
    }

    /// Schedules `action` to fire at `at` (unix seconds).
    pub fn schedule(&mut self, at: Timestamp, action: EventAction) -> EventHandle {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(seq, Entry { at, action });
        self.heap.push(Reverse((at, seq)));
        EventHandle(seq)
    }

    /// Cancels a scheduled event. Returns false when the event already
    /// fired or was cancelled.
    pub fn cancel(&mut self, handle: EventHandle) -> bool {
        self.entries.remove(&handle.0).is_some()
    }

    /// Due time of the earliest live event.
    pub fn next_due(&mut self) -> Option<Timestamp> {
        // drop stale heap heads from cancelled events
        while let Some(Reverse((at, seq))) = self.heap.peek().copied() {
            if self.entries.contains_key(&seq) {
                return Some(at);
            }
            self.heap.pop();
        }
        None
    }

    /// Pops the next event due at or before `now`, in (time, sequence)
    /// order. Returns `None` once nothing else is due.
    pub fn pop_due(&mut self, now: Timestamp) -> Option<EventAction> {
        while let Some(Reverse((at, seq))) = self.heap.peek().copied() {
            if at > now {
                return None;
            }
            self.heap.pop();
            if let Some(entry) = self.entries.remove(&seq) {
                return Some(entry.action);
            }
            // cancelled; keep draining
        }
        None
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_instant_fires_in_schedule_order() {
        let mut q = EventQueue::new();
        q.schedule(100, EventAction::DowntimeStart(1));
        q.schedule(100, EventAction::DowntimeStart(2));
        q.schedule(50, EventAction::DowntimeStart(3));
        assert_eq!(q.pop_due(100), Some(EventAction::DowntimeStart(3)));
        assert_eq!(q.pop_due(100), Some(EventAction::DowntimeStart(1)));
        assert_eq!(q.pop_due(100), Some(EventAction::DowntimeStart(2)));
        assert_eq!(q.pop_due(100), None);
    }

    #[test]
    fn cancelled_events_do_not_fire() {
        let mut q = EventQueue::new();
        let h = q.schedule(10, EventAction::Shutdown);
        q.schedule(20, EventAction::Restart);
        assert!(q.cancel(h));
        assert!(!q.cancel(h));
        assert_eq!(q.next_due(), Some(20));
        assert_eq!(q.pop_due(30), Some(EventAction::Restart));
    }

    #[test]
    fn nothing_due_before_deadline() {
        let mut q = EventQueue::new();
        q.schedule(100, EventAction::ExpireDowntimes);
        assert_eq!(q.pop_due(99), None);
        assert_eq!(q.len(), 1);
    }
}
