//! Discrete-event engine: an arena of event records with a freelist, and a
//! binary min-heap of event ids ordered by firing time.
//!
//! Events are addressed by index; the intrusive `next` field threads the
//! arena freelist while an event is free and a node's input queue while it
//! is queued. A live event is in exactly one place at a time: the heap, a
//! single input queue, or a sleeping task's delay slot.

use kozan_primitives::{BlockId, NodeId, SimTime};
use tracing::trace;

/// Index of an event in the arena.
pub type EventId = usize;

/// Sentinel for "no event" in queue heads and `next` links.
pub const NO_EVENT: EventId = usize::MAX;

/// What happens when an event fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// One-shot timer: signal the node's delay channel.
    Delay { node: NodeId },
    /// A block arriving at `node`: the completion of its own mining run
    /// (`mining` true, `block` is the parent mined on) or a delivery of
    /// `block` from a peer.
    NewBlock { node: NodeId, mining: bool, block: BlockId },
}

#[derive(Debug, Clone)]
pub struct Event {
    /// Absolute virtual time at which the event fires.
    pub time: SimTime,
    /// Freelist link while free, input-queue link while queued.
    pub(crate) next: EventId,
    pub kind: EventKind,
}

impl Event {
    fn cleared(next: EventId) -> Self {
        Self { time: 0.0, next, kind: EventKind::Delay { node: 0 } }
    }
}

#[derive(Debug)]
pub struct EventQueue {
    events: Vec<Event>,
    /// Head of the free event list, threaded through `next`.
    free: EventId,
    /// Time-ordered priority queue of event ids.
    heap: Vec<EventId>,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    pub fn new() -> Self {
        Self { events: Vec::new(), free: NO_EVENT, heap: Vec::new() }
    }

    /// Allocate a fresh event carrying `kind`. The firing time is set by
    /// [`EventQueue::post`]. Grows the arena by doubling when the freelist
    /// is exhausted; new entries are cleared and threaded onto it.
    pub fn alloc(&mut self, kind: EventKind) -> EventId {
        if self.free == NO_EVENT {
            self.grow();
        }
        let e = self.free;
        self.free = self.events[e].next;
        self.events[e].next = NO_EVENT;
        self.events[e].kind = kind;
        e
    }

    /// Clear the record and return it to the freelist. The caller must
    /// have removed it from the heap and any queue first.
    pub fn free(&mut self, e: EventId) {
        self.events[e] = Event::cleared(self.free);
        self.free = e;
    }

    /// Schedule `e` to fire at absolute time `time`.
    pub fn post(&mut self, e: EventId, time: SimTime) {
        self.events[e].time = time;
        trace!(target: "events", event = e, time, "posted");
        self.heap_add(e);
    }

    /// Remove and return the earliest event, if any. Ties are broken by
    /// heap position; consumers must not rely on tie order.
    pub fn pop(&mut self) -> Option<EventId> {
        let r = *self.heap.first()?;
        let p = self.heap.pop().expect("heap is non-empty");
        if self.heap.is_empty() {
            return Some(r);
        }

        // Sift the old last element down from the root, preferring the
        // left child when both children tie.
        let mut i = 0;
        loop {
            let lchild = i * 2 + 1;
            if lchild >= self.heap.len() {
                break;
            }
            let rchild = lchild + 1;
            let next_i = if rchild >= self.heap.len()
                || !(self.events[self.heap[rchild]].time < self.events[self.heap[lchild]].time)
            {
                lchild
            } else {
                rchild
            };
            if !(self.events[self.heap[next_i]].time < self.events[p].time) {
                break;
            }
            self.heap[i] = self.heap[next_i];
            i = next_i;
        }
        self.heap[i] = p;
        Some(r)
    }

    /// An event is pending while its firing time is still in the future.
    pub fn is_pending(&self, e: EventId, now: SimTime) -> bool {
        self.events[e].time > now
    }

    pub fn get(&self, e: EventId) -> &Event {
        &self.events[e]
    }

    pub(crate) fn set_next(&mut self, e: EventId, next: EventId) {
        self.events[e].next = next;
    }

    pub(crate) fn next(&self, e: EventId) -> EventId {
        self.events[e].next
    }

    /// Number of events currently scheduled on the heap.
    pub fn heap_len(&self) -> usize {
        self.heap.len()
    }

    /// Number of arena slots (free and live).
    pub fn capacity(&self) -> usize {
        self.events.len()
    }

    // Append at the end of the heap, then bubble upwards. A tie with the
    // parent keeps the existing parent in place.
    fn heap_add(&mut self, n: EventId) {
        let mut i = self.heap.len();
        self.heap.push(n);
        while i > 0 {
            let parent = (i - 1) / 2;
            if !(self.events[n].time < self.events[self.heap[parent]].time) {
                break;
            }
            self.heap[i] = self.heap[parent];
            i = parent;
        }
        self.heap[i] = n;
    }

    fn grow(&mut self) {
        let old = self.events.len();
        let new = if old == 0 { 1 } else { old * 2 };
        for i in old..new {
            let next = if i + 1 < new { i + 1 } else { NO_EVENT };
            self.events.push(Event::cleared(next));
        }
        self.free = old;
        // Heap storage tracks the arena so posting never reallocates
        // mid-dispatch.
        self.heap.reserve(new - self.heap.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delivery(node: NodeId) -> EventKind {
        EventKind::NewBlock { node, mining: false, block: 1000 }
    }

    #[test]
    fn alloc_grows_and_threads_freelist() {
        let mut q = EventQueue::new();
        let a = q.alloc(delivery(0));
        assert_eq!(q.capacity(), 1);
        let b = q.alloc(delivery(1));
        assert_eq!(q.capacity(), 2);
        assert_ne!(a, b);

        // Freeing then allocating reuses the freed slot first.
        q.free(a);
        assert_eq!(q.alloc(delivery(2)), a);
    }

    #[test]
    fn free_clears_the_record() {
        let mut q = EventQueue::new();
        let e = q.alloc(delivery(3));
        q.post(e, 42.0);
        assert_eq!(q.pop(), Some(e));
        q.free(e);
        assert_eq!(q.get(e).time, 0.0);
    }

    #[test]
    fn pop_returns_earliest() {
        let mut q = EventQueue::new();
        let times = [5.0, 1.0, 3.0, 4.0, 2.0];
        for (i, &t) in times.iter().enumerate() {
            let e = q.alloc(delivery(i));
            q.post(e, t);
        }
        let mut order = Vec::new();
        while let Some(e) = q.pop() {
            order.push(q.get(e).time);
        }
        assert_eq!(order, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn pop_single_element_empties_heap() {
        let mut q = EventQueue::new();
        let e = q.alloc(delivery(0));
        q.post(e, 7.0);
        assert_eq!(q.heap_len(), 1);
        assert_eq!(q.pop(), Some(e));
        assert_eq!(q.heap_len(), 0);
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn pending_is_strictly_future() {
        let mut q = EventQueue::new();
        let e = q.alloc(delivery(0));
        q.post(e, 10.0);
        assert!(q.is_pending(e, 9.9));
        assert!(!q.is_pending(e, 10.0));
        assert!(!q.is_pending(e, 11.0));
    }

    #[test]
    fn equal_times_all_drain() {
        let mut q = EventQueue::new();
        for i in 0..4 {
            let e = q.alloc(delivery(i));
            q.post(e, 1.0);
        }
        let mut seen = 0;
        while q.pop().is_some() {
            seen += 1;
        }
        assert_eq!(seen, 4);
    }
}
