//! Event queue
//!
//! Pending events in ascending `scheduled_time` order. Ties keep insertion
//! order: each entry carries a sequence number and new entries go after every
//! entry with an equal or earlier time.

use crate::error::Result;
use crate::event::Event;
use std::cmp::Ordering;
use std::collections::VecDeque;

#[derive(Clone, Debug)]
struct Entry {
    seq: u64,
    event: Event,
}

impl Entry {
    // total_cmp keeps the order deterministic for -0.0.
    fn cmp_key(&self, other: &Entry) -> Ordering {
        match self.event.scheduled_time.total_cmp(&other.event.scheduled_time) {
            Ordering::Equal => self.seq.cmp(&other.seq),
            o => o,
        }
    }
}

/// Ordered multiset of pending events.
#[derive(Clone, Debug, Default)]
pub struct EventQueue {
    entries: VecDeque<Entry>,
    seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an event behind every event cued at or before its time.
    /// Returns the new queue size.
    pub fn enqueue(&mut self, event: Event) -> Result<usize> {
        self.entries.try_reserve(1)?;

        let seq = self.seq;
        self.seq += 1;
        let entry = Entry { seq, event };
        let idx = self
            .entries
            .partition_point(|e| e.cmp_key(&entry) == Ordering::Less);
        self.entries.insert(idx, entry);
        Ok(self.entries.len())
    }

    pub fn peek_head(&self) -> Option<&Event> {
        self.entries.front().map(|e| &e.event)
    }

    pub fn pop_head(&mut self) -> Option<Event> {
        self.entries.pop_front().map(|e| e.event)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Move every pending event by `delta` ticks in one step.
    ///
    /// A uniform shift preserves both order and spacing, so no re-sort is needed.
    pub fn shift_all(&mut self, delta: f64) {
        for entry in self.entries.iter_mut() {
            entry.event.scheduled_time += delta;
        }
    }

    /// Events in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.entries.iter().map(|e| &e.event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Atom;

    fn ev(at: f64, tag: &str, n: i64) -> Event {
        Event::new(at, tag, vec![Atom::Int(n)]).unwrap()
    }

    fn times(q: &EventQueue) -> Vec<f64> {
        q.iter().map(|e| e.scheduled_time()).collect()
    }

    #[test]
    fn test_enqueue_orders_by_time() {
        let mut q = EventQueue::new();
        assert_eq!(q.enqueue(ev(30.0, "a", 0)).unwrap(), 1);
        assert_eq!(q.enqueue(ev(10.0, "a", 1)).unwrap(), 2);
        assert_eq!(q.enqueue(ev(20.0, "a", 2)).unwrap(), 3);

        assert_eq!(times(&q), vec![10.0, 20.0, 30.0]);
        assert!((q.peek_head().unwrap().scheduled_time() - 10.0).abs() < 1e-10);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let mut q = EventQueue::new();
        q.enqueue(ev(5.0, "a", 0)).unwrap();
        q.enqueue(ev(5.0, "b", 1)).unwrap();
        q.enqueue(ev(1.0, "c", 2)).unwrap();
        q.enqueue(ev(5.0, "d", 3)).unwrap();

        let tags: Vec<&str> = q.iter().map(|e| e.class_tag()).collect();
        assert_eq!(tags, vec!["c", "a", "b", "d"]);
    }

    #[test]
    fn test_pop_and_clear() {
        let mut q = EventQueue::new();
        assert!(q.pop_head().is_none());

        q.enqueue(ev(2.0, "a", 0)).unwrap();
        q.enqueue(ev(1.0, "b", 1)).unwrap();

        let head = q.pop_head().unwrap();
        assert_eq!(head.class_tag(), "b");
        assert_eq!(q.size(), 1);

        q.clear();
        assert!(q.is_empty());
        assert!(q.peek_head().is_none());
    }

    #[test]
    fn test_shift_all_preserves_spacing() {
        let mut q = EventQueue::new();
        q.enqueue(ev(100.0, "a", 0)).unwrap();
        q.enqueue(ev(100.5, "a", 1)).unwrap();
        q.enqueue(ev(140.0, "a", 2)).unwrap();

        q.shift_all(-40.0);
        assert_eq!(times(&q), vec![60.0, 60.5, 100.0]);

        q.shift_all(0.0);
        assert_eq!(times(&q), vec![60.0, 60.5, 100.0]);
    }

    #[test]
    fn test_enqueue_after_shift_stays_sorted() {
        let mut q = EventQueue::new();
        q.enqueue(ev(10.0, "a", 0)).unwrap();
        q.enqueue(ev(20.0, "a", 1)).unwrap();
        q.shift_all(15.0);
        q.enqueue(ev(30.0, "b", 2)).unwrap();

        assert_eq!(times(&q), vec![25.0, 30.0, 35.0]);
    }
}
