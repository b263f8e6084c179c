use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Condvar;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

use crate::event::SchedulerEvent;

pub type Result<T> = std::result::Result<T, SchedulerError>;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler closed")]
    Closed,
}

struct State {
    heap: BinaryHeap<Reverse<OrdEvent>>,
    closed: bool,
}

/// Wraps a [`SchedulerEvent`] to give the heap a total order independent
/// of borrow lifetimes (`Ord` on `SchedulerEvent` borrows `sort_key`,
/// which is fine for comparisons but we want owned storage in the heap).
struct OrdEvent(SchedulerEvent);

impl PartialEq for OrdEvent {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq(&other.0)
    }
}
impl Eq for OrdEvent {}
impl PartialOrd for OrdEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for OrdEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

/// Priority queue ordered by `(scheduled_at, priority, sort_key,
/// sequence_num)`.
pub struct Scheduler {
    state: Mutex<State>,
    condvar: Condvar,
    sequence: AtomicU64,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler {
            state: Mutex::new(State {
                heap: BinaryHeap::new(),
                closed: false,
            }),
            condvar: Condvar::new(),
            sequence: AtomicU64::new(0),
        }
    }

    /// Assigns a monotonically increasing `sequence_num` and, if
    /// `sort_key` is empty, derives one from `(event_id, event_type,
    /// loop_id)`.
    pub fn schedule(&self, mut event: SchedulerEvent) -> Result<()> {
        event.sequence_num = self.sequence.fetch_add(1, Ordering::SeqCst);
        if event.sort_key.is_empty() {
            event.sort_key = SchedulerEvent::derive_sort_key(
                &event.event_id,
                &event.event_type,
                event.loop_id.as_deref(),
            );
        }
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if state.closed {
            return Err(SchedulerError::Closed);
        }
        state.heap.push(Reverse(OrdEvent(event)));
        drop(state);
        self.condvar.notify_all();
        Ok(())
    }

    /// Non-destructive look at the next event to pop.
    pub fn peek(&self) -> Option<SchedulerEvent> {
        let state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.heap.peek().map(|Reverse(OrdEvent(e))| e.clone())
    }

    /// Pop the next event without blocking.
    pub fn try_next(&self) -> Option<SchedulerEvent> {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.heap.pop().map(|Reverse(OrdEvent(e))| e)
    }

    /// Blocks until an event is ready or the scheduler is closed.
    pub fn next(&self) -> Result<SchedulerEvent> {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        loop {
            if let Some(Reverse(OrdEvent(event))) = state.heap.pop() {
                return Ok(event);
            }
            if state.closed {
                return Err(SchedulerError::Closed);
            }
            state = self
                .condvar
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Unblocks every waiting `next()` caller with `Closed`. Pending
    /// events are neither re-delivered nor lost — a drained caller simply
    /// observes closure once the heap is empty.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.closed = true;
        drop(state);
        self.condvar.notify_all();
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hash of the sorted queue state: two schedulers loaded with the
    /// same events produce equal hashes.
    pub fn snapshot_hash(&self) -> String {
        let state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut events: Vec<&SchedulerEvent> =
            state.heap.iter().map(|Reverse(OrdEvent(e))| e).collect();
        events.sort_by(|a, b| a.order_key().cmp(&b.order_key()));

        let mut buf = Vec::new();
        for e in events {
            buf.extend_from_slice(e.event_id.as_bytes());
            buf.push(0);
            buf.extend_from_slice(&e.scheduled_at.to_be_bytes());
            buf.extend_from_slice(&e.priority.to_be_bytes());
            buf.extend_from_slice(e.sort_key.as_bytes());
            buf.push(0);
            buf.extend_from_slice(&e.sequence_num.to_be_bytes());
            buf.push(0xff);
        }
        format!("sha256:{}", hex::encode(Sha256::digest(&buf)))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn ev(id: &str, at: i64, prio: i64) -> SchedulerEvent {
        SchedulerEvent {
            event_id: id.to_string(),
            event_type: "test".to_string(),
            scheduled_at: at,
            priority: prio,
            sequence_num: 0,
            sort_key: String::new(),
            loop_id: None,
        }
    }

    #[test]
    fn pops_in_total_order() {
        let s = Scheduler::new();
        s.schedule(ev("b", 10, 1)).expect("schedule");
        s.schedule(ev("a", 5, 1)).expect("schedule");
        s.schedule(ev("c", 10, 0)).expect("schedule");

        assert_eq!(s.try_next().expect("event").event_id, "a");
        assert_eq!(s.try_next().expect("event").event_id, "c");
        assert_eq!(s.try_next().expect("event").event_id, "b");
        assert!(s.try_next().is_none());
    }

    #[test]
    fn ties_break_by_insertion_sequence() {
        let s = Scheduler::new();
        s.schedule(ev("first", 0, 0)).expect("schedule");
        s.schedule(ev("second", 0, 0)).expect("schedule");
        assert_eq!(s.try_next().expect("event").event_id, "first");
        assert_eq!(s.try_next().expect("event").event_id, "second");
    }

    #[test]
    fn identical_insertions_same_snapshot_hash() {
        let a = Scheduler::new();
        let b = Scheduler::new();
        for s in [&a, &b] {
            s.schedule(ev("x", 1, 1)).expect("schedule");
            s.schedule(ev("y", 2, 1)).expect("schedule");
        }
        assert_eq!(a.snapshot_hash(), b.snapshot_hash());
    }

    #[test]
    fn close_unblocks_next() {
        let s = Scheduler::new();
        s.close();
        assert!(matches!(s.next(), Err(SchedulerError::Closed)));
    }

    #[test]
    fn scheduling_after_close_is_rejected() {
        let s = Scheduler::new();
        s.close();
        assert!(matches!(s.schedule(ev("x", 0, 0)), Err(SchedulerError::Closed)));
    }
}
