//! Timer queue with lazy cancellation
//!
//! A min-heap of one-shot timers keyed by `(deadline, seq)`. The `live` map is
//! the source of truth: cancelling a timer only removes it from the map, and
//! stale heap entries are dropped when they surface.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

/// Handle to a scheduled timer. Used to cancel it before it fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Slot {
    deadline: u64,
    seq: u64,
    id: TimerId,
}

impl PartialOrd for Slot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Reversed so the max-heap pops the earliest deadline first, FIFO on ties.
impl Ord for Slot {
    fn cmp(&self, other: &Self) -> Ordering {
        self.deadline
            .cmp(&other.deadline)
            .then(self.seq.cmp(&other.seq))
            .reverse()
    }
}

/// One-shot timers ordered by deadline, then by insertion order.
pub struct TimerQueue<T> {
    heap: BinaryHeap<Slot>,
    live: HashMap<TimerId, T>,
    next_seq: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            live: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Insert a timer due at `deadline` (logical milliseconds).
    pub fn push(&mut self, deadline: u64, task: T) -> TimerId {
        let seq = self.next_seq;
        self.next_seq += 1;
        let id = TimerId(seq);
        self.live.insert(id, task);
        self.heap.push(Slot { deadline, seq, id });
        id
    }

    /// Cancel a timer. Returns the task if it had not fired yet.
    pub fn cancel(&mut self, id: TimerId) -> Option<T> {
        self.live.remove(&id)
    }

    /// Deadline of the earliest live timer.
    pub fn peek_deadline(&mut self) -> Option<u64> {
        self.drop_stale();
        self.heap.peek().map(|slot| slot.deadline)
    }

    /// Pop the earliest live timer if it is due at or before `now`.
    pub fn pop_due(&mut self, now: u64) -> Option<(TimerId, u64, T)> {
        self.drop_stale();
        let slot = *self.heap.peek()?;
        if slot.deadline > now {
            return None;
        }
        self.heap.pop();
        let task = self.live.remove(&slot.id)?;
        Some((slot.id, slot.deadline, task))
    }

    fn drop_stale(&mut self) {
        while let Some(slot) = self.heap.peek() {
            if self.live.contains_key(&slot.id) {
                break;
            }
            self.heap.pop();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }
}
