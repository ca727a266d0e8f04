//! Time Scheduler
//!
//! Owns the logical clock and the one-shot timers that defer step invocation
//! and post-step advancement. Time is measured in whole milliseconds.

use crate::timer_queue::{TimerId, TimerQueue};
use std::time::Instant;

/// Scheduler execution mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerMode {
    /// Logical time follows the wall clock.
    Realtime,
    /// Logical time only moves when the owner steps it.
    Offline,
}

/// Work run when a timer fires.
pub type TimerTask = Box<dyn FnOnce()>;

/// Logical clock plus the timer queue.
pub struct TimeScheduler {
    pub mode: SchedulerMode,

    /// Realtime anchor.
    wall_anchor: Instant,

    /// Offline clock.
    offline_now: u64,

    timers: TimerQueue<TimerTask>,
}

impl TimeScheduler {
    /// Create a new scheduler.
    pub fn new(mode: SchedulerMode) -> Self {
        Self {
            mode,
            wall_anchor: Instant::now(),
            offline_now: 0,
            timers: TimerQueue::new(),
        }
    }

    /// Current logical time in milliseconds.
    pub fn now(&self) -> u64 {
        match self.mode {
            SchedulerMode::Offline => self.offline_now,
            SchedulerMode::Realtime => {
                let elapsed = Instant::now().duration_since(self.wall_anchor);
                u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
            }
        }
    }

    /// Move the offline clock forward. Ignored in realtime mode and never
    /// moves time backwards.
    pub fn set_offline_now(&mut self, t: u64) {
        if self.mode == SchedulerMode::Offline {
            self.offline_now = self.offline_now.max(t);
        }
    }

    /// Schedule `task` to run `delay_ms` after the current logical time.
    pub fn schedule_in(&mut self, delay_ms: u64, task: TimerTask) -> TimerId {
        let deadline = self.now().saturating_add(delay_ms);
        let id = self.timers.push(deadline, task);
        tracing::trace!(?id, deadline, "timer scheduled");
        id
    }

    /// Cancel a pending timer. Returns false if it already fired.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let cancelled = self.timers.cancel(id).is_some();
        if cancelled {
            tracing::trace!(?id, "timer cancelled");
        }
        cancelled
    }

    /// Deadline of the next pending timer.
    pub fn peek_next_deadline(&mut self) -> Option<u64> {
        self.timers.peek_deadline()
    }

    /// Take the next timer due at or before `now`.
    /// The caller runs the task after releasing its borrow of the scheduler.
    pub fn pop_due(&mut self, now: u64) -> Option<TimerTask> {
        let (id, deadline, task) = self.timers.pop_due(now)?;
        tracing::trace!(?id, deadline, now, "timer due");
        Some(task)
    }

    /// Check if any timers are pending.
    pub fn has_pending_timers(&self) -> bool {
        !self.timers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_scheduler_creation() {
        let sched = TimeScheduler::new(SchedulerMode::Offline);
        assert_eq!(sched.mode, SchedulerMode::Offline);
        assert_eq!(sched.now(), 0);
        assert!(!sched.has_pending_timers());
    }

    #[test]
    fn test_schedule_relative_to_now() {
        let mut sched = TimeScheduler::new(SchedulerMode::Offline);
        sched.set_offline_now(100);
        sched.schedule_in(25, Box::new(|| {}));
        assert_eq!(sched.peek_next_deadline(), Some(125));
    }

    #[test]
    fn test_offline_clock_is_monotonic() {
        let mut sched = TimeScheduler::new(SchedulerMode::Offline);
        sched.set_offline_now(50);
        sched.set_offline_now(10);
        assert_eq!(sched.now(), 50);
    }

    #[test]
    fn test_cancelled_timer_never_runs() {
        let mut sched = TimeScheduler::new(SchedulerMode::Offline);
        let fired = Rc::new(RefCell::new(Vec::new()));

        let f = fired.clone();
        let a = sched.schedule_in(0, Box::new(move || f.borrow_mut().push("a")));
        let f = fired.clone();
        sched.schedule_in(0, Box::new(move || f.borrow_mut().push("b")));

        assert!(sched.cancel(a));
        assert!(!sched.cancel(a));

        while let Some(task) = sched.pop_due(0) {
            task();
        }
        assert_eq!(*fired.borrow(), vec!["b"]);
    }
}
