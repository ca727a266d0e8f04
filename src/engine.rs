//! Engine - realtime and offline execution loops
//!
//! The engine ties together the executor and the timer scheduler that
//! sequencers run on.
//! - Realtime: uses spin_sleep to wait for the next due timer
//! - Offline: logical time only moves through the stepping API

use crate::error::EngineError;
use crate::executor::Executor;
use crate::scheduler::TimeScheduler;
use crate::sequencer::{Sequencer, SequencerConfig};
use crate::signal::{Signal, SignalFuture};
use crate::timer_queue::TimerId;
use spin_sleep::SpinSleeper;
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

pub use crate::scheduler::SchedulerMode;

/// Configuration for the engine.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Upper bound on timer tasks run by a single stepping call before it
    /// gives up with [`EngineError::RunawayScheduling`].
    pub max_timeslices: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_timeslices: 200_000,
        }
    }
}

/// The runtime sequencers are scheduled on.
pub struct Engine {
    pub executor: Rc<Executor>,
    pub scheduler: Rc<RefCell<TimeScheduler>>,
    sleeper: SpinSleeper,
    config: EngineConfig,
}

impl Engine {
    pub fn new(mode: SchedulerMode, config: EngineConfig) -> Self {
        Self {
            executor: Rc::new(Executor::new()),
            scheduler: Rc::new(RefCell::new(TimeScheduler::new(mode))),
            sleeper: SpinSleeper::default(),
            config,
        }
    }

    /// Offline engine with default configuration.
    pub fn offline() -> Self {
        Self::new(SchedulerMode::Offline, EngineConfig::default())
    }

    /// Realtime engine with default configuration.
    pub fn realtime() -> Self {
        Self::new(SchedulerMode::Realtime, EngineConfig::default())
    }

    pub fn mode(&self) -> SchedulerMode {
        self.scheduler.borrow().mode
    }

    /// Create a sequencer driven by this engine.
    pub fn sequencer(&self, config: SequencerConfig) -> Sequencer {
        Sequencer::new(self, config)
    }

    /// Current logical time in milliseconds.
    pub fn now(&self) -> u64 {
        self.scheduler.borrow().now()
    }

    /// A future that completes `ms` logical milliseconds from now.
    pub fn sleep_ms(&self, ms: u64) -> Sleep {
        let signal = Signal::new();
        let s = signal.clone();
        let timer = self
            .scheduler
            .borrow_mut()
            .schedule_in(ms, Box::new(move || s.resolve()));
        Sleep {
            wait: signal.wait(),
            signal,
            timer: Some(timer),
            scheduler: Rc::downgrade(&self.scheduler),
        }
    }

    /// True when no timer is pending and no awaitable is being driven.
    pub fn is_idle(&self) -> bool {
        !self.scheduler.borrow().has_pending_timers() && self.executor.pending_tasks() == 0
    }

    /// Run everything due at or before `now`, draining the executor between
    /// timer tasks. Timers scheduled while draining run too if they are due.
    fn run_due(&self, now: u64, budget: &mut usize, target_ms: u64) -> Result<(), EngineError> {
        loop {
            self.executor.run_until_stalled();

            // Release the scheduler before running the task; it may schedule more.
            let task = self.scheduler.borrow_mut().pop_due(now);
            let Some(task) = task else {
                return Ok(());
            };
            task();

            *budget += 1;
            if *budget > self.config.max_timeslices {
                return Err(EngineError::RunawayScheduling {
                    target_ms,
                    timeslices: self.config.max_timeslices,
                });
            }
        }
    }

    /// Run all work due at the current time without moving the clock.
    pub fn run_until_stalled(&self) -> Result<(), EngineError> {
        let now = self.now();
        let mut budget = 0;
        self.run_due(now, &mut budget, now)
    }

    /// Advance offline time to `target_ms`, firing timers in deadline order.
    pub fn advance_to(&self, target_ms: u64) -> Result<(), EngineError> {
        let mut budget = 0;
        self.run_due(self.now(), &mut budget, target_ms)?;

        loop {
            let next = self.scheduler.borrow_mut().peek_next_deadline();
            let Some(t) = next.filter(|t| *t <= target_ms) else {
                break;
            };
            self.scheduler.borrow_mut().set_offline_now(t);
            self.run_due(t, &mut budget, target_ms)?;
        }

        self.scheduler.borrow_mut().set_offline_now(target_ms);
        self.run_due(target_ms, &mut budget, target_ms)
    }

    /// Step offline time forward by `dt_ms`.
    pub fn step_ms(&self, dt_ms: u64) -> Result<(), EngineError> {
        let target = self.now().saturating_add(dt_ms);
        self.advance_to(target)
    }

    /// Run in realtime until `is_done` returns true or nothing is left to do.
    pub fn run_until<F>(&self, is_done: F) -> Result<(), EngineError>
    where
        F: Fn() -> bool,
    {
        loop {
            self.executor.run_until_stalled();
            if is_done() {
                return Ok(());
            }

            let now = self.now();
            let next = self.scheduler.borrow_mut().peek_next_deadline();
            match next {
                Some(t) if t <= now => {
                    let mut budget = 0;
                    self.run_due(now, &mut budget, now)?;
                }
                Some(t) => self.sleeper.sleep(Duration::from_millis(t - now)),
                None if self.is_idle() => return Ok(()),
                // Awaitables are pending but nothing is scheduled; poll again shortly.
                None => self.sleeper.sleep(Duration::from_millis(1)),
            }
        }
    }
}

/// Future returned by [`Engine::sleep_ms`]. Dropping it cancels the timer.
pub struct Sleep {
    wait: SignalFuture,
    signal: Signal,
    timer: Option<TimerId>,
    scheduler: Weak<RefCell<TimeScheduler>>,
}

impl Future for Sleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.wait).poll(cx) {
            Poll::Ready(_) => {
                this.timer = None;
                Poll::Ready(())
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        let Some(id) = self.timer.take() else {
            return;
        };
        if self.signal.is_settled() {
            return;
        }
        if let Some(scheduler) = self.scheduler.upgrade() {
            if let Ok(mut sched) = scheduler.try_borrow_mut() {
                sched.cancel(id);
            }
        }
    }
}
