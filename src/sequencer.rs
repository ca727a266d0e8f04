//! Sequencer
//!
//! The playback state machine. A sequencer walks its [`Timeline`] one
//! position at a time, hands every step a [`Next`] continuation, and only
//! moves on once every member of the position has completed.
//!
//! In synchronous mode each transition happens on the caller's stack. In
//! async mode (forced on by any non-zero wait) step invocation is deferred to
//! the next scheduler tick and advancement waits for the position's delay.
//! At most one invocation timer and one advance timer are pending at a time.

use crate::completion::{self, Completion};
use crate::element::EventNames;
use crate::engine::Engine;
use crate::error::SequencerError;
use crate::event::{Event, ListenerId, Listeners};
use crate::executor::Executor;
use crate::scheduler::TimeScheduler;
use crate::timeline::{GotoTarget, Position, Step, Timeline};
use crate::timer_queue::TimerId;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Loop counter value meaning "loop forever".
const LOOP_FOREVER: i64 = -1;

/// Direction of travel through the timeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl Direction {
    pub fn sign(self) -> isize {
        match self {
            Direction::Forward => 1,
            Direction::Backward => -1,
        }
    }

    pub fn reversed(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

/// How many passes over the timeline playback makes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Loops {
    Forever,
    /// `Times(0)` plays a single pass, like `Times(1)`.
    Times(u32),
}

impl Loops {
    fn counter(self) -> i64 {
        match self {
            Loops::Forever => LOOP_FOREVER,
            Loops::Times(n) => i64::from(n.max(1)),
        }
    }

    fn from_counter(counter: i64) -> Self {
        match u32::try_from(counter) {
            Ok(n) => Loops::Times(n),
            Err(_) => Loops::Forever,
        }
    }
}

impl Default for Loops {
    fn default() -> Self {
        Loops::Times(1)
    }
}

impl From<u32> for Loops {
    fn from(n: u32) -> Self {
        Loops::Times(n)
    }
}

/// Initial settings for a sequencer.
#[derive(Clone, Debug)]
pub struct SequencerConfig {
    /// Defer invocation and advancement to scheduler ticks.
    pub async_mode: bool,
    pub direction: Direction,
    pub loops: Loops,
    /// Allow wrapping past the start while moving forward (or past the end
    /// while moving backward).
    pub loop_backward: bool,
    pub event_names: EventNames,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            async_mode: false,
            direction: Direction::Forward,
            loops: Loops::default(),
            loop_backward: false,
            event_names: EventNames::standard(),
        }
    }
}

/// Result of turning the raw index into a runnable position.
#[derive(Debug, PartialEq, Eq)]
enum Boundary {
    InRange,
    Wrapped,
    Exhausted,
}

/// Mutable playback state (behind `Rc<RefCell<>>`).
struct SequencerInner {
    timeline: Timeline,

    index: isize,
    direction: Direction,
    loops: i64,
    loop_budget: i64,
    loop_backward: bool,

    playing: bool,
    initialized: bool,
    /// A step window is open: `Before` fired and `After` has not.
    in_step: bool,
    /// Outstanding member completions for the running position.
    pending: usize,
    async_mode: bool,

    /// Evaluation cycle; continuations from older cycles are ignored.
    cycle: u64,
    /// Position of the open step window.
    current: Option<usize>,
    /// Logical time the open step window was entered.
    entered_at: Option<u64>,

    invoke_timer: Option<TimerId>,
    advance_timer: Option<TimerId>,

    /// A drive loop is running further up the stack.
    draining: bool,
    /// Advance requested inside the drive loop, tagged with its cycle.
    queued_advance: Option<u64>,

    listeners: Listeners,
    finale: Option<Rc<dyn Fn(&Sequencer)>>,
    event_names: EventNames,

    scheduler: Rc<RefCell<TimeScheduler>>,
    executor: Rc<Executor>,
}

impl SequencerInner {
    fn start_index(&self) -> isize {
        match self.direction {
            Direction::Forward => 0,
            Direction::Backward => self.timeline.len() as isize - 1,
        }
    }

    fn set_loop_counters(&mut self, loops: Loops) {
        self.loops = loops.counter();
        self.loop_budget = self.loops;
    }

    /// Wrap an out-of-range index and account for the loop it completes.
    fn resolve_boundary(&mut self) -> Boundary {
        let len = self.timeline.len() as isize;
        let dir = self.direction.sign() as i64;

        if self.index < 0 {
            if self.loops != LOOP_FOREVER {
                if self.direction == Direction::Backward || self.loop_backward {
                    self.index = len - 1;
                    self.loops += dir;
                } else {
                    return Boundary::Exhausted;
                }
            } else {
                self.index = len - 1;
            }
            return self.after_wrap();
        }

        if self.index >= len {
            if self.loops != LOOP_FOREVER {
                if self.direction == Direction::Forward || self.loop_backward {
                    self.index = 0;
                    self.loops -= dir;
                } else {
                    return Boundary::Exhausted;
                }
            } else {
                self.index = 0;
            }
            return self.after_wrap();
        }

        Boundary::InRange
    }

    // Wrapping against the direction of travel gives a loop back, which
    // pushes the counter past the budget when no loop has been used yet.
    fn after_wrap(&self) -> Boundary {
        if self.loops == 0 || self.loops > self.loop_budget {
            Boundary::Exhausted
        } else {
            Boundary::Wrapped
        }
    }

    fn cancel_timers(&mut self) {
        let mut sched = self.scheduler.borrow_mut();
        if let Some(id) = self.invoke_timer.take() {
            sched.cancel(id);
        }
        if let Some(id) = self.advance_timer.take() {
            sched.cancel(id);
        }
    }
}

/// Continuation handed to each step. Consuming it signals that the step
/// (one member of its position) is finished.
pub struct Next {
    seq: Weak<RefCell<SequencerInner>>,
    cycle: u64,
}

impl Next {
    /// Finish now.
    pub fn done(self) {
        self.done_when(Completion::Now);
    }

    /// Finish once `completion` has settled.
    pub fn done_when(self, completion: impl Into<Completion>) {
        let Some(inner) = self.seq.upgrade() else {
            return;
        };
        let (executor, names) = {
            let s = inner.borrow();
            (s.executor.clone(), s.event_names.clone())
        };
        drop(inner);

        let seq = self.seq;
        let cycle = self.cycle;
        completion::resolve(completion.into(), &executor, &names, move || {
            if let Some(inner) = seq.upgrade() {
                Sequencer(inner).member_done(cycle);
            }
        });
    }
}

/// Handle to a sequencer. Clones share the same state.
#[derive(Clone)]
pub struct Sequencer(Rc<RefCell<SequencerInner>>);

impl Sequencer {
    pub fn new(engine: &Engine, config: SequencerConfig) -> Self {
        let loops = config.loops.counter();
        Sequencer(Rc::new(RefCell::new(SequencerInner {
            timeline: Timeline::new(),
            index: 0,
            direction: config.direction,
            loops,
            loop_budget: loops,
            loop_backward: config.loop_backward,
            playing: false,
            initialized: false,
            in_step: false,
            pending: 0,
            async_mode: config.async_mode,
            cycle: 0,
            current: None,
            entered_at: None,
            invoke_timer: None,
            advance_timer: None,
            draining: false,
            queued_advance: None,
            listeners: Listeners::default(),
            finale: None,
            event_names: config.event_names,
            scheduler: engine.scheduler.clone(),
            executor: engine.executor.clone(),
        })))
    }

    // --- Step registry ---

    /// Append one step.
    pub fn step(&self, f: impl Fn(Next) + 'static) -> &Self {
        self.0.borrow_mut().timeline.push(Position::Single(Rc::new(f)));
        self
    }

    /// Append `times` positions running the same step.
    pub fn step_repeated(&self, f: impl Fn(Next) + 'static, times: usize) -> &Self {
        let step: Step = Rc::new(f);
        let mut s = self.0.borrow_mut();
        for _ in 0..times {
            s.timeline.push(Position::Single(step.clone()));
        }
        drop(s);
        self
    }

    /// Append one position whose steps run together.
    pub fn group(&self, steps: impl IntoIterator<Item = Step>) -> &Self {
        let steps: Vec<Step> = steps.into_iter().collect();
        self.0.borrow_mut().timeline.push(Position::Group(steps));
        self
    }

    /// Delay advancement after the most recently added position.
    /// Any non-zero delay switches the sequencer to async mode for good.
    pub fn wait(&self, delay_ms: u64) -> &Self {
        let mut s = self.0.borrow_mut();
        match s.timeline.set_wait(delay_ms) {
            Some(index) => {
                tracing::trace!(index, delay_ms, "wait set");
                if delay_ms > 0 {
                    s.async_mode = true;
                }
            }
            None => tracing::debug!(delay_ms, "wait ignored: no step added yet"),
        }
        drop(s);
        self
    }

    /// Name the next position to be added.
    pub fn marker(&self, name: impl Into<String>) -> &Self {
        self.0.borrow_mut().timeline.set_marker(name);
        self
    }

    // --- Playback control ---

    /// Enter the sequence at its start and run that position without
    /// starting playback.
    pub fn init(&self) -> &Self {
        {
            let mut s = self.0.borrow_mut();
            s.initialized = true;
            s.playing = false;
            s.index = s.start_index();
        }
        tracing::debug!("init");
        self.trigger(Event::Init);
        self.run()
    }

    /// Play using the remaining loop count as the new budget.
    pub fn play(&self) -> &Self {
        let current = Loops::from_counter(self.0.borrow().loops);
        self.play_loops(current)
    }

    /// Play with a fresh loop budget. When already playing only the budget changes.
    pub fn play_loops(&self, loops: Loops) -> &Self {
        let resume = {
            let mut s = self.0.borrow_mut();
            s.set_loop_counters(loops);
            if s.playing {
                return self;
            }
            s.playing = true;
            s.initialized
        };

        tracing::debug!(?loops, resume, "play");
        self.trigger(Event::Play);

        if resume {
            return self.next();
        }

        {
            let mut s = self.0.borrow_mut();
            s.initialized = true;
            s.index = s.start_index();
        }
        self.trigger(Event::Start);
        self.run()
    }

    pub fn pause(&self) -> &Self {
        let was_playing = std::mem::replace(&mut self.0.borrow_mut().playing, false);
        if was_playing {
            tracing::debug!(index = self.index(), "pause");
            self.close_window();
            self.trigger(Event::Pause);
        }
        self
    }

    pub fn toggle(&self) -> &Self {
        if self.is_playing() {
            self.pause()
        } else {
            self.play()
        }
    }

    /// Leave the sequence and run the finale. No-op unless initialized.
    pub fn stop(&self) -> &Self {
        {
            let mut s = self.0.borrow_mut();
            if !s.initialized {
                return self;
            }
            s.playing = false;
            s.initialized = false;
        }

        tracing::debug!(index = self.index(), "stop");
        self.close_window();
        self.trigger(Event::Stop);

        let finale = self.0.borrow().finale.clone();
        if let Some(finale) = finale {
            finale(self);
        }
        self
    }

    /// Set the callback run after every stop, replacing the previous one.
    pub fn done(&self, f: impl Fn(&Sequencer) + 'static) -> &Self {
        self.0.borrow_mut().finale = Some(Rc::new(f));
        self
    }

    pub fn next(&self) -> &Self {
        self.next_by(1)
    }

    /// Move `n` positions in the direction of travel and run there.
    pub fn next_by(&self, n: isize) -> &Self {
        {
            let mut s = self.0.borrow_mut();
            if !s.initialized {
                return self;
            }
            s.index += n * s.direction.sign();
        }
        self.run()
    }

    pub fn previous(&self) -> &Self {
        self.previous_by(1)
    }

    /// Move `n` positions against the direction of travel and run there.
    pub fn previous_by(&self, n: isize) -> &Self {
        self.next_by(-n)
    }

    /// Run the current position again.
    pub fn same(&self) -> &Self {
        self.run()
    }

    /// Jump to the start for the current direction and run it.
    pub fn rewind(&self) -> &Self {
        {
            let mut s = self.0.borrow_mut();
            s.index = s.start_index();
        }
        self.run()
    }

    pub fn set_loop(&self, loops: Loops) -> &Self {
        self.0.borrow_mut().set_loop_counters(loops);
        self
    }

    pub fn set_loop_backward(&self, loop_backward: bool) -> &Self {
        self.0.borrow_mut().loop_backward = loop_backward;
        self
    }

    /// Set the raw index. Takes effect on the next evaluation.
    pub fn set_index(&self, index: isize) -> &Self {
        self.0.borrow_mut().index = index;
        self
    }

    pub fn set_direction(&self, direction: Direction) -> &Self {
        self.0.borrow_mut().direction = direction;
        self
    }

    pub fn reverse(&self) -> &Self {
        let mut s = self.0.borrow_mut();
        s.direction = s.direction.reversed();
        drop(s);
        self
    }

    /// Jump to a marker or registered index and run it. An unresolvable
    /// target leaves the index alone; the current position still runs.
    pub fn goto(&self, target: impl Into<GotoTarget>) -> &Self {
        let target = target.into();
        let resolved = self.0.borrow().timeline.resolve(&target);
        match resolved {
            Ok(index) => self.0.borrow_mut().index = index as isize,
            Err(err) => tracing::debug!(%err, "goto target ignored"),
        }
        self.run()
    }

    /// Like [`goto`](Self::goto) but reports an unresolvable target instead
    /// of running anything.
    pub fn try_goto(&self, target: impl Into<GotoTarget>) -> Result<&Self, SequencerError> {
        let index = self.0.borrow().timeline.resolve(&target.into())?;
        self.0.borrow_mut().index = index as isize;
        Ok(self.run())
    }

    /// Subscribe to a lifecycle event.
    pub fn on(&self, event: Event, f: impl Fn(&Sequencer) + 'static) -> ListenerId {
        self.0.borrow_mut().listeners.add(event, Rc::new(f))
    }

    /// Remove one listener, or every listener of `event` when `id` is `None`.
    pub fn off(&self, event: Event, id: Option<ListenerId>) -> &Self {
        let mut s = self.0.borrow_mut();
        match id {
            Some(id) => {
                s.listeners.remove(event, id);
            }
            None => s.listeners.clear(event),
        }
        drop(s);
        self
    }

    // --- Accessors ---

    pub fn index(&self) -> isize {
        self.0.borrow().index
    }

    pub fn direction(&self) -> Direction {
        self.0.borrow().direction
    }

    pub fn is_playing(&self) -> bool {
        self.0.borrow().playing
    }

    pub fn is_initialized(&self) -> bool {
        self.0.borrow().initialized
    }

    pub fn is_in_step(&self) -> bool {
        self.0.borrow().in_step
    }

    /// Member completions still outstanding for the running position.
    pub fn pending(&self) -> usize {
        self.0.borrow().pending
    }

    pub fn is_async(&self) -> bool {
        self.0.borrow().async_mode
    }

    pub fn remaining_loops(&self) -> Loops {
        Loops::from_counter(self.0.borrow().loops)
    }

    pub fn loop_budget(&self) -> Loops {
        Loops::from_counter(self.0.borrow().loop_budget)
    }

    pub fn loop_backward(&self) -> bool {
        self.0.borrow().loop_backward
    }

    /// Number of positions.
    pub fn len(&self) -> usize {
        self.0.borrow().timeline.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().timeline.is_empty()
    }

    pub fn marker_index(&self, name: &str) -> Option<usize> {
        self.0.borrow().timeline.marker(name)
    }

    /// Report a step window that has waited at least `max_ms` logical
    /// milliseconds for its completions. Never affects playback.
    pub fn check_progress(&self, max_ms: u64) -> Result<(), SequencerError> {
        let s = self.0.borrow();
        if !s.in_step || s.pending == 0 {
            return Ok(());
        }
        let (Some(index), Some(entered)) = (s.current, s.entered_at) else {
            return Ok(());
        };
        let waited_ms = s.scheduler.borrow().now().saturating_sub(entered);
        if waited_ms >= max_ms {
            return Err(SequencerError::StepNeverCompleted {
                index,
                pending: s.pending,
                waited_ms,
            });
        }
        Ok(())
    }

    // --- Internals ---

    fn trigger(&self, event: Event) {
        let listeners = self.0.borrow().listeners.snapshot(event);
        tracing::trace!(%event, listeners = listeners.len(), "dispatch");
        for listener in listeners {
            listener(self);
        }
    }

    /// Close an open step window and drop any scheduled invocation or advance.
    fn close_window(&self) {
        let was_in_step = {
            let mut s = self.0.borrow_mut();
            s.cancel_timers();
            std::mem::take(&mut s.in_step)
        };
        if was_in_step {
            self.trigger(Event::After);
        }
    }

    fn run(&self) -> &Self {
        self.drive(Self::evaluate);
        self
    }

    /// Run `f`, then every advance it queued, looping on this frame so
    /// synchronous playback never nests one step inside another. Nested
    /// calls run `f` directly and leave their queued advance to the outer loop.
    fn drive(&self, f: impl FnOnce(&Self)) {
        if std::mem::replace(&mut self.0.borrow_mut().draining, true) {
            f(self);
            return;
        }
        let _guard = DriveGuard(self);
        f(self);
        loop {
            let due = {
                let mut s = self.0.borrow_mut();
                match s.queued_advance.take() {
                    None => break,
                    // Dropped if a pause or jump happened after the request.
                    Some(cycle) => cycle == s.cycle && s.playing,
                }
            };
            if due {
                self.step_forward();
            }
        }
    }

    /// Resolve the index against the timeline bounds, then run the position.
    fn evaluate(&self) {
        let boundary = self.0.borrow_mut().resolve_boundary();
        match boundary {
            Boundary::Exhausted => {
                tracing::debug!("loop budget exhausted");
                self.stop();
                return;
            }
            Boundary::Wrapped => {
                tracing::debug!(remaining = ?self.remaining_loops(), "loop");
                self.trigger(Event::Loop);
                // A loop listener may have stopped playback.
                if !self.is_initialized() {
                    return;
                }
            }
            Boundary::InRange => {}
        }

        let (index, cycle, async_mode) = {
            let mut s = self.0.borrow_mut();
            let index = usize::try_from(s.index)
                .ok()
                .filter(|i| *i < s.timeline.len());
            s.cycle += 1;
            (index, s.cycle, s.async_mode)
        };
        let Some(index) = index else {
            tracing::debug!("no position to run");
            self.stop();
            return;
        };

        if async_mode {
            self.schedule_invoke(index, cycle);
        } else {
            self.invoke(index, cycle);
        }
    }

    fn schedule_invoke(&self, index: usize, cycle: u64) {
        let weak = Rc::downgrade(&self.0);
        let mut s = self.0.borrow_mut();
        if let Some(id) = s.invoke_timer.take() {
            s.scheduler.borrow_mut().cancel(id);
        }
        let id = s.scheduler.borrow_mut().schedule_in(
            0,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.borrow_mut().invoke_timer = None;
                    Sequencer(inner).drive(|s| s.invoke(index, cycle));
                }
            }),
        );
        s.invoke_timer = Some(id);
    }

    /// Open a step window at `index` and start every member of the position.
    fn invoke(&self, index: usize, cycle: u64) {
        if self.0.borrow().cycle != cycle {
            return;
        }
        if std::mem::take(&mut self.0.borrow_mut().in_step) {
            // A window left open by a jump closes before the next one opens.
            self.trigger(Event::After);
        }

        let position = {
            let mut s = self.0.borrow_mut();
            if s.cycle != cycle {
                return;
            }
            let Some(position) = s.timeline.position(index).cloned() else {
                return;
            };
            let now = s.scheduler.borrow().now();
            s.in_step = true;
            s.pending = position.len();
            s.current = Some(index);
            s.entered_at = Some(now);
            position
        };

        tracing::debug!(index, cycle, members = position.len(), "step");
        self.trigger(Event::Before);

        if position.is_empty() {
            self.member_done(cycle);
            return;
        }
        for step in position.steps() {
            step(Next {
                seq: Rc::downgrade(&self.0),
                cycle,
            });
        }
    }

    /// One member of the running position finished.
    fn member_done(&self, cycle: u64) {
        enum Then {
            Hold,
            CloseWindow,
            Advance,
            AdvanceAfter(u64),
        }

        let then = {
            let mut s = self.0.borrow_mut();
            if s.cycle != cycle {
                tracing::trace!(cycle, current = s.cycle, "stale continuation ignored");
                return;
            }
            s.pending = s.pending.saturating_sub(1);
            if !s.playing {
                if std::mem::take(&mut s.in_step) {
                    Then::CloseWindow
                } else {
                    Then::Hold
                }
            } else if s.pending > 0 {
                Then::Hold
            } else if s.async_mode {
                let delay = s.current.map_or(0, |i| s.timeline.wait_after(i));
                Then::AdvanceAfter(delay)
            } else {
                Then::Advance
            }
        };

        match then {
            Then::Hold => {}
            Then::CloseWindow => self.trigger(Event::After),
            Then::Advance => self.advance(),
            Then::AdvanceAfter(delay_ms) => self.schedule_advance(delay_ms),
        }
    }

    fn schedule_advance(&self, delay_ms: u64) {
        let weak = Rc::downgrade(&self.0);
        let mut s = self.0.borrow_mut();
        if let Some(id) = s.advance_timer.take() {
            s.scheduler.borrow_mut().cancel(id);
        }
        let id = s.scheduler.borrow_mut().schedule_in(
            delay_ms,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.borrow_mut().advance_timer = None;
                    Sequencer(inner).advance();
                }
            }),
        );
        s.advance_timer = Some(id);
    }

    fn advance(&self) {
        {
            let mut s = self.0.borrow_mut();
            if s.draining {
                s.queued_advance = Some(s.cycle);
                return;
            }
        }
        self.drive(Self::step_forward);
    }

    /// Close the window and move one position in the direction of travel.
    fn step_forward(&self) {
        if std::mem::take(&mut self.0.borrow_mut().in_step) {
            self.trigger(Event::After);
        }
        {
            let mut s = self.0.borrow_mut();
            s.index += s.direction.sign();
        }
        self.evaluate();
    }
}

/// Ends a drive loop, also when a step or listener unwinds through it.
struct DriveGuard<'a>(&'a Sequencer);

impl Drop for DriveGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut s) = self.0 .0.try_borrow_mut() {
            s.draining = false;
            s.queued_advance = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_and_seq(config: SequencerConfig) -> (Engine, Sequencer) {
        let engine = Engine::offline();
        let seq = engine.sequencer(config);
        (engine, seq)
    }

    fn boundary_of(seq: &Sequencer) -> Boundary {
        seq.0.borrow_mut().resolve_boundary()
    }

    fn with_steps(seq: &Sequencer, n: usize) {
        seq.step_repeated(|next| next.done(), n);
    }

    #[test]
    fn test_loops_counter_mapping() {
        assert_eq!(Loops::Forever.counter(), -1);
        assert_eq!(Loops::Times(3).counter(), 3);
        assert_eq!(Loops::Times(0).counter(), 1);
        assert_eq!(Loops::from_counter(-1), Loops::Forever);
        assert_eq!(Loops::from_counter(2), Loops::Times(2));
    }

    #[test]
    fn test_overflow_consumes_a_loop_forward() {
        let (_engine, seq) = engine_and_seq(SequencerConfig::default());
        with_steps(&seq, 3);
        seq.set_loop(Loops::Times(2)).set_index(3);

        assert_eq!(boundary_of(&seq), Boundary::Wrapped);
        assert_eq!(seq.index(), 0);
        assert_eq!(seq.remaining_loops(), Loops::Times(1));

        seq.set_index(3);
        assert_eq!(boundary_of(&seq), Boundary::Exhausted);
    }

    #[test]
    fn test_underflow_consumes_a_loop_backward() {
        let (_engine, seq) = engine_and_seq(SequencerConfig {
            direction: Direction::Backward,
            loops: Loops::Times(2),
            ..Default::default()
        });
        with_steps(&seq, 3);
        seq.set_index(-1);

        assert_eq!(boundary_of(&seq), Boundary::Wrapped);
        assert_eq!(seq.index(), 2);
        assert_eq!(seq.remaining_loops(), Loops::Times(1));
    }

    #[test]
    fn test_underflow_forward_requires_loop_backward() {
        let (_engine, seq) = engine_and_seq(SequencerConfig {
            loops: Loops::Times(3),
            ..Default::default()
        });
        with_steps(&seq, 3);

        seq.set_index(-1);
        assert_eq!(boundary_of(&seq), Boundary::Exhausted);

        // Wrapping backwards hands a loop back, exceeding a fresh budget.
        seq.set_loop_backward(true).set_index(-1);
        assert_eq!(boundary_of(&seq), Boundary::Exhausted);

        // After one forward pass there is a loop to give back.
        seq.set_loop(Loops::Times(3)).set_index(3);
        assert_eq!(boundary_of(&seq), Boundary::Wrapped);
        assert_eq!(seq.remaining_loops(), Loops::Times(2));
        seq.set_index(-1);
        assert_eq!(boundary_of(&seq), Boundary::Wrapped);
        assert_eq!(seq.index(), 2);
        assert_eq!(seq.remaining_loops(), Loops::Times(3));
    }

    #[test]
    fn test_overflow_backward_requires_loop_backward() {
        let (_engine, seq) = engine_and_seq(SequencerConfig {
            direction: Direction::Backward,
            loops: Loops::Times(2),
            ..Default::default()
        });
        with_steps(&seq, 2);
        seq.set_index(2);
        assert_eq!(boundary_of(&seq), Boundary::Exhausted);
    }

    #[test]
    fn test_forever_wraps_without_counting() {
        let (_engine, seq) = engine_and_seq(SequencerConfig {
            loops: Loops::Forever,
            ..Default::default()
        });
        with_steps(&seq, 4);

        for _ in 0..10 {
            seq.set_index(4);
            assert_eq!(boundary_of(&seq), Boundary::Wrapped);
            seq.set_index(-1);
            assert_eq!(boundary_of(&seq), Boundary::Wrapped);
            assert_eq!(seq.index(), 3);
        }
        assert_eq!(seq.remaining_loops(), Loops::Forever);
    }

    #[test]
    fn test_in_range_untouched() {
        let (_engine, seq) = engine_and_seq(SequencerConfig::default());
        with_steps(&seq, 3);
        seq.set_index(1);
        assert_eq!(boundary_of(&seq), Boundary::InRange);
        assert_eq!(seq.index(), 1);
    }

    #[test]
    fn test_wait_switches_to_async() {
        let (_engine, seq) = engine_and_seq(SequencerConfig::default());
        seq.wait(100);
        assert!(!seq.is_async());

        with_steps(&seq, 1);
        seq.wait(0);
        assert!(!seq.is_async());
        seq.wait(50);
        assert!(seq.is_async());
    }

    #[test]
    fn test_stop_before_init_is_noop() {
        let (_engine, seq) = engine_and_seq(SequencerConfig::default());
        let stops = Rc::new(std::cell::Cell::new(0));
        let s = stops.clone();
        seq.done(move |_| s.set(s.get() + 1));

        seq.stop().stop();
        assert_eq!(stops.get(), 0);
    }

    #[test]
    fn test_empty_timeline_stops_on_play() {
        let (_engine, seq) = engine_and_seq(SequencerConfig {
            loops: Loops::Forever,
            ..Default::default()
        });
        let stops = Rc::new(std::cell::Cell::new(0));
        let s = stops.clone();
        seq.done(move |_| s.set(s.get() + 1));

        seq.play();
        assert_eq!(stops.get(), 1);
        assert!(!seq.is_initialized());
    }
}
