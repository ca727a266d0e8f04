//! Awaitable driver
//!
//! Steps may finish on a future. The executor owns those futures and polls
//! them on the caller's thread in the order they were woken, so settlements
//! replay identically from run to run.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::mem::ManuallyDrop;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, RawWaker, RawWakerVTable, Waker};

type BoxedFuture = Pin<Box<dyn Future<Output = ()>>>;

/// Handle to a spawned future. The future is dropped as soon as it finishes.
pub struct Task {
    fut: RefCell<Option<BoxedFuture>>,
    in_queue: Cell<bool>,
    owner: Weak<RunQueue>,
}

impl Task {
    pub fn is_finished(&self) -> bool {
        // Borrowed means it is being polled right now.
        self.fut.try_borrow().is_ok_and(|fut| fut.is_none())
    }
}

#[derive(Default)]
struct RunQueue {
    ready: RefCell<VecDeque<Rc<Task>>>,
    unfinished: Cell<usize>,
}

impl RunQueue {
    fn schedule(&self, task: &Rc<Task>) {
        if task.is_finished() || task.in_queue.replace(true) {
            return;
        }
        self.ready.borrow_mut().push_back(task.clone());
    }

    fn pop_ready(&self) -> Option<Rc<Task>> {
        self.ready.borrow_mut().pop_front()
    }
}

#[derive(Default)]
pub struct Executor {
    queue: Rc<RunQueue>,
}

impl Executor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `fut`; it is first polled by the next [`run_until_stalled`](Self::run_until_stalled).
    pub fn spawn(&self, fut: impl Future<Output = ()> + 'static) -> Rc<Task> {
        let task = Rc::new(Task {
            fut: RefCell::new(Some(Box::pin(fut))),
            in_queue: Cell::new(false),
            owner: Rc::downgrade(&self.queue),
        });
        self.queue.unfinished.set(self.queue.unfinished.get() + 1);
        self.queue.schedule(&task);
        task
    }

    /// Poll woken tasks until the queue is empty, including tasks spawned or
    /// woken along the way. Returns how many polls ran.
    pub fn run_until_stalled(&self) -> usize {
        let mut polls = 0;
        while let Some(task) = self.queue.pop_ready() {
            task.in_queue.set(false);

            let waker = waker_for(&task);
            let mut cx = Context::from_waker(&waker);

            let mut slot = task.fut.borrow_mut();
            let Some(fut) = slot.as_mut() else {
                continue;
            };
            polls += 1;
            if fut.as_mut().poll(&mut cx).is_pending() {
                continue;
            }

            let finished = slot.take();
            drop(slot);
            drop(finished);
            self.queue
                .unfinished
                .set(self.queue.unfinished.get().saturating_sub(1));
        }
        polls
    }

    pub fn has_ready_tasks(&self) -> bool {
        !self.queue.ready.borrow().is_empty()
    }

    /// Spawned tasks that have not finished.
    pub fn pending_tasks(&self) -> usize {
        self.queue.unfinished.get()
    }
}

// Waker data is a pointer obtained from `Rc::into_raw(Rc<Task>)` and owns one
// strong count.

static TASK_WAKER: RawWakerVTable =
    RawWakerVTable::new(clone_raw, wake_raw, wake_by_ref_raw, drop_raw);

fn waker_for(task: &Rc<Task>) -> Waker {
    let data = Rc::into_raw(task.clone()).cast::<()>();
    // SAFETY: `data` carries its own strong count, released by `drop_raw`.
    unsafe { Waker::from_raw(RawWaker::new(data, &TASK_WAKER)) }
}

/// View the task behind `data` without giving up its strong count.
unsafe fn task_ref(data: *const ()) -> ManuallyDrop<Rc<Task>> {
    // SAFETY: callers pass waker data, which is a live `Rc<Task>` pointer.
    ManuallyDrop::new(unsafe { Rc::from_raw(data.cast::<Task>()) })
}

unsafe fn clone_raw(data: *const ()) -> RawWaker {
    // SAFETY: `data` is waker data.
    let task = unsafe { task_ref(data) };
    RawWaker::new(Rc::into_raw(Rc::clone(&task)).cast(), &TASK_WAKER)
}

unsafe fn wake_by_ref_raw(data: *const ()) {
    // SAFETY: `data` is waker data.
    let task = unsafe { task_ref(data) };
    if let Some(queue) = task.owner.upgrade() {
        queue.schedule(&task);
    }
}

unsafe fn wake_raw(data: *const ()) {
    // SAFETY: `wake` consumes the waker, so its count is released afterwards.
    unsafe {
        wake_by_ref_raw(data);
        drop_raw(data);
    }
}

unsafe fn drop_raw(data: *const ()) {
    // SAFETY: releases the count owned by this waker.
    drop(unsafe { Rc::from_raw(data.cast::<Task>()) });
}
