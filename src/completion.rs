//! Completion signals handed to a step's continuation.
//!
//! Every variant reduces to a number of leaves. A countdown starts at the
//! leaf count and the group member counts as complete when it reaches zero,
//! whatever order the leaves settle in.

use crate::element::{DomListener, Element, EventNames, EventTarget};
use crate::executor::Executor;
use crate::signal::{Signal, SignalFuture};
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};

/// What a step waits on before it counts as finished.
pub enum Completion {
    /// Finished immediately.
    Now,
    /// Finished when the future settles. Its output is ignored, so failure
    /// counts as completion too.
    Awaitable(Pin<Box<dyn Future<Output = ()>>>),
    /// Finished on the first end event fired by the target.
    Event(Rc<dyn EventTarget>),
    /// Finished when every member has finished.
    Many(Vec<Completion>),
}

impl Completion {
    pub fn awaitable<F>(fut: F) -> Self
    where
        F: Future + 'static,
    {
        Completion::Awaitable(Box::pin(async move {
            let _ = fut.await;
        }))
    }

    pub fn event(target: Rc<dyn EventTarget>) -> Self {
        Completion::Event(target)
    }

    pub fn all<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Completion>,
    {
        Completion::Many(items.into_iter().map(Into::into).collect())
    }

    /// Number of individual settlements this completion waits for.
    pub fn leaf_count(&self) -> usize {
        match self {
            Completion::Many(items) => items.iter().map(Completion::leaf_count).sum(),
            _ => 1,
        }
    }
}

impl Default for Completion {
    fn default() -> Self {
        Completion::Now
    }
}

impl From<()> for Completion {
    fn from(_: ()) -> Self {
        Completion::Now
    }
}

impl From<SignalFuture> for Completion {
    fn from(fut: SignalFuture) -> Self {
        Completion::awaitable(fut)
    }
}

impl From<&Signal> for Completion {
    fn from(signal: &Signal) -> Self {
        Completion::awaitable(signal.wait())
    }
}

impl From<Rc<Element>> for Completion {
    fn from(el: Rc<Element>) -> Self {
        Completion::Event(el)
    }
}

impl From<Rc<dyn EventTarget>> for Completion {
    fn from(target: Rc<dyn EventTarget>) -> Self {
        Completion::Event(target)
    }
}

impl<T: Into<Completion>> From<Vec<T>> for Completion {
    fn from(items: Vec<T>) -> Self {
        Completion::all(items)
    }
}

/// Counts settlements down to zero, then runs its callback once.
pub(crate) struct Countdown {
    remaining: Cell<usize>,
    on_zero: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl Countdown {
    pub(crate) fn new(count: usize, on_zero: impl FnOnce() + 'static) -> Rc<Self> {
        Rc::new(Self {
            remaining: Cell::new(count),
            on_zero: RefCell::new(Some(Box::new(on_zero))),
        })
    }

    #[cfg(test)]
    pub(crate) fn remaining(&self) -> usize {
        self.remaining.get()
    }

    pub(crate) fn tick(&self) {
        let left = self.remaining.get();
        if left == 0 {
            return;
        }
        self.remaining.set(left - 1);
        if left == 1 {
            let on_zero = self.on_zero.borrow_mut().take();
            if let Some(f) = on_zero {
                f();
            }
        }
    }
}

/// Wait for `completion`, then run `on_done` exactly once.
pub(crate) fn resolve(
    completion: Completion,
    executor: &Executor,
    names: &EventNames,
    on_done: impl FnOnce() + 'static,
) {
    let count = completion.leaf_count();
    let countdown = Countdown::new(count, on_done);
    if count == 0 {
        // Empty `Many`: nothing to wait for.
        let on_zero = countdown.on_zero.borrow_mut().take();
        if let Some(f) = on_zero {
            f();
        }
        return;
    }
    settle(completion, executor, names, &countdown);
}

fn settle(completion: Completion, executor: &Executor, names: &EventNames, countdown: &Rc<Countdown>) {
    match completion {
        Completion::Now => countdown.tick(),
        Completion::Awaitable(fut) => {
            let cd = countdown.clone();
            executor.spawn(async move {
                fut.await;
                cd.tick();
            });
        }
        Completion::Event(target) => watch_end_events(target, names, countdown.clone()),
        Completion::Many(items) => {
            for item in items {
                settle(item, executor, names, countdown);
            }
        }
    }
}

fn watch_end_events(target: Rc<dyn EventTarget>, names: &EventNames, countdown: Rc<Countdown>) {
    let watched: Vec<String> = names
        .watched(target.kind())
        .into_iter()
        .map(str::to_string)
        .collect();
    if watched.is_empty() {
        tracing::debug!("event target has no end events to watch; step will not complete");
        return;
    }

    // The listener finds its own Rc through this slot to unregister itself.
    let me: Rc<RefCell<Option<Weak<dyn Fn()>>>> = Rc::new(RefCell::new(None));
    let weak_target = Rc::downgrade(&target);
    let fired = Cell::new(false);
    let names_for_listener = watched.clone();
    let slot = me.clone();

    let listener: DomListener = Rc::new(move || {
        if fired.replace(true) {
            return;
        }
        let this = slot.borrow().as_ref().and_then(Weak::upgrade);
        if let (Some(target), Some(this)) = (weak_target.upgrade(), this) {
            for name in &names_for_listener {
                target.remove_event_listener(name, &this);
            }
        }
        countdown.tick();
    });
    *me.borrow_mut() = Some(Rc::downgrade(&listener));

    for name in &watched {
        target.add_event_listener(name, listener.clone());
    }
}
