//! One-shot settle handle.
//!
//! A `Signal` is settled exactly once, either resolved or rejected, and any
//! number of `SignalFuture`s wait on it. Steps hand `signal.wait()` to their
//! continuation to finish when some external work settles.

use crate::error::SignalRejected;
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

struct SignalInner {
    outcome: Option<Result<(), SignalRejected>>,
    wakers: Vec<Waker>,
}

/// Shared settle state between producers and waiting futures.
#[derive(Clone)]
pub struct Signal {
    inner: Rc<RefCell<SignalInner>>,
}

impl Signal {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(SignalInner {
                outcome: None,
                wakers: Vec::new(),
            })),
        }
    }

    /// Settle successfully. No-op if already settled.
    pub fn resolve(&self) {
        self.settle(Ok(()));
    }

    /// Settle as rejected. No-op if already settled.
    pub fn reject(&self) {
        self.settle(Err(SignalRejected));
    }

    fn settle(&self, outcome: Result<(), SignalRejected>) {
        let wakers = {
            let mut s = self.inner.borrow_mut();
            if s.outcome.is_some() {
                return;
            }
            s.outcome = Some(outcome);
            std::mem::take(&mut s.wakers)
        };
        for w in wakers {
            w.wake();
        }
    }

    pub fn is_settled(&self) -> bool {
        self.inner.borrow().outcome.is_some()
    }

    /// A future that completes once this signal settles.
    pub fn wait(&self) -> SignalFuture {
        SignalFuture {
            inner: self.inner.clone(),
        }
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

/// Future returned by [`Signal::wait`].
pub struct SignalFuture {
    inner: Rc<RefCell<SignalInner>>,
}

impl Future for SignalFuture {
    type Output = Result<(), SignalRejected>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut s = self.inner.borrow_mut();
        if let Some(outcome) = s.outcome {
            return Poll::Ready(outcome);
        }
        if !s.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            s.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}
