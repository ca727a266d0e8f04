//! Step Sequencer
//!
//! Runs an ordered list of steps one at a time (or in parallel groups),
//! advancing only when each step signals completion:
//! - Pause, resume, reverse and jump to named markers
//! - Bounded or unbounded looping in either direction
//! - Per-step delays on a deterministic logical clock
//! - Completion by direct call, settled awaitables or end events
//! - Dual execution modes: realtime (spin_sleep) and offline (stepping API)

pub mod timer_queue;
pub mod scheduler;
pub mod executor;
pub mod signal;
pub mod engine;
pub mod element;
pub mod completion;
pub mod timeline;
pub mod event;
pub mod sequencer;
pub mod error;


pub use completion::Completion;
pub use element::{Element, ElementKind, EventNames, EventTarget};
pub use engine::{Engine, EngineConfig, SchedulerMode, Sleep};
pub use error::{EngineError, ParseEventError, SequencerError, SignalRejected};
pub use event::{Event, ListenerId};
pub use sequencer::{Direction, Loops, Next, Sequencer, SequencerConfig};
pub use signal::Signal;
pub use timeline::{step_fn, GotoTarget, Position, Step};
