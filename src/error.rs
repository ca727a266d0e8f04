//! Error types.

/// Errors reported by the checked sequencer operations and instrumentation.
/// Playback itself never fails: unresolvable requests are ignored.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SequencerError {
    /// No marker registered under this name
    #[error("unknown marker: {0:?}")]
    UnknownMarker(String),

    /// Index does not hold a registered step
    #[error("no step at index {index} (sequence has {len} positions)")]
    NoStepAt { index: usize, len: usize },

    /// The open step window has been waiting longer than allowed
    #[error("step {index} has not completed after {waited_ms}ms ({pending} completions outstanding)")]
    StepNeverCompleted {
        index: usize,
        pending: usize,
        waited_ms: u64,
    },
}

/// Errors from driving the engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Offline stepping kept finding due timers without making progress.
    #[error("advance_to({target_ms}) exceeded {timeslices} timeslices - likely infinite scheduling")]
    RunawayScheduling { target_ms: u64, timeslices: usize },
}

/// Unrecognized lifecycle event name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown lifecycle event: {0:?}")]
pub struct ParseEventError(pub String);

/// Output of a rejected [`Signal`](crate::signal::Signal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("signal rejected")]
pub struct SignalRejected;
