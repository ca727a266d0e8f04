//! Step registry: positions, post-step waits and named markers.
//!
//! Append-only. Positions are never removed or replaced once added.

use crate::error::SequencerError;
use crate::sequencer::Next;
use std::collections::HashMap;
use std::rc::Rc;

/// A unit of work. It must eventually consume its [`Next`] to let playback advance.
pub type Step = Rc<dyn Fn(Next)>;

/// Wrap a closure as a [`Step`].
pub fn step_fn(f: impl Fn(Next) + 'static) -> Step {
    Rc::new(f)
}

/// What runs at one position of the sequence.
#[derive(Clone)]
pub enum Position {
    Single(Step),
    /// Steps started together; the position completes when all of them have.
    Group(Vec<Step>),
}

impl Position {
    /// Number of completions this position waits for.
    pub fn len(&self) -> usize {
        match self {
            Position::Single(_) => 1,
            Position::Group(steps) => steps.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn steps(&self) -> &[Step] {
        match self {
            Position::Single(step) => std::slice::from_ref(step),
            Position::Group(steps) => steps,
        }
    }
}

/// Where `goto` should jump.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GotoTarget {
    Marker(String),
    Index(usize),
}

impl From<&str> for GotoTarget {
    fn from(name: &str) -> Self {
        GotoTarget::Marker(name.to_string())
    }
}

impl From<String> for GotoTarget {
    fn from(name: String) -> Self {
        GotoTarget::Marker(name)
    }
}

impl From<usize> for GotoTarget {
    fn from(index: usize) -> Self {
        GotoTarget::Index(index)
    }
}

#[derive(Clone, Default)]
pub struct Timeline {
    positions: Vec<Position>,
    waits: HashMap<usize, u64>,
    markers: HashMap<String, usize>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, position: Position) -> usize {
        self.positions.push(position);
        self.positions.len() - 1
    }

    /// Attach `delay_ms` to the most recently added position.
    /// Returns the position, or `None` when nothing has been added yet.
    pub fn set_wait(&mut self, delay_ms: u64) -> Option<usize> {
        let last = self.positions.len().checked_sub(1)?;
        self.waits.insert(last, delay_ms);
        Some(last)
    }

    /// Delay after `index` completes, 0 when none was set.
    pub fn wait_after(&self, index: usize) -> u64 {
        self.waits.get(&index).copied().unwrap_or(0)
    }

    /// Name the next position to be added. Last write wins.
    pub fn set_marker(&mut self, name: impl Into<String>) -> usize {
        let at = self.positions.len();
        self.markers.insert(name.into(), at);
        at
    }

    pub fn marker(&self, name: &str) -> Option<usize> {
        self.markers.get(name).copied()
    }

    pub fn position(&self, index: usize) -> Option<&Position> {
        self.positions.get(index)
    }

    /// Resolve a jump target to a registered position.
    pub fn resolve(&self, target: &GotoTarget) -> Result<usize, SequencerError> {
        let index = match target {
            GotoTarget::Marker(name) => self
                .marker(name)
                .ok_or_else(|| SequencerError::UnknownMarker(name.clone()))?,
            GotoTarget::Index(index) => *index,
        };
        if index < self.positions.len() {
            Ok(index)
        } else {
            Err(SequencerError::NoStepAt {
                index,
                len: self.positions.len(),
            })
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
