//! Lifecycle events and the listener table.

use crate::error::ParseEventError;
use crate::sequencer::Sequencer;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

/// Lifecycle notifications emitted by a [`Sequencer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Event {
    Init,
    Play,
    Stop,
    Start,
    Loop,
    Pause,
    /// A step window opened.
    Before,
    /// A step window closed.
    After,
}

impl Event {
    pub const ALL: [Event; 8] = [
        Event::Init,
        Event::Play,
        Event::Stop,
        Event::Start,
        Event::Loop,
        Event::Pause,
        Event::Before,
        Event::After,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Event::Init => "init",
            Event::Play => "play",
            Event::Stop => "stop",
            Event::Start => "start",
            Event::Loop => "loop",
            Event::Pause => "pause",
            Event::Before => "before",
            Event::After => "after",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Event {
    type Err = ParseEventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Event::ALL
            .into_iter()
            .find(|e| e.name() == s)
            .ok_or_else(|| ParseEventError(s.to_string()))
    }
}

/// Callback run when an event fires.
pub type Listener = Rc<dyn Fn(&Sequencer)>;

/// Identifies a registered listener for [`Sequencer::off`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Ordered listeners per event.
#[derive(Default)]
pub(crate) struct Listeners {
    slots: [Vec<(ListenerId, Listener)>; 8],
    next_id: u64,
}

impl Listeners {
    pub(crate) fn add(&mut self, event: Event, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.slots[event.slot()].push((id, listener));
        id
    }

    pub(crate) fn remove(&mut self, event: Event, id: ListenerId) -> bool {
        let list = &mut self.slots[event.slot()];
        let before = list.len();
        list.retain(|(l, _)| *l != id);
        list.len() != before
    }

    pub(crate) fn clear(&mut self, event: Event) {
        self.slots[event.slot()].clear();
    }

    /// Listeners to call for `event`, copied so they can run unborrowed.
    pub(crate) fn snapshot(&self, event: Event) -> Vec<Listener> {
        self.slots[event.slot()]
            .iter()
            .map(|(_, l)| l.clone())
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn count(&self, event: Event) -> usize {
        self.slots[event.slot()].len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for event in Event::ALL {
            assert_eq!(event.name().parse::<Event>(), Ok(event));
        }
        assert_eq!(
            "finish".parse::<Event>(),
            Err(ParseEventError("finish".to_string()))
        );
    }

    #[test]
    fn test_remove_by_id_keeps_order() {
        let mut table = Listeners::default();
        let noop: Listener = Rc::new(|_| {});
        let a = table.add(Event::Loop, noop.clone());
        let b = table.add(Event::Loop, noop.clone());
        let c = table.add(Event::Loop, noop.clone());
        table.add(Event::Stop, noop);

        assert!(table.remove(Event::Loop, b));
        assert!(!table.remove(Event::Loop, b));
        assert!(!table.remove(Event::Stop, a));
        assert_eq!(table.count(Event::Loop), 2);

        let ids: Vec<ListenerId> = table.slots[Event::Loop.slot()].iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![a, c]);

        table.clear(Event::Loop);
        assert_eq!(table.count(Event::Loop), 0);
        assert_eq!(table.count(Event::Stop), 1);
    }
}
