//! Event-emitting completion sources.
//!
//! Anything implementing [`EventTarget`] can finish a step: the sequencer
//! listens for the host's animation-end and transition-end events, plus
//! `"ended"` for media elements. [`Element`] is a plain in-process target.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Event fired by media elements when playback reaches the end.
pub const MEDIA_ENDED: &str = "ended";

/// Callback registered on an event target. Removal is by `Rc` identity.
pub type DomListener = Rc<dyn Fn()>;

/// Category of an event target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ElementKind {
    #[default]
    Generic,
    /// Audio/video-like element; also completes on [`MEDIA_ENDED`].
    Media,
}

/// Registration of listeners by event name.
pub trait EventTarget {
    fn kind(&self) -> ElementKind;

    fn add_event_listener(&self, name: &str, listener: DomListener);

    fn remove_event_listener(&self, name: &str, listener: &DomListener);
}

/// The host's end-of-animation and end-of-transition event names.
/// Either may be absent when the host does not support it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventNames {
    pub animation_end: Option<String>,
    pub transition_end: Option<String>,
}

const ANIMATION_PROPS: [(&str, &str); 4] = [
    ("animation", "animationend"),
    ("-o-animation", "oAnimationEnd"),
    ("-moz-animation", "animationend"),
    ("-webkit-animation", "webkitAnimationEnd"),
];

const TRANSITION_PROPS: [(&str, &str); 4] = [
    ("transition", "transitionend"),
    ("-o-transition", "oTransitionEnd"),
    ("-moz-transition", "transitionend"),
    ("-webkit-transition", "webkitTransitionEnd"),
];

impl EventNames {
    /// Unprefixed `animationend` / `transitionend`.
    pub fn standard() -> Self {
        Self {
            animation_end: Some("animationend".to_string()),
            transition_end: Some("transitionend".to_string()),
        }
    }

    /// No animation or transition support.
    pub fn none() -> Self {
        Self::default()
    }

    /// Pick the end-event names for the first style property the host
    /// supports, checking the unprefixed property before vendor prefixes.
    pub fn detect(supports: impl Fn(&str) -> bool) -> Self {
        let pick = |table: &[(&str, &str)]| {
            table
                .iter()
                .find(|(prop, _)| supports(prop))
                .map(|(_, event)| (*event).to_string())
        };
        Self {
            animation_end: pick(&ANIMATION_PROPS),
            transition_end: pick(&TRANSITION_PROPS),
        }
    }

    /// Names a target of `kind` must be watched for.
    pub(crate) fn watched(&self, kind: ElementKind) -> Vec<&str> {
        let mut names: Vec<&str> = [&self.animation_end, &self.transition_end]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect();
        if kind == ElementKind::Media {
            names.push(MEDIA_ENDED);
        }
        names
    }
}

/// In-process event target.
#[derive(Default)]
pub struct Element {
    kind: ElementKind,
    listeners: RefCell<HashMap<String, Vec<DomListener>>>,
}

impl Element {
    pub fn new(kind: ElementKind) -> Rc<Self> {
        Rc::new(Self {
            kind,
            listeners: RefCell::new(HashMap::new()),
        })
    }

    pub fn generic() -> Rc<Self> {
        Self::new(ElementKind::Generic)
    }

    pub fn media() -> Rc<Self> {
        Self::new(ElementKind::Media)
    }

    /// Fire `name`, calling every listener registered for it at this moment.
    /// Returns how many listeners ran.
    pub fn dispatch(&self, name: &str) -> usize {
        let snapshot: Vec<DomListener> = self
            .listeners
            .borrow()
            .get(name)
            .cloned()
            .unwrap_or_default();
        for listener in &snapshot {
            listener();
        }
        snapshot.len()
    }

    pub fn listener_count(&self, name: &str) -> usize {
        self.listeners.borrow().get(name).map_or(0, Vec::len)
    }
}

impl EventTarget for Element {
    fn kind(&self) -> ElementKind {
        self.kind
    }

    fn add_event_listener(&self, name: &str, listener: DomListener) {
        self.listeners
            .borrow_mut()
            .entry(name.to_string())
            .or_default()
            .push(listener);
    }

    fn remove_event_listener(&self, name: &str, listener: &DomListener) {
        if let Some(list) = self.listeners.borrow_mut().get_mut(name) {
            list.retain(|l| !Rc::ptr_eq(l, listener));
        }
    }
}
