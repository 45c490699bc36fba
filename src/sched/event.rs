//! Input events and the source abstraction the run loop polls.

use std::time::Duration;

/// A keyboard key, reduced to what response predicates match on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Space,
    Enter,
    Escape,
    Backspace,
    /// Platform scancode for anything else.
    Code(u32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    KeyDown(Key),
    KeyUp(Key),
    MouseDown(MouseButton),
    MouseUp(MouseButton),
    /// Window-system request to end the experiment.
    Quit,
}

/// A typed input event stamped with the source clock.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Event {
    pub time: f64,
    pub kind: EventKind,
}

impl Event {
    pub fn key_down(time: f64, key: Key) -> Self {
        Event {
            time,
            kind: EventKind::KeyDown(key),
        }
    }

    /// The pressed character, if this is a key-down of a printable key.
    pub fn pressed_char(&self) -> Option<char> {
        match self.kind {
            EventKind::KeyDown(Key::Char(c)) => Some(c),
            _ => None,
        }
    }
}

/// Where events and the experiment clock come from. Window layers push
/// into a [`crate::io::ChannelEvents`]; tests script one by hand.
pub trait EventSource {
    /// Seconds on the source's monotonic clock.
    fn now(&self) -> f64;

    /// Next pending event, if any. Must not block.
    fn poll(&mut self) -> Option<Event>;

    /// Called when a pass over the queues made no progress. Real sources
    /// sleep briefly; scripted sources advance their clock.
    fn idle(&mut self) {
        std::thread::sleep(Duration::from_millis(1));
    }
}
