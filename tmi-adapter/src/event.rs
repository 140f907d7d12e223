//! Event kinds and the subscriber registry the client dispatches through.

use std::fmt;
use std::sync::Arc;

use crate::message::Message;

/// Callback for every decoded line, protocol chatter included.
pub type LineCallback = Arc<dyn Fn(&str) + Send + Sync>;
/// Callback for lines recognised as chat messages.
pub type MessageCallback = Arc<dyn Fn(&Message) + Send + Sync>;

/// The events a client emits to its subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Line,
    Message,
}

/// Handle returned on registration, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// A callback tagged with the event kind it listens to.
#[derive(Clone)]
pub enum Listener {
    Line(LineCallback),
    Message(MessageCallback),
}

impl Listener {
    pub fn kind(&self) -> EventKind {
        match self {
            Listener::Line(_) => EventKind::Line,
            Listener::Message(_) => EventKind::Message,
        }
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Listener").field(&self.kind()).finish()
    }
}

/// Ordered subscriber lists, one per [`EventKind`].
///
/// Dispatch goes through the `*_snapshot` methods so callbacks can be
/// invoked after the owning lock is released. A callback that registers or
/// removes listeners (itself included) therefore never invalidates the
/// iteration in progress; the change applies from the next event on.
#[derive(Default)]
pub(crate) struct Subscribers {
    next_id: u64,
    line: Vec<(ListenerId, LineCallback)>,
    message: Vec<(ListenerId, MessageCallback)>,
}

impl Subscribers {
    pub(crate) fn add(&mut self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        match listener {
            Listener::Line(cb) => self.line.push((id, cb)),
            Listener::Message(cb) => self.message.push((id, cb)),
        }
        id
    }

    /// Returns whether anything was removed.
    pub(crate) fn remove(&mut self, kind: EventKind, id: ListenerId) -> bool {
        match kind {
            EventKind::Line => remove_id(&mut self.line, id),
            EventKind::Message => remove_id(&mut self.message, id),
        }
    }

    pub(crate) fn len(&self, kind: EventKind) -> usize {
        match kind {
            EventKind::Line => self.line.len(),
            EventKind::Message => self.message.len(),
        }
    }

    pub(crate) fn line_snapshot(&self) -> Vec<LineCallback> {
        self.line.iter().map(|(_, cb)| cb.clone()).collect()
    }

    pub(crate) fn message_snapshot(&self) -> Vec<MessageCallback> {
        self.message.iter().map(|(_, cb)| cb.clone()).collect()
    }
}

fn remove_id<T>(list: &mut Vec<(ListenerId, T)>, id: ListenerId) -> bool {
    match list.iter().position(|(existing, _)| *existing == id) {
        Some(index) => {
            list.remove(index);
            true
        }
        None => false,
    }
}
