//! Observer registration lists
//!
//! Subscribers are notified synchronously, in registration order, within
//! the tick that produced the event.

use std::fmt;

/// Handle returned by [`Observers::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

type Callback<E> = Box<dyn FnMut(&E) + Send>;

/// An ordered list of event subscribers
pub struct Observers<E> {
    subscribers: Vec<(SubscriberId, Callback<E>)>,
    next_id: u64,
}

impl<E> Observers<E> {
    /// Create an empty list
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
            next_id: 0,
        }
    }

    /// Register a subscriber
    pub fn subscribe(&mut self, callback: impl FnMut(&E) + Send + 'static) -> SubscriberId {
        let id = SubscriberId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Remove a subscriber; returns false if it was not registered
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    /// Deliver an event to every subscriber
    pub fn notify(&mut self, event: &E) {
        for (_, callback) in self.subscribers.iter_mut() {
            callback(event);
        }
    }

    /// Number of subscribers
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Check if nobody is subscribed
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl<E> Default for Observers<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Observers<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
