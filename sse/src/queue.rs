//! Bounded FIFO with drop-oldest overflow.
//!
//! Producers never wait: when the queue is full the oldest unsent event is
//! discarded to make room. There is exactly one consumer per queue (the
//! stream's writer task), so a single `Notify` permit is enough to hand over
//! wake-ups without losing any.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

use crate::event::Event;

/// Result of a [`EventQueue::push`].
#[derive(Debug, PartialEq, Eq)]
pub enum Push {
    Queued,
    /// Queued after evicting the oldest event, which is returned.
    DroppedOldest(Event),
    /// The queue was closed; the event was discarded.
    Closed,
}

struct State {
    events: VecDeque<Event>,
    closed: bool,
}

pub struct EventQueue {
    state: Mutex<State>,
    available: Notify,
    capacity: usize,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(State {
                events: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            available: Notify::new(),
            capacity,
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push(&self, event: Event) -> Push {
        let outcome = {
            let mut state = self.state();
            if state.closed {
                return Push::Closed;
            }

            let dropped = if state.events.len() >= self.capacity {
                state.events.pop_front()
            } else {
                None
            };
            state.events.push_back(event);

            match dropped {
                Some(old) => Push::DroppedOldest(old),
                None => Push::Queued,
            }
        };

        self.available.notify_one();
        outcome
    }

    /// Waits for the next event. Returns `None` once the queue is closed.
    pub async fn pop(&self) -> Option<Event> {
        loop {
            {
                let mut state = self.state();
                if state.closed {
                    return None;
                }
                if let Some(event) = state.events.pop_front() {
                    return Some(event);
                }
            }
            self.available.notified().await;
        }
    }

    pub fn try_pop(&self) -> Option<Event> {
        let mut state = self.state();
        if state.closed {
            return None;
        }
        state.events.pop_front()
    }

    /// Closes the queue, discarding whatever is still buffered.
    /// Returns the number of events discarded.
    pub fn close(&self) -> usize {
        let discarded = {
            let mut state = self.state();
            state.closed = true;
            let discarded = state.events.len();
            state.events.clear();
            discarded
        };

        self.available.notify_one();
        discarded
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    pub fn len(&self) -> usize {
        self.state().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().events.is_empty()
    }
}
