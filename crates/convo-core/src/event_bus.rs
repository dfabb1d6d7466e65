//! Event bus between the client core and its observers.
//!
//! The bus is single-threaded (WASM constraint) and uses interior mutability
//! via RefCell. Events are buffered until the UI drains them on re-render.
//! A streamed reply emits one event per fragment, so the buffer is bounded:
//! when nobody drains it, the oldest events are dropped.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use convo_types::event::ClientEvent;

const DEFAULT_CAPACITY: usize = 4096;

struct Queue {
    events: VecDeque<ClientEvent>,
    capacity: usize,
    dropped: usize,
}

/// Shared event bus, clone-cheap via Rc.
#[derive(Clone)]
pub struct EventBus {
    inner: Rc<RefCell<Queue>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Queue {
                events: VecDeque::new(),
                capacity: capacity.max(1),
                dropped: 0,
            })),
        }
    }

    /// Publish an event. Called by the client core only.
    pub fn emit(&self, event: ClientEvent) {
        let mut queue = self.inner.borrow_mut();
        if queue.events.len() == queue.capacity {
            queue.events.pop_front();
            queue.dropped += 1;
            if queue.dropped == 1 {
                log::warn!("Event bus full ({} events), dropping oldest", queue.capacity);
            }
        }
        queue.events.push_back(event);
    }

    /// Drain all pending events. Called by the UI layer.
    pub fn drain(&self) -> Vec<ClientEvent> {
        let mut queue = self.inner.borrow_mut();
        if queue.dropped > 0 {
            log::debug!("{} events were dropped before this drain", queue.dropped);
            queue.dropped = 0;
        }
        queue.events.drain(..).collect()
    }

    pub fn has_pending(&self) -> bool {
        !self.inner.borrow().events.is_empty()
    }

    /// Events lost to the capacity bound since the last drain.
    pub fn dropped(&self) -> usize {
        self.inner.borrow().dropped
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
