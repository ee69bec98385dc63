// SPDX-License-Identifier: CEPL-1.0
use std::collections::VecDeque;

/// What the host tells the loop about its window, in arrival order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Event {
    /// Logical (scale-independent) client size.
    WindowResized { width: u32, height: u32 },
    /// Drawable size in physical pixels; this is what the swap chain follows.
    FramebufferResized { width: u32, height: u32 },
    WindowMoved { x: i32, y: i32 },
    Focused(bool),
    CloseRequested,
}

/// FIFO of host events. Filled by the windowing callbacks, drained once per tick.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<Event>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.events.push_back(event);
    }

    pub fn pop(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = Event> + '_ {
        self.events.drain(..)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl Extend<Event> for EventQueue {
    fn extend<I: IntoIterator<Item = Event>>(&mut self, iter: I) {
        self.events.extend(iter);
    }
}
