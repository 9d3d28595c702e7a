//! Thread-safe FIFO of pending events.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use crate::bus::relock;

struct Inner<E, A> {
    items: VecDeque<(E, A)>,
    closed: bool,
}

/// Unbounded queue shared by `send` callers and the draining dispatcher.
///
/// The passive dispatcher only ever uses [`EventQueue::try_pop`]; the
/// condition variable exists for the active worker, which blocks in
/// [`EventQueue::wait_pop`] until an item arrives or the queue closes.
pub(crate) struct EventQueue<E, A> {
    inner: Mutex<Inner<E, A>>,
    ready: Condvar,
}

impl<E, A> EventQueue<E, A> {
    pub(crate) fn new() -> Self {
        EventQueue {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                closed: false,
            }),
            ready: Condvar::new(),
        }
    }

    pub(crate) fn push(&self, event: E, args: A) {
        let mut inner = relock(&self.inner);
        inner.items.push_back((event, args));
        self.ready.notify_one();
    }

    pub(crate) fn try_pop(&self) -> Option<(E, A)> {
        relock(&self.inner).items.pop_front()
    }

    /// Block until an item is available or the queue is closed and empty.
    ///
    /// Items enqueued before the close are still returned, so a closing
    /// worker drains the backlog before seeing `None`.
    pub(crate) fn wait_pop(&self) -> Option<(E, A)> {
        let mut inner = relock(&self.inner);
        loop {
            if let Some(item) = inner.items.pop_front() {
                return Some(item);
            }
            if inner.closed {
                return None;
            }
            inner = self
                .ready
                .wait(inner)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }

    pub(crate) fn close(&self) {
        relock(&self.inner).closed = true;
        self.ready.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn pops_in_fifo_order() {
        let queue: EventQueue<&str, u32> = EventQueue::new();
        queue.push("a", 1);
        queue.push("b", 2);

        assert_eq!(queue.try_pop(), Some(("a", 1)));
        assert_eq!(queue.try_pop(), Some(("b", 2)));
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn wait_pop_drains_backlog_after_close() {
        let queue: EventQueue<&str, ()> = EventQueue::new();
        queue.push("pending", ());
        queue.close();

        assert_eq!(queue.wait_pop(), Some(("pending", ())));
        assert_eq!(queue.wait_pop(), None);
    }

    #[test]
    fn wait_pop_wakes_on_push_from_another_thread() {
        let queue: Arc<EventQueue<&str, ()>> = Arc::new(EventQueue::new());

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.wait_pop())
        };

        queue.push("wake", ());
        assert_eq!(consumer.join().unwrap(), Some(("wake", ())));
    }

    #[test]
    fn wait_pop_wakes_on_close() {
        let queue: Arc<EventQueue<&str, ()>> = Arc::new(EventQueue::new());

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.wait_pop())
        };

        queue.close();
        assert_eq!(consumer.join().unwrap(), None);
    }
}
