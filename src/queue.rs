//! Inbound message queue.
//!
//! Decouples raw frame arrival from protocol dispatch: the reader task pushes
//! text frames as they arrive, and a single drain task pops them one at a time,
//! yielding to the scheduler between messages. Strict FIFO order is the
//! per-connection ordering guarantee.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;

/// FIFO buffer between the transport reader and the dispatch loop.
///
/// Single consumer: exactly one task may call [`MessageQueue::pop`].
pub(crate) struct MessageQueue {
    items: Mutex<VecDeque<String>>,
    closed: AtomicBool,
    notify: Notify,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            closed: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Append a raw message. Returns false if the queue was already closed.
    pub fn push(&self, message: String) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        self.items
            .lock()
            .expect("message queue poisoned")
            .push_back(message);
        self.notify.notify_one();
        true
    }

    /// Pop the next message in arrival order, waiting if the queue is empty.
    /// Returns `None` once the queue is closed and drained.
    pub async fn pop(&self) -> Option<String> {
        loop {
            let notified = self.notify.notified();
            {
                let mut items = self.items.lock().expect("message queue poisoned");
                if let Some(message) = items.pop_front() {
                    return Some(message);
                }
                if self.closed.load(Ordering::Acquire) {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Stop accepting messages and wake the consumer.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }
}
