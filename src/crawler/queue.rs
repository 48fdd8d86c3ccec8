//! Completion-aware handoff between scanning lanes and the download executor

use crate::state::ContentItem;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;

/// Unbounded FIFO with many producers and one consumer
///
/// Producers `push` until `mark_producers_done` is called. The consumer's
/// `take` waits for items and returns `None` only once the queue is closed
/// and drained. Items from one producer come out in the order it pushed them.
#[derive(Debug, Default)]
pub struct SharedQueue {
    items: Mutex<VecDeque<ContentItem>>,
    closed: AtomicBool,
    notify: Notify,
}

impl SharedQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an item
    ///
    /// Returns `false` (and drops the item) if producers were already marked done.
    pub fn push(&self, item: ContentItem) -> bool {
        if self.closed.load(Ordering::Acquire) {
            tracing::debug!("Dropping {} item pushed after close", item.post_type());
            return false;
        }

        self.lock().push_back(item);
        self.notify.notify_one();
        true
    }

    /// Takes the next item, waiting while the queue is open and empty
    ///
    /// # Returns
    ///
    /// * `Some(ContentItem)` - The oldest queued item
    /// * `None` - Producers are done and every item has been taken
    pub async fn take(&self) -> Option<ContentItem> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(item) = self.lock().pop_front() {
                return Some(item);
            }

            if self.closed.load(Ordering::Acquire) {
                // A push may have landed between the pop above and the close
                return self.lock().pop_front();
            }

            notified.await;
        }
    }

    /// Signals that no more items will be pushed; safe to call repeatedly
    pub fn mark_producers_done(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!("Queue closed with {} items pending", self.len());
        }
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<ContentItem>> {
        // A poisoned queue still holds valid items
        self.items.lock().unwrap_or_else(|e| e.into_inner())
    }
}
