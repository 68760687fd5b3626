//! Work queue with per-item acknowledgment and drain detection
//!
//! A FIFO queue shared by one producer and many workers. Dequeuing hands out
//! a [`WorkTicket`]; acknowledging an item is only possible through that
//! ticket, so an item can never be acknowledged without having been dequeued.
//!
//! The queue is drained once it is closed (no more input) and every item ever
//! enqueued has been acknowledged. [`WorkQueue::join`] waits for that state.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// Counters describing the queue at one point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub enqueued: usize,
    pub dequeued: usize,
    /// Items acknowledged by workers or discarded on abandonment
    pub acknowledged: usize,
    /// Items removed without being processed
    pub discarded: usize,
    /// Items waiting to be dequeued
    pub pending: usize,
    pub closed: bool,
}

impl QueueSnapshot {
    /// Items dequeued but not yet acknowledged
    pub fn in_flight(&self) -> usize {
        self.dequeued + self.discarded - self.acknowledged
    }

    /// Whether every item has been accounted for and no more will arrive
    pub fn is_drained(&self) -> bool {
        self.closed && self.acknowledged == self.enqueued
    }
}

/// Rejected push: the queue no longer accepts items
#[derive(Debug, PartialEq, Eq)]
pub struct Closed<T>(pub T);

#[derive(Debug)]
struct QueueState<T> {
    items: VecDeque<T>,
    enqueued: usize,
    dequeued: usize,
    acknowledged: usize,
    discarded: usize,
    closed: bool,
}

impl<T> QueueState<T> {
    fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            enqueued: self.enqueued,
            dequeued: self.dequeued,
            acknowledged: self.acknowledged,
            discarded: self.discarded,
            pending: self.items.len(),
            closed: self.closed,
        }
    }
}

/// Multi-producer, multi-consumer FIFO queue with join semantics
#[derive(Debug)]
pub struct WorkQueue<T> {
    state: Mutex<QueueState<T>>,
    changed: Notify,
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                enqueued: 0,
                dequeued: 0,
                acknowledged: 0,
                discarded: 0,
                closed: false,
            }),
            changed: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        // Counters stay consistent across a panic: every update is a single statement
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends an item, or hands it back if the queue is closed
    pub fn push(&self, item: T) -> Result<(), Closed<T>> {
        {
            let mut state = self.lock();
            if state.closed {
                return Err(Closed(item));
            }
            state.items.push_back(item);
            state.enqueued += 1;
        }
        self.changed.notify_waiters();
        Ok(())
    }

    /// Signals that no more items will be pushed
    pub fn close(&self) {
        self.lock().closed = true;
        self.changed.notify_waiters();
    }

    /// Takes the next item, waiting while the queue is open and empty
    ///
    /// Returns `None` once the queue is closed and empty.
    pub async fn pop(&self) -> Option<WorkTicket<'_, T>> {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if let Some(item) = state.items.pop_front() {
                    state.dequeued += 1;
                    return Some(WorkTicket {
                        queue: self,
                        item,
                        acknowledged: false,
                    });
                }
                if state.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Takes the next item without waiting
    pub fn try_pop(&self) -> Option<WorkTicket<'_, T>> {
        let mut state = self.lock();
        let item = state.items.pop_front()?;
        state.dequeued += 1;
        Some(WorkTicket {
            queue: self,
            item,
            acknowledged: false,
        })
    }

    /// Closes the queue and discards every item still waiting
    ///
    /// Discarded items count as acknowledged so that `join` can complete once
    /// the in-flight items are done. Returns how many items were discarded.
    pub fn abandon_pending(&self) -> usize {
        let discarded = {
            let mut state = self.lock();
            let discarded = state.items.len();
            state.items.clear();
            state.discarded += discarded;
            state.acknowledged += discarded;
            state.closed = true;
            discarded
        };
        self.changed.notify_waiters();
        discarded
    }

    /// Waits until the queue is closed and every item has been acknowledged
    pub async fn join(&self) {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.snapshot().is_drained() {
                return;
            }

            notified.await;
        }
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        self.lock().snapshot()
    }

    fn acknowledge(&self) {
        self.lock().acknowledged += 1;
        self.changed.notify_waiters();
    }
}

/// Proof that an item was dequeued; acknowledging consumes it
///
/// A ticket dropped without [`WorkTicket::done`] (for instance while a worker
/// unwinds) still acknowledges its item so that `join` cannot hang.
#[derive(Debug)]
pub struct WorkTicket<'a, T> {
    queue: &'a WorkQueue<T>,
    item: T,
    acknowledged: bool,
}

impl<T> WorkTicket<'_, T> {
    pub fn item(&self) -> &T {
        &self.item
    }

    /// Marks the item as fully processed
    pub fn done(mut self) {
        self.acknowledged = true;
        self.queue.acknowledge();
    }
}

impl<T> Drop for WorkTicket<'_, T> {
    fn drop(&mut self) {
        if !self.acknowledged {
            tracing::warn!("Work item dropped without acknowledgment");
            self.queue.acknowledge();
        }
    }
}
