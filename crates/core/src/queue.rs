//! In-memory task queue between the watcher and the worker
//!
//! Unbounded FIFO with queue-style accounting: every `put` increments the
//! unfinished counter and every `task_done` decrements it, so [`TaskQueue::join`]
//! can wait for the backlog *and* the in-flight task to finish. Nothing here
//! survives a restart.

use crate::error::{Error, Result};
use crate::records::FileTask;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tracing::{trace, warn};

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<FileTask>,
    closed: bool,
}

#[derive(Debug, Default)]
struct Inner {
    state: Mutex<QueueState>,
    /// Signalled on put and on close
    available: Notify,
    /// Tasks put but not yet marked done
    unfinished: AtomicUsize,
    /// Signalled when `unfinished` drops to zero
    drained: Notify,
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cloneable handle to the shared task queue
#[derive(Debug, Clone, Default)]
pub struct TaskQueue {
    inner: Arc<Inner>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task. Never blocks; fails only once the queue is closed.
    pub fn put(&self, task: FileTask) -> Result<()> {
        {
            let mut state = self.inner.lock_state();
            if state.closed {
                return Err(Error::queue(format!(
                    "Queue is closed, dropping {}",
                    task.path().display()
                )));
            }
            trace!(path = %task.path().display(), "Queue put");
            state.items.push_back(task);
            self.inner.unfinished.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.available.notify_one();
        Ok(())
    }

    /// Wait for the next task
    ///
    /// Returns `None` once the queue has been closed and every remaining task
    /// has been handed out. Dropping the future before it completes never loses
    /// a task: items are only removed inside a single synchronous poll.
    pub async fn get(&self) -> Option<FileTask> {
        loop {
            let notified = self.inner.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.inner.lock_state();
                if let Some(task) = state.items.pop_front() {
                    return Some(task);
                }
                if state.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Take the next task without waiting
    pub fn try_get(&self) -> Option<FileTask> {
        self.inner.lock_state().items.pop_front()
    }

    /// Number of tasks waiting to be picked up
    ///
    /// Point-in-time approximation; does not include the task being processed.
    pub fn size(&self) -> usize {
        self.inner.lock_state().items.len()
    }

    /// Number of tasks that were put but not yet marked done
    pub fn unfinished(&self) -> usize {
        self.inner.unfinished.load(Ordering::SeqCst)
    }

    /// Mark a previously dequeued task as finished
    pub fn task_done(&self) -> Result<()> {
        let previous = self
            .inner
            .unfinished
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));

        match previous {
            Ok(1) => {
                self.inner.drained.notify_waiters();
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(_) => {
                warn!("task_done called more times than tasks were put");
                Err(Error::queue("task_done() called too many times"))
            }
        }
    }

    /// Wait until every task put so far has been marked done
    pub async fn join(&self) {
        loop {
            let drained = self.inner.drained.notified();
            tokio::pin!(drained);
            drained.as_mut().enable();

            if self.unfinished() == 0 {
                return;
            }

            drained.await;
        }
    }

    /// Stop accepting tasks; waiting consumers drain what is left, then see `None`
    pub fn close(&self) {
        self.inner.lock_state().closed = true;
        self.inner.available.notify_waiters();
        self.inner.available.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock_state().closed
    }
}
