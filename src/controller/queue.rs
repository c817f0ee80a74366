//! Keyed work queue feeding the reconcile workers
//!
//! Guarantees:
//! - a key waiting in the queue is stored once, so bursts of events for the
//!   same Project coalesce into one pass;
//! - a key is handed to at most one worker at a time; if it is added again
//!   while being processed it is marked dirty and re-queued on [`WorkQueue::done`];
//! - [`WorkQueue::requeue_after`] re-adds a key once its delay has elapsed.

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tracing::debug;

/// Delivery contract between the watch side and the reconcile workers
#[async_trait]
pub trait WorkQueue<K>: Send + Sync {
    /// Make `key` eligible for processing
    async fn add(&self, key: K);

    /// Wait for the next key; `None` once the queue is shut down
    async fn dequeue(&self) -> Option<K>;

    /// Re-add `key` after `delay`
    async fn requeue_after(&self, key: K, delay: Duration);

    /// Mark the processing of `key` as finished
    async fn done(&self, key: &K);

    /// Stop handing out keys and wake all waiting workers
    async fn shut_down(&self);

    /// Number of keys waiting to be processed
    async fn len(&self) -> usize;
}

#[derive(Debug)]
struct QueueState<K> {
    pending: VecDeque<K>,
    queued: HashSet<K>,
    processing: HashSet<K>,
    dirty: HashSet<K>,
    shutting_down: bool,
}

impl<K> Default for QueueState<K> {
    fn default() -> Self {
        Self {
            pending: VecDeque::new(),
            queued: HashSet::new(),
            processing: HashSet::new(),
            dirty: HashSet::new(),
            shutting_down: false,
        }
    }
}

struct Inner<K> {
    state: Mutex<QueueState<K>>,
    notify: Notify,
}

/// In-process [`WorkQueue`] with per-key serialization and delayed requeue
pub struct ReconcileQueue<K> {
    inner: Arc<Inner<K>>,
}

impl<K> Clone for ReconcileQueue<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K> Default for ReconcileQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> ReconcileQueue<K> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState::default()),
                notify: Notify::new(),
            }),
        }
    }
}

#[async_trait]
impl<K> WorkQueue<K> for ReconcileQueue<K>
where
    K: Clone + Eq + Hash + Send + Sync + std::fmt::Display + 'static,
{
    async fn add(&self, key: K) {
        let mut state = self.inner.state.lock().await;
        if state.shutting_down {
            return;
        }
        if state.processing.contains(&key) {
            debug!("{} is being processed, deferring", key);
            state.dirty.insert(key);
            return;
        }
        if state.queued.insert(key.clone()) {
            state.pending.push_back(key);
            drop(state);
            self.inner.notify.notify_one();
        }
    }

    async fn dequeue(&self) -> Option<K> {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.inner.state.lock().await;
                if state.shutting_down {
                    return None;
                }
                if let Some(key) = state.pending.pop_front() {
                    state.queued.remove(&key);
                    state.processing.insert(key.clone());
                    return Some(key);
                }
            }

            notified.await;
        }
    }

    async fn requeue_after(&self, key: K, delay: Duration) {
        if delay.is_zero() {
            self.add(key).await;
            return;
        }

        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(key).await;
        });
    }

    async fn done(&self, key: &K) {
        let mut state = self.inner.state.lock().await;
        state.processing.remove(key);
        if state.dirty.remove(key) && !state.shutting_down && state.queued.insert(key.clone()) {
            state.pending.push_back(key.clone());
            drop(state);
            self.inner.notify.notify_one();
        }
    }

    async fn shut_down(&self) {
        let mut state = self.inner.state.lock().await;
        state.shutting_down = true;
        drop(state);
        self.inner.notify.notify_waiters();
    }

    async fn len(&self) -> usize {
        self.inner.state.lock().await.pending.len()
    }
}
