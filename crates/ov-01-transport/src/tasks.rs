//! # Tracked Background Tasks
//!
//! Per-node arena of detached tasks (downloads, refetches, deliveries).
//! The triggering handler never waits on them; [`TaskSet::shutdown`] joins
//! every one of them before the node releases its connections.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Arena of tasks owned by one node.
#[derive(Debug, Default)]
pub struct TaskSet {
    tasks: Mutex<JoinSet<()>>,
    closed: AtomicBool,
}

impl TaskSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a tracked task onto the current runtime.
    ///
    /// Returns `false` once the set has been shut down; the future is dropped.
    pub fn spawn<F>(&self, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock();
        // `closed` only flips under this lock, so an accepted task is joined.
        if self.closed.load(Ordering::Acquire) {
            debug!("Task rejected: set is shut down");
            return false;
        }
        // Reap finished tasks so the arena does not grow without bound.
        while let Some(result) = tasks.try_join_next() {
            log_join_result(result);
        }
        tasks.spawn(task);
        true
    }

    /// Number of tasks not yet reaped.
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Join every task currently tracked, including tasks they spawn, while
    /// still accepting new work.
    pub async fn join_all(&self) {
        loop {
            let mut batch = std::mem::take(&mut *self.tasks.lock());
            if batch.is_empty() {
                return;
            }
            while let Some(result) = batch.join_next().await {
                log_join_result(result);
            }
        }
    }

    /// Join every task, including tasks spawned by tasks being joined, then
    /// refuse further spawns.
    pub async fn shutdown(&self) {
        loop {
            let mut batch = {
                let mut tasks = self.tasks.lock();
                if tasks.is_empty() {
                    self.closed.store(true, Ordering::Release);
                    return;
                }
                std::mem::take(&mut *tasks)
            };
            while let Some(result) = batch.join_next().await {
                log_join_result(result);
            }
        }
    }
}

fn log_join_result(result: Result<(), tokio::task::JoinError>) {
    if let Err(err) = result {
        if err.is_panic() {
            warn!(error = %err, "Background task panicked");
        }
    }
}
