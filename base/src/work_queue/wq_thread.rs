// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! A work queue bundled with its worker thread: [`WorkQueueThread`].

use super::DeferredWorkQueue;
use crate::sync::{SpawnError, WorkerThread};
use std::sync::Arc;

/// [`DeferredWorkQueue`] plus the one thread that drives it.
///
/// Spawning and joining the worker by hand is boilerplate every consumer of a work
/// queue repeats, so this type owns both: construction spawns a named thread running
/// [`DeferredWorkQueue::work`], drop requests termination and joins (completing the
/// in-flight package, abandoning the rest).
///
/// Clone the [`queue()`](Self::queue) handle freely; the queue outlives the worker
/// only in the sense that enqueued-but-never-run packages are dropped with it.
#[derive(Debug)]
pub struct WorkQueueThread {
    queue: Arc<DeferredWorkQueue>,
    /// `Some` until drop.
    worker: Option<WorkerThread>,
}

impl WorkQueueThread {
    /// Spawns the worker thread under the given name.
    ///
    /// # Errors
    ///
    /// [`SpawnError::OutOfResources`] if the OS refuses the thread.
    pub fn new(thread_name: &str) -> Result<Self, SpawnError> {
        let queue = Arc::new(DeferredWorkQueue::new());
        let queue_for_thread = Arc::clone(&queue);
        let worker = WorkerThread::spawn(thread_name, None, move |_cancel| {
            queue_for_thread.work();
        })?;
        Ok(Self {
            queue,
            worker: Some(worker),
        })
    }

    /// Handle to the driven queue.
    #[must_use]
    pub fn queue(&self) -> &Arc<DeferredWorkQueue> { &self.queue }
}

impl Drop for WorkQueueThread {
    fn drop(&mut self) {
        self.queue.request_termination();
        if let Some(worker) = self.worker.take() {
            worker.join();
        }
    }
}
