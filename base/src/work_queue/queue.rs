// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The queue itself: [`DeferredWorkQueue`].

use super::{DeferredWorkPackage, OwnerId, QueueError, StaticCore, StaticDeferredWorkPackage,
            StaticState, StaticWorkPackage, WorkPackage};
use crate::sync::{Semaphore, abort_on_panic};
use std::{collections::VecDeque,
          sync::{Arc, Condvar, Mutex, MutexGuard},
          thread::{self, ThreadId},
          time::Instant};

/// One enqueued unit of work, erased over the four package flavors.
enum QueueItem {
    Dynamic(WorkPackage),
    Static(Arc<StaticWorkPackage>),
    StaticDeferred(Arc<StaticDeferredWorkPackage>),
}

impl QueueItem {
    fn owner(&self) -> Option<OwnerId> {
        match self {
            Self::Dynamic(pkg) => pkg.owner,
            Self::Static(pkg) => pkg.core.owner,
            Self::StaticDeferred(pkg) => pkg.core.owner,
        }
    }

    fn owner_sub_id(&self) -> Option<u32> {
        match self {
            Self::Dynamic(pkg) => pkg.owner_sub_id,
            Self::Static(pkg) => pkg.core.owner_sub_id,
            Self::StaticDeferred(pkg) => pkg.core.owner_sub_id,
        }
    }

    fn core(&self) -> Option<&StaticCore> {
        match self {
            Self::Dynamic(_) => None,
            Self::Static(pkg) => Some(&pkg.core),
            Self::StaticDeferred(pkg) => Some(&pkg.core),
        }
    }

    /// Identity of a static package: the address of its state core. Stable for the
    /// lifetime of the `Arc` allocation; `None` for dynamic packages.
    fn core_addr(&self) -> Option<usize> {
        self.core().map(|core| std::ptr::from_ref(core) as usize)
    }
}

fn addr_of_core(core: &StaticCore) -> usize { std::ptr::from_ref(core) as usize }

/// Mutex-protected state of a [`DeferredWorkQueue`].
struct QueueInner {
    /// FIFO of prompt packages.
    normal: VecDeque<QueueItem>,
    /// Deferred packages, sorted by non-decreasing deadline, FIFO among equals.
    deferred: VecDeque<(Instant, QueueItem)>,
    /// Worker shall return after the in-flight package.
    terminate: bool,
    /// Owner key of the currently executing package. `None` = idle or anonymous.
    owner_of_current: Option<OwnerId>,
    /// Sub-id of the currently executing package.
    sub_id_of_current: Option<u32>,
    /// Identity of the currently executing *static* package, to let it re-enqueue
    /// itself and to let removal wait for it.
    current_core_addr: Option<usize>,
    /// Thread currently inside [`DeferredWorkQueue::work`]. Lets blocking
    /// operations detect they run on the worker itself (where blocking would
    /// self-deadlock) and degrade to a no-op instead.
    worker_thread: Option<ThreadId>,
}

/// Single-consumer FIFO of prompt and time-deferred work packages.
///
/// The queue is passive: some thread must drive it by calling [`work()`], which
/// loops until [`request_termination()`] - usually via [`WorkQueueThread`]. All
/// public operations are safe from any thread, *including from within a running
/// package's functor* (except [`flush_non_deferred()`], which would wait on
/// itself and therefore panics on the worker thread).
///
/// Scheduling order per iteration: a deferred package whose deadline has been
/// reached beats the normal FIFO; otherwise the normal head runs; otherwise the
/// worker sleeps until the earliest deferred deadline (or an insert).
///
/// Functors run with the queue mutex released and the *flush mutex* held - that
/// mutex is the synchronization point [`flush_non_deferred()`] relies on.
///
/// [`flush_non_deferred()`]: Self::flush_non_deferred
/// [`request_termination()`]: Self::request_termination
/// [`WorkQueueThread`]: super::WorkQueueThread
/// [`work()`]: Self::work
pub struct DeferredWorkQueue {
    inner: Mutex<QueueInner>,
    /// Signaled on insert and on termination request.
    queue_cv: Condvar,
    /// Signaled whenever the currently-executing package changes.
    owner_changed_cv: Condvar,
    /// Held while a functor executes.
    flush_mutex: Mutex<()>,
}

impl Default for DeferredWorkQueue {
    fn default() -> Self { Self::new() }
}

impl std::fmt::Debug for DeferredWorkQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredWorkQueue").finish_non_exhaustive()
    }
}

impl DeferredWorkQueue {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                normal: VecDeque::new(),
                deferred: VecDeque::new(),
                terminate: false,
                owner_of_current: None,
                sub_id_of_current: None,
                current_core_addr: None,
                worker_thread: None,
            }),
            queue_cv: Condvar::new(),
            owner_changed_cv: Condvar::new(),
            flush_mutex: Mutex::new(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().expect("DeferredWorkQueue mutex poisoned")
    }

    // ---------------------------------------------------------------- enqueueing

    /// Appends a queue-owned package to the normal FIFO.
    ///
    /// # Errors
    ///
    /// [`QueueError::OutOfHostMemory`] if the queue cannot grow.
    pub fn add(&self, package: WorkPackage) -> Result<(), QueueError> {
        let mut inner = self.lock();
        inner
            .normal
            .try_reserve(1)
            .map_err(|_| QueueError::OutOfHostMemory)?;
        inner.normal.push_back(QueueItem::Dynamic(package));
        self.queue_cv.notify_all();
        Ok(())
    }

    /// Prepends a queue-owned package to the normal FIFO - urgency without a
    /// priority field. It will run before every other normal package, but not
    /// before a deferred package whose deadline has been reached.
    ///
    /// # Errors
    ///
    /// [`QueueError::OutOfHostMemory`] if the queue cannot grow.
    pub fn insert_at_head(&self, package: WorkPackage) -> Result<(), QueueError> {
        let mut inner = self.lock();
        inner
            .normal
            .try_reserve(1)
            .map_err(|_| QueueError::OutOfHostMemory)?;
        inner.normal.push_front(QueueItem::Dynamic(package));
        self.queue_cv.notify_all();
        Ok(())
    }

    /// Appends a caller-owned package to the normal FIFO.
    ///
    /// # Errors
    ///
    /// [`QueueError::AlreadyEnqueued`] if the package already sits in a queue;
    /// [`QueueError::OutOfHostMemory`] if the queue cannot grow.
    pub fn add_static(&self, package: &Arc<StaticWorkPackage>) -> Result<(), QueueError> {
        let mut inner = self.lock();
        inner
            .normal
            .try_reserve(1)
            .map_err(|_| QueueError::OutOfHostMemory)?;
        Self::mark_enqueued(&inner, &package.core)?;
        inner.normal.push_back(QueueItem::Static(Arc::clone(package)));
        self.queue_cv.notify_all();
        Ok(())
    }

    /// Prepends a caller-owned package to the normal FIFO.
    ///
    /// # Errors
    ///
    /// Same as [`add_static()`](Self::add_static).
    pub fn insert_at_head_static(
        &self,
        package: &Arc<StaticWorkPackage>,
    ) -> Result<(), QueueError> {
        let mut inner = self.lock();
        inner
            .normal
            .try_reserve(1)
            .map_err(|_| QueueError::OutOfHostMemory)?;
        Self::mark_enqueued(&inner, &package.core)?;
        inner
            .normal
            .push_front(QueueItem::Static(Arc::clone(package)));
        self.queue_cv.notify_all();
        Ok(())
    }

    /// Inserts a queue-owned deferred package, sorted by deadline (FIFO among equal
    /// deadlines).
    ///
    /// # Errors
    ///
    /// [`QueueError::OutOfHostMemory`] if the queue cannot grow.
    pub fn add_deferred(&self, package: DeferredWorkPackage) -> Result<(), QueueError> {
        let mut inner = self.lock();
        inner
            .deferred
            .try_reserve(1)
            .map_err(|_| QueueError::OutOfHostMemory)?;
        let due = package.execute_at;
        let index = inner.deferred.partition_point(|(d, _)| *d <= due);
        inner
            .deferred
            .insert(index, (due, QueueItem::Dynamic(package.package)));
        self.queue_cv.notify_all();
        Ok(())
    }

    /// Inserts a caller-owned deferred package, sorted by its current deadline.
    ///
    /// While enqueued, the package's deadline is frozen (see
    /// [`StaticDeferredWorkPackage::set_execute_at`]).
    ///
    /// # Errors
    ///
    /// Same as [`add_static()`](Self::add_static).
    pub fn add_static_deferred(
        &self,
        package: &Arc<StaticDeferredWorkPackage>,
    ) -> Result<(), QueueError> {
        let mut inner = self.lock();
        inner
            .deferred
            .try_reserve(1)
            .map_err(|_| QueueError::OutOfHostMemory)?;
        Self::mark_enqueued(&inner, &package.core)?;
        let due = package.execute_at();
        let index = inner.deferred.partition_point(|(d, _)| *d <= due);
        inner
            .deferred
            .insert(index, (due, QueueItem::StaticDeferred(Arc::clone(package))));
        self.queue_cv.notify_all();
        Ok(())
    }

    /// State transition for enqueueing a static package. Caller holds the queue
    /// mutex.
    fn mark_enqueued(inner: &QueueInner, core: &StaticCore) -> Result<(), QueueError> {
        match core.state() {
            StaticState::Detached => {
                core.set_state(StaticState::Enqueued);
                Ok(())
            }
            // A running static package may re-enqueue itself (and only itself -
            // identity is checked against the currently executing package).
            StaticState::Executing
                if inner.current_core_addr == Some(addr_of_core(core)) =>
            {
                core.set_state(StaticState::ExecutingReenqueued);
                Ok(())
            }
            _ => Err(QueueError::AlreadyEnqueued),
        }
    }

    // ------------------------------------------------------------------ removal

    /// Detaches a caller-owned package from the queue.
    ///
    /// If the package is currently executing, this blocks until that execution has
    /// finished (synchronous detach) - unless called from within the package's own
    /// functor, where it is a no-op by construction.
    pub fn remove_static(&self, package: &Arc<StaticWorkPackage>) {
        self.remove_by_core(&package.core);
    }

    /// Deferred-package variant of [`remove_static()`](Self::remove_static).
    pub fn remove_static_deferred(&self, package: &Arc<StaticDeferredWorkPackage>) {
        self.remove_by_core(&package.core);
    }

    fn remove_by_core(&self, core: &StaticCore) {
        let addr = addr_of_core(core);
        let mut inner = self.lock();

        let before = inner.normal.len() + inner.deferred.len();
        inner.normal.retain(|item| item.core_addr() != Some(addr));
        inner
            .deferred
            .retain(|(_, item)| item.core_addr() != Some(addr));
        let was_in_list = inner.normal.len() + inner.deferred.len() != before;

        if was_in_list {
            match core.state() {
                StaticState::Enqueued => core.set_state(StaticState::Detached),
                StaticState::ExecutingReenqueued => core.set_state(StaticState::Executing),
                _ => {}
            }
        }

        self.await_if_executing(inner, |inner| inner.current_core_addr == Some(addr));
    }

    /// Detaches every package belonging to `owner` from both lists. Queue-owned
    /// matches are destroyed. If a package of this owner is currently executing,
    /// blocks until it finished (no-op from the worker thread itself).
    pub fn remove_by_owner(&self, owner: OwnerId) {
        self.remove_matching(owner, None);
    }

    /// As [`remove_by_owner()`](Self::remove_by_owner), restricted to packages
    /// that also carry the given sub-id.
    pub fn remove_by_owner_and_id(&self, owner: OwnerId, owner_sub_id: u32) {
        self.remove_matching(owner, Some(owner_sub_id));
    }

    fn remove_matching(&self, owner: OwnerId, owner_sub_id: Option<u32>) {
        let matches = |item: &QueueItem| {
            item.owner() == Some(owner)
                && owner_sub_id.is_none_or(|sub| item.owner_sub_id() == Some(sub))
        };
        let detach = |item: &QueueItem| {
            if let Some(core) = item.core() {
                match core.state() {
                    StaticState::Enqueued => core.set_state(StaticState::Detached),
                    StaticState::ExecutingReenqueued => core.set_state(StaticState::Executing),
                    _ => {}
                }
            }
        };

        let mut inner = self.lock();
        inner.normal.retain(|item| {
            if matches(item) {
                detach(item);
                false
            } else {
                true
            }
        });
        inner.deferred.retain(|(_, item)| {
            if matches(item) {
                detach(item);
                false
            } else {
                true
            }
        });

        self.await_if_executing(inner, |inner| {
            inner.owner_of_current == Some(owner)
                && owner_sub_id.is_none_or(|sub| inner.sub_id_of_current == Some(sub))
        });
    }

    /// Blocks on the owner-changed monitor while `condition` holds - except on the
    /// worker thread, where blocking would self-deadlock and the contract is
    /// "no-op".
    fn await_if_executing(
        &self,
        mut inner: MutexGuard<'_, QueueInner>,
        condition: impl Fn(&QueueInner) -> bool,
    ) {
        if inner.worker_thread == Some(thread::current().id()) {
            return;
        }
        while condition(&inner) {
            inner = self
                .owner_changed_cv
                .wait(inner)
                .expect("DeferredWorkQueue mutex poisoned");
        }
    }

    /// If the currently executing package belongs to `owner`, blocks until it has
    /// finished. No-op from the worker thread itself.
    pub fn wait_until_current_executed(&self, owner: OwnerId) {
        let inner = self.lock();
        self.await_if_executing(inner, |inner| inner.owner_of_current == Some(owner));
    }

    /// Whether any enqueued (not currently executing) package belongs to `owner`.
    /// O(n) scan.
    #[must_use]
    pub fn is_any_in_queue(&self, owner: OwnerId) -> bool {
        let inner = self.lock();
        inner
            .normal
            .iter()
            .chain(inner.deferred.iter().map(|(_, item)| item))
            .any(|item| item.owner() == Some(owner))
    }

    // ------------------------------------------------------------------ flushing

    /// Blocks until every *normal* package enqueued before this call has executed.
    ///
    /// Implemented by enqueueing a sentinel that posts a semaphore. Deferred
    /// packages are out of scope, as are head-insertions that happen after the
    /// sentinel went in.
    ///
    /// # Errors
    ///
    /// [`QueueError::OutOfHostMemory`] if the sentinel cannot be enqueued.
    ///
    /// # Panics
    ///
    /// Panics when called from the worker thread - the sentinel could never run
    /// while its caller blocks the worker.
    pub fn flush_non_deferred(&self) -> Result<(), QueueError> {
        {
            let inner = self.lock();
            assert!(
                inner.worker_thread != Some(thread::current().id()),
                "flush_non_deferred called from the work queue's own worker thread"
            );
        }

        let semaphore = Arc::new(Semaphore::new(0));
        let sentinel = Arc::clone(&semaphore);
        self.add(WorkPackage::new(move || sentinel.post()))?;
        semaphore.wait();
        Ok(())
    }

    // ------------------------------------------------------------------- worker

    /// Requests the worker to return from [`work()`](Self::work) after the
    /// in-flight package (immediately if idle).
    pub fn request_termination(&self) {
        let mut inner = self.lock();
        inner.terminate = true;
        self.queue_cv.notify_all();
    }

    /// The worker loop. Runs packages until [`request_termination()`] is called.
    ///
    /// Exactly one thread may run this at a time; [`WorkQueueThread`] arranges
    /// that. Per iteration: pick the next package (deferred-and-due beats normal),
    /// record it as current, run its functor under the flush mutex, then detach or
    /// destroy it and signal the owner-changed monitor.
    ///
    /// [`request_termination()`]: Self::request_termination
    /// [`WorkQueueThread`]: super::WorkQueueThread
    pub fn work(&self) {
        {
            let mut inner = self.lock();
            debug_assert!(inner.worker_thread.is_none(), "work() is single-consumer");
            inner.worker_thread = Some(thread::current().id());
        }

        loop {
            let Some(item) = self.next_item() else {
                return;
            };

            match item {
                QueueItem::Dynamic(package) => {
                    {
                        let _flush = self.flush_mutex.lock().expect("flush mutex poisoned");
                        abort_on_panic("work package functor", package.task);
                    }
                    self.finish(None);
                }
                QueueItem::Static(package) => {
                    {
                        let _flush = self.flush_mutex.lock().expect("flush mutex poisoned");
                        abort_on_panic("work package functor", || (package.core.task)());
                    }
                    self.finish(Some(&package.core));
                }
                QueueItem::StaticDeferred(package) => {
                    {
                        let _flush = self.flush_mutex.lock().expect("flush mutex poisoned");
                        abort_on_panic("work package functor", || (package.core.task)());
                    }
                    self.finish(Some(&package.core));
                }
            }
        }
    }

    /// Waits for and claims the next runnable package; `None` on termination.
    fn next_item(&self) -> Option<QueueItem> {
        let mut inner = self.lock();

        let item = loop {
            if inner.terminate {
                inner.worker_thread = None;
                return None;
            }

            let now = Instant::now();

            // A deferred package whose deadline has been reached goes first.
            if let Some((due, _)) = inner.deferred.front() {
                if *due <= now {
                    let (_, item) = inner.deferred.pop_front().expect("front exists");
                    break item;
                }
            }

            if let Some(item) = inner.normal.pop_front() {
                break item;
            }

            // Nothing runnable: sleep until the earliest deadline or an insert.
            match inner.deferred.front().map(|(due, _)| *due) {
                Some(due) => {
                    let timeout = due.saturating_duration_since(now);
                    let (guard, _timed_out) = self
                        .queue_cv
                        .wait_timeout(inner, timeout)
                        .expect("DeferredWorkQueue mutex poisoned");
                    inner = guard;
                }
                None => {
                    inner = self
                        .queue_cv
                        .wait(inner)
                        .expect("DeferredWorkQueue mutex poisoned");
                }
            }
        };

        inner.owner_of_current = item.owner();
        inner.sub_id_of_current = item.owner_sub_id();
        inner.current_core_addr = item.core_addr();
        if let Some(core) = item.core() {
            core.set_state(StaticState::Executing);
        }
        Some(item)
    }

    /// Post-execution bookkeeping: detach the static package (unless its functor
    /// re-enqueued it), clear the current-package tracking, wake waiters.
    fn finish(&self, core: Option<&StaticCore>) {
        let mut inner = self.lock();
        if let Some(core) = core {
            match core.state() {
                StaticState::Executing => core.set_state(StaticState::Detached),
                StaticState::ExecutingReenqueued => core.set_state(StaticState::Enqueued),
                // Detached already - a concurrent remove got here first.
                StaticState::Detached | StaticState::Enqueued => {}
            }
        }
        inner.owner_of_current = None;
        inner.sub_id_of_current = None;
        inner.current_core_addr = None;
        drop(inner);
        self.owner_changed_cv.notify_all();
    }
}
