// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Work package types: [`WorkPackage`], [`DeferredWorkPackage`],
//! [`StaticWorkPackage`], [`StaticDeferredWorkPackage`].

use super::{OwnerId, QueueError};
use std::{fmt::{Debug, Formatter},
          sync::{Arc, Mutex,
                 atomic::{AtomicU8, Ordering}},
          time::{Duration, Instant}};

/// Queue-owned, one-shot work package. Executed as soon as possible.
///
/// The functor is required to be no-panic; a panic escaping it is fatal (see
/// [`abort_on_panic`](crate::sync::abort_on_panic)).
pub struct WorkPackage {
    pub(crate) owner: Option<OwnerId>,
    pub(crate) owner_sub_id: Option<u32>,
    pub(crate) task: Box<dyn FnOnce() + Send>,
}

impl WorkPackage {
    /// Creates an anonymous package (no owner - it cannot be removed by key).
    #[must_use]
    pub fn new(task: impl FnOnce() + Send + 'static) -> Self {
        Self {
            owner: None,
            owner_sub_id: None,
            task: Box::new(task),
        }
    }

    /// Creates a package removable via its owner key (and optional sub-id).
    #[must_use]
    pub fn with_owner(
        owner: OwnerId,
        owner_sub_id: Option<u32>,
        task: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            owner: Some(owner),
            owner_sub_id,
            task: Box::new(task),
        }
    }
}

impl Debug for WorkPackage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkPackage")
            .field("owner", &self.owner)
            .field("owner_sub_id", &self.owner_sub_id)
            .finish_non_exhaustive()
    }
}

/// Queue-owned, one-shot work package with an absolute monotonic deadline.
///
/// Executed at or after `execute_at`, never before.
pub struct DeferredWorkPackage {
    pub(crate) package: WorkPackage,
    pub(crate) execute_at: Instant,
}

impl DeferredWorkPackage {
    /// Creates an anonymous package due at `execute_at`.
    #[must_use]
    pub fn new(execute_at: Instant, task: impl FnOnce() + Send + 'static) -> Self {
        Self {
            package: WorkPackage::new(task),
            execute_at,
        }
    }

    /// Creates an anonymous package due `delay` from now.
    #[must_use]
    pub fn after(delay: Duration, task: impl FnOnce() + Send + 'static) -> Self {
        Self::new(Instant::now() + delay, task)
    }

    /// Creates an owned package due at `execute_at`.
    #[must_use]
    pub fn with_owner(
        owner: OwnerId,
        owner_sub_id: Option<u32>,
        execute_at: Instant,
        task: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            package: WorkPackage::with_owner(owner, owner_sub_id, task),
            execute_at,
        }
    }
}

impl Debug for DeferredWorkPackage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredWorkPackage")
            .field("owner", &self.package.owner)
            .field("execute_at", &self.execute_at)
            .finish_non_exhaustive()
    }
}

/// Lifecycle of a caller-owned (static) package.
///
/// Values are stored in an [`AtomicU8`]; all transitions happen under the queue
/// mutex, the atomic only makes cross-thread reads well-defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum StaticState {
    /// Not enqueued anywhere. The only state in which enqueueing is legal.
    Detached = 0,
    /// Sitting in exactly one queue.
    Enqueued = 1,
    /// Popped by the worker; its functor is running (or about to).
    Executing = 2,
    /// Running *and* already re-enqueued by its own functor.
    ExecutingReenqueued = 3,
}

impl StaticState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Detached,
            1 => Self::Enqueued,
            2 => Self::Executing,
            3 => Self::ExecutingReenqueued,
            _ => unreachable!("invalid static package state {value}"),
        }
    }
}

/// Shared state fields of the two static package flavors.
pub(crate) struct StaticCore {
    pub owner: Option<OwnerId>,
    pub owner_sub_id: Option<u32>,
    pub state: AtomicU8,
    pub task: Box<dyn Fn() + Send + Sync>,
}

impl StaticCore {
    fn new(
        owner: Option<OwnerId>,
        owner_sub_id: Option<u32>,
        task: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        Self {
            owner,
            owner_sub_id,
            state: AtomicU8::new(StaticState::Detached as u8),
            task: Box::new(task),
        }
    }

    pub fn state(&self) -> StaticState { StaticState::from_u8(self.state.load(Ordering::Acquire)) }

    pub fn set_state(&self, state: StaticState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

impl Debug for StaticCore {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCore")
            .field("owner", &self.owner)
            .field("owner_sub_id", &self.owner_sub_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Caller-owned, re-usable work package. Executed as soon as possible.
///
/// Lives in an [`Arc`]; the caller keeps one handle and passes references to
/// [`DeferredWorkQueue::add_static`]. After each execution the package detaches and
/// may be enqueued again - including from within its own functor while it is still
/// executing (the queue tracks the currently running package to permit exactly
/// that). Enqueueing it while it already sits in a queue is
/// [`QueueError::AlreadyEnqueued`].
///
/// The functor is `Fn`, not `FnOnce` - it may run many times; interior mutability is
/// the caller's choice.
///
/// [`DeferredWorkQueue::add_static`]: super::DeferredWorkQueue::add_static
#[derive(Debug)]
pub struct StaticWorkPackage {
    pub(crate) core: StaticCore,
}

impl StaticWorkPackage {
    /// Creates an anonymous re-usable package.
    #[must_use]
    pub fn new(task: impl Fn() + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            core: StaticCore::new(None, None, task),
        })
    }

    /// Creates an owned re-usable package.
    #[must_use]
    pub fn with_owner(
        owner: OwnerId,
        owner_sub_id: Option<u32>,
        task: impl Fn() + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            core: StaticCore::new(Some(owner), owner_sub_id, task),
        })
    }

    /// Whether the package currently sits in a queue or is executing.
    #[must_use]
    pub fn is_detached(&self) -> bool { self.core.state() == StaticState::Detached }
}

/// Caller-owned, re-usable work package with an absolute monotonic deadline.
///
/// The deadline is settable while (and only while) the package is detached, so one
/// package can serve a periodic re-arm pattern: its functor does its work, moves the
/// deadline, and re-enqueues itself.
#[derive(Debug)]
pub struct StaticDeferredWorkPackage {
    pub(crate) core: StaticCore,
    pub(crate) execute_at: Mutex<Instant>,
}

impl StaticDeferredWorkPackage {
    /// Creates an anonymous re-usable deferred package due at `execute_at`.
    #[must_use]
    pub fn new(execute_at: Instant, task: impl Fn() + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            core: StaticCore::new(None, None, task),
            execute_at: Mutex::new(execute_at),
        })
    }

    /// Creates an owned re-usable deferred package due at `execute_at`.
    #[must_use]
    pub fn with_owner(
        owner: OwnerId,
        owner_sub_id: Option<u32>,
        execute_at: Instant,
        task: impl Fn() + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            core: StaticCore::new(Some(owner), owner_sub_id, task),
            execute_at: Mutex::new(execute_at),
        })
    }

    /// Moves the deadline.
    ///
    /// Legal while the package is detached, or from within its own functor while
    /// it executes (the re-arm pattern: do the work, move the deadline,
    /// re-enqueue).
    ///
    /// # Errors
    ///
    /// [`QueueError::NotDetached`] if the package is enqueued - the queue's
    /// deferred list is sorted by deadline and silently mutating the key would
    /// corrupt that order.
    pub fn set_execute_at(&self, execute_at: Instant) -> Result<(), QueueError> {
        if matches!(
            self.core.state(),
            StaticState::Enqueued | StaticState::ExecutingReenqueued
        ) {
            return Err(QueueError::NotDetached);
        }
        *self.execute_at.lock().expect("deadline mutex poisoned") = execute_at;
        Ok(())
    }

    /// Current deadline.
    #[must_use]
    pub fn execute_at(&self) -> Instant {
        *self.execute_at.lock().expect("deadline mutex poisoned")
    }
}
