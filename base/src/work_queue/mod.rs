// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Deferred work queue: a single-consumer FIFO that serializes prompt and
//! time-deferred callables onto one worker thread.
//!
//! # Work packages
//!
//! Two storage disciplines, two timing disciplines:
//!
//! | Type                          | Storage                   | Timing                |
//! | :---------------------------- | :------------------------ | :-------------------- |
//! | [`WorkPackage`]               | queue-owned, one-shot     | as soon as possible   |
//! | [`DeferredWorkPackage`]       | queue-owned, one-shot     | at/after a deadline   |
//! | [`StaticWorkPackage`]         | caller-owned, re-usable   | as soon as possible   |
//! | [`StaticDeferredWorkPackage`] | caller-owned, re-usable   | at/after a deadline   |
//!
//! *Queue-owned* ("dynamic") packages are consumed by execution or removal.
//! *Caller-owned* ("static") packages live in an [`Arc`](std::sync::Arc), carry an
//! explicit enqueued/executing state, may be re-enqueued after each run (even by
//! their own functor while it is executing), and double-enqueueing is an error.
//!
//! # Ordering
//!
//! Normal packages run in FIFO order. Deferred packages run no earlier than their
//! deadline, ordered by deadline (FIFO among equal deadlines), and - once due - take
//! priority over normal packages. [`DeferredWorkQueue::insert_at_head`] provides
//! urgency without a priority field.
//!
//! # Removal and flushing
//!
//! Packages can be detached by identity or by owner ([`OwnerId`]); removal of a
//! package that is currently executing blocks until that execution finished.
//! [`DeferredWorkQueue::flush_non_deferred`] blocks until every normal package
//! enqueued before the call has executed.
//!
//! [`WorkQueueThread`] bundles a queue with the worker thread that drives it.

// Attach sources.
pub mod errors;
pub mod owner;
pub mod queue;
pub mod work_package;
pub mod wq_thread;

#[cfg(test)]
mod tests;

// Re-export.
pub use errors::*;
pub use owner::*;
pub use queue::*;
pub use work_package::*;
pub use wq_thread::*;
