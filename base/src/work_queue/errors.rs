// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Error type of the work queue: [`QueueError`].

/// Failures of [`DeferredWorkQueue`] operations.
///
/// [`DeferredWorkQueue`]: super::DeferredWorkQueue
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum QueueError {
    /// A caller-owned (static) package was enqueued while it is already in a queue.
    ///
    /// A static package may sit in at most one queue at a time. Re-enqueueing is
    /// legal only once it is detached again - or from within its own functor while
    /// it executes.
    #[error("Static work package is already enqueued")]
    #[diagnostic(code(r3bl_base::work_queue::already_enqueued))]
    AlreadyEnqueued,

    /// A deferred package's deadline was changed while the package is enqueued or
    /// executing. Deadlines are only settable on detached packages.
    #[error("Deferred work package is not detached")]
    #[diagnostic(code(r3bl_base::work_queue::not_detached))]
    NotDetached,

    /// The host heap refused to grow the queue.
    #[error("Host heap exhausted while enqueueing a work package")]
    #[diagnostic(code(r3bl_base::work_queue::out_of_host_memory))]
    OutOfHostMemory,
}
