// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words condvar coalesced

//! Concurrency and runtime building blocks for embedded and server applications.
//!
//! This crate is the execution backbone that the rest of an application hangs off of.
//! It deliberately contains **no async runtime** - every blocking behavior is a plain
//! OS thread parked on a condition-variable monitor, which keeps the crate usable from
//! any threading environment and makes its ordering guarantees easy to state and test.
//!
//! # The four subsystems
//!
//! | Module         | What it gives you                                                   |
//! | :------------- | :------------------------------------------------------------------ |
//! | [`work_queue`] | Single-consumer FIFO of prompt and time-deferred work packages      |
//! | [`cyclic`]     | Trigger-driven cyclic executor + supervised start/stop controller   |
//! | [`mem`]        | Segregated-free-list heap manager over an arbitrary address window  |
//! | [`log`]        | Multi-producer, single-consumer log pipeline with drop reporting    |
//!
//! They share the primitives in [`sync`] (counting semaphore, cancellable worker
//! threads) and one failure discipline: recoverable failures are `Result`s, a panic
//! escaping *user-supplied* code (work-package functors, cyclic callbacks, controller
//! hooks) is treated as fatal and aborts the process - see [`sync::abort_on_panic`].
//!
//! # Threading model
//!
//! The crate spawns exactly three kinds of threads, each owned by its component:
//! one worker per [`work_queue::DeferredWorkQueue`] (via
//! [`work_queue::WorkQueueThread`]), one thread per [`cyclic::TriggeredCyclicExec`],
//! and one worker per [`log::ThreadedLogFacility`]. User code calls in from arbitrary
//! threads. Cancellation is cooperative and polled at well-defined suspension points.
//!
//! # Lock ordering
//!
//! Where components nest, mutexes are acquired top-to-bottom in this order and never
//! the other way around:
//!
//! ```text
//! Logger -> LogFacility(front) -> LogFacility(queue) -> WorkQueue(queue)
//!        -> StartStopCtrl -> TriggeredCyclicExec -> HeapManager
//! ```
//!
//! Backends, work-package functors, and cyclic callbacks always run with the
//! component's own mutex *released* (functors hold only the queue's flush mutex so
//! that [`work_queue::DeferredWorkQueue::flush_non_deferred`] has a synchronization
//! point).

// Attach sources.
pub mod cyclic;
pub mod log;
pub mod mem;
pub mod sync;
pub mod work_queue;

// Re-export.
pub use cyclic::*;
pub use log::*;
pub use mem::*;
pub use sync::*;
pub use work_queue::*;
