// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Shared concurrency primitives used by every other module in this crate.
//!
//! [`std::sync::Mutex`], [`std::sync::Condvar`] and [`std::time::Instant`] already
//! cover the mutex / condition-variable / monotonic-clock needs, so this module only
//! adds what std lacks:
//!
//! - [`Semaphore`] - a counting semaphore (std has none).
//! - [`CancelToken`] / [`WorkerThread`] - named thread spawning with cooperative
//!   cancellation, the way every dedicated thread in this crate is run.
//! - [`abort_on_panic`] - the crate-wide rendering of "a panic escaping user code is
//!   fatal".

// Attach sources.
pub mod panic_guard;
pub mod semaphore;
pub mod worker_thread;

// Re-export.
pub use panic_guard::*;
pub use semaphore::*;
pub use worker_thread::*;
