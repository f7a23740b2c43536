// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words PLL resampling

//! Triggered cyclic execution: a thread that samples on an external trigger at a
//! fixed rhythm, plus the supervisor that sequences its start/stop lifecycle.
//!
//! # Executor
//!
//! [`TriggeredCyclicExec`] owns a dedicated thread that blocks on a
//! [`TriggerSource`] and drives a four-state cycle machine
//! (`stopped -> starting -> wait-lock -> running`). Your domain logic plugs in as a
//! [`CyclicHandler`] - a capability record of five callbacks instead of an
//! inheritance hierarchy. The executor reports trigger timeouts, PLL loss of lock
//! and overruns (trigger arrived while the previous sample was still running).
//!
//! # Controller
//!
//! [`StartStopCtrl`] sits on top and turns raw executor state changes into a clean
//! client lifecycle: asynchronous [`start_async`]/[`stop_async`] with precise result
//! codes, start-locking, automatic restart after PLL loss of lock with a bounded
//! budget, and totally ordered notification hooks. Notifications travel through a
//! [`DeferredWorkQueue`] - the queue's FIFO order is what makes the stop-race
//! resolutions deterministic.
//!
//! [`DeferredWorkQueue`]: crate::work_queue::DeferredWorkQueue
//! [`start_async`]: StartStopCtrl::start_async
//! [`stop_async`]: StartStopCtrl::stop_async

// Attach sources.
pub mod controller;
pub mod executor;
pub mod states;
pub mod trigger;

#[cfg(test)]
mod tests;

// Re-export.
pub use controller::*;
pub use executor::*;
pub use states::*;
pub use trigger::*;
