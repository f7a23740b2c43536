// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Trigger plumbing: [`TriggerSource`], [`TriggerEvent`], [`SoftwareTrigger`].

use std::{sync::{Condvar, Mutex},
          time::Duration};

/// Outcome of one [`TriggerSource::wait_timeout`] attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEvent {
    /// The trigger fired while we were waiting.
    Signaled,
    /// The trigger had already fired *before* the wait started - the waiter was
    /// late. For the cyclic executor this is the overrun indication.
    AlreadySignaled,
    /// No trigger within the timeout.
    Timeout,
}

/// A signalable wake-up source the cyclic executor blocks on.
///
/// Implementations wrap whatever actually paces the system: a timer interrupt
/// relayed from an ISR, a field-bus sync frame, a [`SoftwareTrigger`] fed by
/// another thread, or a scripted double in tests. The executor only ever calls the
/// wait side.
///
/// The signal side is latching, not counting: a signal arriving while no one waits
/// is held until the next wait (which then reports [`AlreadySignaled`]); further
/// signals in that window coalesce into the same latch.
///
/// [`AlreadySignaled`]: TriggerEvent::AlreadySignaled
pub trait TriggerSource: Send + Sync {
    /// Blocks until the trigger fires (or consumed a latched signal immediately).
    fn wait(&self);

    /// Blocks until the trigger fires, at most `timeout`.
    fn wait_timeout(&self, timeout: Duration) -> TriggerEvent;
}

/// [`TriggerSource`] signalable from ordinary threads.
///
/// A latched flag under a [`Mutex`] + [`Condvar`] monitor. [`signal()`] is cheap
/// and non-blocking (beyond the mutex), so it can be called from a timer callback
/// or any producer thread.
///
/// [`signal()`]: Self::signal
#[derive(Debug, Default)]
pub struct SoftwareTrigger {
    signaled: Mutex<bool>,
    cv: Condvar,
}

impl SoftwareTrigger {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Fires the trigger. Coalesces with a still-latched previous signal.
    pub fn signal(&self) {
        let mut signaled = self.signaled.lock().expect("SoftwareTrigger mutex poisoned");
        *signaled = true;
        self.cv.notify_one();
    }
}

impl TriggerSource for SoftwareTrigger {
    fn wait(&self) {
        let mut signaled = self.signaled.lock().expect("SoftwareTrigger mutex poisoned");
        while !*signaled {
            signaled = self.cv.wait(signaled).expect("SoftwareTrigger mutex poisoned");
        }
        *signaled = false;
    }

    fn wait_timeout(&self, timeout: Duration) -> TriggerEvent {
        let mut signaled = self.signaled.lock().expect("SoftwareTrigger mutex poisoned");

        // Latched before the wait started: the waiter is late.
        if *signaled {
            *signaled = false;
            return TriggerEvent::AlreadySignaled;
        }

        let deadline = std::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            if remaining.is_zero() {
                return TriggerEvent::Timeout;
            }
            let (guard, _timeout_result) = self
                .cv
                .wait_timeout(signaled, remaining)
                .expect("SoftwareTrigger mutex poisoned");
            signaled = guard;
            if *signaled {
                *signaled = false;
                return TriggerEvent::Signaled;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread};

    #[test]
    fn signal_before_wait_reports_already_signaled() {
        let trigger = SoftwareTrigger::new();
        trigger.signal();
        assert_eq!(
            trigger.wait_timeout(Duration::from_millis(10)),
            TriggerEvent::AlreadySignaled
        );
    }

    #[test]
    fn repeated_signals_coalesce_into_one_latch() {
        let trigger = SoftwareTrigger::new();
        trigger.signal();
        trigger.signal();
        assert_eq!(
            trigger.wait_timeout(Duration::from_millis(10)),
            TriggerEvent::AlreadySignaled
        );
        assert_eq!(
            trigger.wait_timeout(Duration::from_millis(10)),
            TriggerEvent::Timeout
        );
    }

    #[test]
    fn wait_times_out_without_a_signal() {
        let trigger = SoftwareTrigger::new();
        assert_eq!(
            trigger.wait_timeout(Duration::from_millis(10)),
            TriggerEvent::Timeout
        );
    }

    #[test]
    fn signal_from_another_thread_wakes_the_waiter() {
        let trigger = Arc::new(SoftwareTrigger::new());
        let trigger_for_thread = Arc::clone(&trigger);

        let signaler = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            trigger_for_thread.signal();
        });

        assert_eq!(
            trigger.wait_timeout(Duration::from_secs(5)),
            TriggerEvent::Signaled
        );
        signaler.join().unwrap();
    }
}
