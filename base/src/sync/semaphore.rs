// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Counting semaphore: [`Semaphore`].

use std::sync::{Condvar, Mutex};

/// A counting semaphore built from a [`Mutex`] + [`Condvar`] monitor.
///
/// Used wherever one thread must park until another thread hands it a token, e.g.
/// [`DeferredWorkQueue::flush_non_deferred`] enqueues a sentinel work package that
/// posts a local semaphore the flushing thread waits on.
///
/// Spurious condvar wakeups are absorbed internally - [`wait()`] only returns after a
/// token has actually been consumed.
///
/// [`DeferredWorkQueue::flush_non_deferred`]: crate::work_queue::DeferredWorkQueue::flush_non_deferred
/// [`wait()`]: Self::wait
#[derive(Debug, Default)]
pub struct Semaphore {
    count: Mutex<usize>,
    cv: Condvar,
}

impl Semaphore {
    /// Creates a semaphore with `initial` tokens.
    #[must_use]
    pub fn new(initial: usize) -> Self {
        Self {
            count: Mutex::new(initial),
            cv: Condvar::new(),
        }
    }

    /// Adds one token and wakes one waiter.
    pub fn post(&self) {
        let mut count = self.count.lock().expect("Semaphore mutex poisoned");
        *count += 1;
        self.cv.notify_one();
    }

    /// Blocks until a token is available, then consumes it.
    pub fn wait(&self) {
        let mut count = self.count.lock().expect("Semaphore mutex poisoned");
        while *count == 0 {
            count = self.cv.wait(count).expect("Semaphore mutex poisoned");
        }
        *count -= 1;
    }

    /// Consumes a token if one is available right now.
    ///
    /// # Returns
    ///
    /// `true` if a token was consumed, `false` if the count was zero.
    pub fn try_wait(&self) -> bool {
        let mut count = self.count.lock().expect("Semaphore mutex poisoned");
        if *count == 0 {
            return false;
        }
        *count -= 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread, time::Duration};

    #[test]
    fn try_wait_reports_token_availability() {
        let sem = Semaphore::new(1);
        assert!(sem.try_wait());
        assert!(!sem.try_wait());
        sem.post();
        assert!(sem.try_wait());
    }

    #[test]
    fn wait_parks_until_post_from_other_thread() {
        let sem = Arc::new(Semaphore::new(0));
        let sem_for_thread = Arc::clone(&sem);

        let handle = thread::spawn(move || {
            sem_for_thread.wait();
        });

        // Give the spawned thread a moment to park, then release it.
        thread::sleep(Duration::from_millis(20));
        sem.post();
        handle.join().unwrap();

        assert!(!sem.try_wait());
    }

    #[test]
    fn posts_accumulate() {
        let sem = Semaphore::new(0);
        sem.post();
        sem.post();
        sem.wait();
        sem.wait();
        assert!(!sem.try_wait());
    }
}
