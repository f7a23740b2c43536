// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words taskthreads

//! Named worker threads with cooperative cancellation: [`WorkerThread`],
//! [`CancelToken`].

use std::{io,
          sync::{Arc,
                 atomic::{AtomicBool, Ordering}},
          thread::JoinHandle};

/// Cloneable cooperative-cancellation flag shared between a [`WorkerThread`] and the
/// closure running on it.
///
/// Cancellation never interrupts a running closure - the flag is only *readable* via
/// [`is_cancellation_pending()`], and each worker loop in this crate polls it at a
/// well-defined point (top of the executor iteration, queue wait, log worker wait).
///
/// [`is_cancellation_pending()`]: Self::is_cancellation_pending
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Raises the cancellation flag. Idempotent.
    pub fn request_cancel(&self) { self.flag.store(true, Ordering::Release); }

    /// Polls the cancellation flag.
    #[must_use]
    pub fn is_cancellation_pending(&self) -> bool { self.flag.load(Ordering::Acquire) }
}

/// Failure to spawn a [`WorkerThread`].
///
/// Thread creation is the one place where the OS can refuse us resources, so it gets
/// a dedicated error kind instead of being folded into a generic one.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum SpawnError {
    /// [`std::thread::Builder::spawn()`] failed.
    #[error("Failed to spawn worker thread '{name}'")]
    #[diagnostic(
        code(r3bl_base::sync::thread_spawn),
        help(
            "The system may have reached its thread limit - \
             check `ulimit -u` for the per-user limit"
        )
    )]
    OutOfResources {
        /// Name the thread was going to carry.
        name: String,
        #[source]
        source: io::Error,
    },
}

/// A named OS thread paired with a [`CancelToken`].
///
/// This is how every dedicated thread in this crate is run: the work-queue worker,
/// the cyclic executor thread, and the log-facility worker. The closure receives the
/// token and is expected to poll it cooperatively.
///
/// The original scheduling-policy / priority knobs of the underlying platform layer
/// are not portable through [`std::thread`]; only the stack size survives.
///
/// Dropping a [`WorkerThread`] without [`join()`] requests cancellation and detaches -
/// owners in this crate always join explicitly.
///
/// [`join()`]: Self::join
#[derive(Debug)]
pub struct WorkerThread {
    handle: Option<JoinHandle<()>>,
    cancel: CancelToken,
}

impl WorkerThread {
    /// Spawns a named thread running `work`.
    ///
    /// # Errors
    ///
    /// Returns [`SpawnError::OutOfResources`] if the OS refuses to create the thread.
    pub fn spawn<F>(
        name: &str,
        stack_size: Option<usize>,
        work: F,
    ) -> Result<Self, SpawnError>
    where
        F: FnOnce(CancelToken) + Send + 'static,
    {
        let cancel = CancelToken::new();
        let token_for_thread = cancel.clone();

        let mut builder = std::thread::Builder::new().name(name.to_owned());
        if let Some(bytes) = stack_size {
            builder = builder.stack_size(bytes);
        }

        let handle = builder
            .spawn(move || work(token_for_thread))
            .map_err(|source| SpawnError::OutOfResources {
                name: name.to_owned(),
                source,
            })?;

        Ok(Self {
            handle: Some(handle),
            cancel,
        })
    }

    /// Raises the thread's cancellation flag. Does not wait.
    pub fn cancel(&self) { self.cancel.request_cancel(); }

    /// Returns a clone of the thread's [`CancelToken`].
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken { self.cancel.clone() }

    /// Waits until the thread has terminated.
    ///
    /// A panic on the worker thread is re-raised here so it cannot pass silently.
    ///
    /// # Panics
    ///
    /// Panics if the worker thread panicked.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(panic_payload) = handle.join() {
                std::panic::resume_unwind(panic_payload);
            }
        }
    }

    /// [`cancel()`](Self::cancel) followed by [`join()`](Self::join).
    pub fn cancel_and_join(self) {
        self.cancel();
        self.join();
    }
}

impl Drop for WorkerThread {
    fn drop(&mut self) {
        // Not joined: make sure the thread at least notices it should wind down.
        if self.handle.is_some() {
            self.cancel.request_cancel();
        }
    }
}
