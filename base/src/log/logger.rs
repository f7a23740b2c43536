// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The per-source log front: [`Logger`].

use super::{LogLevel, LogMessage, LogType, MessagePayload, ThreadedLogFacility};
use chrono::Local;
use std::{error::Error,
          sync::{Arc, Mutex, Weak,
                 atomic::{AtomicU8, Ordering}}};

/// Per-source front-end of the log pipeline.
///
/// Every subsystem that wants to log creates one `Logger` (named after itself)
/// and registers it at a [`ThreadedLogFacility`]. The logger carries the
/// source's severity threshold; everything below it is dropped before any
/// allocation happens.
///
/// # Call variants
///
/// | Method                                  | Payload                           |
/// | :-------------------------------------- | :-------------------------------- |
/// | [`log()`] / [`log_ts()`]                | `&'static str`, zero-cost deposit |
/// | [`log_string()`] / [`log_string_ts()`]  | pre-built [`String`]              |
/// | [`log_lazy()`] / [`log_lazy_ts()`]      | closure, built on worker thread   |
/// | [`log_with_error()`] / [`..._ts()`]     | text + error whose cause chain is rendered as indented lines |
///
/// The `_ts` variants stamp the wall clock at the call site; rendering still
/// happens on the worker.
///
/// Every variant is no-throw. For payloads the *caller* builds (strings,
/// closures' captures), wrap the construction and report failures via
/// [`log_failed()`] - the facility turns those into a guaranteed error line.
/// Check [`is_above_level()`] first to skip expensive construction entirely.
///
/// # Level changes
///
/// [`set_log_level()`] and friends are lock-free stores. Raising the level
/// races benignly with in-flight messages (see the [module docs](super)).
///
/// [`is_above_level()`]: Self::is_above_level
/// [`log()`]: Self::log
/// [`log_failed()`]: Self::log_failed
/// [`log_lazy()`]: Self::log_lazy
/// [`log_lazy_ts()`]: Self::log_lazy_ts
/// [`log_string()`]: Self::log_string
/// [`log_string_ts()`]: Self::log_string_ts
/// [`log_ts()`]: Self::log_ts
/// [`log_with_error()`]: Self::log_with_error
/// [`set_log_level()`]: Self::set_log_level
pub struct Logger {
    name: Arc<str>,
    level: AtomicU8,
    /// Back-pointer to the owning facility. Weak on purpose: the facility holds
    /// weak references to its loggers, loggers hold a weak reference back - the
    /// user's `Arc<Logger>` is the only owner.
    facility: Mutex<Option<Weak<ThreadedLogFacility>>>,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("level", &self.log_level())
            .finish_non_exhaustive()
    }
}

impl Logger {
    /// Default threshold of a fresh logger.
    pub const DEFAULT_LEVEL: LogLevel = LogLevel::InfoOrAbove;

    /// Creates a detached logger named `name` at the default level.
    #[must_use]
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: Arc::from(name),
            level: AtomicU8::new(Self::DEFAULT_LEVEL as u8),
            facility: Mutex::new(None),
        })
    }

    /// Name of this log source.
    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    pub(crate) fn name_shared(&self) -> Arc<str> { Arc::clone(&self.name) }

    /// Whether a message of severity `log_type` would currently pass the filter.
    #[must_use]
    pub fn is_above_level(&self, log_type: LogType) -> bool {
        self.log_level().allows(log_type)
    }

    /// Currently configured threshold.
    #[must_use]
    pub fn log_level(&self) -> LogLevel {
        LogLevel::from_repr(self.level.load(Ordering::Relaxed)).expect("valid level repr")
    }

    /// Sets the threshold.
    pub fn set_log_level(&self, level: LogLevel) {
        self.level.store(level as u8, Ordering::Relaxed);
    }

    /// Ensures the threshold is at or below `level` (logging at least as much).
    pub fn lower_log_level(&self, level: LogLevel) {
        if self.log_level() > level {
            self.set_log_level(level);
        }
    }

    /// Ensures the threshold is at or above `level` (logging at most as much).
    pub fn raise_log_level(&self, level: LogLevel) {
        if self.log_level() < level {
            self.set_log_level(level);
        }
    }

    // ------------------------------------------------------------ log variants

    /// Logs a string literal.
    pub fn log(&self, log_type: LogType, text: &'static str) {
        self.deposit(log_type, false, MessagePayload::Static(text));
    }

    /// Logs a string literal with a wall-clock timestamp.
    pub fn log_ts(&self, log_type: LogType, text: &'static str) {
        self.deposit(log_type, true, MessagePayload::Static(text));
    }

    /// Logs a pre-built string.
    pub fn log_string(&self, log_type: LogType, text: impl Into<String>) {
        self.deposit(log_type, false, MessagePayload::Text(text.into()));
    }

    /// Logs a pre-built string with a wall-clock timestamp.
    pub fn log_string_ts(&self, log_type: LogType, text: impl Into<String>) {
        self.deposit(log_type, true, MessagePayload::Text(text.into()));
    }

    /// Logs a message whose text is built on the worker thread - the cheapest
    /// way to log expensive-to-format data.
    pub fn log_lazy(
        &self,
        log_type: LogType,
        build: impl FnOnce() -> String + Send + 'static,
    ) {
        self.deposit(log_type, false, MessagePayload::Lazy(Box::new(build)));
    }

    /// Timestamped variant of [`log_lazy()`](Self::log_lazy).
    pub fn log_lazy_ts(
        &self,
        log_type: LogType,
        build: impl FnOnce() -> String + Send + 'static,
    ) {
        self.deposit(log_type, true, MessagePayload::Lazy(Box::new(build)));
    }

    /// Logs a message plus an error; the error's cause chain is rendered as one
    /// indented line per level.
    pub fn log_with_error(
        &self,
        log_type: LogType,
        text: impl Into<String>,
        error: impl Error + Send + Sync + 'static,
    ) {
        self.deposit(
            log_type,
            false,
            MessagePayload::WithError {
                text: text.into(),
                error: Box::new(error),
            },
        );
    }

    /// Timestamped variant of [`log_with_error()`](Self::log_with_error).
    pub fn log_with_error_ts(
        &self,
        log_type: LogType,
        text: impl Into<String>,
        error: impl Error + Send + Sync + 'static,
    ) {
        self.deposit(
            log_type,
            true,
            MessagePayload::WithError {
                text: text.into(),
                error: Box::new(error),
            },
        );
    }

    /// Reports that a log message could not even be created (e.g. building its
    /// text failed). The facility counts these and emits a summary error line.
    pub fn log_failed(&self) {
        if let Some(facility) = self.current_facility() {
            facility.report_message_creation_failed();
        }
    }

    // -------------------------------------------------------------- internals

    fn deposit(&self, log_type: LogType, timestamped: bool, payload: MessagePayload) {
        if !self.is_above_level(log_type) {
            return;
        }
        let Some(facility) = self.current_facility() else {
            return;
        };

        facility.enqueue(LogMessage {
            source: self.name_shared(),
            severity: log_type,
            timestamp: timestamped.then(Local::now),
            payload,
        });
    }

    fn current_facility(&self) -> Option<Arc<ThreadedLogFacility>> {
        self.facility
            .lock()
            .expect("Logger mutex poisoned")
            .as_ref()
            .and_then(Weak::upgrade)
    }

    /// Binds this logger to a facility. Part of registration.
    pub(crate) fn attach(&self, facility: &Arc<ThreadedLogFacility>) -> Result<(), super::LogError> {
        let mut slot = self.facility.lock().expect("Logger mutex poisoned");
        if slot.as_ref().is_some_and(|weak| weak.upgrade().is_some()) {
            return Err(super::LogError::AlreadyAttached);
        }
        *slot = Some(Arc::downgrade(facility));
        Ok(())
    }

    /// Unbinds this logger. Part of unregistration.
    pub(crate) fn detach(&self) {
        *self.facility.lock().expect("Logger mutex poisoned") = None;
    }
}
