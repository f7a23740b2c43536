// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The sink interface of the log pipeline: [`Backend`].

use super::{BackendError, LogType};

/// A sink that consumes rendered log lines.
///
/// Implementations are registered at a [`ThreadedLogFacility`] and invoked on
/// its worker thread, in registration order, with no facility mutex held. They
/// must be internally synchronized (`Send + Sync`) because clearing/reading a
/// back-end (e.g. the history ring) happens from other threads.
///
/// `process` receives the fully rendered line - possibly multi-line for
/// messages with a nested error chain - and the message's severity, so sinks
/// can style or filter without re-parsing the text.
///
/// Errors are counted by the facility and surface in its drop report; panics
/// are fatal.
///
/// [`ThreadedLogFacility`]: super::ThreadedLogFacility
pub trait Backend: Send + Sync {
    /// Consumes one rendered log line.
    ///
    /// # Errors
    ///
    /// [`BackendError`] if the line could not be recorded or written; the
    /// facility counts it and moves on to the next back-end.
    fn process(&self, text: &str, severity: LogType) -> Result<(), BackendError>;
}
