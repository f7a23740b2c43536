// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Error types of the log subsystem: [`LogError`], [`BackendError`],
//! [`ConfigError`].

use crate::sync::SpawnError;
use std::io;

/// Failures of [`ThreadedLogFacility`](super::ThreadedLogFacility) lifecycle and
/// registration operations.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum LogError {
    /// A logger with this source name is already registered at the facility.
    #[error("A log source named '{name}' is already registered")]
    #[diagnostic(code(r3bl_base::log::duplicate_source))]
    DuplicateSource {
        /// The colliding source name.
        name: String,
    },

    /// The logger is already attached to a facility. A logger can be registered
    /// at one facility only.
    #[error("Logger is already attached to a log facility")]
    #[diagnostic(code(r3bl_base::log::already_attached))]
    AlreadyAttached,

    /// The logger is not registered at this facility.
    #[error("Logger is not registered at this log facility")]
    #[diagnostic(code(r3bl_base::log::not_registered))]
    NotRegistered,

    /// [`start`](super::ThreadedLogFacility::start) while the worker runs.
    #[error("The log facility worker is already running")]
    #[diagnostic(code(r3bl_base::log::already_started))]
    AlreadyStarted,

    /// Worker thread creation failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Spawn(#[from] SpawnError),
}

/// Failure of one [`Backend::process`](super::Backend::process) call.
///
/// A failing back-end never aborts delivery to the remaining back-ends; the
/// facility counts the incident and reports it through the drop-report line.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum BackendError {
    /// The sink could not be written.
    #[error("Backend I/O failed")]
    #[diagnostic(code(r3bl_base::log::backend_io))]
    Io(#[from] io::Error),

    /// The back-end could not grow its internal storage.
    #[error("Backend out of host memory")]
    #[diagnostic(code(r3bl_base::log::backend_oom))]
    OutOfHostMemory,
}

/// Failures of the persisted log-configuration readers and writers.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ConfigError {
    /// Reading or writing the underlying stream failed.
    #[error("Log configuration I/O failed")]
    #[diagnostic(code(r3bl_base::log::config_io))]
    Io(#[from] io::Error),

    /// The binary stream does not start with the expected magic-version word.
    #[error("Unsupported log configuration version {found:#010x}")]
    #[diagnostic(code(r3bl_base::log::config_bad_magic))]
    BadMagic {
        /// The magic-version word actually read.
        found: u32,
    },

    /// The input violates the format (bad level code, non-UTF-8 name, malformed
    /// text line). Reading aborts at the first offense.
    #[error("Malformed log configuration: {reason}")]
    #[diagnostic(code(r3bl_base::log::config_invalid_format))]
    InvalidFormat {
        /// What exactly is malformed.
        reason: String,
    },
}
