// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Severity and threshold vocabulary: [`LogType`], [`LogLevel`].

use strum_macros::{Display, EnumString, FromRepr};

/// Length of every header returned by [`LogType::header`].
pub const LOG_MSG_HEADER_LENGTH: usize = 7;

/// Severity of one log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, FromRepr)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum LogType {
    /// Messages by developers for developers.
    Debug = 0,
    /// Useful for running and management of the system.
    Info = 1,
    /// Handled exceptional situations.
    Warning = 2,
    /// Unhandled errors.
    Error = 3,
    /// Critical conditions; typically post-mortem records, since a program about
    /// to terminate will not get its fatal message through a queue anyway.
    Fatal = 4,
}

impl LogType {
    /// Fixed-width message header, always [`LOG_MSG_HEADER_LENGTH`] characters.
    #[must_use]
    pub fn header(self) -> &'static str {
        match self {
            Self::Debug => "[DEBUG]",
            Self::Info => "[INFO ]",
            Self::Warning => "[WARN ]",
            Self::Error => "[ERROR]",
            Self::Fatal => "[FATAL]",
        }
    }
}

/// Per-logger threshold: messages of a [`LogType`] below it are suppressed.
///
/// The numeric values line up with [`LogType`] so that the filter check is a
/// single comparison: a message passes iff `type as u8 >= level as u8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString,
         FromRepr)]
#[repr(u8)]
pub enum LogLevel {
    /// Logs everything.
    #[strum(serialize = "debug")]
    DebugOrAbove = 0,
    /// Logs info, warning, error and fatal messages.
    #[strum(serialize = "info")]
    InfoOrAbove = 1,
    /// Logs warning, error and fatal messages.
    #[strum(serialize = "warning")]
    WarningOrAbove = 2,
    /// Logs error and fatal messages.
    #[strum(serialize = "error")]
    ErrorOrAbove = 3,
    /// Logs fatal messages only.
    #[strum(serialize = "fatal")]
    FatalOrAbove = 4,
    /// Logs nothing.
    #[strum(serialize = "nothing")]
    Nothing = 5,
}

impl LogLevel {
    /// Single-letter code used by the CLI surface: `D I W E F N`.
    #[must_use]
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'D' => Some(Self::DebugOrAbove),
            'I' => Some(Self::InfoOrAbove),
            'W' => Some(Self::WarningOrAbove),
            'E' => Some(Self::ErrorOrAbove),
            'F' => Some(Self::FatalOrAbove),
            'N' => Some(Self::Nothing),
            _ => None,
        }
    }

    /// Whether a message of severity `log_type` passes this threshold.
    #[must_use]
    pub fn allows(self, log_type: LogType) -> bool { log_type as u8 >= self as u8 }
}
