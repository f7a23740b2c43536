// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words CSI

//! Terminal sink with severity coloring: [`TermBackend`].

use super::{Backend, BackendError, LogType};
use std::{io::Write,
          sync::Mutex};

// CSI styles per severity. The `ansi-colors` feature compiles them out entirely
// for sinks (or tests) that must see the raw text.
#[cfg(feature = "ansi-colors")]
mod style {
    pub const WARNING: &str = "\x1b[1;33m"; // yellow, bold
    pub const ERROR: &str = "\x1b[31m"; // red
    pub const FATAL: &str = "\x1b[1;31m"; // red, bold
    pub const RESET: &str = "\x1b[0m";
}
#[cfg(not(feature = "ansi-colors"))]
mod style {
    pub const WARNING: &str = "";
    pub const ERROR: &str = "";
    pub const FATAL: &str = "";
    pub const RESET: &str = "";
}

/// Log back-end writing one line per message to a terminal-like sink.
///
/// Warnings, errors and fatal messages are wrapped in CSI color escapes (reset
/// after each line); debug and info lines pass through unstyled. Defaults to
/// stdout; any `Write + Send` sink can be substituted, which is also how tests
/// capture output.
pub struct TermBackend {
    sink: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for TermBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TermBackend").finish_non_exhaustive()
    }
}

impl Default for TermBackend {
    fn default() -> Self { Self::new() }
}

impl TermBackend {
    /// Terminal back-end writing to stdout.
    #[must_use]
    pub fn new() -> Self { Self::with_sink(Box::new(std::io::stdout())) }

    /// Terminal back-end writing to an arbitrary sink.
    #[must_use]
    pub fn with_sink(sink: Box<dyn Write + Send>) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }
}

impl Backend for TermBackend {
    fn process(&self, text: &str, severity: LogType) -> Result<(), BackendError> {
        let prefix = match severity {
            LogType::Warning => style::WARNING,
            LogType::Error => style::ERROR,
            LogType::Fatal => style::FATAL,
            LogType::Debug | LogType::Info => "",
        };
        let suffix = if prefix.is_empty() { "" } else { style::RESET };

        let mut sink = self.sink.lock().expect("TermBackend sink poisoned");
        writeln!(sink, "{prefix}{text}{suffix}")?;
        sink.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// Shared capture sink so the test can read what the backend wrote.
    #[derive(Clone, Default)]
    struct CaptureSink(Arc<Mutex<Vec<u8>>>);

    impl Write for CaptureSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> { Ok(()) }
    }

    fn capture() -> (TermBackend, CaptureSink) {
        let sink = CaptureSink::default();
        (TermBackend::with_sink(Box::new(sink.clone())), sink)
    }

    #[test]
    fn info_lines_pass_through_unstyled() {
        let (backend, sink) = capture();
        backend.process("[INFO ] Src: hello", LogType::Info).unwrap();
        let written = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
        assert_eq!(written, "[INFO ] Src: hello\n");
    }

    #[cfg(feature = "ansi-colors")]
    #[test]
    fn error_lines_are_wrapped_in_color_escapes() {
        let (backend, sink) = capture();
        backend.process("[ERROR] Src: boom", LogType::Error).unwrap();
        let written = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
        assert_eq!(written, "\x1b[31m[ERROR] Src: boom\x1b[0m\n");
    }

    #[cfg(feature = "ansi-colors")]
    #[test]
    fn fatal_is_bold_red_and_warning_bold_yellow() {
        let (backend, sink) = capture();
        backend.process("w", LogType::Warning).unwrap();
        backend.process("f", LogType::Fatal).unwrap();
        let written = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
        assert_eq!(written, "\x1b[1;33mw\x1b[0m\n\x1b[1;31mf\x1b[0m\n");
    }
}
