// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The deposited form of one log message: [`LogMessage`].

use super::LogType;
use chrono::{DateTime, Local};
use std::{error::Error, sync::Arc};

/// Indentation of nested error-cause lines.
const CAUSE_INDENT: &str = "        ";

/// Payload variants of a deposited message.
///
/// Rendering the final text happens on the facility's worker thread, so the
/// payload keeps the cheapest possible representation of what the call site
/// provided: a borrowed literal, an owned string, a deferred closure, or an
/// owned error whose cause chain is walked at render time.
pub(crate) enum MessagePayload {
    Static(&'static str),
    Text(String),
    /// Built on the worker thread, not at the call site.
    Lazy(Box<dyn FnOnce() -> String + Send>),
    WithError {
        text: String,
        error: Box<dyn Error + Send + Sync>,
    },
}

/// One message in the facility's FIFO, waiting to be rendered and delivered.
pub(crate) struct LogMessage {
    /// Name of the emitting log source (shared with its [`Logger`]).
    ///
    /// [`Logger`]: super::Logger
    pub source: Arc<str>,
    pub severity: LogType,
    /// Wall-clock stamp for the timestamped call variants.
    pub timestamp: Option<DateTime<Local>>,
    pub payload: MessagePayload,
}

impl LogMessage {
    /// Renders the final output:
    /// `[<SEVERITY>] <source>: [<timestamp>] <text>`, followed by one indented
    /// line per nested error cause.
    pub fn render(self) -> String {
        let mut out = String::new();
        out.push_str(self.severity.header());
        out.push(' ');
        out.push_str(&self.source);
        out.push_str(": ");

        if let Some(timestamp) = self.timestamp {
            out.push_str(&timestamp.format("[%Y-%m-%d %H:%M:%S%.3f] ").to_string());
        }

        match self.payload {
            MessagePayload::Static(text) => out.push_str(text),
            MessagePayload::Text(text) => out.push_str(&text),
            MessagePayload::Lazy(build) => out.push_str(&build()),
            MessagePayload::WithError { text, error } => {
                out.push_str(&text);
                let mut level = 1usize;
                let mut cause: Option<&(dyn Error + 'static)> = Some(error.as_ref());
                while let Some(current) = cause {
                    out.push('\n');
                    out.push_str(CAUSE_INDENT);
                    out.push_str(&format!("{level}: {current}"));
                    cause = current.source();
                    level += 1;
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn message(severity: LogType, payload: MessagePayload) -> LogMessage {
        LogMessage {
            source: Arc::from("TestSrc"),
            severity,
            timestamp: None,
            payload,
        }
    }

    #[test]
    fn renders_header_source_and_text() {
        let rendered = message(LogType::Info, MessagePayload::Static("hello")).render();
        assert_eq!(rendered, "[INFO ] TestSrc: hello");
    }

    #[test]
    fn lazy_payload_is_built_at_render_time() {
        let rendered =
            message(LogType::Debug, MessagePayload::Lazy(Box::new(|| "built".into()))).render();
        assert_eq!(rendered, "[DEBUG] TestSrc: built");
    }

    #[test]
    fn error_cause_chain_becomes_indented_lines() {
        #[derive(Debug)]
        struct Inner;
        impl std::fmt::Display for Inner {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "inner cause")
            }
        }
        impl Error for Inner {}

        #[derive(Debug)]
        struct Outer(Inner);
        impl std::fmt::Display for Outer {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "outer failure")
            }
        }
        impl Error for Outer {
            fn source(&self) -> Option<&(dyn Error + 'static)> { Some(&self.0) }
        }

        let rendered = message(
            LogType::Error,
            MessagePayload::WithError {
                text: "operation failed".into(),
                error: Box::new(Outer(Inner)),
            },
        )
        .render();

        let expected = concat!(
            "[ERROR] TestSrc: operation failed\n",
            "        1: outer failure\n",
            "        2: inner cause"
        );
        assert_eq!(rendered, expected);
    }

    #[test]
    fn timestamp_is_prepended_to_the_text() {
        let timestamp = Local::now();
        let rendered = LogMessage {
            source: Arc::from("Clocked"),
            severity: LogType::Warning,
            timestamp: Some(timestamp),
            payload: MessagePayload::Static("tick"),
        }
        .render();

        let expected_prefix =
            format!("[WARN ] Clocked: {}", timestamp.format("[%Y-%m-%d %H:%M:%S%.3f] "));
        assert_eq!(rendered, format!("{expected_prefix}tick"));
    }
}
