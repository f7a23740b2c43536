// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Threaded log facility: many logger fronts, one bounded FIFO, one worker
//! thread, many back-ends.
//!
//! # Shape of the pipeline
//!
//! ```text
//! Logger ──┐
//! Logger ──┼──► bounded FIFO ──► worker thread ──► Backend (terminal)
//! Logger ──┘    (per facility)   (formats text)    Backend (history ring)
//! ```
//!
//! [`Logger`] is the per-source front: a name plus an atomic severity threshold.
//! Messages below the threshold are dropped before any allocation. The
//! [`ThreadedLogFacility`] enqueues accepted messages into a bounded FIFO -
//! bounded for everything *below* error severity; error and fatal messages are
//! exempt. The worker thread renders each message
//! (`[<SEVERITY>] <source>: <text>`) and hands it to every registered
//! [`Backend`] in registration order.
//!
//! # Nothing is dropped silently
//!
//! Capacity overflows, message-creation failures and back-end delivery failures
//! are counted, and the worker periodically synthesizes an error line
//! (`N message(s) dropped`) through the normal back-end chain - retrying until
//! that report itself got through.
//!
//! # Level raising is racy by design
//!
//! Raising a logger's level does not chase messages already past the check; a
//! handful of below-threshold messages may still be emitted. Removing the race
//! would cost a global stall per level change, which is not worth it.
//!
//! # Configuration
//!
//! Per-logger levels can be snapshot and restored as a list, persisted in a
//! [binary](config_binary) or [text](config_text) form, and manipulated through
//! the [`cli`] command surface.

// Attach sources.
pub mod backend;
pub mod backend_history;
pub mod backend_term;
pub mod cli;
pub mod config_binary;
pub mod config_text;
pub mod errors;
pub mod facility;
pub mod levels;
pub mod logger;
pub mod message;

#[cfg(test)]
mod tests;

// Re-export.
pub use backend::*;
pub use backend_history::*;
pub use backend_term::*;
pub use cli::*;
pub use errors::*;
pub use facility::*;
pub use levels::*;
pub use logger::*;
pub use message::*;
